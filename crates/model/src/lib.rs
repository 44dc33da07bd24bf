//! Domain model for refset translation curation.
//!
//! This crate provides the **value types** the workflow engine operates on, plus the
//! JSON wire helpers used by on-disk stores:
//! - workflow vocabularies (statuses, roles, actions)
//! - concepts, translations and refsets as fully-loaded value structs
//! - tracking records (the "checked out" marker for a concept)
//!
//! Nothing here performs I/O or decides whether an action is legal; that belongs to
//! `refset-core`.

pub mod concept;
pub mod status;
pub mod tracking_record;
pub mod translation;
pub mod wire;

pub use concept::{Concept, Description, UNKNOWN_DEFINITION_STATUS};
pub use status::{TranslationStatus, UserRole, WorkflowAction, WorkflowStatus};
pub use tracking_record::TrackingRecord;
pub use translation::{Refset, RefsetMember, Translation};

pub use refset_types::{NonEmptyText, TextError, UserName};

/// Errors returned by the `refset-model` crate.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`ModelError`].
pub type ModelResult<T> = Result<T, ModelError>;
