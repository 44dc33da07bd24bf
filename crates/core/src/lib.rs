//! # Refset Core
//!
//! Workflow engine for translating the concepts of a reference set.
//!
//! This crate contains the translation workflow and its storage:
//! - The role capability table, action validation and execution ([`workflow`])
//! - Candidate pools and assigned work per role, with paging
//! - Versioned stores: a Git-backed store with one commit per write, and an in-memory
//!   store for embedding and tests
//!
//! **No interface concerns**: argument parsing, environment loading and subscriber setup
//! belong in the `refset-run` binary.

pub mod config;
pub mod constants;
pub mod error;
pub mod paging;
pub mod stores;
pub mod user;
pub mod workflow;

pub use config::CoreConfig;
pub use error::{WorkflowError, WorkflowResult};
pub use paging::{Page, PageRequest};
pub use stores::{
    ConceptStore, GitStore, MemoryStore, RefsetStore, RevisionStore, TrackingRecordStore,
    TranslationStore, WorkflowStore,
};
pub use user::User;
pub use workflow::{
    ValidationResult, WorkflowChange, WorkflowConfig, WorkflowOutcome, WorkflowResponse,
    WorkflowService,
};
