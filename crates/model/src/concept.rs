//! Concepts: the unit of editorial work inside a translation.

use crate::status::WorkflowStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Definition status given to concepts created by the workflow before any terminology
/// server has classified them.
pub const UNKNOWN_DEFINITION_STATUS: &str = "unknown";

/// A translated description of a concept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub term: String,
    pub language_code: String,
    pub type_id: String,
}

/// A concept being translated.
///
/// `id` is `None` until a store has persisted the concept. Candidate concepts surfaced
/// from refset membership start out unpersisted and gain an identity on their first
/// author `ASSIGN`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub id: Option<Uuid>,
    pub terminology_id: String,
    pub name: String,
    pub translation_id: Option<Uuid>,
    pub module_id: Option<String>,
    pub effective_time: Option<NaiveDate>,
    pub definition_status_id: Option<String>,
    pub workflow_status: WorkflowStatus,
    /// Set while a concept that already reached publication readiness is re-opened.
    pub revision: bool,
    #[serde(default)]
    pub descriptions: Vec<Description>,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
}

impl Concept {
    /// An unpersisted `NEW` concept for a terminology id.
    pub fn new(terminology_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            terminology_id: terminology_id.into(),
            name: name.into(),
            translation_id: None,
            module_id: None,
            effective_time: None,
            definition_status_id: None,
            workflow_status: WorkflowStatus::New,
            revision: false,
            descriptions: Vec::new(),
            last_modified: None,
            last_modified_by: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Record who touched the concept and when.
    pub fn stamp(&mut self, user: &str, at: DateTime<Utc>) {
        self.last_modified = Some(at);
        self.last_modified_by = Some(user.to_string());
    }
}
