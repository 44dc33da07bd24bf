//! Tracking records: "this concept is currently checked out for editorial work".
//!
//! A tracking record exists exactly while an author or reviewer holds a concept. At most
//! one live record per concept id is allowed; stores enforce that with an atomic
//! create-if-absent.

use crate::{ModelError, ModelResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of reviewer slots (`REVIEWER`, `REVIEWER2`).
pub const MAX_REVIEWERS: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// Assigned by the store on creation.
    pub id: Option<Uuid>,
    pub concept_id: Uuid,
    pub translation_id: Uuid,
    pub refset_id: Uuid,
    /// Ordered set of authoring user names.
    pub authors: Vec<String>,
    /// Slot 0 is the first reviewer, slot 1 the second.
    pub reviewers: Vec<String>,
    pub for_authoring: bool,
    pub for_review: bool,
    pub revision: bool,
    /// Concept revision before the current authoring session (or rework) began.
    pub origin_revision: Option<u64>,
    /// Concept revision before the current review session began.
    pub review_origin_revision: Option<u64>,
    /// The first reviewer's origin while a second reviewer holds the concept.
    #[serde(default)]
    pub prior_review_origin_revision: Option<u64>,
    /// Reviewers recorded when feedback sent the concept back for rework.
    #[serde(default)]
    pub origin_reviewers: Vec<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
}

impl TrackingRecord {
    /// A new, unpersisted record checking `concept_id` out to `author`.
    pub fn for_author(concept_id: Uuid, translation_id: Uuid, refset_id: Uuid, author: &str) -> Self {
        Self {
            id: None,
            concept_id,
            translation_id,
            refset_id,
            authors: vec![author.to_string()],
            reviewers: Vec::new(),
            for_authoring: true,
            for_review: false,
            revision: false,
            origin_revision: None,
            review_origin_revision: None,
            prior_review_origin_revision: None,
            origin_reviewers: Vec::new(),
            last_modified: None,
            last_modified_by: None,
        }
    }

    pub fn has_author(&self, user: &str) -> bool {
        self.authors.iter().any(|a| a == user)
    }

    /// Adds an author unless already present, keeping insertion order.
    pub fn add_author(&mut self, user: &str) {
        if !self.has_author(user) {
            self.authors.push(user.to_string());
        }
    }

    pub fn reviewer(&self, slot: usize) -> Option<&str> {
        self.reviewers.get(slot).map(String::as_str)
    }

    /// Appends a reviewer to the next free slot.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidInput`] when both reviewer slots are taken.
    pub fn push_reviewer(&mut self, user: &str) -> ModelResult<()> {
        if self.reviewers.len() >= MAX_REVIEWERS {
            return Err(ModelError::InvalidInput(format!(
                "tracking record for concept {} already has {MAX_REVIEWERS} reviewers",
                self.concept_id
            )));
        }
        self.reviewers.push(user.to_string());
        Ok(())
    }

    pub fn stamp(&mut self, user: &str, at: DateTime<Utc>) {
        self.last_modified = Some(at);
        self.last_modified_by = Some(user.to_string());
    }
}
