//! Translations and the refsets they translate.

use crate::status::TranslationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member of a refset, identified by the terminology id of its concept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefsetMember {
    pub concept_id: String,
    pub name: String,
}

/// A named set of terminology concepts.
///
/// Membership is supplied from outside the workflow engine and is only read here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refset {
    pub id: Uuid,
    pub terminology_id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<RefsetMember>,
}

/// A language-specific translation of a refset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: Uuid,
    pub terminology_id: String,
    pub name: String,
    pub language: String,
    pub module_id: String,
    pub refset_id: Uuid,
    pub workflow_status: TranslationStatus,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
}

impl Translation {
    /// A fresh translation of `refset_id` in status `NEW`.
    pub fn new(
        refset_id: Uuid,
        name: impl Into<String>,
        language: impl Into<String>,
        module_id: impl Into<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            terminology_id: id.simple().to_string(),
            name: name.into(),
            language: language.into(),
            module_id: module_id.into(),
            refset_id,
            workflow_status: TranslationStatus::New,
            last_modified: None,
            last_modified_by: None,
        }
    }

    pub fn stamp(&mut self, user: &str, at: DateTime<Utc>) {
        self.last_modified = Some(at);
        self.last_modified_by = Some(user.to_string());
    }
}

impl Refset {
    pub fn new(name: impl Into<String>, members: Vec<RefsetMember>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            terminology_id: id.simple().to_string(),
            name: name.into(),
            members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_translation_starts_new() {
        let refset = Refset::new("Cardiology", vec![]);
        let translation = Translation::new(refset.id, "Cardiology (da)", "da", "554471000005108");
        assert_eq!(translation.workflow_status, TranslationStatus::New);
        assert_eq!(translation.refset_id, refset.id);
        assert_eq!(translation.terminology_id.len(), 32);
    }
}
