//! Workflow vocabularies: concept and translation statuses, editorial roles and actions.
//!
//! All four enums serialise as `SCREAMING_SNAKE_CASE` (`READY_FOR_PUBLICATION`,
//! `REVIEWER2`, ...). Parsing from text is case-insensitive and accepts `-` in place of
//! `_` so the same names work on the command line.

use crate::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn normalise(input: &str) -> String {
    input.trim().replace('-', "_").to_ascii_uppercase()
}

/// Workflow status of a single concept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    New,
    EditingInProgress,
    EditingDone,
    ReviewNew,
    ReviewInProgress,
    ReviewDone,
    ReadyForPublication,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 7] = [
        Self::New,
        Self::EditingInProgress,
        Self::EditingDone,
        Self::ReviewNew,
        Self::ReviewInProgress,
        Self::ReviewDone,
        Self::ReadyForPublication,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::EditingInProgress => "EDITING_IN_PROGRESS",
            Self::EditingDone => "EDITING_DONE",
            Self::ReviewNew => "REVIEW_NEW",
            Self::ReviewInProgress => "REVIEW_IN_PROGRESS",
            Self::ReviewDone => "REVIEW_DONE",
            Self::ReadyForPublication => "READY_FOR_PUBLICATION",
        }
    }

    /// True for the authoring stages (`NEW`, `EDITING_IN_PROGRESS`, `EDITING_DONE`).
    pub const fn is_editing(self) -> bool {
        matches!(
            self,
            Self::New | Self::EditingInProgress | Self::EditingDone
        )
    }

    /// True for the review stages (`REVIEW_NEW`, `REVIEW_IN_PROGRESS`, `REVIEW_DONE`).
    pub const fn is_review(self) -> bool {
        matches!(
            self,
            Self::ReviewNew | Self::ReviewInProgress | Self::ReviewDone
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let wanted = normalise(s);
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "workflow status",
                value: s.to_string(),
            })
    }
}

/// Workflow status of a whole translation.
///
/// Shares the concept status names and adds the release stages `BETA` and `PUBLISHED`.
/// It is a separate type so the two state spaces cannot be mixed up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranslationStatus {
    New,
    EditingInProgress,
    EditingDone,
    ReviewNew,
    ReviewInProgress,
    ReviewDone,
    ReadyForPublication,
    Beta,
    Published,
}

impl TranslationStatus {
    pub const ALL: [TranslationStatus; 9] = [
        Self::New,
        Self::EditingInProgress,
        Self::EditingDone,
        Self::ReviewNew,
        Self::ReviewInProgress,
        Self::ReviewDone,
        Self::ReadyForPublication,
        Self::Beta,
        Self::Published,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::EditingInProgress => "EDITING_IN_PROGRESS",
            Self::EditingDone => "EDITING_DONE",
            Self::ReviewNew => "REVIEW_NEW",
            Self::ReviewInProgress => "REVIEW_IN_PROGRESS",
            Self::ReviewDone => "REVIEW_DONE",
            Self::ReadyForPublication => "READY_FOR_PUBLICATION",
            Self::Beta => "BETA",
            Self::Published => "PUBLISHED",
        }
    }
}

impl fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslationStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let wanted = normalise(s);
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "translation status",
                value: s.to_string(),
            })
    }
}

/// Editorial project role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Author,
    Reviewer,
    Reviewer2,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [Self::Author, Self::Reviewer, Self::Reviewer2, Self::Admin];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Author => "AUTHOR",
            Self::Reviewer => "REVIEWER",
            Self::Reviewer2 => "REVIEWER2",
            Self::Admin => "ADMIN",
        }
    }

    /// Index into `TrackingRecord::reviewers` held by this role, if it is a reviewer role.
    pub const fn reviewer_slot(self) -> Option<usize> {
        match self {
            Self::Reviewer => Some(0),
            Self::Reviewer2 => Some(1),
            Self::Author | Self::Admin => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let wanted = normalise(s);
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "user role",
                value: s.to_string(),
            })
    }
}

/// Action a user asks the workflow engine to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAction {
    Assign,
    Unassign,
    Save,
    Finish,
    PrepareForPublication,
    Feedback,
    Beta,
    Publish,
    Cancel,
}

impl WorkflowAction {
    pub const ALL: [WorkflowAction; 9] = [
        Self::Assign,
        Self::Unassign,
        Self::Save,
        Self::Finish,
        Self::PrepareForPublication,
        Self::Feedback,
        Self::Beta,
        Self::Publish,
        Self::Cancel,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "ASSIGN",
            Self::Unassign => "UNASSIGN",
            Self::Save => "SAVE",
            Self::Finish => "FINISH",
            Self::PrepareForPublication => "PREPARE_FOR_PUBLICATION",
            Self::Feedback => "FEEDBACK",
            Self::Beta => "BETA",
            Self::Publish => "PUBLISH",
            Self::Cancel => "CANCEL",
        }
    }

    /// Actions that change the translation rather than a concept.
    pub const fn is_translation_level(self) -> bool {
        matches!(self, Self::Beta | Self::Publish)
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowAction {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let wanted = normalise(s);
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == wanted)
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "workflow action",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialise_screaming_snake_case() {
        let json = serde_json::to_string(&WorkflowStatus::ReadyForPublication).unwrap();
        assert_eq!(json, "\"READY_FOR_PUBLICATION\"");
        let json = serde_json::to_string(&UserRole::Reviewer2).unwrap();
        assert_eq!(json, "\"REVIEWER2\"");
    }

    #[test]
    fn parse_is_case_insensitive_and_accepts_dashes() {
        assert_eq!(
            "prepare-for-publication".parse::<WorkflowAction>().unwrap(),
            WorkflowAction::PrepareForPublication
        );
        assert_eq!("reviewer2".parse::<UserRole>().unwrap(), UserRole::Reviewer2);
        assert_eq!(
            "Editing_Done".parse::<WorkflowStatus>().unwrap(),
            WorkflowStatus::EditingDone
        );
    }

    #[test]
    fn unknown_action_is_reported_with_kind() {
        let err = "approve".parse::<WorkflowAction>().unwrap_err();
        assert!(matches!(
            err,
            ModelError::UnknownVariant {
                kind: "workflow action",
                ..
            }
        ));
    }

    #[test]
    fn display_matches_as_str() {
        for status in WorkflowStatus::ALL {
            assert_eq!(status.to_string(), status.as_str());
        }
        for status in TranslationStatus::ALL {
            assert_eq!(status.to_string().parse::<TranslationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn editing_and_review_stages_are_disjoint() {
        for status in WorkflowStatus::ALL {
            assert!(!(status.is_editing() && status.is_review()));
        }
        assert!(!WorkflowStatus::ReadyForPublication.is_editing());
        assert!(!WorkflowStatus::ReadyForPublication.is_review());
    }

    #[test]
    fn reviewer_slots() {
        assert_eq!(UserRole::Reviewer.reviewer_slot(), Some(0));
        assert_eq!(UserRole::Reviewer2.reviewer_slot(), Some(1));
        assert_eq!(UserRole::Author.reviewer_slot(), None);
    }
}
