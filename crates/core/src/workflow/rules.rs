//! The role capability table.
//!
//! One row per legal (action, role) pair. The validator evaluates these rows against the
//! live concept and tracking record, and the same rows are exported as data through
//! [`workflow_config`] so user interfaces can pre-filter actions.
//!
//! `UNASSIGN` has one row per role. Which reviewer slot it actually releases is decided
//! from the tracking record when the action is performed, not from the row.

use refset_model::{TranslationStatus, UserRole, WorkflowAction, WorkflowStatus};
use serde::Serialize;

use WorkflowStatus::{
    EditingDone, EditingInProgress, New, ReadyForPublication, ReviewDone, ReviewInProgress,
    ReviewNew,
};

/// Whether a row needs a live tracking record for the concept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordRequirement {
    Absent,
    Present,
    Any,
}

impl RecordRequirement {
    pub fn allows(self, has_record: bool) -> bool {
        match self {
            Self::Absent => !has_record,
            Self::Present => has_record,
            Self::Any => true,
        }
    }
}

/// Concept statuses a row accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "statuses", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusGuard {
    Any,
    OneOf(&'static [WorkflowStatus]),
}

impl StatusGuard {
    pub fn allows(self, status: WorkflowStatus) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(statuses) => statuses.contains(&status),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRule {
    pub action: WorkflowAction,
    pub role: UserRole,
    pub record: RecordRequirement,
    pub statuses: StatusGuard,
    /// Extra statuses accepted only while the tracking record is a revision.
    pub revision_statuses: &'static [WorkflowStatus],
    /// The acting user must already hold the role's place on the record.
    pub requires_membership: bool,
    /// Number of reviewers the record must hold, when the row cares.
    pub reviewer_count: Option<usize>,
}

impl ActionRule {
    pub fn allows_status(&self, status: WorkflowStatus, record_is_revision: bool) -> bool {
        self.statuses.allows(status)
            || (record_is_revision && self.revision_statuses.contains(&status))
    }
}

/// Translation statuses from which a translation-level action may be taken, by any role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TranslationRule {
    pub action: WorkflowAction,
    pub statuses: &'static [TranslationStatus],
}

/// The complete table, as exported to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkflowConfig {
    pub concept_rules: Vec<ActionRule>,
    pub translation_rules: Vec<TranslationRule>,
    /// Actions every role may take in any state.
    pub always_allowed: Vec<WorkflowAction>,
}

const EDITING_OR_REVIEW: &[WorkflowStatus] = &[
    New,
    EditingInProgress,
    EditingDone,
    ReviewNew,
    ReviewInProgress,
    ReviewDone,
];

const fn row(
    action: WorkflowAction,
    role: UserRole,
    statuses: &'static [WorkflowStatus],
) -> ActionRule {
    ActionRule {
        action,
        role,
        record: RecordRequirement::Present,
        statuses: StatusGuard::OneOf(statuses),
        revision_statuses: &[],
        requires_membership: false,
        reviewer_count: None,
    }
}

const fn unassign(role: UserRole) -> ActionRule {
    ActionRule {
        revision_statuses: &[ReadyForPublication],
        ..row(WorkflowAction::Unassign, role, EDITING_OR_REVIEW)
    }
}

const fn feedback(role: UserRole) -> ActionRule {
    ActionRule {
        action: WorkflowAction::Feedback,
        role,
        record: RecordRequirement::Present,
        statuses: StatusGuard::Any,
        revision_statuses: &[],
        requires_membership: true,
        reviewer_count: None,
    }
}

static CONCEPT_RULES: &[ActionRule] = &[
    ActionRule {
        record: RecordRequirement::Absent,
        ..row(
            WorkflowAction::Assign,
            UserRole::Author,
            &[New, ReadyForPublication],
        )
    },
    ActionRule {
        reviewer_count: Some(0),
        ..row(WorkflowAction::Assign, UserRole::Reviewer, &[EditingDone])
    },
    ActionRule {
        reviewer_count: Some(1),
        ..row(WorkflowAction::Assign, UserRole::Reviewer2, &[ReviewDone])
    },
    unassign(UserRole::Author),
    unassign(UserRole::Reviewer),
    unassign(UserRole::Reviewer2),
    unassign(UserRole::Admin),
    row(
        WorkflowAction::Save,
        UserRole::Author,
        &[New, EditingInProgress, EditingDone, ReadyForPublication],
    ),
    row(
        WorkflowAction::Save,
        UserRole::Reviewer,
        &[ReviewNew, ReviewInProgress],
    ),
    row(
        WorkflowAction::Save,
        UserRole::Reviewer2,
        &[ReviewNew, ReviewInProgress, ReviewDone],
    ),
    row(
        WorkflowAction::Finish,
        UserRole::Author,
        &[EditingInProgress, EditingDone, ReadyForPublication],
    ),
    row(
        WorkflowAction::Finish,
        UserRole::Reviewer,
        &[ReviewNew, ReviewInProgress],
    ),
    row(
        WorkflowAction::Finish,
        UserRole::Reviewer2,
        &[ReviewNew, ReviewInProgress, ReviewDone],
    ),
    row(
        WorkflowAction::PrepareForPublication,
        UserRole::Reviewer2,
        &[ReviewDone],
    ),
    feedback(UserRole::Author),
    feedback(UserRole::Reviewer),
    feedback(UserRole::Reviewer2),
];

static TRANSLATION_RULES: &[TranslationRule] = &[
    TranslationRule {
        action: WorkflowAction::Beta,
        statuses: &[TranslationStatus::New],
    },
    TranslationRule {
        action: WorkflowAction::Publish,
        statuses: &[TranslationStatus::New, TranslationStatus::Beta],
    },
];

/// The concept-level row for `(action, role)`, if that pair is ever legal.
pub fn rule_for(action: WorkflowAction, role: UserRole) -> Option<&'static ActionRule> {
    CONCEPT_RULES
        .iter()
        .find(|r| r.action == action && r.role == role)
}

pub fn translation_rule_for(action: WorkflowAction) -> Option<&'static TranslationRule> {
    TRANSLATION_RULES.iter().find(|r| r.action == action)
}

pub fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        concept_rules: CONCEPT_RULES.to_vec(),
        translation_rules: TRANSLATION_RULES.to_vec(),
        always_allowed: vec![WorkflowAction::Cancel],
    }
}
