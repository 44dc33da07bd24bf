use super::find_tracking_record;
use super::rules::{rule_for, translation_rule_for, RecordRequirement};
use crate::stores::TrackingRecordStore;
use crate::user::User;
use crate::WorkflowResult;
use refset_model::{Concept, TrackingRecord, Translation, UserRole, WorkflowAction};
use serde::Serialize;

/// Outcome of validating one action. An empty `errors` list means the action may be
/// performed; `warnings` never block it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(message: String) -> Self {
        Self {
            errors: vec![message],
            warnings: Vec::new(),
        }
    }
}

/// Decides whether an action is legal for a role on the current state.
///
/// Business-rule failures are reported in the returned [`ValidationResult`], one error
/// per failed check. Only store failures and data-integrity faults (two live tracking
/// records for one concept) come back as `Err`.
pub struct WorkflowActionValidator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> WorkflowActionValidator<'a, S>
where
    S: TrackingRecordStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn validate(
        &self,
        translation: &Translation,
        user: &User,
        role: UserRole,
        action: WorkflowAction,
        concept: &Concept,
    ) -> WorkflowResult<ValidationResult> {
        if action == WorkflowAction::Cancel {
            return Ok(ValidationResult::default());
        }

        if action.is_translation_level() {
            return Ok(validate_translation_action(translation, action));
        }

        let Some(rule) = rule_for(action, role) else {
            return Ok(ValidationResult::error(format!(
                "{action} is not permitted for role {role}"
            )));
        };

        if let Some(owner) = concept.translation_id {
            if owner != translation.id {
                return Ok(ValidationResult::error(format!(
                    "concept {} belongs to a different translation",
                    concept.terminology_id
                )));
            }
        }

        let record = find_tracking_record(self.store, concept)?;
        if !rule.record.allows(record.is_some()) {
            let message = match rule.record {
                RecordRequirement::Absent => format!(
                    "concept {} is already assigned",
                    concept.terminology_id
                ),
                _ => format!("concept {} is not assigned", concept.terminology_id),
            };
            return Ok(ValidationResult::error(message));
        }

        if let (Some(expected), Some(record)) = (rule.reviewer_count, &record) {
            if record.reviewers.len() != expected {
                return Ok(ValidationResult::error(format!(
                    "concept {} has {} reviewer(s); {action} as {role} needs {expected}",
                    concept.terminology_id,
                    record.reviewers.len()
                )));
            }
        }

        if rule.requires_membership {
            let is_member = record
                .as_ref()
                .is_some_and(|r| holds_role(r, user.name(), role));
            if !is_member {
                return Ok(ValidationResult::error(format!(
                    "{} does not hold the {role} place on concept {}",
                    user.name(),
                    concept.terminology_id
                )));
            }
        }

        let is_revision = record.as_ref().is_some_and(|r| r.revision);
        if !rule.allows_status(concept.workflow_status, is_revision) {
            return Ok(ValidationResult::error(format!(
                "{action} is not allowed for {role} on concept {} in status {}",
                concept.terminology_id, concept.workflow_status
            )));
        }

        if action == WorkflowAction::Unassign && concept.workflow_status.is_review() {
            if let Some(record) = &record {
                if let Err(message) = released_review_slot(record, user.name(), role) {
                    return Ok(ValidationResult::error(format!(
                        "{message} on concept {}",
                        concept.terminology_id
                    )));
                }
            }
        }

        let mut result = ValidationResult::default();
        if action == WorkflowAction::Assign && role != UserRole::Author {
            if let Some(record) = &record {
                if record.has_author(user.name()) {
                    result
                        .warnings
                        .push(format!("{} is reviewing their own work", user.name()));
                }
                if record.reviewers.iter().any(|r| r == user.name()) {
                    result.warnings.push(format!(
                        "{} already reviewed concept {}",
                        user.name(),
                        concept.terminology_id
                    ));
                }
            }
        }
        Ok(result)
    }
}

fn validate_translation_action(translation: &Translation, action: WorkflowAction) -> ValidationResult {
    match translation_rule_for(action) {
        Some(rule) if rule.statuses.contains(&translation.workflow_status) => {
            ValidationResult::default()
        }
        Some(_) => ValidationResult::error(format!(
            "{action} is not allowed on translation {} in status {}",
            translation.name, translation.workflow_status
        )),
        None => ValidationResult::error(format!("{action} is not a translation action")),
    }
}

/// The reviewer slot an `UNASSIGN` during review releases.
///
/// Only the most recent slot can be released: `REVIEWER` while it is alone on the
/// record, `REVIEWER2` for its own slot, and `ADMIN` for whichever slot is last.
pub(crate) fn released_review_slot(
    record: &TrackingRecord,
    user: &str,
    role: UserRole,
) -> Result<usize, String> {
    let last = record
        .reviewers
        .len()
        .checked_sub(1)
        .ok_or_else(|| "no reviewer to release".to_string())?;
    if role == UserRole::Admin {
        return Ok(last);
    }
    let Some(slot) = role.reviewer_slot() else {
        return Err(format!("{role} cannot release a review"));
    };
    if record.reviewer(slot) != Some(user) {
        return Err(format!("{user} does not hold the {role} place"));
    }
    if slot != last {
        return Err(format!(
            "{user} cannot release the {role} place while a second reviewer holds the review"
        ));
    }
    Ok(slot)
}

/// Whether `user` is the record's author (any of them), first reviewer or second reviewer.
fn holds_role(record: &TrackingRecord, user: &str, role: UserRole) -> bool {
    match role.reviewer_slot() {
        Some(slot) => record.reviewer(slot) == Some(user),
        None => role == UserRole::Author && record.has_author(user),
    }
}
