//! Performs validated workflow actions.
//!
//! Each action reads the current tracking record through the same single-or-none lookup
//! as the validator, applies its transition and writes the result through the store.
//! The returned [`WorkflowOutcome`] carries the state after the action plus a list of
//! [`WorkflowChange`]s; nothing the caller passed in is mutated.

use super::find_tracking_record;
use super::rules::rule_for;
use super::validator::released_review_slot;
use crate::stores::WorkflowStore;
use crate::user::User;
use crate::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use refset_model::{
    Concept, TrackingRecord, Translation, TranslationStatus, UserRole, WorkflowAction,
    WorkflowStatus, UNKNOWN_DEFINITION_STATUS,
};
use serde::Serialize;
use uuid::Uuid;

/// One observable effect of an action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum WorkflowChange {
    ConceptCreated {
        concept_id: Uuid,
    },
    ConceptUpdated {
        concept_id: Uuid,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },
    ConceptRestored {
        concept_id: Uuid,
        revision: u64,
    },
    ConceptDeleted {
        concept_id: Uuid,
    },
    TrackingRecordCreated {
        record_id: Uuid,
    },
    TrackingRecordUpdated {
        record_id: Uuid,
    },
    TrackingRecordDeleted {
        record_id: Uuid,
    },
    TranslationStatusChanged {
        translation_id: Uuid,
        from: TranslationStatus,
        to: TranslationStatus,
    },
}

/// State after an action.
///
/// `concept` is `None` once the concept itself was deleted, `tracking_record` is `None`
/// when no record exists any more (or never did).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkflowOutcome {
    pub tracking_record: Option<TrackingRecord>,
    pub concept: Option<Concept>,
    pub translation: Translation,
    pub changes: Vec<WorkflowChange>,
}

impl WorkflowOutcome {
    fn unchanged(
        translation: &Translation,
        concept: &Concept,
        tracking_record: Option<TrackingRecord>,
    ) -> Self {
        Self {
            tracking_record,
            concept: Some(concept.clone()),
            translation: translation.clone(),
            changes: Vec::new(),
        }
    }
}

pub struct WorkflowActionExecutor<'a, S: ?Sized> {
    store: &'a S,
}

/// Inputs shared by every transition.
struct Act<'x> {
    translation: &'x Translation,
    user: &'x str,
    role: UserRole,
    action: WorkflowAction,
    now: DateTime<Utc>,
}

impl<'a, S> WorkflowActionExecutor<'a, S>
where
    S: WorkflowStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Perform `action`. Must only be called after validation returned no errors for the
    /// same inputs.
    ///
    /// # Errors
    ///
    /// Consistency faults ([`WorkflowError::IllegalAction`],
    /// [`WorkflowError::DuplicateTrackingRecords`], [`WorkflowError::MissingTrackingRecord`],
    /// [`WorkflowError::TrackingRecordExists`]) when the state does not admit the action,
    /// and any store failure unchanged.
    pub fn perform(
        &self,
        translation: &Translation,
        user: &User,
        role: UserRole,
        action: WorkflowAction,
        concept: &Concept,
    ) -> WorkflowResult<WorkflowOutcome> {
        let act = Act {
            translation,
            user: user.name(),
            role,
            action,
            now: Utc::now(),
        };

        match action {
            WorkflowAction::Cancel => {
                let record = find_tracking_record(self.store, concept)?;
                Ok(WorkflowOutcome::unchanged(translation, concept, record))
            }
            WorkflowAction::Beta => self.set_translation_status(&act, concept, TranslationStatus::Beta),
            WorkflowAction::Publish => {
                self.set_translation_status(&act, concept, TranslationStatus::Published)
            }
            _ => {
                if rule_for(action, role).is_none() {
                    return Err(illegal(&act, "no rule permits this pair"));
                }
                match action {
                    WorkflowAction::Assign if role == UserRole::Author => {
                        self.assign_author(&act, concept)
                    }
                    WorkflowAction::Assign => self.assign_reviewer(&act, concept),
                    WorkflowAction::Unassign => self.unassign(&act, concept),
                    WorkflowAction::Save => self.save(&act, concept),
                    WorkflowAction::Finish => self.finish(&act, concept),
                    WorkflowAction::PrepareForPublication => {
                        self.prepare_for_publication(&act, concept)
                    }
                    WorkflowAction::Feedback => self.feedback(&act, concept),
                    WorkflowAction::Beta | WorkflowAction::Publish | WorkflowAction::Cancel => {
                        Err(illegal(&act, "not a concept action"))
                    }
                }
            }
        }
    }

    // ========================================================================
    // ASSIGN
    // ========================================================================

    fn assign_author(&self, act: &Act<'_>, concept: &Concept) -> WorkflowResult<WorkflowOutcome> {
        let mut changes = Vec::new();
        let mut concept = concept.clone();

        // A stale candidate may already have been picked up by someone else; fall through
        // to the record create so exclusivity is decided by the store.
        if !concept.is_persisted() {
            if let Some(existing) = self
                .store
                .find_concepts_by_translation(act.translation.id)?
                .into_iter()
                .find(|c| c.terminology_id == concept.terminology_id)
            {
                concept = existing;
            }
        }

        if !concept.is_persisted() {
            concept.translation_id = Some(act.translation.id);
            concept.module_id = Some(act.translation.module_id.clone());
            concept.effective_time = None;
            concept.definition_status_id = Some(UNKNOWN_DEFINITION_STATUS.to_string());
            concept.stamp(act.user, act.now);
            concept = self.store.create_concept(concept)?;
            changes.push(WorkflowChange::ConceptCreated {
                concept_id: persisted_id(&concept)?,
            });
        }
        let concept_id = persisted_id(&concept)?;
        let before = concept.workflow_status;

        let mut record = TrackingRecord::for_author(
            concept_id,
            act.translation.id,
            act.translation.refset_id,
            act.user,
        );
        if concept.workflow_status == WorkflowStatus::ReadyForPublication {
            record.origin_revision = Some(self.store.current_revision_number(concept_id)?);
            record.revision = true;
            concept.revision = true;
        }
        record.stamp(act.user, act.now);
        let record = self.store.create_tracking_record(record)?;
        changes.push(WorkflowChange::TrackingRecordCreated {
            record_id: record_id(&record)?,
        });

        concept.stamp(act.user, act.now);
        self.store.update_concept(&concept)?;
        changes.push(WorkflowChange::ConceptUpdated {
            concept_id,
            from: before,
            to: concept.workflow_status,
        });

        Ok(self.outcome(act, Some(concept), Some(record), changes))
    }

    fn assign_reviewer(&self, act: &Act<'_>, concept: &Concept) -> WorkflowResult<WorkflowOutcome> {
        let (concept_id, mut record) = self.require_record(act, concept)?;
        let mut concept = concept.clone();
        let before = concept.workflow_status;

        record.for_authoring = false;
        record.for_review = true;
        if act.role == UserRole::Reviewer2 {
            record.prior_review_origin_revision = record.review_origin_revision;
        }
        record.review_origin_revision = Some(self.store.current_revision_number(concept_id)?);
        record.push_reviewer(act.user)?;

        // A second reviewer joins a finished review; PREPARE_FOR_PUBLICATION is the exit.
        if act.role == UserRole::Reviewer {
            concept.workflow_status = WorkflowStatus::ReviewNew;
        }

        self.persist(act, concept, record, before, Vec::new())
    }

    // ========================================================================
    // UNASSIGN
    // ========================================================================

    fn unassign(&self, act: &Act<'_>, concept: &Concept) -> WorkflowResult<WorkflowOutcome> {
        let (concept_id, record) = self.require_record(act, concept)?;
        let status = concept.workflow_status;

        if status.is_editing() && !record.revision {
            return self.discard_new_concept(act, concept_id, record);
        }
        if status.is_editing() {
            return self.abandon_rework(act, concept_id, record);
        }
        if status == WorkflowStatus::ReadyForPublication && record.revision {
            return self.abandon_untouched_revision(act, concept, record);
        }
        if status.is_review() {
            return self.release_reviewer(act, concept_id, record);
        }
        Err(illegal(
            act,
            &format!("concept {} cannot be released from {status}", concept.terminology_id),
        ))
    }

    /// The concept was created by this authoring session: nothing of it survives.
    fn discard_new_concept(
        &self,
        act: &Act<'_>,
        concept_id: Uuid,
        record: TrackingRecord,
    ) -> WorkflowResult<WorkflowOutcome> {
        let record_id = record_id(&record)?;
        self.store.delete_tracking_record(record_id)?;
        self.store.delete_concept(concept_id, true)?;
        let changes = vec![
            WorkflowChange::TrackingRecordDeleted { record_id },
            WorkflowChange::ConceptDeleted { concept_id },
        ];
        Ok(self.outcome(act, None, None, changes))
    }

    /// Re-opened for publication but never saved: drop the record and the revision mark.
    fn abandon_untouched_revision(
        &self,
        act: &Act<'_>,
        concept: &Concept,
        record: TrackingRecord,
    ) -> WorkflowResult<WorkflowOutcome> {
        let concept_id = persisted_id(concept)?;
        let record_id = record_id(&record)?;
        self.store.delete_tracking_record(record_id)?;

        let mut concept = concept.clone();
        concept.revision = false;
        concept.stamp(act.user, act.now);
        self.store.update_concept(&concept)?;

        let changes = vec![
            WorkflowChange::TrackingRecordDeleted { record_id },
            WorkflowChange::ConceptUpdated {
                concept_id,
                from: concept.workflow_status,
                to: concept.workflow_status,
            },
        ];
        Ok(self.outcome(act, Some(concept), None, changes))
    }

    /// A revision in an editing state: roll back to where the rework started.
    fn abandon_rework(
        &self,
        act: &Act<'_>,
        concept_id: Uuid,
        mut record: TrackingRecord,
    ) -> WorkflowResult<WorkflowOutcome> {
        let origin = record
            .origin_revision
            .ok_or(WorkflowError::MissingOriginRevision(concept_id))?;
        let (mut concept, mut changes) = self.restore(concept_id, origin)?;
        let record_id = record_id(&record)?;

        if concept.workflow_status == WorkflowStatus::ReadyForPublication {
            self.store.delete_tracking_record(record_id)?;
            changes.push(WorkflowChange::TrackingRecordDeleted { record_id });
            if concept.revision {
                concept.revision = false;
                self.store.update_concept(&concept)?;
            }
            return Ok(self.outcome(act, Some(concept), None, changes));
        }

        record.reviewers = std::mem::take(&mut record.origin_reviewers);
        record.origin_revision = None;
        record.revision = concept.revision;
        let (for_authoring, for_review) = pool_flags(concept.workflow_status);
        record.for_authoring = for_authoring;
        record.for_review = for_review;
        record.stamp(act.user, act.now);
        self.store.update_tracking_record(&record)?;
        changes.push(WorkflowChange::TrackingRecordUpdated { record_id });

        Ok(self.outcome(act, Some(concept), Some(record), changes))
    }

    /// Release the acting reviewer's slot (the most recent one) and roll the concept back
    /// to where that review started. The restore is the only concept write.
    fn release_reviewer(
        &self,
        act: &Act<'_>,
        concept_id: Uuid,
        mut record: TrackingRecord,
    ) -> WorkflowResult<WorkflowOutcome> {
        let origin = record
            .review_origin_revision
            .ok_or(WorkflowError::MissingOriginRevision(concept_id))?;

        let slot = released_review_slot(&record, act.user, act.role)
            .map_err(|reason| illegal(act, &reason))?;
        match slot {
            0 => {
                record.reviewers.clear();
                record.for_review = false;
                record.review_origin_revision = None;
            }
            1 => {
                record.reviewers.truncate(1);
                record.for_authoring = true;
                record.for_review = true;
                record.review_origin_revision = record.prior_review_origin_revision.take();
            }
            n => {
                return Err(illegal(
                    act,
                    &format!("tracking record for concept {concept_id} has no reviewer slot {n}"),
                ));
            }
        }

        let (concept, mut changes) = self.restore(concept_id, origin)?;
        if !concept.revision && record.revision {
            record.revision = false;
            record.origin_revision = None;
            record.origin_reviewers.clear();
        }
        record.stamp(act.user, act.now);
        self.store.update_tracking_record(&record)?;
        changes.push(WorkflowChange::TrackingRecordUpdated {
            record_id: record_id(&record)?,
        });

        Ok(self.outcome(act, Some(concept), Some(record), changes))
    }

    fn restore(
        &self,
        concept_id: Uuid,
        revision: u64,
    ) -> WorkflowResult<(Concept, Vec<WorkflowChange>)> {
        let snapshot = self.store.snapshot_at(concept_id, revision)?;
        let concept = self.store.restore(concept_id, &snapshot)?;
        Ok((
            concept,
            vec![WorkflowChange::ConceptRestored {
                concept_id,
                revision,
            }],
        ))
    }

    // ========================================================================
    // SAVE / FINISH / FEEDBACK / PREPARE_FOR_PUBLICATION
    // ========================================================================

    fn save(&self, act: &Act<'_>, concept: &Concept) -> WorkflowResult<WorkflowOutcome> {
        let (_, record) = self.require_record(act, concept)?;
        let mut concept = concept.clone();
        let before = concept.workflow_status;

        concept.workflow_status = match (act.role, before) {
            (UserRole::Author, WorkflowStatus::New | WorkflowStatus::ReadyForPublication) => {
                WorkflowStatus::EditingInProgress
            }
            (UserRole::Reviewer | UserRole::Reviewer2, WorkflowStatus::ReviewNew) => {
                WorkflowStatus::ReviewInProgress
            }
            (_, unchanged) => unchanged,
        };

        self.persist(act, concept, record, before, Vec::new())
    }

    fn finish(&self, act: &Act<'_>, concept: &Concept) -> WorkflowResult<WorkflowOutcome> {
        let (_, mut record) = self.require_record(act, concept)?;
        let mut concept = concept.clone();
        let before = concept.workflow_status;

        match before {
            WorkflowStatus::New
            | WorkflowStatus::EditingInProgress
            | WorkflowStatus::EditingDone
            | WorkflowStatus::ReadyForPublication => {
                concept.workflow_status = WorkflowStatus::EditingDone;
                record.for_authoring = false;
            }
            WorkflowStatus::ReviewNew
            | WorkflowStatus::ReviewInProgress
            | WorkflowStatus::ReviewDone => {
                concept.workflow_status = WorkflowStatus::ReviewDone;
            }
        }

        self.persist(act, concept, record, before, Vec::new())
    }

    fn feedback(&self, act: &Act<'_>, concept: &Concept) -> WorkflowResult<WorkflowOutcome> {
        let (concept_id, mut record) = self.require_record(act, concept)?;
        let mut concept = concept.clone();
        let before = concept.workflow_status;

        if !record.revision {
            record.origin_revision = Some(self.store.current_revision_number(concept_id)?);
            record.origin_reviewers = record.reviewers.clone();
        }
        record.revision = true;
        concept.revision = true;

        if act.role == UserRole::Author {
            record.reviewers.clear();
            record.review_origin_revision = None;
            record.prior_review_origin_revision = None;
            record.for_authoring = true;
            record.for_review = false;
            concept.workflow_status = WorkflowStatus::EditingInProgress;
        } else {
            if record.reviewers.len() > 1 {
                record.reviewers.truncate(1);
                record.review_origin_revision = record.prior_review_origin_revision.take();
            }
            record.for_authoring = false;
            record.for_review = true;
            concept.workflow_status = WorkflowStatus::ReviewInProgress;
        }

        self.persist(act, concept, record, before, Vec::new())
    }

    fn prepare_for_publication(
        &self,
        act: &Act<'_>,
        concept: &Concept,
    ) -> WorkflowResult<WorkflowOutcome> {
        let (concept_id, record) = self.require_record(act, concept)?;
        let mut concept = concept.clone();
        let before = concept.workflow_status;

        concept.workflow_status = WorkflowStatus::ReadyForPublication;
        concept.revision = false;
        concept.stamp(act.user, act.now);
        self.store.update_concept(&concept)?;

        let record_id = record_id(&record)?;
        self.store.delete_tracking_record(record_id)?;

        let changes = vec![
            WorkflowChange::ConceptUpdated {
                concept_id,
                from: before,
                to: concept.workflow_status,
            },
            WorkflowChange::TrackingRecordDeleted { record_id },
        ];
        Ok(self.outcome(act, Some(concept), None, changes))
    }

    // ========================================================================
    // BETA / PUBLISH
    // ========================================================================

    fn set_translation_status(
        &self,
        act: &Act<'_>,
        concept: &Concept,
        status: TranslationStatus,
    ) -> WorkflowResult<WorkflowOutcome> {
        let mut translation = act.translation.clone();
        let from = translation.workflow_status;
        translation.workflow_status = status;
        translation.stamp(act.user, act.now);
        self.store.update_translation(&translation)?;

        Ok(WorkflowOutcome {
            tracking_record: None,
            concept: Some(concept.clone()),
            changes: vec![WorkflowChange::TranslationStatusChanged {
                translation_id: translation.id,
                from,
                to: status,
            }],
            translation,
        })
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn require_record(
        &self,
        act: &Act<'_>,
        concept: &Concept,
    ) -> WorkflowResult<(Uuid, TrackingRecord)> {
        let concept_id = persisted_id(concept)?;
        match find_tracking_record(self.store, concept)? {
            Some(record) => Ok((concept_id, record)),
            None => {
                tracing::error!(
                    action = %act.action,
                    role = %act.role,
                    concept_id = %concept_id,
                    "action performed on a concept without a tracking record"
                );
                Err(WorkflowError::MissingTrackingRecord(concept_id))
            }
        }
    }

    /// Stamp and write both the concept and its record.
    fn persist(
        &self,
        act: &Act<'_>,
        mut concept: Concept,
        mut record: TrackingRecord,
        before: WorkflowStatus,
        mut changes: Vec<WorkflowChange>,
    ) -> WorkflowResult<WorkflowOutcome> {
        let concept_id = persisted_id(&concept)?;
        concept.stamp(act.user, act.now);
        self.store.update_concept(&concept)?;
        changes.push(WorkflowChange::ConceptUpdated {
            concept_id,
            from: before,
            to: concept.workflow_status,
        });

        record.stamp(act.user, act.now);
        self.store.update_tracking_record(&record)?;
        changes.push(WorkflowChange::TrackingRecordUpdated {
            record_id: record_id(&record)?,
        });

        Ok(self.outcome(act, Some(concept), Some(record), changes))
    }

    fn outcome(
        &self,
        act: &Act<'_>,
        concept: Option<Concept>,
        tracking_record: Option<TrackingRecord>,
        changes: Vec<WorkflowChange>,
    ) -> WorkflowOutcome {
        WorkflowOutcome {
            tracking_record,
            concept,
            translation: act.translation.clone(),
            changes,
        }
    }
}

/// Pool membership implied by a concept status when a record is put back.
fn pool_flags(status: WorkflowStatus) -> (bool, bool) {
    match status {
        WorkflowStatus::New | WorkflowStatus::EditingInProgress => (true, false),
        WorkflowStatus::EditingDone | WorkflowStatus::ReadyForPublication => (false, false),
        WorkflowStatus::ReviewNew | WorkflowStatus::ReviewInProgress | WorkflowStatus::ReviewDone => {
            (false, true)
        }
    }
}

fn persisted_id(concept: &Concept) -> WorkflowResult<Uuid> {
    concept
        .id
        .ok_or_else(|| WorkflowError::UnpersistedConcept(concept.terminology_id.clone()))
}

fn record_id(record: &TrackingRecord) -> WorkflowResult<Uuid> {
    record
        .id
        .ok_or(WorkflowError::MissingTrackingRecord(record.concept_id))
}

fn illegal(act: &Act<'_>, reason: &str) -> WorkflowError {
    tracing::error!(action = %act.action, role = %act.role, reason, "illegal workflow action");
    WorkflowError::IllegalAction {
        action: act.action,
        role: act.role,
        reason: reason.to_string(),
    }
}
