//! The refset translation workflow engine.
//!
//! Callers follow a validate-then-perform protocol:
//!
//! 1. [`WorkflowService::validate_workflow_action`] decides whether an action is legal for
//!    a role on the current concept, tracking record and translation. Business-rule
//!    failures come back as a [`ValidationResult`], never as `Err`.
//! 2. [`WorkflowService::perform_workflow_action`] applies the action through the store
//!    and returns the resulting state as a [`WorkflowOutcome`].
//!
//! [`WorkflowService::submit_workflow_action`] does both in one call.
//!
//! The engine never caches: every call re-reads the tracking record, and callers are
//! expected to re-fetch state between actions. Exclusivity of tracking records is enforced
//! by the store's atomic create-if-absent; the validator's "record absent" check is only
//! a best-effort guard ahead of it.

mod candidates;
mod executor;
pub mod rules;
mod validator;

pub use candidates::CandidatePoolFinder;
pub use executor::{WorkflowActionExecutor, WorkflowChange, WorkflowOutcome};
pub use rules::{workflow_config, WorkflowConfig};
pub use validator::{ValidationResult, WorkflowActionValidator};

use crate::config::CoreConfig;
use crate::paging::{Page, PageRequest};
use crate::stores::{TrackingRecordStore, WorkflowStore};
use crate::user::User;
use crate::{WorkflowError, WorkflowResult};
use refset_model::{Concept, TrackingRecord, Translation, UserRole, WorkflowAction};
use serde::Serialize;
use std::sync::Arc;

/// The single-or-none tracking record lookup shared by validation and execution.
///
/// An unpersisted concept has no record. More than one live record is a data-integrity
/// fault.
pub(crate) fn find_tracking_record<S>(
    store: &S,
    concept: &Concept,
) -> WorkflowResult<Option<TrackingRecord>>
where
    S: TrackingRecordStore + ?Sized,
{
    let Some(concept_id) = concept.id else {
        return Ok(None);
    };
    let mut records = store.find_tracking_records_by_concept(concept_id)?;
    if records.len() > 1 {
        tracing::error!(
            concept_id = %concept_id,
            count = records.len(),
            "multiple live tracking records for one concept"
        );
        return Err(WorkflowError::DuplicateTrackingRecords {
            concept_id,
            count: records.len(),
        });
    }
    Ok(records.pop())
}

/// Result of [`WorkflowService::submit_workflow_action`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WorkflowResponse {
    Rejected(ValidationResult),
    Performed(WorkflowOutcome),
}

/// Entry point bundling validation, execution and the candidate pools over one store.
pub struct WorkflowService<S> {
    store: S,
    cfg: Arc<CoreConfig>,
}

impl<S: WorkflowStore> WorkflowService<S> {
    pub fn new(store: S, cfg: Arc<CoreConfig>) -> Self {
        Self { store, cfg }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn validate_workflow_action(
        &self,
        translation: &Translation,
        user: &User,
        role: UserRole,
        action: WorkflowAction,
        concept: &Concept,
    ) -> WorkflowResult<ValidationResult> {
        let result = WorkflowActionValidator::new(&self.store)
            .validate(translation, user, role, action, concept)?;
        tracing::debug!(
            action = %action,
            role = %role,
            user = user.name(),
            terminology_id = %concept.terminology_id,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validated workflow action"
        );
        Ok(result)
    }

    pub fn perform_workflow_action(
        &self,
        translation: &Translation,
        user: &User,
        role: UserRole,
        action: WorkflowAction,
        concept: &Concept,
    ) -> WorkflowResult<WorkflowOutcome> {
        let outcome = WorkflowActionExecutor::new(&self.store)
            .perform(translation, user, role, action, concept)?;
        tracing::info!(
            action = %action,
            role = %role,
            user = user.name(),
            terminology_id = %concept.terminology_id,
            changes = outcome.changes.len(),
            "performed workflow action"
        );
        Ok(outcome)
    }

    /// Validate, and perform only if validation found no errors.
    pub fn submit_workflow_action(
        &self,
        translation: &Translation,
        user: &User,
        role: UserRole,
        action: WorkflowAction,
        concept: &Concept,
    ) -> WorkflowResult<WorkflowResponse> {
        let validation = self.validate_workflow_action(translation, user, role, action, concept)?;
        if !validation.is_valid() {
            tracing::warn!(
                action = %action,
                role = %role,
                user = user.name(),
                terminology_id = %concept.terminology_id,
                errors = ?validation.errors,
                "rejected workflow action"
            );
            return Ok(WorkflowResponse::Rejected(validation));
        }
        self.perform_workflow_action(translation, user, role, action, concept)
            .map(WorkflowResponse::Performed)
    }

    pub fn find_available_concepts(
        &self,
        role: UserRole,
        translation: &Translation,
        page: &PageRequest,
    ) -> WorkflowResult<Page<Concept>> {
        CandidatePoolFinder::new(&self.store, self.cfg.max_page_size())
            .find_available_concepts(role, translation, page)
    }

    pub fn find_assigned_concepts(
        &self,
        role: UserRole,
        translation: &Translation,
        user_name: &str,
        page: &PageRequest,
    ) -> WorkflowResult<Page<TrackingRecord>> {
        CandidatePoolFinder::new(&self.store, self.cfg.max_page_size())
            .find_assigned_concepts(role, translation, user_name, page)
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        workflow_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{ConceptStore, GitStore, MemoryStore, RevisionStore, TranslationStore};
    use refset_model::{
        Description, Refset, RefsetMember, TranslationStatus, WorkflowStatus,
        UNKNOWN_DEFINITION_STATUS,
    };
    use std::path::PathBuf;
    use tempfile::TempDir;
    use uuid::Uuid;

    const MI: &str = "22298006";

    struct Fixture<S> {
        service: WorkflowService<S>,
        translation: Translation,
    }

    fn seed<S: WorkflowStore>(store: S, cfg: CoreConfig) -> Fixture<S> {
        let refset = store
            .create_refset(Refset::new(
                "Cardiology",
                vec![
                    RefsetMember {
                        concept_id: MI.into(),
                        name: "Myocardial infarction".into(),
                    },
                    RefsetMember {
                        concept_id: "38341003".into(),
                        name: "Hypertension".into(),
                    },
                ],
            ))
            .unwrap();
        let translation = store
            .create_translation(Translation::new(
                refset.id,
                "Cardiology (da)",
                "da",
                "554471000005108",
            ))
            .unwrap();
        Fixture {
            service: WorkflowService::new(store, Arc::new(cfg)),
            translation,
        }
    }

    fn fixture() -> Fixture<MemoryStore> {
        let cfg = CoreConfig::with_data_dir(PathBuf::from("unused")).unwrap();
        seed(MemoryStore::new(), cfg)
    }

    fn user(name: &str) -> User {
        User::from_user_name(name).unwrap()
    }

    impl<S: WorkflowStore> Fixture<S> {
        fn candidate(&self, terminology_id: &str) -> Concept {
            self.service
                .find_available_concepts(UserRole::Author, &self.translation, &PageRequest::default())
                .unwrap()
                .items
                .into_iter()
                .find(|c| c.terminology_id == terminology_id)
                .unwrap()
        }

        fn act(
            &self,
            name: &str,
            role: UserRole,
            action: WorkflowAction,
            concept: &Concept,
        ) -> WorkflowOutcome {
            match self
                .service
                .submit_workflow_action(&self.translation, &user(name), role, action, concept)
                .unwrap()
            {
                WorkflowResponse::Performed(outcome) => outcome,
                WorkflowResponse::Rejected(v) => panic!("{action} by {role} rejected: {:?}", v.errors),
            }
        }

        fn validate(
            &self,
            name: &str,
            role: UserRole,
            action: WorkflowAction,
            concept: &Concept,
        ) -> ValidationResult {
            self.service
                .validate_workflow_action(&self.translation, &user(name), role, action, concept)
                .unwrap()
        }

        fn concept(&self, id: Uuid) -> Option<Concept> {
            self.service.store().get_concept(id).unwrap()
        }

        fn record(&self, id: Uuid) -> Option<TrackingRecord> {
            let mut records = self
                .service
                .store()
                .find_tracking_records_by_concept(id)
                .unwrap();
            assert!(records.len() <= 1);
            records.pop()
        }

        /// Scenario A: alice assigns, saves and finishes. Returns the finished concept.
        fn authored(&self) -> Concept {
            let candidate = self.candidate(MI);
            let assigned = self.act("alice", UserRole::Author, WorkflowAction::Assign, &candidate);
            let mut concept = assigned.concept.unwrap();
            concept.descriptions.push(Description {
                term: "hjerteinfarkt".into(),
                language_code: "da".into(),
                type_id: "900000000000013009".into(),
            });
            let saved = self.act("alice", UserRole::Author, WorkflowAction::Save, &concept);
            let concept = saved.concept.unwrap();
            self.act("alice", UserRole::Author, WorkflowAction::Finish, &concept)
                .concept
                .unwrap()
        }

        /// Scenario A, then bob reviews to `REVIEW_DONE`.
        fn reviewed(&self) -> Concept {
            let concept = self.authored();
            let concept = self
                .act("bob", UserRole::Reviewer, WorkflowAction::Assign, &concept)
                .concept
                .unwrap();
            self.act("bob", UserRole::Reviewer, WorkflowAction::Finish, &concept)
                .concept
                .unwrap()
        }
    }

    // ------------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------------

    #[test]
    fn scenario_a_author_assign_save_finish() {
        let f = fixture();
        let candidate = f.candidate(MI);
        assert!(!candidate.is_persisted());

        let out = f.act("alice", UserRole::Author, WorkflowAction::Assign, &candidate);
        let record = out.tracking_record.unwrap();
        let concept = out.concept.unwrap();
        assert_eq!(record.authors, vec!["alice".to_string()]);
        assert!(record.for_authoring);
        assert!(!record.for_review);
        assert_eq!(concept.workflow_status, WorkflowStatus::New);
        assert_eq!(concept.translation_id, Some(f.translation.id));
        assert_eq!(concept.module_id.as_deref(), Some("554471000005108"));
        assert_eq!(
            concept.definition_status_id.as_deref(),
            Some(UNKNOWN_DEFINITION_STATUS)
        );

        let out = f.act("alice", UserRole::Author, WorkflowAction::Save, &concept);
        let concept = out.concept.unwrap();
        assert_eq!(concept.workflow_status, WorkflowStatus::EditingInProgress);
        assert_eq!(concept.last_modified_by.as_deref(), Some("alice"));

        let out = f.act("alice", UserRole::Author, WorkflowAction::Finish, &concept);
        let concept = out.concept.unwrap();
        assert_eq!(concept.workflow_status, WorkflowStatus::EditingDone);
        assert!(!out.tracking_record.unwrap().for_authoring);
        assert_eq!(f.concept(concept.id.unwrap()), Some(concept));
    }

    #[test]
    fn scenario_b_reviewer_unassign_restores_editing_done() {
        let f = fixture();
        let finished = f.authored();
        let id = finished.id.unwrap();
        let revision_at_done = f.service.store().current_revision_number(id).unwrap();

        let out = f.act("bob", UserRole::Reviewer, WorkflowAction::Assign, &finished);
        let record = out.tracking_record.unwrap();
        assert_eq!(record.reviewers, vec!["bob".to_string()]);
        assert!(record.for_review);
        assert_eq!(record.review_origin_revision, Some(revision_at_done));
        assert_eq!(out.concept.unwrap().workflow_status, WorkflowStatus::ReviewNew);

        let out = f.act("bob", UserRole::Reviewer, WorkflowAction::Unassign, &f.concept(id).unwrap());
        let record = out.tracking_record.unwrap();
        assert!(record.reviewers.is_empty());
        assert!(!record.for_review);
        assert_eq!(f.concept(id), Some(finished));
    }

    #[test]
    fn scenario_c_second_reviewer_prepares_for_publication() {
        let f = fixture();
        let concept = f.reviewed();
        assert_eq!(concept.workflow_status, WorkflowStatus::ReviewDone);
        let id = concept.id.unwrap();

        let out = f.act("carol", UserRole::Reviewer2, WorkflowAction::Assign, &concept);
        assert_eq!(
            out.tracking_record.unwrap().reviewers,
            vec!["bob".to_string(), "carol".to_string()]
        );
        let concept = out.concept.unwrap();
        assert_eq!(concept.workflow_status, WorkflowStatus::ReviewDone);

        let out = f.act(
            "carol",
            UserRole::Reviewer2,
            WorkflowAction::PrepareForPublication,
            &concept,
        );
        assert!(out.tracking_record.is_none());
        let concept = out.concept.unwrap();
        assert_eq!(concept.workflow_status, WorkflowStatus::ReadyForPublication);
        assert!(!concept.revision);
        assert!(f.record(id).is_none());
    }

    #[test]
    fn scenario_d_reviewer_cannot_assign_a_new_concept() {
        let f = fixture();
        let candidate = f.candidate(MI);
        let result = f.validate("bob", UserRole::Reviewer, WorkflowAction::Assign, &candidate);
        assert_eq!(result.errors.len(), 1);

        let response = f
            .service
            .submit_workflow_action(
                &f.translation,
                &user("bob"),
                UserRole::Reviewer,
                WorkflowAction::Assign,
                &candidate,
            )
            .unwrap();
        assert!(matches!(response, WorkflowResponse::Rejected(_)));
        assert!(f
            .service
            .store()
            .find_concepts_by_translation(f.translation.id)
            .unwrap()
            .is_empty());
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    #[test]
    fn exclusivity_holds_for_competing_authors() {
        let f = fixture();
        let stale = f.candidate(MI);
        let concept = f
            .act("alice", UserRole::Author, WorkflowAction::Assign, &stale)
            .concept
            .unwrap();

        let result = f.validate("dave", UserRole::Author, WorkflowAction::Assign, &concept);
        assert_eq!(result.errors.len(), 1);

        for attempt in [&concept, &stale] {
            let err = f
                .service
                .perform_workflow_action(
                    &f.translation,
                    &user("dave"),
                    UserRole::Author,
                    WorkflowAction::Assign,
                    attempt,
                )
                .unwrap_err();
            assert!(matches!(err, WorkflowError::TrackingRecordExists(_)));
        }

        let records = f
            .service
            .store()
            .find_tracking_records_by_translation(f.translation.id)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].authors, vec!["alice".to_string()]);
    }

    #[test]
    fn assign_then_unassign_leaves_no_residue() {
        let f = fixture();
        let concept = f
            .act("alice", UserRole::Author, WorkflowAction::Assign, &f.candidate(MI))
            .concept
            .unwrap();
        let id = concept.id.unwrap();

        let out = f.act("alice", UserRole::Author, WorkflowAction::Unassign, &concept);
        assert!(out.concept.is_none());
        assert!(out.tracking_record.is_none());
        assert!(f.concept(id).is_none());
        assert!(f.record(id).is_none());
        assert_eq!(f.candidate(MI).terminology_id, MI);
    }

    #[test]
    fn review_rollback_restores_content_after_edits() {
        let f = fixture();
        let finished = f.authored();
        let id = finished.id.unwrap();

        let mut concept = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Assign, &finished)
            .concept
            .unwrap();
        concept.name = "Heart attack".into();
        concept.descriptions.clear();
        let edited = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Save, &concept)
            .concept
            .unwrap();
        assert_eq!(edited.workflow_status, WorkflowStatus::ReviewInProgress);

        f.act("bob", UserRole::Reviewer, WorkflowAction::Unassign, &edited);
        let restored = f.concept(id).unwrap();
        assert_eq!(restored, finished);
        assert_eq!(restored.workflow_status, WorkflowStatus::EditingDone);
        assert_eq!(restored.descriptions.len(), 1);
    }

    #[test]
    fn repeated_save_keeps_status() {
        let f = fixture();
        let concept = f
            .act("alice", UserRole::Author, WorkflowAction::Assign, &f.candidate(MI))
            .concept
            .unwrap();
        let first = f
            .act("alice", UserRole::Author, WorkflowAction::Save, &concept)
            .concept
            .unwrap();
        let second = f
            .act("alice", UserRole::Author, WorkflowAction::Save, &first)
            .concept
            .unwrap();
        assert_eq!(first.workflow_status, WorkflowStatus::EditingInProgress);
        assert_eq!(second.workflow_status, first.workflow_status);

        let concept = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Assign, &f.finish_authoring(second))
            .concept
            .unwrap();
        let first = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Save, &concept)
            .concept
            .unwrap();
        let second = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Save, &first)
            .concept
            .unwrap();
        assert_eq!(second.workflow_status, WorkflowStatus::ReviewInProgress);
    }

    impl<S: WorkflowStore> Fixture<S> {
        fn finish_authoring(&self, in_progress: Concept) -> Concept {
            self.act("alice", UserRole::Author, WorkflowAction::Finish, &in_progress)
                .concept
                .unwrap()
        }

        fn state(&self) -> (Vec<Concept>, Vec<TrackingRecord>, Option<Translation>) {
            let store = self.service.store();
            let mut concepts = store.find_concepts_by_translation(self.translation.id).unwrap();
            concepts.sort_by_key(|c| c.id);
            let mut records = store
                .find_tracking_records_by_translation(self.translation.id)
                .unwrap();
            records.sort_by_key(|r| r.id);
            (
                concepts,
                records,
                store.get_translation(self.translation.id).unwrap(),
            )
        }
    }

    #[test]
    fn cancel_changes_nothing() {
        let f = fixture();
        let candidate = f.candidate(MI);
        let finished = f.authored();
        let reviewing = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Assign, &finished)
            .concept
            .unwrap();

        for concept in [&candidate, &reviewing] {
            for role in UserRole::ALL {
                let before = f.state();
                let result = f.validate("erin", role, WorkflowAction::Cancel, concept);
                assert!(result.is_valid());
                let out = f.act("erin", role, WorkflowAction::Cancel, concept);
                assert!(out.changes.is_empty());
                assert_eq!(out.concept.as_ref(), Some(concept));
                assert_eq!(f.state(), before);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Revisions, feedback and second reviewers
    // ------------------------------------------------------------------------

    fn published(f: &Fixture<MemoryStore>) -> Concept {
        let concept = f.reviewed();
        let concept = f
            .act("carol", UserRole::Reviewer2, WorkflowAction::Assign, &concept)
            .concept
            .unwrap();
        f.act(
            "carol",
            UserRole::Reviewer2,
            WorkflowAction::PrepareForPublication,
            &concept,
        )
        .concept
        .unwrap()
    }

    #[test]
    fn reopening_a_ready_concept_and_releasing_it_clears_the_revision() {
        let f = fixture();
        let ready = published(&f);
        let id = ready.id.unwrap();
        let ready_revision = f.service.store().current_revision_number(id).unwrap();

        let out = f.act("alice", UserRole::Author, WorkflowAction::Assign, &ready);
        let record = out.tracking_record.unwrap();
        assert!(record.revision);
        assert_eq!(record.origin_revision, Some(ready_revision));
        let concept = out.concept.unwrap();
        assert!(concept.revision);
        assert_eq!(concept.workflow_status, WorkflowStatus::ReadyForPublication);

        let out = f.act("alice", UserRole::Author, WorkflowAction::Unassign, &concept);
        assert!(out.tracking_record.is_none());
        assert!(!f.concept(id).unwrap().revision);
        assert!(f.record(id).is_none());
    }

    #[test]
    fn abandoning_edits_to_a_ready_concept_restores_it() {
        let f = fixture();
        let ready = published(&f);
        let id = ready.id.unwrap();

        let mut concept = f
            .act("alice", UserRole::Author, WorkflowAction::Assign, &ready)
            .concept
            .unwrap();
        concept.name = "Heart attack".into();
        let edited = f
            .act("alice", UserRole::Author, WorkflowAction::Save, &concept)
            .concept
            .unwrap();
        assert_eq!(edited.workflow_status, WorkflowStatus::EditingInProgress);

        let out = f.act("alice", UserRole::Author, WorkflowAction::Unassign, &edited);
        assert!(out.tracking_record.is_none());
        let restored = f.concept(id).unwrap();
        assert_eq!(restored.workflow_status, WorkflowStatus::ReadyForPublication);
        assert_eq!(restored.name, "Myocardial infarction");
        assert!(!restored.revision);
    }

    #[test]
    fn reviewer_feedback_keeps_one_reviewer() {
        let f = fixture();
        let concept = f.reviewed();
        let id = concept.id.unwrap();
        let concept = f
            .act("carol", UserRole::Reviewer2, WorkflowAction::Assign, &concept)
            .concept
            .unwrap();

        let out = f.act("carol", UserRole::Reviewer2, WorkflowAction::Feedback, &concept);
        let record = out.tracking_record.unwrap();
        assert_eq!(record.reviewers, vec!["bob".to_string()]);
        assert!(record.revision);
        assert!(record.for_review);
        assert_eq!(
            record.origin_reviewers,
            vec!["bob".to_string(), "carol".to_string()]
        );
        let concept = out.concept.unwrap();
        assert_eq!(concept.workflow_status, WorkflowStatus::ReviewInProgress);
        assert!(concept.revision);

        let not_member = f.validate("carol", UserRole::Reviewer2, WorkflowAction::Feedback, &concept);
        assert_eq!(not_member.errors.len(), 1);

        // bob can pick it back up as the single reviewer.
        let assigned = f
            .service
            .find_assigned_concepts(UserRole::Reviewer, &f.translation, "bob", &PageRequest::default())
            .unwrap();
        assert_eq!(assigned.total_count, 1);
        assert_eq!(assigned.items[0].concept_id, id);
    }

    #[test]
    fn author_feedback_then_unassign_puts_the_review_back() {
        let f = fixture();
        let concept = f.reviewed();
        let id = concept.id.unwrap();

        let out = f.act("alice", UserRole::Author, WorkflowAction::Feedback, &concept);
        let record = out.tracking_record.unwrap();
        assert!(record.reviewers.is_empty());
        assert!(record.for_authoring);
        let concept = out.concept.unwrap();
        assert_eq!(concept.workflow_status, WorkflowStatus::EditingInProgress);

        let out = f.act("alice", UserRole::Author, WorkflowAction::Unassign, &concept);
        let record = out.tracking_record.unwrap();
        assert_eq!(record.reviewers, vec!["bob".to_string()]);
        assert!(!record.revision);
        assert!(record.for_review);
        let restored = f.concept(id).unwrap();
        assert_eq!(restored.workflow_status, WorkflowStatus::ReviewDone);
        assert!(!restored.revision);
    }

    #[test]
    fn second_reviewer_unassign_keeps_first_review() {
        let f = fixture();
        let done = f.reviewed();
        let id = done.id.unwrap();
        let first_origin = f.record(id).unwrap().review_origin_revision;

        let concept = f
            .act("carol", UserRole::Reviewer2, WorkflowAction::Assign, &done)
            .concept
            .unwrap();
        let out = f.act("carol", UserRole::Reviewer2, WorkflowAction::Unassign, &concept);

        let record = out.tracking_record.unwrap();
        assert_eq!(record.reviewers, vec!["bob".to_string()]);
        assert!(record.for_authoring);
        assert!(record.for_review);
        assert_eq!(record.review_origin_revision, first_origin);
        assert_eq!(f.concept(id), Some(done));
    }

    #[test]
    fn first_reviewer_cannot_release_under_a_second_reviewer() {
        let f = fixture();
        let done = f.reviewed();
        let id = done.id.unwrap();
        let concept = f
            .act("carol", UserRole::Reviewer2, WorkflowAction::Assign, &done)
            .concept
            .unwrap();
        let held = f.record(id).unwrap();

        let result = f.validate("bob", UserRole::Reviewer, WorkflowAction::Unassign, &concept);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("second reviewer"));

        let err = f
            .service
            .perform_workflow_action(
                &f.translation,
                &user("bob"),
                UserRole::Reviewer,
                WorkflowAction::Unassign,
                &concept,
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::IllegalAction { .. }));
        assert_eq!(f.record(id), Some(held));
        assert_eq!(f.concept(id), Some(concept));
    }

    #[test]
    fn only_the_reviewer_in_the_slot_releases_a_review() {
        let f = fixture();
        let done = f.reviewed();
        let id = done.id.unwrap();

        for (name, role) in [
            ("alice", UserRole::Author),
            ("dave", UserRole::Reviewer),
            ("bob", UserRole::Reviewer2),
        ] {
            let result = f.validate(name, role, WorkflowAction::Unassign, &done);
            assert_eq!(result.errors.len(), 1, "{name} as {role}");
        }

        let concept = f
            .act("carol", UserRole::Reviewer2, WorkflowAction::Assign, &done)
            .concept
            .unwrap();
        for (name, role) in [("alice", UserRole::Author), ("dave", UserRole::Reviewer2)] {
            let result = f.validate(name, role, WorkflowAction::Unassign, &concept);
            assert_eq!(result.errors.len(), 1, "{name} as {role}");
        }
        assert_eq!(f.record(id).unwrap().reviewers.len(), 2);
    }

    #[test]
    fn admin_unassign_releases_the_latest_review_first() {
        let f = fixture();
        let finished = f.authored();
        let id = finished.id.unwrap();
        let concept = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Assign, &finished)
            .concept
            .unwrap();
        let done = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Finish, &concept)
            .concept
            .unwrap();
        let concept = f
            .act("carol", UserRole::Reviewer2, WorkflowAction::Assign, &done)
            .concept
            .unwrap();

        let out = f.act("root", UserRole::Admin, WorkflowAction::Unassign, &concept);
        assert_eq!(out.tracking_record.unwrap().reviewers, vec!["bob".to_string()]);
        assert_eq!(f.concept(id), Some(done.clone()));

        let out = f.act("root", UserRole::Admin, WorkflowAction::Unassign, &done);
        let record = out.tracking_record.unwrap();
        assert!(record.reviewers.is_empty());
        assert!(!record.for_review);
        assert_eq!(f.concept(id), Some(finished));
    }

    #[test]
    fn admin_unassign_discards_a_new_concept() {
        let f = fixture();
        let concept = f
            .act("alice", UserRole::Author, WorkflowAction::Assign, &f.candidate(MI))
            .concept
            .unwrap();
        let id = concept.id.unwrap();

        let out = f.act("root", UserRole::Admin, WorkflowAction::Unassign, &concept);
        assert!(out.concept.is_none());
        assert!(f.concept(id).is_none());
        assert!(f.record(id).is_none());
    }

    #[test]
    fn a_third_reviewer_is_rejected_before_perform() {
        let f = fixture();
        let done = f.reviewed();
        let id = done.id.unwrap();
        let concept = f
            .act("carol", UserRole::Reviewer2, WorkflowAction::Assign, &done)
            .concept
            .unwrap();

        let result = f.validate("dave", UserRole::Reviewer2, WorkflowAction::Assign, &concept);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("2 reviewer(s)"));

        let response = f
            .service
            .submit_workflow_action(
                &f.translation,
                &user("dave"),
                UserRole::Reviewer2,
                WorkflowAction::Assign,
                &concept,
            )
            .unwrap();
        assert!(matches!(response, WorkflowResponse::Rejected(_)));
        assert_eq!(
            f.record(id).unwrap().reviewers,
            vec!["bob".to_string(), "carol".to_string()]
        );
        assert!(f
            .service
            .find_available_concepts(UserRole::Reviewer2, &f.translation, &PageRequest::default())
            .unwrap()
            .items
            .is_empty());
    }

    // ------------------------------------------------------------------------
    // Validation and faults
    // ------------------------------------------------------------------------

    #[test]
    fn duplicate_tracking_records_are_a_consistency_fault() {
        let f = fixture();
        let concept = f
            .act("alice", UserRole::Author, WorkflowAction::Assign, &f.candidate(MI))
            .concept
            .unwrap();
        let duplicate = f.record(concept.id.unwrap()).unwrap();
        f.service
            .store()
            .insert_tracking_record_unchecked(duplicate);

        let err = f
            .service
            .validate_workflow_action(
                &f.translation,
                &user("alice"),
                UserRole::Author,
                WorkflowAction::Save,
                &concept,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::DuplicateTrackingRecords { count: 2, .. }
        ));
        assert!(err.is_consistency_fault());
    }

    #[test]
    fn unlisted_role_action_pairs_fail_with_one_error() {
        let f = fixture();
        let concept = f.reviewed();
        let result = f.validate("alice", UserRole::Author, WorkflowAction::PrepareForPublication, &concept);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("not permitted"));

        let err = f
            .service
            .perform_workflow_action(
                &f.translation,
                &user("alice"),
                UserRole::Author,
                WorkflowAction::PrepareForPublication,
                &concept,
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::IllegalAction { .. }));
    }

    #[test]
    fn status_guard_rejects_finish_before_review() {
        let f = fixture();
        let concept = f.authored();
        let result = f.validate("bob", UserRole::Reviewer, WorkflowAction::Finish, &concept);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("EDITING_DONE"));
    }

    #[test]
    fn self_review_is_a_warning_not_an_error() {
        let f = fixture();
        let concept = f.authored();
        let result = f.validate("alice", UserRole::Reviewer, WorkflowAction::Assign, &concept);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn translation_actions_follow_translation_status() {
        let f = fixture();
        let concept = f.candidate(MI);
        assert!(f
            .validate("admin", UserRole::Admin, WorkflowAction::Beta, &concept)
            .is_valid());

        let out = f.act("admin", UserRole::Admin, WorkflowAction::Beta, &concept);
        assert_eq!(out.translation.workflow_status, TranslationStatus::Beta);
        let translation = f
            .service
            .store()
            .get_translation(f.translation.id)
            .unwrap()
            .unwrap();
        assert_eq!(translation.workflow_status, TranslationStatus::Beta);

        let result = f
            .service
            .validate_workflow_action(
                &translation,
                &user("admin"),
                UserRole::Admin,
                WorkflowAction::Beta,
                &concept,
            )
            .unwrap();
        assert_eq!(result.errors.len(), 1);
        let result = f
            .service
            .validate_workflow_action(
                &translation,
                &user("admin"),
                UserRole::Admin,
                WorkflowAction::Publish,
                &concept,
            )
            .unwrap();
        assert!(result.is_valid());
    }

    // ------------------------------------------------------------------------
    // Pools
    // ------------------------------------------------------------------------

    #[test]
    fn candidate_pools_follow_the_workflow() {
        let f = fixture();
        let all = PageRequest::default();
        let ids = |role| -> Vec<String> {
            f.service
                .find_available_concepts(role, &f.translation, &all)
                .unwrap()
                .items
                .into_iter()
                .map(|c| c.terminology_id)
                .collect()
        };

        assert_eq!(ids(UserRole::Author), vec![MI.to_string(), "38341003".to_string()]);
        assert!(ids(UserRole::Reviewer).is_empty());

        let finished = f.authored();
        assert_eq!(ids(UserRole::Author), vec!["38341003".to_string()]);
        assert_eq!(ids(UserRole::Reviewer), vec![MI.to_string()]);
        assert!(ids(UserRole::Reviewer2).is_empty());

        let concept = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Assign, &finished)
            .concept
            .unwrap();
        f.act("bob", UserRole::Reviewer, WorkflowAction::Finish, &concept);
        assert_eq!(ids(UserRole::Reviewer2), vec![MI.to_string()]);
        assert_eq!(
            ids(UserRole::Admin),
            vec![MI.to_string(), "38341003".to_string()]
        );

        let page = f
            .service
            .find_available_concepts(
                UserRole::Admin,
                &f.translation,
                &PageRequest::new(0, Some(1), Some("hyper".into())),
            )
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].terminology_id, "38341003");
    }

    #[test]
    fn assigned_pools_follow_the_record() {
        let f = fixture();
        let all = PageRequest::default();
        let count = |role, user: &str| {
            f.service
                .find_assigned_concepts(role, &f.translation, user, &all)
                .unwrap()
                .total_count
        };

        let concept = f
            .act("alice", UserRole::Author, WorkflowAction::Assign, &f.candidate(MI))
            .concept
            .unwrap();
        assert_eq!(count(UserRole::Author, "alice"), 1);
        assert_eq!(count(UserRole::Author, "dave"), 0);

        let concept = f
            .act("alice", UserRole::Author, WorkflowAction::Save, &concept)
            .concept
            .unwrap();
        let concept = f
            .act("alice", UserRole::Author, WorkflowAction::Finish, &concept)
            .concept
            .unwrap();
        assert_eq!(count(UserRole::Author, "alice"), 0);

        f.act("bob", UserRole::Reviewer, WorkflowAction::Assign, &concept);
        assert_eq!(count(UserRole::Reviewer, "bob"), 1);
        assert_eq!(count(UserRole::Reviewer2, "bob"), 0);
        assert_eq!(count(UserRole::Admin, "anyone"), 1);
    }

    // ------------------------------------------------------------------------
    // On-disk store
    // ------------------------------------------------------------------------

    #[test]
    fn review_rollback_on_git_store() {
        let dir = TempDir::new().unwrap();
        let cfg = CoreConfig::with_data_dir(dir.path().join("store")).unwrap();
        let store = GitStore::init(Arc::new(cfg.clone())).unwrap();
        let f = seed(store, cfg);

        let finished = f.authored();
        let id = finished.id.unwrap();
        let mut concept = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Assign, &finished)
            .concept
            .unwrap();
        concept.name = "Heart attack".into();
        let edited = f
            .act("bob", UserRole::Reviewer, WorkflowAction::Save, &concept)
            .concept
            .unwrap();

        f.act("bob", UserRole::Reviewer, WorkflowAction::Unassign, &edited);
        assert_eq!(f.concept(id), Some(finished));
        let record = f.record(id).unwrap();
        assert!(record.reviewers.is_empty());

        // Assign/unassign on disk leaves nothing behind either.
        let other = f
            .act("alice", UserRole::Author, WorkflowAction::Assign, &f.candidate("38341003"))
            .concept
            .unwrap();
        f.act("alice", UserRole::Author, WorkflowAction::Unassign, &other);
        assert!(f.concept(other.id.unwrap()).is_none());
    }
}
