//! Which concepts each role may pick up next, and which it currently holds.

use crate::paging::{paginate, Page, PageEntry, PageRequest};
use crate::stores::WorkflowStore;
use crate::{WorkflowError, WorkflowResult};
use refset_model::{Concept, TrackingRecord, Translation, UserRole, WorkflowStatus};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub struct CandidatePoolFinder<'a, S: ?Sized> {
    store: &'a S,
    max_page_size: usize,
}

impl<'a, S> CandidatePoolFinder<'a, S>
where
    S: WorkflowStore + ?Sized,
{
    pub fn new(store: &'a S, max_page_size: usize) -> Self {
        Self {
            store,
            max_page_size,
        }
    }

    /// Concepts `role` may newly `ASSIGN`.
    ///
    /// - `AUTHOR`: refset members with no concept in the translation yet, as unpersisted
    ///   `NEW` concepts
    /// - `REVIEWER`: `EDITING_DONE` concepts that have a tracking record
    /// - `REVIEWER2`: `REVIEW_DONE` concepts whose record has exactly one reviewer
    /// - `ADMIN`: all of the above
    pub fn find_available_concepts(
        &self,
        role: UserRole,
        translation: &Translation,
        page: &PageRequest,
    ) -> WorkflowResult<Page<Concept>> {
        let concepts = self.store.find_concepts_by_translation(translation.id)?;
        let records: HashMap<Uuid, TrackingRecord> = self
            .store
            .find_tracking_records_by_translation(translation.id)?
            .into_iter()
            .map(|r| (r.concept_id, r))
            .collect();

        let mut pool = Vec::new();
        if matches!(role, UserRole::Author | UserRole::Admin) {
            pool.extend(self.unrepresented_members(translation, &concepts)?);
        }
        if matches!(role, UserRole::Reviewer | UserRole::Admin) {
            pool.extend(
                concepts
                    .iter()
                    .filter(|c| c.workflow_status == WorkflowStatus::EditingDone)
                    .filter(|c| c.id.is_some_and(|id| records.contains_key(&id)))
                    .cloned(),
            );
        }
        if matches!(role, UserRole::Reviewer2 | UserRole::Admin) {
            pool.extend(
                concepts
                    .iter()
                    .filter(|c| c.workflow_status == WorkflowStatus::ReviewDone)
                    .filter(|c| {
                        c.id.and_then(|id| records.get(&id))
                            .is_some_and(|r| r.reviewers.len() == 1)
                    })
                    .cloned(),
            );
        }

        let entries = pool
            .into_iter()
            .map(|c| PageEntry {
                terminology_id: c.terminology_id.clone(),
                name: c.name.clone(),
                item: c,
            })
            .collect();
        let result = paginate(entries, page, self.max_page_size);
        tracing::debug!(
            role = %role,
            translation_id = %translation.id,
            total = result.total_count,
            "found available concepts"
        );
        Ok(result)
    }

    fn unrepresented_members(
        &self,
        translation: &Translation,
        concepts: &[Concept],
    ) -> WorkflowResult<Vec<Concept>> {
        let refset = self
            .store
            .get_refset(translation.refset_id)?
            .ok_or_else(|| WorkflowError::NotFound {
                kind: "refset",
                id: translation.refset_id.to_string(),
            })?;
        let represented: HashSet<&str> = concepts
            .iter()
            .map(|c| c.terminology_id.as_str())
            .collect();

        Ok(refset
            .members
            .iter()
            .filter(|m| !represented.contains(m.concept_id.as_str()))
            .map(|m| {
                let mut concept = Concept::new(m.concept_id.clone(), m.name.clone());
                concept.translation_id = Some(translation.id);
                concept
            })
            .collect())
    }

    /// Tracking records `user_name` currently holds in `role`.
    ///
    /// `ADMIN` sees every record of the translation.
    pub fn find_assigned_concepts(
        &self,
        role: UserRole,
        translation: &Translation,
        user_name: &str,
        page: &PageRequest,
    ) -> WorkflowResult<Page<TrackingRecord>> {
        let concepts: HashMap<Uuid, Concept> = self
            .store
            .find_concepts_by_translation(translation.id)?
            .into_iter()
            .filter_map(|c| c.id.map(|id| (id, c)))
            .collect();

        let entries = self
            .store
            .find_tracking_records_by_translation(translation.id)?
            .into_iter()
            .filter(|r| is_assigned_to(r, role, user_name))
            .map(|r| {
                let (terminology_id, name) = match concepts.get(&r.concept_id) {
                    Some(c) => (c.terminology_id.clone(), c.name.clone()),
                    None => (r.concept_id.to_string(), String::new()),
                };
                PageEntry {
                    terminology_id,
                    name,
                    item: r,
                }
            })
            .collect();

        Ok(paginate(entries, page, self.max_page_size))
    }
}

fn is_assigned_to(record: &TrackingRecord, role: UserRole, user_name: &str) -> bool {
    match role {
        UserRole::Author => {
            record.has_author(user_name) && record.for_authoring && !record.for_review
        }
        UserRole::Reviewer => {
            record.reviewers.len() == 1 && record.reviewer(0) == Some(user_name) && record.for_review
        }
        UserRole::Reviewer2 => record.reviewer(1) == Some(user_name),
        UserRole::Admin => true,
    }
}
