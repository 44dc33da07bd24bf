//! In-process store.
//!
//! Everything lives behind one mutex, so check-and-insert of tracking records is atomic.
//! Concept writes are appended to a revision log; revision numbers come from a single
//! counter shared by all concepts, so they increase strictly but are not contiguous per
//! concept.

use super::{ConceptStore, RefsetStore, RevisionStore, TrackingRecordStore, TranslationStore};
use crate::{WorkflowError, WorkflowResult};
use refset_model::{Concept, Refset, TrackingRecord, Translation};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug)]
struct RevisionEntry {
    revision: u64,
    concept_id: Uuid,
    /// `None` records a deletion.
    state: Option<Concept>,
}

#[derive(Debug, Default)]
struct MemoryState {
    concepts: HashMap<Uuid, Concept>,
    translations: HashMap<Uuid, Translation>,
    refsets: HashMap<Uuid, Refset>,
    records: HashMap<Uuid, TrackingRecord>,
    history: Vec<RevisionEntry>,
    last_revision: u64,
}

impl MemoryState {
    fn log(&mut self, concept_id: Uuid, state: Option<Concept>) {
        self.last_revision += 1;
        self.history.push(RevisionEntry {
            revision: self.last_revision,
            concept_id,
            state,
        });
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> WorkflowResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| WorkflowError::StoreLockPoisoned)
    }

    /// Insert a record without the uniqueness check, to reproduce corrupted data.
    #[cfg(test)]
    pub(crate) fn insert_tracking_record_unchecked(&self, mut record: TrackingRecord) -> Uuid {
        let id = Uuid::new_v4();
        record.id = Some(id);
        self.state
            .lock()
            .expect("memory store lock")
            .records
            .insert(id, record);
        id
    }
}

fn concept_id(concept: &Concept) -> WorkflowResult<Uuid> {
    concept
        .id
        .ok_or_else(|| WorkflowError::UnpersistedConcept(concept.terminology_id.clone()))
}

fn not_found(kind: &'static str, id: Uuid) -> WorkflowError {
    WorkflowError::NotFound {
        kind,
        id: id.to_string(),
    }
}

impl ConceptStore for MemoryStore {
    fn get_concept(&self, id: Uuid) -> WorkflowResult<Option<Concept>> {
        Ok(self.lock()?.concepts.get(&id).cloned())
    }

    fn create_concept(&self, mut concept: Concept) -> WorkflowResult<Concept> {
        let id = Uuid::new_v4();
        concept.id = Some(id);

        let mut state = self.lock()?;
        state.concepts.insert(id, concept.clone());
        state.log(id, Some(concept.clone()));
        tracing::debug!(concept_id = %id, terminology_id = %concept.terminology_id, "created concept");
        Ok(concept)
    }

    fn update_concept(&self, concept: &Concept) -> WorkflowResult<()> {
        let id = concept_id(concept)?;
        let mut state = self.lock()?;
        if !state.concepts.contains_key(&id) {
            return Err(not_found("concept", id));
        }
        state.concepts.insert(id, concept.clone());
        state.log(id, Some(concept.clone()));
        Ok(())
    }

    fn delete_concept(&self, id: Uuid, cascade: bool) -> WorkflowResult<()> {
        let mut state = self.lock()?;
        let concept = state.concepts.get(&id).ok_or_else(|| not_found("concept", id))?;
        if !cascade && !concept.descriptions.is_empty() {
            return Err(WorkflowError::InvalidInput(format!(
                "concept {id} still has {} descriptions",
                concept.descriptions.len()
            )));
        }
        state.concepts.remove(&id);
        state.log(id, None);
        tracing::debug!(concept_id = %id, cascade, "deleted concept");
        Ok(())
    }

    fn find_concepts_by_translation(&self, translation_id: Uuid) -> WorkflowResult<Vec<Concept>> {
        Ok(self
            .lock()?
            .concepts
            .values()
            .filter(|c| c.translation_id == Some(translation_id))
            .cloned()
            .collect())
    }
}

impl TranslationStore for MemoryStore {
    fn get_translation(&self, id: Uuid) -> WorkflowResult<Option<Translation>> {
        Ok(self.lock()?.translations.get(&id).cloned())
    }

    fn create_translation(&self, translation: Translation) -> WorkflowResult<Translation> {
        let mut state = self.lock()?;
        if !state.refsets.contains_key(&translation.refset_id) {
            return Err(not_found("refset", translation.refset_id));
        }
        state.translations.insert(translation.id, translation.clone());
        Ok(translation)
    }

    fn update_translation(&self, translation: &Translation) -> WorkflowResult<()> {
        let mut state = self.lock()?;
        if !state.translations.contains_key(&translation.id) {
            return Err(not_found("translation", translation.id));
        }
        state.translations.insert(translation.id, translation.clone());
        Ok(())
    }
}

impl RefsetStore for MemoryStore {
    fn get_refset(&self, id: Uuid) -> WorkflowResult<Option<Refset>> {
        Ok(self.lock()?.refsets.get(&id).cloned())
    }

    fn create_refset(&self, refset: Refset) -> WorkflowResult<Refset> {
        self.lock()?.refsets.insert(refset.id, refset.clone());
        Ok(refset)
    }
}

impl TrackingRecordStore for MemoryStore {
    fn find_tracking_records_by_concept(
        &self,
        concept_id: Uuid,
    ) -> WorkflowResult<Vec<TrackingRecord>> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|r| r.concept_id == concept_id)
            .cloned()
            .collect())
    }

    fn find_tracking_records_by_translation(
        &self,
        translation_id: Uuid,
    ) -> WorkflowResult<Vec<TrackingRecord>> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|r| r.translation_id == translation_id)
            .cloned()
            .collect())
    }

    fn create_tracking_record(&self, mut record: TrackingRecord) -> WorkflowResult<TrackingRecord> {
        let mut state = self.lock()?;
        if state
            .records
            .values()
            .any(|r| r.concept_id == record.concept_id)
        {
            return Err(WorkflowError::TrackingRecordExists(record.concept_id));
        }
        let id = Uuid::new_v4();
        record.id = Some(id);
        state.records.insert(id, record.clone());
        Ok(record)
    }

    fn update_tracking_record(&self, record: &TrackingRecord) -> WorkflowResult<()> {
        let id = record
            .id
            .ok_or(WorkflowError::MissingTrackingRecord(record.concept_id))?;
        let mut state = self.lock()?;
        if !state.records.contains_key(&id) {
            return Err(not_found("tracking record", id));
        }
        state.records.insert(id, record.clone());
        Ok(())
    }

    fn delete_tracking_record(&self, id: Uuid) -> WorkflowResult<()> {
        self.lock()?
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("tracking record", id))
    }
}

impl RevisionStore for MemoryStore {
    fn current_revision_number(&self, concept_id: Uuid) -> WorkflowResult<u64> {
        self.lock()?
            .history
            .iter()
            .rev()
            .find(|e| e.concept_id == concept_id)
            .map(|e| e.revision)
            .ok_or_else(|| not_found("concept", concept_id))
    }

    fn snapshot_at(&self, concept_id: Uuid, revision: u64) -> WorkflowResult<Concept> {
        self.lock()?
            .history
            .iter()
            .rev()
            .find(|e| e.concept_id == concept_id && e.revision <= revision)
            .and_then(|e| e.state.clone())
            .ok_or(WorkflowError::RevisionNotFound {
                concept_id,
                revision,
            })
    }

    fn restore(&self, concept_id: Uuid, snapshot: &Concept) -> WorkflowResult<Concept> {
        let mut restored = snapshot.clone();
        restored.id = Some(concept_id);

        let mut state = self.lock()?;
        if !state.concepts.contains_key(&concept_id) {
            return Err(not_found("concept", concept_id));
        }
        state.concepts.insert(concept_id, restored.clone());
        state.log(concept_id, Some(restored.clone()));
        tracing::debug!(concept_id = %concept_id, "restored concept from snapshot");
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refset_model::{Description, WorkflowStatus};

    fn stored_concept(store: &MemoryStore) -> Concept {
        store
            .create_concept(Concept::new("22298006", "Myocardial infarction"))
            .unwrap()
    }

    #[test]
    fn snapshot_returns_state_as_of_revision() {
        let store = MemoryStore::new();
        let mut concept = stored_concept(&store);
        let id = concept.id.unwrap();
        let first = store.current_revision_number(id).unwrap();

        concept.workflow_status = WorkflowStatus::EditingInProgress;
        concept.name = "Heart attack".into();
        store.update_concept(&concept).unwrap();
        let second = store.current_revision_number(id).unwrap();
        assert!(second > first);

        let old = store.snapshot_at(id, first).unwrap();
        assert_eq!(old.name, "Myocardial infarction");
        assert_eq!(old.workflow_status, WorkflowStatus::New);

        let restored = store.restore(id, &old).unwrap();
        assert_eq!(store.get_concept(id).unwrap(), Some(restored));
    }

    #[test]
    fn revision_numbers_ignore_other_concepts() {
        let store = MemoryStore::new();
        let a = stored_concept(&store);
        let a_rev = store.current_revision_number(a.id.unwrap()).unwrap();
        stored_concept(&store);
        assert_eq!(store.current_revision_number(a.id.unwrap()).unwrap(), a_rev);
    }

    #[test]
    fn snapshot_before_creation_is_not_found() {
        let store = MemoryStore::new();
        stored_concept(&store);
        let late = stored_concept(&store);
        let err = store.snapshot_at(late.id.unwrap(), 1).unwrap_err();
        assert!(matches!(err, WorkflowError::RevisionNotFound { .. }));
    }

    #[test]
    fn create_tracking_record_is_create_if_absent() {
        let store = MemoryStore::new();
        let concept = stored_concept(&store);
        let record = TrackingRecord::for_author(
            concept.id.unwrap(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "alice",
        );
        let created = store.create_tracking_record(record.clone()).unwrap();
        assert!(created.id.is_some());

        let err = store.create_tracking_record(record).unwrap_err();
        assert!(matches!(err, WorkflowError::TrackingRecordExists(_)));
        assert_eq!(
            store
                .find_tracking_records_by_concept(concept.id.unwrap())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn delete_without_cascade_refuses_concepts_with_descriptions() {
        let store = MemoryStore::new();
        let mut concept = Concept::new("22298006", "Myocardial infarction");
        concept.descriptions.push(Description {
            term: "hjerteinfarkt".into(),
            language_code: "da".into(),
            type_id: "900000000000013009".into(),
        });
        let concept = store.create_concept(concept).unwrap();
        let id = concept.id.unwrap();

        assert!(store.delete_concept(id, false).is_err());
        store.delete_concept(id, true).unwrap();
        assert_eq!(store.get_concept(id).unwrap(), None);
    }

    #[test]
    fn update_of_unknown_concept_is_not_found() {
        let store = MemoryStore::new();
        let mut concept = Concept::new("1", "x");
        concept.id = Some(Uuid::new_v4());
        let err = store.update_concept(&concept).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { kind: "concept", .. }));
    }
}
