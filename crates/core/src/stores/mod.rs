//! Persistence collaborators consumed by the workflow engine.
//!
//! The engine never touches storage directly. It reads and writes fully-loaded value
//! structs through these traits, and every implementation must provide:
//!
//! - **Exclusivity**: `create_tracking_record` is an atomic create-if-absent keyed by
//!   concept id, failing with [`WorkflowError::TrackingRecordExists`] when a live record
//!   already exists
//! - **Revisions**: every concept write produces a numbered revision that can later be
//!   read back with `snapshot_at` and written over the live concept with `restore`
//!
//! Two implementations ship with the crate: [`MemoryStore`] (in-process, append-only
//! revision log) and [`GitStore`] (JSON files in a local Git repository whose history
//! is the revision log).
//!
//! [`WorkflowError::TrackingRecordExists`]: crate::WorkflowError::TrackingRecordExists

mod git;
mod memory;
mod versioned;

pub use git::GitStore;
pub use memory::MemoryStore;

use crate::WorkflowResult;
use refset_model::{Concept, Refset, TrackingRecord, Translation};
use uuid::Uuid;

pub trait ConceptStore {
    fn get_concept(&self, id: Uuid) -> WorkflowResult<Option<Concept>>;

    /// Persist a new concept, assigning its id. Returns the stored concept.
    fn create_concept(&self, concept: Concept) -> WorkflowResult<Concept>;

    fn update_concept(&self, concept: &Concept) -> WorkflowResult<()>;

    /// Delete a concept. Without `cascade`, a concept that still owns descriptions is
    /// refused with `InvalidInput`.
    fn delete_concept(&self, id: Uuid, cascade: bool) -> WorkflowResult<()>;

    fn find_concepts_by_translation(&self, translation_id: Uuid) -> WorkflowResult<Vec<Concept>>;
}

pub trait TranslationStore {
    fn get_translation(&self, id: Uuid) -> WorkflowResult<Option<Translation>>;

    fn create_translation(&self, translation: Translation) -> WorkflowResult<Translation>;

    fn update_translation(&self, translation: &Translation) -> WorkflowResult<()>;
}

pub trait RefsetStore {
    fn get_refset(&self, id: Uuid) -> WorkflowResult<Option<Refset>>;

    fn create_refset(&self, refset: Refset) -> WorkflowResult<Refset>;
}

pub trait TrackingRecordStore {
    /// All live records for a concept. More than one is a data-integrity fault the
    /// caller must report.
    fn find_tracking_records_by_concept(&self, concept_id: Uuid)
        -> WorkflowResult<Vec<TrackingRecord>>;

    fn find_tracking_records_by_translation(
        &self,
        translation_id: Uuid,
    ) -> WorkflowResult<Vec<TrackingRecord>>;

    /// Atomic create-if-absent keyed by `record.concept_id`. Assigns the record id.
    fn create_tracking_record(&self, record: TrackingRecord) -> WorkflowResult<TrackingRecord>;

    fn update_tracking_record(&self, record: &TrackingRecord) -> WorkflowResult<()>;

    fn delete_tracking_record(&self, id: Uuid) -> WorkflowResult<()>;
}

pub trait RevisionStore {
    /// Number of the latest revision that changed the concept.
    fn current_revision_number(&self, concept_id: Uuid) -> WorkflowResult<u64>;

    /// The concept as it stood at `revision`.
    fn snapshot_at(&self, concept_id: Uuid, revision: u64) -> WorkflowResult<Concept>;

    /// Overwrite the live concept with every field of `snapshot`, descriptions included.
    /// Returns the concept as now stored.
    fn restore(&self, concept_id: Uuid, snapshot: &Concept) -> WorkflowResult<Concept>;
}

/// Everything the workflow engine needs from persistence.
pub trait WorkflowStore:
    ConceptStore + TranslationStore + RefsetStore + TrackingRecordStore + RevisionStore
{
}

impl<T> WorkflowStore for T where
    T: ConceptStore + TranslationStore + RefsetStore + TrackingRecordStore + RevisionStore
{
}
