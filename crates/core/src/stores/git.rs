//! On-disk store: JSON documents versioned in a local Git repository.
//!
//! ## Layout
//!
//! Each document lives under a sharded directory derived from its UUID (32 lowercase hex
//! characters, no hyphens):
//!
//! ```text
//! <data_dir>/concepts/<u[0..2]>/<u[2..4]>/<u>/concept.json
//! <data_dir>/tracking/<c[0..2]>/<c[2..4]>/<c>/tracking.json      (c = concept id)
//! <data_dir>/translations/<u[0..2]>/<u[2..4]>/<u>/translation.json
//! <data_dir>/refsets/<u[0..2]>/<u[2..4]>/<u>/refset.json
//! ```
//!
//! Tracking records are keyed by *concept* id, so a second live record for the same
//! concept would need the same file; creating it with `create_new` is the uniqueness
//! guarantee.
//!
//! ## Revisions
//!
//! Every write is one commit. Revision `n` is the `n`th commit on `main` (1-based), and a
//! concept's current revision is the last commit that changed its file.

use super::versioned::{
    CommitAction, CommitDomain, CommitMessage, Committer, FileChange, VersionedFileService,
};
use super::{ConceptStore, RefsetStore, RevisionStore, TrackingRecordStore, TranslationStore};
use crate::config::CoreConfig;
use crate::constants::{
    CONCEPTS_DIR_NAME, CONCEPT_JSON_FILENAME, REFSETS_DIR_NAME, REFSET_JSON_FILENAME, SYSTEM_USER,
    TRACKING_DIR_NAME, TRACKING_JSON_FILENAME, TRANSLATIONS_DIR_NAME, TRANSLATION_JSON_FILENAME,
};
use crate::user::User;
use crate::{WorkflowError, WorkflowResult};
use refset_model::{wire, Concept, Refset, TrackingRecord, Translation};
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub struct GitStore {
    cfg: Arc<CoreConfig>,
    write_lock: Mutex<()>,
}

impl GitStore {
    /// Create the store directory and repository if needed.
    pub fn init(cfg: Arc<CoreConfig>) -> WorkflowResult<Self> {
        VersionedFileService::init_or_open(cfg.data_dir())?;
        tracing::info!(data_dir = %cfg.data_dir().display(), "initialised store");
        Ok(Self::with_config(cfg))
    }

    /// Open an existing store.
    pub fn open(cfg: Arc<CoreConfig>) -> WorkflowResult<Self> {
        VersionedFileService::open(cfg.data_dir())?;
        Ok(Self::with_config(cfg))
    }

    fn with_config(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    fn repo(&self) -> WorkflowResult<VersionedFileService> {
        VersionedFileService::open(self.cfg.data_dir())
    }

    fn write_guard(&self) -> WorkflowResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| WorkflowError::StoreLockPoisoned)
    }

    fn committer(&self, user_name: Option<&str>) -> Committer {
        let user = user_name
            .and_then(|name| User::from_user_name(name).ok())
            .or_else(|| User::from_user_name(SYSTEM_USER).ok());
        match user {
            Some(user) => Committer {
                name: user.display_name.to_string(),
                email: user.commit_email(self.cfg.committer_email_domain()),
            },
            None => Committer {
                name: SYSTEM_USER.to_string(),
                email: format!("{SYSTEM_USER}@{}", self.cfg.committer_email_domain()),
            },
        }
    }

    fn commit(
        &self,
        user_name: Option<&str>,
        message: CommitMessage,
        changes: &[FileChange<'_>],
    ) -> WorkflowResult<()> {
        let repo = self.repo()?;
        let oid = repo.commit_changes(&self.committer(user_name), &message, changes)?;
        tracing::debug!(commit = %oid, message = %message.render(), "committed store change");
        Ok(())
    }

    fn read_text(&self, relative_path: &Path) -> WorkflowResult<Option<String>> {
        match std::fs::read_to_string(self.cfg.data_dir().join(relative_path)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorkflowError::FileRead(e)),
        }
    }

    fn read_doc<T: DeserializeOwned>(
        &self,
        kind: &str,
        relative_path: &Path,
    ) -> WorkflowResult<Option<T>> {
        match self.read_text(relative_path)? {
            Some(text) => Ok(Some(wire::parse(kind, &text)?)),
            None => Ok(None),
        }
    }

    /// Parse every document named `file_name` under the sharded directory `dir_name`.
    fn list_docs<T: DeserializeOwned>(
        &self,
        kind: &str,
        dir_name: &str,
        file_name: &str,
    ) -> WorkflowResult<Vec<T>> {
        let root = self.cfg.data_dir().join(dir_name);
        let mut docs = Vec::new();
        for first in subdirs(&root)? {
            for second in subdirs(&first)? {
                for leaf in subdirs(&second)? {
                    let path = leaf.join(file_name);
                    if !path.is_file() {
                        continue;
                    }
                    let text = std::fs::read_to_string(&path).map_err(WorkflowError::FileRead)?;
                    docs.push(wire::parse(kind, &text)?);
                }
            }
        }
        Ok(docs)
    }

    /// Remove the now-empty shard directories left behind after deleting `relative_path`.
    fn prune_empty_dirs(&self, relative_path: &Path) {
        // <uuid>, then the two shard levels; the top-level directory stays.
        for dir in relative_path.ancestors().skip(1).take(3) {
            if std::fs::remove_dir(self.cfg.data_dir().join(dir)).is_err() {
                break;
            }
        }
    }

    fn find_record_path(&self, id: Uuid) -> WorkflowResult<Option<(PathBuf, TrackingRecord)>> {
        let records: Vec<TrackingRecord> =
            self.list_docs("tracking record", TRACKING_DIR_NAME, TRACKING_JSON_FILENAME)?;
        Ok(records.into_iter().find(|r| r.id == Some(id)).map(|r| {
            (
                sharded_path(TRACKING_DIR_NAME, r.concept_id, TRACKING_JSON_FILENAME),
                r,
            )
        }))
    }
}

fn sharded_path(dir_name: &str, id: Uuid, file_name: &str) -> PathBuf {
    let id = id.simple().to_string();
    PathBuf::from(dir_name)
        .join(&id[0..2])
        .join(&id[2..4])
        .join(&id)
        .join(file_name)
}

fn concept_path(id: Uuid) -> PathBuf {
    sharded_path(CONCEPTS_DIR_NAME, id, CONCEPT_JSON_FILENAME)
}

fn subdirs(dir: &Path) -> WorkflowResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(WorkflowError::FileRead)? {
        let path = entry.map_err(WorkflowError::FileRead)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn not_found(kind: &'static str, id: Uuid) -> WorkflowError {
    WorkflowError::NotFound {
        kind,
        id: id.to_string(),
    }
}

impl ConceptStore for GitStore {
    fn get_concept(&self, id: Uuid) -> WorkflowResult<Option<Concept>> {
        self.read_doc("concept", &concept_path(id))
    }

    fn create_concept(&self, mut concept: Concept) -> WorkflowResult<Concept> {
        let id = Uuid::new_v4();
        concept.id = Some(id);
        let path = concept_path(id);
        let content = wire::render(&concept)?;

        let mut message = CommitMessage::new(
            CommitDomain::Concept,
            CommitAction::Create,
            format!("Create concept {}", concept.terminology_id),
        )?;
        if let Some(translation_id) = concept.translation_id {
            message = message.with_trailer("Translation-Id", translation_id.to_string())?;
        }

        let _guard = self.write_guard()?;
        self.commit(
            concept.last_modified_by.as_deref(),
            message,
            &[FileChange::Write {
                relative_path: &path,
                content: &content,
                old_content: None,
            }],
        )?;
        Ok(concept)
    }

    fn update_concept(&self, concept: &Concept) -> WorkflowResult<()> {
        let id = concept
            .id
            .ok_or_else(|| WorkflowError::UnpersistedConcept(concept.terminology_id.clone()))?;
        let path = concept_path(id);
        let content = wire::render(concept)?;
        let message = CommitMessage::new(
            CommitDomain::Concept,
            CommitAction::Update,
            format!(
                "Set concept {} to {}",
                concept.terminology_id, concept.workflow_status
            ),
        )?;

        let _guard = self.write_guard()?;
        let old = self
            .read_text(&path)?
            .ok_or_else(|| not_found("concept", id))?;
        if old == content {
            return Ok(());
        }
        self.commit(
            concept.last_modified_by.as_deref(),
            message,
            &[FileChange::Write {
                relative_path: &path,
                content: &content,
                old_content: Some(&old),
            }],
        )
    }

    fn delete_concept(&self, id: Uuid, cascade: bool) -> WorkflowResult<()> {
        let path = concept_path(id);

        let _guard = self.write_guard()?;
        let old = self
            .read_text(&path)?
            .ok_or_else(|| not_found("concept", id))?;
        let concept: Concept = wire::parse("concept", &old)?;
        if !cascade && !concept.descriptions.is_empty() {
            return Err(WorkflowError::InvalidInput(format!(
                "concept {id} still has {} descriptions",
                concept.descriptions.len()
            )));
        }

        let message = CommitMessage::new(
            CommitDomain::Concept,
            CommitAction::Delete,
            format!("Delete concept {}", concept.terminology_id),
        )?;
        self.commit(
            concept.last_modified_by.as_deref(),
            message,
            &[FileChange::Remove {
                relative_path: &path,
                old_content: &old,
            }],
        )?;
        self.prune_empty_dirs(&path);
        Ok(())
    }

    fn find_concepts_by_translation(&self, translation_id: Uuid) -> WorkflowResult<Vec<Concept>> {
        let concepts: Vec<Concept> =
            self.list_docs("concept", CONCEPTS_DIR_NAME, CONCEPT_JSON_FILENAME)?;
        Ok(concepts
            .into_iter()
            .filter(|c| c.translation_id == Some(translation_id))
            .collect())
    }
}

impl TranslationStore for GitStore {
    fn get_translation(&self, id: Uuid) -> WorkflowResult<Option<Translation>> {
        self.read_doc(
            "translation",
            &sharded_path(TRANSLATIONS_DIR_NAME, id, TRANSLATION_JSON_FILENAME),
        )
    }

    fn create_translation(&self, translation: Translation) -> WorkflowResult<Translation> {
        if self.get_refset(translation.refset_id)?.is_none() {
            return Err(not_found("refset", translation.refset_id));
        }
        let path = sharded_path(TRANSLATIONS_DIR_NAME, translation.id, TRANSLATION_JSON_FILENAME);
        let content = wire::render(&translation)?;
        let message = CommitMessage::new(
            CommitDomain::Translation,
            CommitAction::Create,
            format!("Create translation {} ({})", translation.name, translation.language),
        )?
        .with_trailer("Refset-Id", translation.refset_id.to_string())?;

        let _guard = self.write_guard()?;
        self.commit(
            translation.last_modified_by.as_deref(),
            message,
            &[FileChange::Write {
                relative_path: &path,
                content: &content,
                old_content: None,
            }],
        )?;
        Ok(translation)
    }

    fn update_translation(&self, translation: &Translation) -> WorkflowResult<()> {
        let path = sharded_path(TRANSLATIONS_DIR_NAME, translation.id, TRANSLATION_JSON_FILENAME);
        let content = wire::render(translation)?;
        let message = CommitMessage::new(
            CommitDomain::Translation,
            CommitAction::Update,
            format!(
                "Set translation {} to {}",
                translation.name, translation.workflow_status
            ),
        )?;

        let _guard = self.write_guard()?;
        let old = self
            .read_text(&path)?
            .ok_or_else(|| not_found("translation", translation.id))?;
        self.commit(
            translation.last_modified_by.as_deref(),
            message,
            &[FileChange::Write {
                relative_path: &path,
                content: &content,
                old_content: Some(&old),
            }],
        )
    }
}

impl RefsetStore for GitStore {
    fn get_refset(&self, id: Uuid) -> WorkflowResult<Option<Refset>> {
        self.read_doc(
            "refset",
            &sharded_path(REFSETS_DIR_NAME, id, REFSET_JSON_FILENAME),
        )
    }

    fn create_refset(&self, refset: Refset) -> WorkflowResult<Refset> {
        let path = sharded_path(REFSETS_DIR_NAME, refset.id, REFSET_JSON_FILENAME);
        let content = wire::render(&refset)?;
        let message = CommitMessage::new(
            CommitDomain::Refset,
            CommitAction::Create,
            format!("Create refset {} with {} members", refset.name, refset.members.len()),
        )?;

        let _guard = self.write_guard()?;
        self.commit(
            None,
            message,
            &[FileChange::Write {
                relative_path: &path,
                content: &content,
                old_content: None,
            }],
        )?;
        Ok(refset)
    }
}

impl TrackingRecordStore for GitStore {
    fn find_tracking_records_by_concept(
        &self,
        concept_id: Uuid,
    ) -> WorkflowResult<Vec<TrackingRecord>> {
        let path = sharded_path(TRACKING_DIR_NAME, concept_id, TRACKING_JSON_FILENAME);
        Ok(self
            .read_doc::<TrackingRecord>("tracking record", &path)?
            .into_iter()
            .collect())
    }

    fn find_tracking_records_by_translation(
        &self,
        translation_id: Uuid,
    ) -> WorkflowResult<Vec<TrackingRecord>> {
        let records: Vec<TrackingRecord> =
            self.list_docs("tracking record", TRACKING_DIR_NAME, TRACKING_JSON_FILENAME)?;
        Ok(records
            .into_iter()
            .filter(|r| r.translation_id == translation_id)
            .collect())
    }

    fn create_tracking_record(&self, mut record: TrackingRecord) -> WorkflowResult<TrackingRecord> {
        let path = sharded_path(TRACKING_DIR_NAME, record.concept_id, TRACKING_JSON_FILENAME);
        record.id = Some(Uuid::new_v4());
        let content = wire::render(&record)?;
        let message = CommitMessage::new(
            CommitDomain::TrackingRecord,
            CommitAction::Create,
            format!("Check out concept to {}", record.authors.join(", ")),
        )?
        .with_trailer("Concept-Id", record.concept_id.to_string())?;

        let _guard = self.write_guard()?;
        if self.cfg.data_dir().join(&path).exists() {
            return Err(WorkflowError::TrackingRecordExists(record.concept_id));
        }
        self.commit(
            record.last_modified_by.as_deref(),
            message,
            &[FileChange::Write {
                relative_path: &path,
                content: &content,
                old_content: None,
            }],
        )?;
        Ok(record)
    }

    fn update_tracking_record(&self, record: &TrackingRecord) -> WorkflowResult<()> {
        let id = record
            .id
            .ok_or(WorkflowError::MissingTrackingRecord(record.concept_id))?;
        let path = sharded_path(TRACKING_DIR_NAME, record.concept_id, TRACKING_JSON_FILENAME);
        let content = wire::render(record)?;
        let message = CommitMessage::new(
            CommitDomain::TrackingRecord,
            CommitAction::Update,
            "Update tracking record",
        )?
        .with_trailer("Concept-Id", record.concept_id.to_string())?;

        let _guard = self.write_guard()?;
        let old = self
            .read_text(&path)?
            .ok_or_else(|| not_found("tracking record", id))?;
        let existing: TrackingRecord = wire::parse("tracking record", &old)?;
        if existing.id != Some(id) {
            return Err(not_found("tracking record", id));
        }
        if old == content {
            return Ok(());
        }
        self.commit(
            record.last_modified_by.as_deref(),
            message,
            &[FileChange::Write {
                relative_path: &path,
                content: &content,
                old_content: Some(&old),
            }],
        )
    }

    fn delete_tracking_record(&self, id: Uuid) -> WorkflowResult<()> {
        let _guard = self.write_guard()?;
        let (path, record) = self
            .find_record_path(id)?
            .ok_or_else(|| not_found("tracking record", id))?;
        let old = self
            .read_text(&path)?
            .ok_or_else(|| not_found("tracking record", id))?;

        let message = CommitMessage::new(
            CommitDomain::TrackingRecord,
            CommitAction::Delete,
            "Release concept",
        )?
        .with_trailer("Concept-Id", record.concept_id.to_string())?;
        self.commit(
            record.last_modified_by.as_deref(),
            message,
            &[FileChange::Remove {
                relative_path: &path,
                old_content: &old,
            }],
        )?;
        self.prune_empty_dirs(&path);
        Ok(())
    }
}

impl RevisionStore for GitStore {
    fn current_revision_number(&self, concept_id: Uuid) -> WorkflowResult<u64> {
        let repo = self.repo()?;
        let path = concept_path(concept_id);

        let mut previous = None;
        let mut last_change = None;
        for (index, oid) in repo.history()?.into_iter().enumerate() {
            let blob = repo.blob_id_at(oid, &path)?;
            if blob != previous {
                last_change = Some(index as u64 + 1);
                previous = blob;
            }
        }
        last_change.ok_or_else(|| not_found("concept", concept_id))
    }

    fn snapshot_at(&self, concept_id: Uuid, revision: u64) -> WorkflowResult<Concept> {
        let missing = WorkflowError::RevisionNotFound {
            concept_id,
            revision,
        };
        let repo = self.repo()?;
        let history = repo.history()?;
        let Some(oid) = usize::try_from(revision)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| history.get(n).copied())
        else {
            return Err(missing);
        };
        match repo.read_at(oid, &concept_path(concept_id))? {
            Some(text) => Ok(wire::parse("concept", &text)?),
            None => Err(missing),
        }
    }

    fn restore(&self, concept_id: Uuid, snapshot: &Concept) -> WorkflowResult<Concept> {
        let mut restored = snapshot.clone();
        restored.id = Some(concept_id);
        let path = concept_path(concept_id);
        let content = wire::render(&restored)?;
        let message = CommitMessage::new(
            CommitDomain::Concept,
            CommitAction::Restore,
            format!(
                "Restore concept {} to {}",
                restored.terminology_id, restored.workflow_status
            ),
        )?;

        let _guard = self.write_guard()?;
        let old = self
            .read_text(&path)?
            .ok_or_else(|| not_found("concept", concept_id))?;
        if old != content {
            self.commit(
                restored.last_modified_by.as_deref(),
                message,
                &[FileChange::Write {
                    relative_path: &path,
                    content: &content,
                    old_content: Some(&old),
                }],
            )?;
        }
        Ok(restored)
    }
}
