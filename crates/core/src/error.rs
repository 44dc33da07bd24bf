use uuid::Uuid;

use refset_model::{UserRole, WorkflowAction};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid user: {0}")]
    InvalidUser(#[from] refset_types::TextError),
    #[error("model error: {0}")]
    Model(#[from] refset_model::ModelError),

    #[error("found {count} tracking records for concept {concept_id}; expected at most one")]
    DuplicateTrackingRecords { concept_id: Uuid, count: usize },
    #[error("illegal workflow action {action} for role {role}: {reason}")]
    IllegalAction {
        action: WorkflowAction,
        role: UserRole,
        reason: String,
    },
    #[error("no tracking record exists for concept {0}")]
    MissingTrackingRecord(Uuid),
    #[error("a tracking record already exists for concept {0}")]
    TrackingRecordExists(Uuid),
    #[error("tracking record for concept {0} has no revision to roll back to")]
    MissingOriginRevision(Uuid),
    #[error("concept {0} has not been persisted")]
    UnpersistedConcept(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("revision {revision} of concept {concept_id} not found")]
    RevisionNotFound { concept_id: Uuid, revision: u64 },
    #[error("store lock poisoned")]
    StoreLockPoisoned,

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write store file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read store file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to remove store file: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),

    #[error("failed to initialise git repository: {0}")]
    GitInit(git2::Error),
    #[error("failed to open git repository: {0}")]
    GitOpen(git2::Error),
    #[error("failed to access git index: {0}")]
    GitIndex(git2::Error),
    #[error("failed to add file to git index: {0}")]
    GitAdd(git2::Error),
    #[error("failed to remove file from git index: {0}")]
    GitRemove(git2::Error),
    #[error("failed to write git tree: {0}")]
    GitWriteTree(git2::Error),
    #[error("failed to find git tree: {0}")]
    GitFindTree(git2::Error),
    #[error("failed to create git signature: {0}")]
    GitSignature(git2::Error),
    #[error("failed to create git commit: {0}")]
    GitCommit(git2::Error),
    #[error("failed to get git head: {0}")]
    GitHead(git2::Error),
    #[error("failed to set git head: {0}")]
    GitSetHead(git2::Error),
    #[error("failed to peel git commit: {0}")]
    GitPeel(git2::Error),
    #[error("failed to walk git history: {0}")]
    GitRevwalk(git2::Error),
    #[error("failed to read git blob: {0}")]
    GitBlob(git2::Error),
}

impl WorkflowError {
    /// True for data-integrity or programming faults that callers must treat as bugs
    /// rather than retry or show to the user.
    pub fn is_consistency_fault(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTrackingRecords { .. }
                | Self::IllegalAction { .. }
                | Self::MissingTrackingRecord(_)
                | Self::TrackingRecordExists(_)
                | Self::MissingOriginRevision(_)
                | Self::UnpersistedConcept(_)
                | Self::Model(refset_model::ModelError::UnknownVariant { .. })
        )
    }
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
