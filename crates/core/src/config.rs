//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{
    CONCEPTS_DIR_NAME, DEFAULT_COMMITTER_EMAIL_DOMAIN, DEFAULT_MAX_PAGE_SIZE, MAX_PAGE_SIZE_LIMIT,
    REFSETS_DIR_NAME, TRACKING_DIR_NAME, TRANSLATIONS_DIR_NAME,
};
use crate::{WorkflowError, WorkflowResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    committer_email_domain: String,
    max_page_size: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidInput`] if the email domain is empty or contains
    /// characters that cannot appear in a host name, or if `max_page_size` is outside
    /// `1..=MAX_PAGE_SIZE_LIMIT`.
    pub fn new(
        data_dir: PathBuf,
        committer_email_domain: String,
        max_page_size: usize,
    ) -> WorkflowResult<Self> {
        validate_email_domain(&committer_email_domain)?;

        if max_page_size == 0 || max_page_size > MAX_PAGE_SIZE_LIMIT {
            return Err(WorkflowError::InvalidInput(format!(
                "max_page_size must be between 1 and {MAX_PAGE_SIZE_LIMIT}"
            )));
        }

        Ok(Self {
            data_dir,
            committer_email_domain,
            max_page_size,
        })
    }

    /// Configuration with default domain and page size rooted at `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> WorkflowResult<Self> {
        Self::new(
            data_dir,
            DEFAULT_COMMITTER_EMAIL_DOMAIN.to_string(),
            DEFAULT_MAX_PAGE_SIZE,
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn concepts_dir(&self) -> PathBuf {
        self.data_dir.join(CONCEPTS_DIR_NAME)
    }

    pub fn tracking_dir(&self) -> PathBuf {
        self.data_dir.join(TRACKING_DIR_NAME)
    }

    pub fn translations_dir(&self) -> PathBuf {
        self.data_dir.join(TRANSLATIONS_DIR_NAME)
    }

    pub fn refsets_dir(&self) -> PathBuf {
        self.data_dir.join(REFSETS_DIR_NAME)
    }

    pub fn committer_email_domain(&self) -> &str {
        &self.committer_email_domain
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }
}

fn validate_email_domain(domain: &str) -> WorkflowResult<()> {
    const MAX_DOMAIN_LEN: usize = 253;

    if domain.trim().is_empty() {
        return Err(WorkflowError::InvalidInput(
            "committer_email_domain cannot be empty".into(),
        ));
    }

    if domain.len() > MAX_DOMAIN_LEN {
        return Err(WorkflowError::InvalidInput(format!(
            "committer_email_domain exceeds maximum length of {MAX_DOMAIN_LEN} characters"
        )));
    }

    let ok = domain
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-'));

    if !ok {
        return Err(WorkflowError::InvalidInput(
            "committer_email_domain contains invalid characters (only alphanumeric, '.', '-' allowed)"
                .into(),
        ));
    }

    Ok(())
}

/// Parse the maximum page size from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_MAX_PAGE_SIZE`].
pub fn max_page_size_from_env_value(value: Option<String>) -> WorkflowResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_MAX_PAGE_SIZE),
        Some(v) => v.parse::<usize>().map_err(|_| {
            WorkflowError::InvalidInput(format!("max page size must be a positive integer, got '{v}'"))
        }),
    }
}
