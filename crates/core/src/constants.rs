//! Constants used throughout the refset core crate.
//!
//! This module contains store layout names and configuration defaults so on-disk paths
//! stay consistent across the codebase.

/// Default directory for the on-disk store when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "refset_data";

/// Directory holding one sharded folder per concept.
pub const CONCEPTS_DIR_NAME: &str = "concepts";

/// Directory holding one sharded folder per tracked concept.
pub const TRACKING_DIR_NAME: &str = "tracking";

/// Directory holding one sharded folder per translation.
pub const TRANSLATIONS_DIR_NAME: &str = "translations";

/// Directory holding one sharded folder per refset.
pub const REFSETS_DIR_NAME: &str = "refsets";

/// Filename for a concept document.
pub const CONCEPT_JSON_FILENAME: &str = "concept.json";

/// Filename for a tracking record document.
pub const TRACKING_JSON_FILENAME: &str = "tracking.json";

/// Filename for a translation document.
pub const TRANSLATION_JSON_FILENAME: &str = "translation.json";

/// Filename for a refset document.
pub const REFSET_JSON_FILENAME: &str = "refset.json";

/// Default email domain for Git committers that have no email of their own.
pub const DEFAULT_COMMITTER_EMAIL_DOMAIN: &str = "refset.local";

/// Committer name used for store maintenance commits that have no acting user.
pub const SYSTEM_USER: &str = "refset-system";

/// Default upper bound on the number of results in one page.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Hard ceiling on the configurable page size.
pub const MAX_PAGE_SIZE_LIMIT: usize = 10_000;
