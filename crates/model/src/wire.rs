//! JSON wire helpers for on-disk stores.
//!
//! Stores persist the model types as pretty-printed JSON. Parsing goes through
//! `serde_path_to_error` so a malformed file reports the failing field
//! (e.g. `reviewers[1]`) rather than only a line and column.

use crate::{ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON document into `T`.
///
/// # Arguments
///
/// * `kind` - Human-readable name of the document, used in error messages.
/// * `json_text` - The JSON text.
///
/// # Errors
///
/// Returns [`ModelError::Translation`] naming the failing path when the text does not
/// match the schema of `T`.
pub fn parse<T: DeserializeOwned>(kind: &str, json_text: &str) -> ModelResult<T> {
    let mut deserializer = serde_json::Deserializer::from_str(json_text);
    match serde_path_to_error::deserialize::<_, T>(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(ModelError::Translation(format!(
                "{kind} schema mismatch at {path}: {source}"
            )))
        }
    }
}

/// Render `value` as pretty-printed JSON with a trailing newline.
pub fn render<T: Serialize>(value: &T) -> ModelResult<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}
