//! Configuration parsing - the serialized `data-props` attribute.
//!
//! Widget configuration travels as a JSON document in the `data-props`
//! attribute of the host element. A missing or empty attribute means the
//! widget simply has no extra configuration; a malformed one is logged and
//! treated the same way. Neither case may abort the mount - a broken
//! per-widget configuration must never take down an unrelated render.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Attribute holding the serialized widget configuration.
pub const PROPS_ATTR: &str = "data-props";

/// Typed parse failure, for callers that want to inspect it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The attribute was present but not valid JSON.
    #[error("invalid JSON in {PROPS_ATTR} attribute: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse a raw attribute value into a property tree.
pub fn try_parse(raw: &str) -> Result<Value, ConfigError> {
    Ok(serde_json::from_str(raw)?)
}

/// Parse the serialized configuration, degrading gracefully.
///
/// - `None` or an empty string mean "not configured" and yield `None`.
/// - Malformed JSON yields `None` after one diagnostic.
/// - Well-formed JSON is returned unchanged, no normalization.
pub fn parse(raw: Option<&str>) -> Option<Value> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    match try_parse(raw) {
        Ok(tree) => Some(tree),
        Err(err) => {
            warn!(attribute = PROPS_ATTR, %err, "ignoring malformed widget configuration");
            None
        }
    }
}
