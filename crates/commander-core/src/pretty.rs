//! Human-readable rendering helpers.

use serde::Serialize;

/// Render any serializable value as indented JSON.
///
/// Values that fail to serialize render as an object with an `error` field
/// rather than failing the caller.
pub fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(s) => s,
        Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
    }
}

/// A dashed banner line used for dispatch start/end notices.
pub fn banner(text: &str) -> String {
    format!("---------{}---------", text)
}
