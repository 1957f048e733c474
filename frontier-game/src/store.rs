//! Save documents and the storage seam hosts implement.

use thiserror::Error;

use crate::state::{PlayerState, SAVE_VERSION};

/// Key under which the single save slot lives.
pub const STORAGE_KEY: &str = "frontier-idle.save.v1";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save version {found} does not match expected version {expected}")]
    VersionMismatch { found: u64, expected: u32 },
    #[error("save has no version field")]
    MissingVersion,
}

/// Key/value persistence provided by the host.
pub trait SaveStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Replace the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn write(&self, key: &str, document: &str) -> Result<(), Self::Error>;

    /// Delete the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot delete the key.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// Serialize the full state tree.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_save(state: &PlayerState) -> Result<String, SaveError> {
    Ok(serde_json::to_string(state)?)
}

/// Parse a save, rejecting anything written by another save version.
///
/// The version is checked before the body is deserialized so that a
/// document from an incompatible layout is reported as a version mismatch
/// instead of a field error.
///
/// # Errors
///
/// Returns an error on malformed JSON or a version other than [`SAVE_VERSION`].
pub fn decode_save(document: &str) -> Result<PlayerState, SaveError> {
    let value: serde_json::Value = serde_json::from_str(document)?;
    let found = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or(SaveError::MissingVersion)?;
    if found != u64::from(SAVE_VERSION) {
        return Err(SaveError::VersionMismatch {
            found,
            expected: SAVE_VERSION,
        });
    }
    Ok(serde_json::from_value(value)?)
}
