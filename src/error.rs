//! Error types for the position store
//!
//! Reads recover from most of these locally (falling back to `"default"`),
//! so only storage and validation failures ever reach a caller of
//! `update_position`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::PositionRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Key absent from the catalogue text
    #[error("no position entry for '{key}'")]
    NotFound { key: String },

    /// Block matched but a required field is missing or unparseable
    #[error("position entry '{key}' is malformed: {field} {problem}")]
    MalformedRecord {
        key: String,
        field: &'static str,
        problem: String,
    },

    /// Catalogue text could not be read or written
    #[error("catalogue storage unavailable at {location}: {source}")]
    StorageUnavailable {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// The named collection could not be located in the text
    #[error("collection '{collection}' not found in catalogue")]
    MissingCatalogue { collection: String },

    #[error("invalid template key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("invalid position record: {reason}")]
    InvalidRecord { reason: String },
}

impl StoreError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::StorageUnavailable {
            location: path.into().display().to_string(),
            source,
        }
    }
}

/// Step of an update at which it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    ResolveKey,
    ReadOld,
    WriteNew,
    InvalidateCache,
    Verify,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateStage::ResolveKey => "resolve-key",
            UpdateStage::ReadOld => "read-old",
            UpdateStage::WriteNew => "write-new",
            UpdateStage::InvalidateCache => "invalidate-cache",
            UpdateStage::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Failed update, carrying what was being attempted
/// Nothing was committed when this is returned
#[derive(Debug, Error)]
#[error("update of '{key}' failed during {stage}: {source}")]
pub struct UpdateError {
    pub stage: UpdateStage,
    pub key: String,
    pub record: PositionRecord,
    #[source]
    pub source: StoreError,
}
