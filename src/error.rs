// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain text from a source document.
///
/// Kept apart from "nothing recognised", which is an empty record rather
/// than an error.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode PDF {label}: {reason}")]
    Decode { label: String, reason: String },
}

impl DocumentError {
    pub fn is_io(&self) -> bool {
        matches!(self, DocumentError::Io { .. })
    }
}
