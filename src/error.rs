//! Error taxonomy for loading, mapping, merging and writing tables.
//!
//! Every failure surfaces to the caller unchanged: none of these are retried,
//! because each needs a human decision (fix the mapping, close the file that
//! holds a lock, pick another path) before the operation can run again.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = AppendError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppendError {
    /// Malformed column list (duplicate or blank names).
    #[error("{message}")]
    Schema { message: String },

    /// Mapping references a column that does not exist.
    #[error("{message}")]
    MappingValidation { message: String },

    /// Several source columns target the same column while many-to-one is disabled.
    #[error("Target column '{target}' is mapped from more than one source column: {}", .sources.join(", "))]
    MappingConflict { target: String, sources: Vec<String> },

    #[error("Could not read {path:?}: {reason}")]
    FileFormat { path: PathBuf, reason: String },

    #[error("File not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("Could not write {path:?}: {source}")]
    WritePermission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AppendError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn mapping_validation(message: impl Into<String>) -> Self {
        Self::MappingValidation {
            message: message.into(),
        }
    }

    pub fn file_format(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::FileFormat {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable name of the error kind, shown next to the message by collaborators.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SchemaError",
            Self::MappingValidation { .. } => "MappingValidationError",
            Self::MappingConflict { .. } => "MappingConflictError",
            Self::FileFormat { .. } => "FileFormatError",
            Self::FileNotFound { .. } => "FileNotFoundError",
            Self::WritePermission { .. } => "WritePermissionError",
        }
    }
}
