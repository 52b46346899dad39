use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while scanning, apportioning or copying a dataset.
#[derive(Error, Debug)]
pub enum BudgetError {
    /// An apportionment denominator was zero.
    #[error("cannot apportion budget: {denominator} is zero")]
    Division { denominator: &'static str },

    /// A class directory could not be listed. Recoverable: the class is skipped.
    #[error("unreadable class directory {path:?}: {source}")]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A single file could not be processed (copied, stat'ed).
    #[error("failed to process {path:?}: {source}")]
    Processing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source {path:?} is not a directory")]
    SourceNotDirectory { path: PathBuf },

    #[error("target size must be a positive number of megabytes, got {value}")]
    InvalidTarget { value: f64 },
}

impl BudgetError {
    #[cfg(test)]
    pub fn is_division(&self) -> bool {
        matches!(self, BudgetError::Division { .. })
    }
}
