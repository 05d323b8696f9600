//! Error types for the hatchkey-core library.
//!
//! Nearly every variant is a *fatal input* condition: something wrong with
//! the archive or the search configuration, detected before any worker
//! starts. Per-candidate outcomes are not errors and live in
//! [`ProbeOutcome`](crate::archive::ProbeOutcome).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hatchkey operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for archive validation and search configuration
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Archive path does not exist
    #[error("archive '{path}' does not exist")]
    ArchiveNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Archive exists but could not be opened or read
    #[error("failed to read archive '{path}': {source}")]
    ArchiveUnreadable {
        /// Path to the archive
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Archive is a zero-length file
    #[error("archive '{path}' is empty")]
    ArchiveEmpty {
        /// Path to the archive
        path: PathBuf,
    },

    /// Archive bytes do not form a valid ZIP structure
    #[error("invalid zip structure at offset {offset}: {details}")]
    InvalidArchive {
        /// Byte offset where the problem was detected
        offset: u64,
        /// Detailed description of the issue
        details: String,
    },

    /// Archive is valid but uses something the probe cannot handle
    #[error("unsupported archive feature: {0}")]
    Unsupported(String),

    /// Archive contains no password-protected entry to test against
    #[error("archive contains no encrypted entry")]
    NoEncryptedEntry,

    /// Alphabet is empty, has duplicates or contains non-printable symbols
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),

    /// Password length is zero
    #[error("password length must be at least 1")]
    InvalidLength,

    /// Worker count is zero or exceeds the alphabet size
    #[error("invalid worker count {workers}: must be between 1 and {max}")]
    InvalidWorkerCount {
        /// Requested worker count
        workers: usize,
        /// Largest allowed value (alphabet size)
        max: usize,
    },

    /// `|alphabet|^length` does not fit in 64 bits
    #[error("keyspace of {symbols}^{length} candidates is too large")]
    KeyspaceOverflow {
        /// Alphabet size
        symbols: usize,
        /// Password length
        length: usize,
    },

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// A worker thread panicked
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

impl Error {
    /// Creates a new unreadable-archive error
    pub fn archive_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ArchiveUnreadable {
            path: path.into(),
            source,
        }
    }

    /// Creates a new structural zip error
    pub fn invalid_archive(offset: u64, details: impl Into<String>) -> Self {
        Self::InvalidArchive {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new unsupported-feature error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Creates a new invalid alphabet error
    pub fn invalid_alphabet(msg: impl Into<String>) -> Self {
        Self::InvalidAlphabet(msg.into())
    }

    /// Returns true if this error is about the inputs of a run (archive or
    /// configuration) rather than a failure during the run itself
    pub fn is_fatal_input(&self) -> bool {
        !matches!(self, Self::ThreadSpawn(_) | Self::WorkerPanicked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ArchiveNotFound {
            path: "/tmp/missing.zip".into(),
        };
        assert!(err.to_string().contains("does not exist"));
        assert!(err.to_string().contains("/tmp/missing.zip"));

        let err = Error::InvalidWorkerCount { workers: 40, max: 36 };
        assert_eq!(
            err.to_string(),
            "invalid worker count 40: must be between 1 and 36"
        );
    }

    #[test]
    fn test_is_fatal_input() {
        assert!(Error::NoEncryptedEntry.is_fatal_input());
        assert!(Error::invalid_archive(0, "bad signature").is_fatal_input());
        assert!(!Error::WorkerPanicked(3).is_fatal_input());
    }
}
