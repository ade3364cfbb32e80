//! OLTHAD error types

use thiserror::Error;

/// Errors surfaced by tree reads and traversal operations
///
/// `Usage` means the caller violated an operation's contract; it is never
/// retried internally and always surfaces synchronously. `Corrupted` means a
/// structural invariant was found violated while reading - a bug in mutation
/// logic elsewhere, and fatal to the traversal.
#[derive(Debug, Error)]
pub enum OlthadError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("corrupted OLTHAD: {0}")]
    Corrupted(String),
}

impl OlthadError {
    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Check if this is a caller-contract violation
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Check if this is a structural-invariant violation
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted(_))
    }
}
