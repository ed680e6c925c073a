// Typed errors for the cross-reference core

use thiserror::Error;

/// Errors surfaced by the builder and query engine.
///
/// Per-file problems during a build (unreadable or binary sources) are not
/// errors; they are collected in `BuildStats::scan_errors` and exposed through
/// the scan-errors pseudo-query.
#[derive(Debug, Error)]
pub enum CrossRefError {
    /// Another build or query is already running in this session.
    #[error("another build or query is already in progress")]
    Busy,

    /// Every real query requires a non-empty pattern.
    #[error("search pattern is empty")]
    EmptyPattern,

    /// Regex pattern failed to compile; reported before any database access.
    #[error("invalid regular expression: {0}")]
    BadPattern(String),

    /// The database is structurally unreadable. The caller should rebuild.
    #[error("cross-reference database is corrupt: {0}")]
    Corrupt(String),

    /// The database was written by an incompatible format version.
    #[error("database format version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    /// The source file list handed to the builder was not in strict
    /// lexicographic path order.
    #[error("source file list is not sorted: {0:?} follows {1:?}")]
    UnsortedFileList(std::path::PathBuf, std::path::PathBuf),

    /// Cooperative cancellation was requested mid-operation. For queries this
    /// is not an error (partial results are returned); a cancelled build
    /// leaves the previous database untouched.
    #[error("operation cancelled")]
    Cancelled,

    /// Fatal storage failure while writing the new database. The previous
    /// database is left intact.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
