//! Database Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Errors from the record, query and config crates are
//! re-raised as one of these kinds with the original frame kept as a child.

use derive_more::{Display, Error};
use recordbase_config::error::Error as ConfigError;
use recordbase_query::error::Error as QueryError;
use recordbase_record::error::{Error as RecordError, ErrorKind as RecordErrorKind};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A database error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No record (or database) style of that name was ever registered.
    #[display("unknown style: {_0}")]
    UnknownStyle(#[error(not(source))] String),
    /// The style exists but is unusable in this build or environment.
    #[display("style `{_0}` failed to load: {_1}")]
    StyleLoadFailure(#[error(not(source))] String, String),
    /// A single-result request matched nothing.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// A single-result request matched more than one item.
    #[display("{_1} matches for {_0}, expected exactly one")]
    AmbiguousMatch(#[error(not(source))] String, usize),
    /// The `(style, name)` pair (or its archive) already exists.
    #[display("already exists: {_0}")]
    DuplicateKey(#[error(not(source))] String),
    /// Mutually exclusive arguments were given together.
    #[display("conflicting arguments: {_0}")]
    ConflictingArguments(#[error(not(source))] String),
    /// Storage or network failure.
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The remote service refused the operation for this account.
    #[display("not authorized: {_0}")]
    Authorization(#[error(not(source))] String),
    /// Stored or supplied content could not be turned into a record.
    #[display("invalid record: {_0}")]
    InvalidRecord(#[error(not(source))] String),
    /// A metadata cache file exists but cannot be read; a full refresh
    /// rebuilds it.
    #[display("unreadable metadata cache: {}", _0.display())]
    Cache(#[error(not(source))] PathBuf),
    /// A filter or native query could not be built or evaluated.
    #[display("invalid query: {_0}")]
    Query(#[error(not(source))] String),
    /// The database could not be set up from its configuration.
    #[display("invalid database configuration: {_0}")]
    Config(#[error(not(source))] String),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Convert a record error, mapping style lookup failures onto the
    /// matching database kinds.
    #[track_caller]
    pub fn record(err: RecordError) -> Error {
        let kind = match &*err {
            RecordErrorKind::UnknownStyle(style) => Self::UnknownStyle(style.clone()),
            RecordErrorKind::StyleLoadFailure(style, reason) => Self::StyleLoadFailure(style.clone(), reason.clone()),
            RecordErrorKind::Filter(inner) => Self::Query(inner.to_string()),
            other => Self::InvalidRecord(other.to_string()),
        };
        err.raise(kind)
    }

    #[track_caller]
    pub fn query(err: QueryError) -> Error {
        let message = (*err).to_string();
        err.raise(Self::Query(message))
    }

    #[track_caller]
    pub fn config(err: ConfigError) -> Error {
        let message = (*err).to_string();
        err.raise(Self::Config(message))
    }

    /// Map a filesystem error on `path`, naming `what` was being accessed.
    pub(crate) fn io(err: IoError, what: &str, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(what.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::Backend(format!("permission denied: {}", path.display())),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Io(_))
    }

    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}

/// Human-readable label for one record, used in error messages.
pub(crate) fn label(style: &str, name: &str) -> String {
    format!("{style} record `{name}`")
}
