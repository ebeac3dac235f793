//! Record Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use recordbase_query::error::{Error as QueryError, ErrorKind as QueryErrorKind};

/// A record error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No style of that name was ever registered.
    #[display("unknown style: {_0}")]
    UnknownStyle(#[error(not(source))] String),
    /// The style exists but could not be initialised in this build or
    /// environment. Carries the captured reason verbatim.
    #[display("style `{_0}` failed to load: {_1}")]
    StyleLoadFailure(#[error(not(source))] String, String),
    /// Record names become file names and keys; some characters are off-limits.
    #[display("invalid record name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// Content does not have the shape the style expects.
    #[display("invalid {_0} content: {_1}")]
    InvalidModel(#[error(not(source))] String, String),
    /// Content could not be serialized to, or parsed from, text.
    #[display("{_0} codec error")]
    Codec(#[error(not(source))] &'static str),
    /// A search filter could not be translated.
    #[display("invalid search filter: {_0}")]
    Filter(QueryErrorKind),
}

impl ErrorKind {
    /// Convert a query error into a record error, keeping the query crate's
    /// frame as a child in the error tree.
    #[track_caller]
    pub fn filter(err: QueryError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Filter(inner))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
