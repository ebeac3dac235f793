//! Query Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, in the same shape as every other crate in the
//! workspace.

use derive_more::{Display, Error};

/// A query error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Clone, Debug, Display, Error)]
pub enum ErrorKind {
    /// A filter value could not be coerced to the type the field requires
    /// (e.g. a non-numeric string given to an integer match).
    #[display("invalid filter value for `{_0}`: {_1}")]
    InvalidValue(#[error(not(source))] String, String),
    /// A `$regex` pattern did not compile.
    #[display("invalid pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
    /// A query document uses an operator in an unsupported way.
    #[display("malformed query: {_0}")]
    MalformedQuery(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
