//! Config Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A settings source exists but could not be read or merged.
    #[display("could not load settings")]
    Load,
    /// No database is configured under that name.
    #[display("no database named `{_0}` is configured")]
    UnknownDatabase(#[error(not(source))] String),
    /// A database entry's style-specific options have the wrong shape.
    #[display("invalid options for database at `{_0}`")]
    InvalidOptions(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
