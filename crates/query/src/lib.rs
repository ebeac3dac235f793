//! Filter predicates for recordbase.
//!
//! Every search field a record style exposes is backed by one of a handful of
//! predicate translators. A translator renders the same logical operator two
//! ways:
//!
//! - as a [`Mask`] over an in-memory [`Table`] of record metadata (used by the
//!   local database's metadata cache), and
//! - as a fragment of a document-native [`Query`] (used by document stores and
//!   remote services, and evaluated in-process by [`Query::matches`] where no
//!   native engine exists).
//!
//! Both projections select the same rows for the same inputs.

mod document;
pub mod error;
mod table;
pub mod translate;
mod values;

pub use crate::document::Query;
pub use crate::table::{Field, FieldKind, Mask, Row, Table};
pub use crate::translate::{DateMatch, InList, IntMatch, Predicate, StrContains, StrMatch};
pub use crate::values::{Filter, Values, integer, stringify};
