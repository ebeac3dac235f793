//! Interchangeable storage backends for recordbase records.
//!
//! Every backend implements [`Database`]: records are fetched with a
//! [`Search`] (record-style filter terms, or a native [`Query`] narrowed by
//! name) and written one at a time. Three backends are provided:
//!
//! - [`LocalDatabase`]: one file per record under a directory, with a CSV
//!   metadata cache per style,
//! - [`DocumentDatabase`]: `{name, content}` documents in a [`DocumentStore`]
//!   (SQLite with the `sqlite` feature),
//! - [`RemoteCuratedDatabase`]: XML entries on a curated-content service
//!   (HTTPS with the `remote` feature).
//!
//! [`DatabaseRegistry`] and [`load_database`] open a database from its
//! configuration entry.
//!
//! [`Query`]: recordbase_query::Query

mod archive;
mod database;
mod document;
pub mod error;
mod local;
mod registry;
mod remote;
mod retry;
mod search;

pub use crate::archive::{ArchiveSource, archive_name, pack, unpack};
pub use crate::database::{Database, DatabaseHandle};
#[cfg(any(test, feature = "mock"))]
pub use crate::document::MemoryStore;
pub use crate::document::{Document, DocumentDatabase, DocumentOptions, DocumentStore};
#[cfg(feature = "sqlite")]
pub use crate::document::{IN_MEMORY, SqliteStore};
pub use crate::local::{LocalDatabase, LocalOptions};
pub use crate::registry::{DatabaseRegistry, DatabaseStyle, load_database};
#[cfg(feature = "remote")]
pub use crate::remote::HttpCurator;
#[cfg(any(test, feature = "mock"))]
pub use crate::remote::MockCurator;
pub use crate::remote::{Blob, CuratedRecord, CuratorClient, RemoteCuratedDatabase, RemoteOptions};
pub use crate::search::{CopyOptions, CopyReport, DestroyReport, Search};
