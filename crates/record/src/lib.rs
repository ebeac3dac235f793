//! Records: named, styled, hierarchical documents.
//!
//! This crate holds the contract every record style implements
//! ([`Record`], [`RecordStyle`]), the [`Model`] tree records are stored as,
//! and the [`StyleRegistry`] used to look styles up by name.

pub mod error;
mod model;
mod name;
mod record;
mod registry;
pub mod styles;
mod xml;

pub use crate::model::{Format, Model, as_list, text};
pub use crate::name::validate as validate_name;
pub use crate::record::{Record, RecordRegistry, RecordStyle, SearchField, StyleHandle};
pub use crate::registry::{StyleEntry, StyleRegistry};
