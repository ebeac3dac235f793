//! Named style tables.
//!
//! Both record styles and database styles are looked up by name in a
//! [`StyleRegistry`]. A style that could not be set up (for example a backend
//! compiled out of this build) stays listed with its failure reason, so
//! callers can tell "no such style" apart from "style unavailable here".

use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Registration outcome for one style.
#[derive(Clone, Debug)]
pub enum StyleEntry<T> {
    Loaded(T),
    Failed(String),
}

/// A table of style name to constructor (or load failure).
#[derive(Clone, Debug)]
pub struct StyleRegistry<T> {
    entries: BTreeMap<String, StyleEntry<T>>,
}

impl<T> Default for StyleRegistry<T> {
    fn default() -> Self {
        Self { entries: BTreeMap::new() }
    }
}

impl<T> StyleRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a usable style, replacing any earlier entry of that name.
    pub fn register(&mut self, name: impl Into<String>, constructor: T) {
        let name = name.into();
        debug!(style = %name, "registered style");
        self.entries.insert(name, StyleEntry::Loaded(constructor));
    }

    /// Record that a style exists but could not be set up.
    pub fn register_failure(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        let (name, reason) = (name.into(), reason.into());
        debug!(style = %name, %reason, "style failed to load");
        self.entries.insert(name, StyleEntry::Failed(reason));
    }

    /// Look up a usable style.
    ///
    /// Fails with [`ErrorKind::UnknownStyle`] for a name never registered, and
    /// with [`ErrorKind::StyleLoadFailure`] (carrying the recorded reason) for
    /// one that failed.
    pub fn get(&self, name: &str) -> Result<&T> {
        match self.entries.get(name) {
            Some(StyleEntry::Loaded(constructor)) => Ok(constructor),
            Some(StyleEntry::Failed(reason)) => {
                exn::bail!(ErrorKind::StyleLoadFailure(name.to_string(), reason.clone()))
            },
            None => exn::bail!(ErrorKind::UnknownStyle(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Every registered name, loaded or failed, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn loaded_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, StyleEntry::Loaded(_)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, StyleEntry::Failed(_)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The recorded reason a style failed, if it did.
    pub fn failure_reason(&self, name: &str) -> Option<&str> {
        match self.entries.get(name) {
            Some(StyleEntry::Failed(reason)) => Some(reason),
            _ => None,
        }
    }
}
