//! Layered settings for recordbase.
//!
//! Settings are merged, lowest precedence first, from:
//! 1. `settings.toml`, `settings.yaml` and `settings.json` in the platform
//!    configuration directory,
//! 2. an explicitly given file (format picked by extension),
//! 3. `RECORDBASE_`-prefixed environment variables, with `__` separating
//!    nested keys (`RECORDBASE_DATABASES__LOCAL__HOST=/data`).
//!
//! The resulting [`Config`] is created once and passed to whatever needs it.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const ENV_PREFIX: &str = "RECORDBASE_";
const SETTINGS: &str = "settings";

/// One logical database: which backend style, where, and anything else that
/// backend needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub style: String,
    pub host: String,
    /// Style-specific options, deserialized by the backend itself.
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

impl DatabaseConfig {
    pub fn new(style: impl Into<String>, host: impl Into<String>) -> Self {
        Self { style: style.into(), host: host.into(), options: BTreeMap::new() }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Deserialize the style-specific options into a backend's own type.
    pub fn options<T: DeserializeOwned>(&self) -> Result<T> {
        let map: Map<String, Value> = self.options.clone().into_iter().collect();
        serde_json::from_value(Value::Object(map)).or_raise(|| ErrorKind::InvalidOptions(self.host.clone()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,
}

impl Config {
    /// Load from the platform configuration directory and the environment.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment(None))
    }

    /// As [`load`](Config::load), with `path` layered over the platform files.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(Self::figment(Some(path.as_ref())))
    }

    /// The merged provider chain, for callers that want to add layers.
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(dir) = config_dir() {
            debug!(dir = %dir.display(), "reading settings from config directory");
            figment = figment
                .merge(Toml::file(dir.join(format!("{SETTINGS}.toml"))))
                .merge(Yaml::file(dir.join(format!("{SETTINGS}.yaml"))))
                .merge(Json::file(dir.join(format!("{SETTINGS}.json"))));
        }
        if let Some(path) = explicit {
            figment = with_file(figment, path);
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().or_raise(|| ErrorKind::Load)
    }

    /// The database configured under `name`.
    pub fn database(&self, name: &str) -> Result<&DatabaseConfig> {
        self.databases.get(name).ok_or_raise(|| ErrorKind::UnknownDatabase(name.to_string()))
    }

    pub fn database_names(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }
}

/// Layer one settings file over `figment`, choosing the format by extension
/// (TOML unless it says otherwise).
fn with_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

/// Platform configuration directory, e.g. `~/.config/recordbase` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "recordbase", "recordbase").map(|dirs| dirs.config_dir().to_path_buf())
}
