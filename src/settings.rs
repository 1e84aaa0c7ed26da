//! Runtime settings, layered from an optional config file and `UNIRANGE__*`
//! environment variables (environment wins).

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::persist::{DEFAULT_CHUNK_SIZE, PersistenceMode, SqliteStore};
use crate::toolkit::PARSE_STRING_MAX_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file holding the codepoint tables; in memory when absent.
    pub database: Option<String>,
    pub parse_string_max_len: usize,
    pub batch_chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            parse_string_max_len: PARSE_STRING_MAX_LEN,
            batch_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(raw) = path {
            let file = PathBuf::from(raw);
            if !file.exists() {
                warn!(path = raw, "config file not found; continuing with defaults and env overrides");
            }
            builder = builder.add_source(config::File::from(file).required(false));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("UNIRANGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?)
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        match &self.database {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }

    pub fn open_store(&self) -> Result<SqliteStore> {
        Ok(SqliteStore::new(self.persistence_mode())?.with_chunk_size(self.batch_chunk_size))
    }
}
