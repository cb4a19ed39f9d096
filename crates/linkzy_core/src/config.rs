//! Client configuration file (`linkzy.toml`).
//!
//! # Responsibility
//! - Describe where the local database, blob files and logs live.
//! - Provide the editor's starting text for a fresh document.
//!
//! # Invariants
//! - A missing file, section or key falls back to the defaults.
//!
//! ```toml
//! [storage]
//! db_path = "linkzy.sqlite3"
//! blob_root = "blobs"
//!
//! [logging]
//! level = "info"
//! log_dir = "/var/log/linkzy"
//!
//! [editor]
//! initial_content = "// start coding together"
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_EDITOR_CONTENT: &str = "// Start coding together!\n";

/// Top-level configuration stored in `linkzy.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editor: EditorConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file. Relative paths resolve against the config file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Directory receiving uploaded memory photos.
    #[serde(default = "default_blob_root")]
    pub blob_root: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("linkzy.sqlite3")
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("blobs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            blob_root: default_blob_root(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Absolute log directory; file logging stays off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    crate::logging::default_log_level().to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Text shown before the shared document has been written.
    #[serde(default = "default_editor_content")]
    pub initial_content: String,
}

fn default_editor_content() -> String {
    DEFAULT_EDITOR_CONTENT.to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            initial_content: default_editor_content(),
        }
    }
}

/// Config file read/parse failure.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl CoreConfig {
    /// The well-known filename for the config file.
    pub fn filename() -> &'static str {
        "linkzy.toml"
    }

    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Reads `path`, returning defaults when the file does not exist.
    ///
    /// Relative storage paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text).map_err(ConfigError::Parse)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if let Some(base) = path.parent() {
            config.storage.db_path = resolve(base, &config.storage.db_path);
            config.storage.blob_root = resolve(base, &config.storage.blob_root);
        }
        Ok(config)
    }
}

fn resolve(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}
