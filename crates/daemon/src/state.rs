use std::net::SocketAddr;
use std::time::Duration;
use std::{fs, path::PathBuf};

use axum_extra::extract::cookie::Key;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use content_store::ContentStoreConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "gfhs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const CONTENT_DIR_NAME: &str = "content";
pub const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Prefix every route is mounted under, e.g. `/gfhs`. Empty for none.
    #[serde(default)]
    pub path_prefix: String,
    /// Where file bytes live. Defaults to the `content/` directory.
    #[serde(default)]
    pub content_store: Option<ContentStoreConfig>,
    /// Base64 key (at least 64 bytes) signing the session cookies
    pub session_secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_recovery_ttl_secs")]
    pub recovery_ttl_secs: u64,
    /// Deadline for a single request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Directory for log files; stdout only if unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 29320))
}

fn default_token_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_recovery_ttl_secs() -> u64 {
    60 * 60
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            path_prefix: String::new(),
            content_store: None,
            session_secret: BASE64.encode(Key::generate().master()),
            token_ttl_secs: default_token_ttl_secs(),
            recovery_ttl_secs: default_recovery_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn recovery_ttl(&self) -> Duration {
        Duration::from_secs(self.recovery_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Decode the cookie signing key.
    pub fn session_key(&self) -> Result<Key, StateError> {
        let bytes = BASE64
            .decode(self.session_secret.trim())
            .map_err(|e| StateError::InvalidSessionSecret(e.to_string()))?;
        Key::try_from(bytes.as_slice())
            .map_err(|e| StateError::InvalidSessionSecret(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the gfhs directory (~/.gfhs)
    pub gfhs_dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the local content directory
    pub content_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the gfhs directory path (custom or default ~/.gfhs)
    pub fn gfhs_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new gfhs state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let gfhs_dir = Self::gfhs_dir(custom_path)?;

        if gfhs_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&gfhs_dir)?;

        let content_path = gfhs_dir.join(CONTENT_DIR_NAME);
        fs::create_dir_all(&content_path)?;

        let config = config.unwrap_or_default();
        config.session_key()?;
        let config_path = gfhs_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // Empty database; migrations run on first connect
        let db_path = gfhs_dir.join(DB_FILE_NAME);
        fs::write(&db_path, "")?;

        Ok(Self {
            gfhs_dir,
            db_path,
            content_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the gfhs directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let gfhs_dir = Self::gfhs_dir(custom_path)?;

        if !gfhs_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = gfhs_dir.join(DB_FILE_NAME);
        let content_path = gfhs_dir.join(CONTENT_DIR_NAME);
        let config_path = gfhs_dir.join(CONFIG_FILE_NAME);

        if !db_path.exists() {
            return Err(StateError::MissingFile(DB_FILE_NAME.to_string()));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            gfhs_dir,
            db_path,
            content_path,
            config_path,
            config,
        })
    }

    /// The configured content backend, or the local `content/` directory.
    pub fn content_store_config(&self) -> ContentStoreConfig {
        self.config
            .content_store
            .clone()
            .unwrap_or_else(|| ContentStoreConfig::Local {
                path: self.content_path.clone(),
            })
    }

    /// The configured log directory, relative paths taken from the gfhs dir.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.config.log_dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                self.gfhs_dir.join(dir)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("gfhs directory not initialized. Run 'gfhs init' first")]
    NotInitialized,

    #[error("gfhs directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid session secret: {0}")]
    InvalidSessionSecret(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("gfhs");

        let created = AppState::init(Some(root.clone()), None).unwrap();
        assert!(created.content_path.is_dir());
        assert!(created.db_path.exists());

        let loaded = AppState::load(Some(root.clone())).unwrap();
        assert_eq!(loaded.config, created.config);
        loaded.config.session_key().unwrap();
        assert_eq!(
            loaded.content_store_config(),
            ContentStoreConfig::Local {
                path: root.join(CONTENT_DIR_NAME)
            }
        );

        assert!(matches!(
            AppState::init(Some(root), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: AppConfig = toml::from_str(r#"session_secret = "c2hvcnQ=""#).unwrap();
        assert_eq!(config.listen_addr.port(), 29320);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(config.content_store.is_none());
        // "short" is far below the 64 bytes a signing key needs
        assert!(matches!(
            config.session_key(),
            Err(StateError::InvalidSessionSecret(_))
        ));
    }
}
