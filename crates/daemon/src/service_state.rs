use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use url::Url;

use content_store::{ContentStore, ContentStoreError};

use crate::access::AccessGate;
use crate::database::{Database, DatabaseSetupError};
use crate::http_server::normalize_prefix;
use crate::service_config::Config;

/// Main service state, shared by every request handler
#[derive(Clone)]
pub struct State {
    database: Database,
    gate: AccessGate,
    cookie_key: Key,
    path_prefix: String,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup database
        let database = match config.sqlite_path {
            Some(ref path) => {
                if !path.exists() {
                    return Err(StateSetupError::DatabasePathDoesNotExist);
                }
                let url = Url::parse(&format!("sqlite://{}", path.display()))
                    .map_err(|_| StateSetupError::InvalidDatabaseUrl)?;
                tracing::info!(url = %url, "connecting to database");
                Database::connect(&url).await?
            }
            None => {
                tracing::info!("using in-memory database");
                Database::in_memory().await?
            }
        };

        // 2. Setup content store
        tracing::debug!(backend = config.content_store.backend_name(), "loading content store");
        let content = ContentStore::new(config.content_store.clone()).await?;

        // 3. Cookie signing key
        let cookie_key = match &config.session_secret {
            Some(secret) => Key::try_from(secret.as_slice())
                .map_err(|e| StateSetupError::InvalidSessionSecret(e.to_string()))?,
            None => {
                tracing::warn!("no session secret configured, sessions end with this process");
                Key::generate()
            }
        };

        Ok(Self::new(
            database.clone(),
            AccessGate::new(database, content, config.gate),
            cookie_key,
            config.path_prefix.clone(),
        ))
    }

    pub fn new(database: Database, gate: AccessGate, cookie_key: Key, path_prefix: String) -> Self {
        Self {
            database,
            gate,
            cookie_key,
            path_prefix: normalize_prefix(&path_prefix),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn cookie_key(&self) -> &Key {
        &self.cookie_key
    }

    /// Cookie path, so sessions stay scoped to the mounted prefix
    pub fn cookie_path(&self) -> &str {
        if self.path_prefix.is_empty() {
            "/"
        } else {
            &self.path_prefix
        }
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        self.database()
    }
}

impl FromRef<State> for Database {
    fn from_ref(state: &State) -> Self {
        state.database.clone()
    }
}

impl FromRef<State> for ContentStore {
    fn from_ref(state: &State) -> Self {
        state.gate.files().content().clone()
    }
}

impl FromRef<State> for Key {
    fn from_ref(state: &State) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Database path does not exist")]
    DatabasePathDoesNotExist,
    #[error("Database setup error: {0}")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
    #[error("Content store error: {0}")]
    ContentStoreError(#[from] ContentStoreError),
    #[error("Invalid session secret: {0}")]
    InvalidSessionSecret(String),
}
