use std::error::Error;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use gfhs_daemon::access::Credentials;
use gfhs_daemon::http_server::api::client::{ApiClient, ApiError};
use gfhs_daemon::state::{AppState, StateError};
use gfhs_daemon::{ServiceConfig, ServiceState};

const DEFAULT_REMOTE: &str = "http://localhost:29320";
const SESSION_FILE_NAME: &str = "session.toml";

/// Resolve the remote URL for the API client.
///
/// Priority: explicit `--remote` flag > config file listen port and prefix >
/// hardcoded default.
pub fn resolve_remote(explicit: Option<Url>, config_path: Option<PathBuf>) -> Url {
    if let Some(url) = explicit {
        return url;
    }
    if let Ok(state) = AppState::load(config_path) {
        let url = format!(
            "http://localhost:{}{}",
            state.config.listen_addr.port(),
            state.config.path_prefix
        );
        if let Ok(url) = Url::parse(&url) {
            return url;
        }
    }
    Url::parse(DEFAULT_REMOTE).expect("hardcoded URL must parse")
}

/// Credentials saved by `gfhs login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub user: String,
    pub token: String,
}

impl SavedSession {
    fn path(config_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        Ok(AppState::gfhs_dir(config_path)?.join(SESSION_FILE_NAME))
    }

    pub fn load(config_path: Option<PathBuf>) -> Option<Self> {
        let raw = fs::read_to_string(Self::path(config_path).ok()?).ok()?;
        toml::from_str(&raw).ok()
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        let path = Self::path(config_path)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn clear(config_path: Option<PathBuf>) -> Result<(), StateError> {
        let path = Self::path(config_path)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Clone)]
pub struct OpContext {
    /// API client, carrying credentials when any were given or saved
    pub client: ApiClient,
    /// Optional custom config path (defaults to ~/.gfhs)
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(
        remote: Url,
        config_path: Option<PathBuf>,
        credentials: Option<Credentials>,
    ) -> Result<Self, ApiError> {
        let client = match &credentials {
            Some(credentials) => ApiClient::with_credentials(&remote, credentials)?,
            None => ApiClient::new(&remote)?,
        };
        Ok(Self {
            client,
            config_path,
        })
    }

    /// Service state over the local config directory, for administrative
    /// commands that work on the database directly.
    pub async fn local_state(&self) -> Result<ServiceState, LocalStateError> {
        let app_state = AppState::load(self.config_path.clone())?;
        let config = ServiceConfig::from_app_state(&app_state)?;
        Ok(ServiceState::from_config(&config).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LocalStateError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("setup error: {0}")]
    Setup(#[from] gfhs_daemon::service_state::StateSetupError),
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
