use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use content_store::ContentStoreConfig;

use crate::access::GateConfig;
use crate::state::{AppState, StateError};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// address the HTTP server listens on
    pub listen_addr: SocketAddr,
    /// prefix all routes are nested under, empty for none
    pub path_prefix: String,

    // storage configuration
    /// backend holding file bytes
    pub content_store: ContentStoreConfig,
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,

    // credentials
    /// raw cookie signing key, if not set a random one is
    ///  generated and sessions do not survive a restart
    pub session_secret: Option<Vec<u8>>,
    /// token lifetimes and the per-request deadline
    pub gate: GateConfig,
    /// how often expired tokens are swept
    pub sweep_interval: Duration,
    /// how long in-flight requests get after SIGTERM
    pub shutdown_grace: Duration,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            path_prefix: String::new(),
            content_store: ContentStoreConfig::Memory,
            sqlite_path: None,
            session_secret: None,
            gate: GateConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}

impl Config {
    /// Service configuration for an initialized gfhs directory.
    pub fn from_app_state(state: &AppState) -> Result<Self, StateError> {
        let key = state.config.session_key()?;
        Ok(Self {
            listen_addr: state.config.listen_addr,
            path_prefix: state.config.path_prefix.clone(),
            content_store: state.content_store_config(),
            sqlite_path: Some(state.db_path.clone()),
            session_secret: Some(key.master().to_vec()),
            gate: GateConfig {
                token_ttl: state.config.token_ttl(),
                recovery_ttl: state.config.recovery_ttl(),
                request_timeout: state.config.request_timeout(),
            },
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            log_level: tracing::Level::INFO,
            log_dir: state.log_dir(),
        })
    }
}
