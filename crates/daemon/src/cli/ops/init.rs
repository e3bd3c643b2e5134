use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;

use content_store::ContentStoreConfig;
use gfhs_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Address the daemon listens on
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Prefix every route is served under, e.g. `/files`
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Store file content here instead of `<config dir>/content`
    #[arg(long)]
    pub content_dir: Option<PathBuf>,

    /// Directory for daemon log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("state error: {0}")]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(prefix) = &self.path_prefix {
            config.path_prefix = prefix.clone();
        }
        if let Some(path) = &self.content_dir {
            config.content_store = Some(ContentStoreConfig::Local { path: path.clone() });
        }
        config.log_dir = self.log_dir.clone();

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        Ok(format!(
            "Initialized gfhs in {}\n  config:  {}\n  db:      {}\n  content: {}",
            state.gfhs_dir.display(),
            state.config_path.display(),
            state.db_path.display(),
            state.content_store_config().backend_name(),
        ))
    }
}
