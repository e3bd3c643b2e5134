use std::net::SocketAddr;

use clap::Args;

use gfhs_daemon::process::ServiceError;
use gfhs_daemon::state::AppState;
use gfhs_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override the listen address (default from config)
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Directory for log files (default from config, stdout only if unset)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,

    /// Log level for stdout and file logs
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] gfhs_daemon::state::StateError),

    #[error("daemon failed: {0}")]
    Failed(#[from] ServiceError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        // Load state from config path (or default ~/.gfhs)
        let state = AppState::load(ctx.config_path.clone())?;

        let mut config = ServiceConfig::from_app_state(&state)?;
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir.clone();
        }
        config.log_level = self.log_level;

        spawn_service(&config).await?;
        Ok("daemon ended".to_string())
    }
}
