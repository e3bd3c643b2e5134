use clap::Args;

use gfhs_daemon::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health check failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        // 1. Check config directory
        lines.push("Config:".to_string());
        match AppState::load(ctx.config_path.clone()) {
            Ok(state) => {
                lines.push(format!("  directory:    {}", state.gfhs_dir.display()));
                lines.push("  config.toml:  OK".to_string());
                lines.push("  db.sqlite:    OK".to_string());
                lines.push(format!(
                    "  content:      {}",
                    state.content_store_config().backend_name()
                ));
                lines.push(format!("  listen_addr:  {}", state.config.listen_addr));
                if !state.config.path_prefix.is_empty() {
                    lines.push(format!("  path_prefix:  {}", state.config.path_prefix));
                }
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
            }
        }

        // 2. Check daemon liveness and readiness
        let base = ctx.client.base_url();
        let client = ctx.client.http_client();

        lines.push(String::new());
        lines.push(format!("Daemon ({}):", base));

        for check in ["livez", "readyz"] {
            let url = base
                .join(&format!("_status/{check}"))
                .map_err(|e| HealthError::Failed(e.to_string()))?;
            match client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    lines.push(format!("  {check}: OK"));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let reason = resp
                        .json::<serde_json::Value>()
                        .await
                        .ok()
                        .and_then(|body| body["reason"].as_str().map(str::to_string));
                    match reason {
                        Some(reason) => {
                            lines.push(format!("  {check}: UNHEALTHY ({status}: {reason})"))
                        }
                        None => lines.push(format!("  {check}: UNHEALTHY ({status})")),
                    }
                }
                Err(_) => {
                    lines.push(format!("  {check}: NOT REACHABLE"));
                }
            }
        }

        Ok(lines.join("\n"))
    }
}
