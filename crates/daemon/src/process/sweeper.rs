use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::access::AuthValidator;

/// Periodically delete expired session and recovery tokens until shutdown.
///
/// Expired tokens already fail validation; the sweep only keeps the table
/// from growing.
pub async fn run_token_sweeper(
    auth: AuthValidator,
    every: Duration,
    mut shutdown_rx: watch::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match auth.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "expired tokens swept"),
                    Err(e) => tracing::warn!(error = %e, "token sweep failed"),
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::debug!("token sweeper stopping");
                return;
            }
        }
    }
}
