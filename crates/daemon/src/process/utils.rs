use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ServiceConfig;

/// What ended the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownCause {
    Interrupt,
    Terminate,
    Requested,
}

/// Shutdown fan-out: every task holds a receiver, the handle holds the sender.
pub struct ShutdownChannel {
    pub waiter: JoinHandle<ShutdownCause>,
    pub tx: watch::Sender<()>,
    pub rx: watch::Receiver<()>,
}

/// Listen for SIGINT, SIGTERM or a programmatic request and broadcast
/// shutdown on the watch channel.
///
/// SIGINT stops at once. SIGTERM first waits `grace` so a load balancer has
/// time to stop routing to us.
pub fn shutdown_channel(grace: Duration) -> std::io::Result<ShutdownChannel> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let (tx, rx) = watch::channel(());
    let broadcast = tx.clone();
    let mut requested = rx.clone();

    let waiter = tokio::spawn(async move {
        let cause = tokio::select! {
            _ = sigint.recv() => ShutdownCause::Interrupt,
            _ = sigterm.recv() => {
                tracing::info!(grace_ms = grace.as_millis() as u64, "SIGTERM received, draining");
                tokio::time::sleep(grace).await;
                ShutdownCause::Terminate
            }
            _ = requested.changed() => ShutdownCause::Requested,
        };

        tracing::info!(?cause, "shutting down");
        let _ = broadcast.send(());
        cause
    });

    Ok(ShutdownChannel { waiter, tx, rx })
}

/// Route panics through `tracing` so they reach the log files too.
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| {
        let thread = std::thread::current();
        let thread = thread.name().unwrap_or("unnamed");
        match panic.location() {
            Some(loc) => tracing::error!(
                message = %panic,
                thread,
                panic.file = loc.file(),
                panic.line = loc.line(),
            ),
            None => tracing::error!(message = %panic, thread),
        }
    }));
}

pub fn report_startup(config: &ServiceConfig) {
    let build = common::prelude::build_info();

    tracing::info!(
        version = %build.version,
        profile = %build.build_profile,
        built_at = %build.build_timestamp,
        listen_addr = %config.listen_addr,
        path_prefix = %config.path_prefix,
        content_backend = config.content_store.backend_name(),
        persistent_db = config.sqlite_path.is_some(),
        "gfhs starting up"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requested_shutdown_reaches_every_receiver() {
        let channel = shutdown_channel(Duration::from_secs(60)).unwrap();
        let mut task_rx = channel.rx.clone();

        channel.tx.send(()).unwrap();
        let cause = channel.waiter.await.unwrap();
        assert_eq!(cause, ShutdownCause::Requested);

        tokio::time::timeout(Duration::from_secs(1), task_rx.changed())
            .await
            .unwrap()
            .unwrap();
    }
}
