//! Signal-driven shutdown.
//!
//! One task turns SIGINT/SIGTERM into a cancelled token; another waits on
//! the token, closes the session connection and ends the process.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::db::DatabaseClient;

/// Printed when the process is interrupted.
pub const INTERRUPT_MESSAGE: &str = "Exiting due to SIGINT";

/// Cancels `token` on the first SIGINT or SIGTERM.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        token.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Could not listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Once `token` is cancelled, closes the connection and exits with status 0.
pub fn spawn_shutdown_watcher(
    token: CancellationToken,
    db: Arc<dyn DatabaseClient>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        close_on_cancel(token, db).await;
        std::process::exit(0);
    })
}

/// Waits for cancellation, then prints the interrupt message and closes `db`.
pub async fn close_on_cancel(token: CancellationToken, db: Arc<dyn DatabaseClient>) {
    token.cancelled().await;
    println!("\n{INTERRUPT_MESSAGE}");
    if let Err(e) = db.close().await {
        warn!("Failed to close connection on shutdown: {}", e);
    }
}
