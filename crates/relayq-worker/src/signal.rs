// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shutdown signal plumbing.

use tracing::info;

/// Resolve when the process receives a shutdown signal: SIGINT or SIGTERM
/// on unix, ctrl-c elsewhere.
pub(crate) async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut interrupt =
            signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = interrupt.recv() => {
                info!(target: "relayq.worker", "received SIGINT");
            }
            _ = terminate.recv() => {
                info!(target: "relayq.worker", "received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!(target: "relayq.worker", "received ctrl-c");
    }
}
