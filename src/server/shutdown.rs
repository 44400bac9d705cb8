//! Cooperative shutdown coordination.
//!
//! Every long-running task (scheduler loops, leader election, the health
//! server) holds a clone of the same [`CancellationToken`] under the
//! hood; [`ShutdownController::shutdown`] cancels all of them at once.

use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

#[derive(Clone)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn as_cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let token = CancellationToken::new();
    (
        ShutdownController { token: token.clone() },
        ShutdownSignal { token },
    )
}

/// Waits for SIGTERM (Kubernetes' pod termination signal) or SIGINT
/// (local `Ctrl-C`), whichever arrives first, and returns its name.
pub async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let sigterm = signal(SignalKind::terminate());
        let sigint = signal(SignalKind::interrupt());
        let (mut sigterm, mut sigint) = match (sigterm, sigint) {
            (Ok(t), Ok(i)) => (t, i),
            _ => {
                // Signal handlers failed to install (e.g. no signal-capable
                // runtime); fall back to plain ctrl_c so the process can
                // still shut down cleanly on SIGINT.
                let _ = tokio::signal::ctrl_c().await;
                return "CTRL_C";
            }
        };

        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "CTRL_C"
    }
}

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod tests;
