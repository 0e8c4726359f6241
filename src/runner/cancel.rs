use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal;
use tracing::warn;

/// Cooperative cancellation, honoured between steps only.
///
/// A step that has started always runs to completion or failure.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Raise the flag on Ctrl-C or SIGTERM
    pub fn listen_for_signals(&self) {
        let flag = self.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sig) => {
                        sig.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {},
                _ = terminate => {},
            }

            warn!("Interrupt received; stopping after the current step");
            flag.cancel();
        });
    }
}
