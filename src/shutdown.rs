use tokio_util::sync::CancellationToken;

/// The single cancellation flag for a run. Producers, the consumer and the
/// rotation watchers all observe the same token; setting it starts the
/// shutdown protocol.
#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Spawns a task that cancels the run on SIGINT or SIGTERM. The task itself
/// exits once the token is cancelled, whoever set it.
pub fn spawn_signal_listener(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let token = shutdown.token();
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received interrupt, shutting down");
                shutdown.cancel();
            }
            _ = sigterm() => {
                tracing::info!("received SIGTERM, shutting down");
                shutdown.cancel();
            }
        }
    })
}

/// Resolves when SIGTERM is delivered. On non-Unix targets (or if the
/// handler cannot be registered) this future never completes; the short
/// consumer poll keeps the cancellation flag observed there.
#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(_) => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_visible_through_clones() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        assert!(!shutdown.is_cancelled());

        shutdown.clone().cancel();
        assert!(shutdown.is_cancelled());
        token.cancelled().await;
    }
}
