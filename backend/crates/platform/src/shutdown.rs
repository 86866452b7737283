//! Graceful shutdown
//!
//! `Serving -> ShuttingDown -> Drained -> Stopped`
//!
//! On the shutdown signal the listener stops accepting, in-flight requests
//! get a bounded grace period, then background tasks are drained with no
//! timeout. Any error from the server is returned once draining is done.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::background::BackgroundTasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Serving,
    ShuttingDown,
    Drained,
    Stopped,
}

impl ShutdownPhase {
    /// `Stopped` is terminal.
    pub fn next(self) -> Self {
        match self {
            ShutdownPhase::Serving => ShutdownPhase::ShuttingDown,
            ShutdownPhase::ShuttingDown => ShutdownPhase::Drained,
            ShutdownPhase::Drained | ShutdownPhase::Stopped => ShutdownPhase::Stopped,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("in-flight requests did not complete within {0:?}")]
    GracePeriodExceeded(Duration),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    grace_period: Duration,
    tasks: BackgroundTasks,
    cancel: CancellationToken,
    phase: watch::Sender<ShutdownPhase>,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration, tasks: BackgroundTasks) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Serving);
        Self {
            grace_period,
            tasks,
            cancel: CancellationToken::new(),
            phase,
        }
    }

    /// Cancelled when shutdown begins. Long-lived loops select on it.
    pub fn token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    /// Phases are only ever entered in order.
    fn advance(&self) -> ShutdownPhase {
        let phase = self.phase().next();
        tracing::info!(?phase, "Shutdown phase");
        self.phase.send_replace(phase);
        phase
    }

    /// Serve `router` on `listener` until `signal` resolves, then drain.
    pub async fn serve<S>(
        &self,
        listener: TcpListener,
        router: Router,
        signal: S,
    ) -> Result<(), ShutdownError>
    where
        S: Future<Output = ()> + Send,
    {
        let server_cancel = self.cancel.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        });

        let result = tokio::select! {
            res = &mut server => {
                // The server stopped without being asked to.
                self.advance();
                self.cancel.cancel();
                flatten(res)
            }
            _ = signal => {
                self.advance();
                self.cancel.cancel();
                match tokio::time::timeout(self.grace_period, &mut server).await {
                    Ok(res) => flatten(res),
                    Err(_) => {
                        server.abort();
                        Err(ShutdownError::GracePeriodExceeded(self.grace_period))
                    }
                }
            }
        };

        if let Err(e) = &result {
            tracing::error!(error = %e, "Server shutdown error");
        }

        tracing::info!(pending = self.tasks.len(), "Completing background tasks");
        self.tasks.wait().await;
        self.advance();

        self.advance();
        result
    }
}

fn flatten(
    res: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ShutdownError> {
    Ok(res??)
}

/// Wait for shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => tracing::error!("failed to install SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
