// ABOUTME: Sync daemon module for continuous documentation-aware change delivery
// ABOUTME: Provides lifecycle management around a single SyncSession

pub mod session;
pub mod status;

pub use session::SyncSession;
pub use status::{DaemonState, DaemonStatus, SessionMetrics};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use docsync_core::{DocSyncConfig, SyncTransport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Interval for the idle status heartbeat in the event loop
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Sync daemon - manages lifecycle for watching a single root
pub struct SyncDaemon {
    config: DocSyncConfig,

    transport: Arc<dyn SyncTransport>,

    /// Active session
    session: Option<SyncSession>,

    /// Current daemon state
    state: Arc<RwLock<DaemonState>>,

    started_at: Option<DateTime<Utc>>,
}

impl SyncDaemon {
    pub fn new(config: DocSyncConfig, transport: Arc<dyn SyncTransport>) -> Self {
        Self {
            config,
            transport,
            session: None,
            state: Arc::new(RwLock::new(DaemonState::Stopped)),
            started_at: None,
        }
    }

    /// Start watching and run until Ctrl+C
    pub async fn start(&mut self) -> Result<()> {
        self.run_until(async {
            if signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT, shutting down...");
            }
        })
        .await
    }

    /// Start watching and run until `shutdown` resolves
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.session.is_some() {
            anyhow::bail!("Daemon already running");
        }

        *self.state.write().await = DaemonState::Starting;

        let session = match SyncSession::new(&self.config, self.transport.clone())
            .context("Failed to create sync session")
        {
            Ok(session) => session,
            Err(e) => {
                *self.state.write().await = DaemonState::Error;
                return Err(e);
            }
        };

        info!(
            "Daemon started: watching {:?} ({} patterns)",
            session.root(),
            session.active_patterns().len()
        );
        self.session = Some(session);
        self.started_at = Some(Utc::now());
        *self.state.write().await = DaemonState::Running;

        self.run_event_loop(shutdown).await;
        self.stop().await
    }

    /// Stop daemon gracefully
    pub async fn stop(&mut self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        *self.state.write().await = DaemonState::Stopping;

        if let Some(ref mut session) = self.session {
            session.stop();
        }

        *self.state.write().await = DaemonState::Stopped;

        info!("Graceful shutdown complete");
        Ok(())
    }

    pub fn session(&self) -> Option<&SyncSession> {
        self.session.as_ref()
    }

    /// Get current status
    pub async fn status(&self) -> DaemonStatus {
        let state = *self.state.read().await;
        let mut status = DaemonStatus::new(self.config.sync.root_or_cwd());
        status.state = state;
        status.started_at = self.started_at;

        if let Some(session) = &self.session {
            status.root = session.root().to_path_buf();
            status.active_patterns = session.active_patterns();
            status.metrics = session.metrics().clone();
            status.queue = session.queue().status();
        }
        status
    }

    /// Main event loop
    async fn run_event_loop<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                // Classify and enqueue debounced changes
                batch = async {
                    match self.session.as_mut() {
                        Some(session) => session.next_batch().await,
                        None => std::future::pending::<Option<docsync_core::ChangeGroups>>().await,
                    }
                } => {
                    match batch {
                        Some(groups) => {
                            if let Some(ref mut session) = self.session {
                                session.process_batch(groups).await;
                            }
                        }
                        None => {
                            info!("Change capture closed, stopping event loop");
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    if let Some(session) = &self.session {
                        debug!("Heartbeat: {}", session.queue().status_text());
                    }
                }
            }
        }
    }
}
