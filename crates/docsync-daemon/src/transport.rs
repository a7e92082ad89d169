use async_trait::async_trait;
use chrono::Utc;
use docsync_core::{ClassifiedChange, DocSyncError, Result, SyncTransport, TransportConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Request body posted for each batch
#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    sent_at: String,
    changes: &'a [ClassifiedChange],
}

/// Posts each batch as JSON to a remote endpoint.
/// Any network error or non-success status fails the whole batch.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn sync_changes(&self, changes: &[ClassifiedChange]) -> Result<()> {
        let body = SyncRequest {
            sent_at: Utc::now().to_rfc3339(),
            changes,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocSyncError::Transport(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocSyncError::Transport(format!(
                "{} responded {}: {}",
                self.endpoint,
                status,
                text.trim()
            )));
        }

        debug!("Delivered {} changes to {}", changes.len(), self.endpoint);
        Ok(())
    }
}

/// Dry-run transport: logs each batch and accepts it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl SyncTransport for LogTransport {
    async fn sync_changes(&self, changes: &[ClassifiedChange]) -> Result<()> {
        for change in changes {
            info!(
                "[dry-run] {} {:?} ({}, docs: {})",
                change.kind, change.path, change.priority, change.has_documentation
            );
        }
        Ok(())
    }
}

/// HTTP delivery when an endpoint is configured, otherwise a dry run.
pub fn from_config(config: &TransportConfig) -> Arc<dyn SyncTransport> {
    match config.endpoint.as_deref() {
        Some(endpoint) if !endpoint.trim().is_empty() => {
            info!("Delivering changes to {}", endpoint);
            Arc::new(HttpTransport::new(endpoint.trim()))
        }
        _ => {
            info!("No transport endpoint configured, running in dry-run mode");
            Arc::new(LogTransport)
        }
    }
}
