use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use crates::domain::repositories::processed_webhook_events::ProcessedWebhookEventRepository;
use tracing::{error, info};

pub struct WebhookEventRetentionUseCase {
    repository: Arc<dyn ProcessedWebhookEventRepository + Send + Sync>,
    retention_days: i64,
}

impl WebhookEventRetentionUseCase {
    pub fn new(
        repository: Arc<dyn ProcessedWebhookEventRepository + Send + Sync>,
        retention_days: i64,
    ) -> Self {
        Self {
            repository,
            retention_days,
        }
    }

    /// Deletes claims older than the retention window; returns how many went.
    pub async fn purge_expired(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(self.retention_days.max(1));
        let deleted = self.repository.delete_before(cutoff).await?;

        info!(
            deleted,
            cutoff = %cutoff,
            "webhook_event_retention: purged processed webhook events"
        );
        Ok(deleted)
    }
}

pub async fn run_retention_loop(usecase: Arc<WebhookEventRetentionUseCase>, interval: std::time::Duration) {
    loop {
        if let Err(err) = usecase.purge_expired().await {
            error!(error = ?err, "webhook_event_retention: purge failed");
        }

        tokio::time::sleep(interval).await;
    }
}
