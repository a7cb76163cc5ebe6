use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::value_objects::enums::webhook_event_statuses::WebhookClaim;

#[automock]
#[async_trait]
pub trait ProcessedWebhookEventRepository {
    /// Claims `event_id` for this delivery. A `processing` claim taken before
    /// `stale_before` is considered abandoned and is taken over.
    async fn try_claim(
        &self,
        event_id: &str,
        event_type: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<WebhookClaim>;
    async fn mark_processed(&self, event_id: &str) -> Result<()>;
    async fn release(&self, event_id: &str) -> Result<()>;
    /// Removes events claimed before `cutoff`; returns the number of rows deleted.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
