use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::processed_webhook_events},
};
use domain::{
    entities::processed_webhook_events::InsertProcessedWebhookEventEntity,
    repositories::processed_webhook_events::ProcessedWebhookEventRepository,
    value_objects::enums::webhook_event_statuses::{WebhookClaim, WebhookEventStatus},
};

pub struct ProcessedWebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ProcessedWebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProcessedWebhookEventRepository for ProcessedWebhookEventPostgres {
    async fn try_claim(
        &self,
        event_id: &str,
        event_type: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<WebhookClaim> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let inserted = insert_into(processed_webhook_events::table)
            .values(&InsertProcessedWebhookEventEntity {
                event_id: event_id.to_string(),
                event_type: event_type.to_string(),
                status: WebhookEventStatus::Processing.to_string(),
                claimed_at: now,
                processed_at: None,
            })
            .on_conflict(processed_webhook_events::event_id)
            .do_nothing()
            .execute(&mut conn)?;

        if inserted == 1 {
            return Ok(WebhookClaim::Claimed);
        }

        // Row locking makes only one concurrent takeover match the lease filter.
        let taken_over = update(
            processed_webhook_events::table
                .filter(processed_webhook_events::event_id.eq(event_id))
                .filter(processed_webhook_events::status.eq(WebhookEventStatus::Processing.as_str()))
                .filter(processed_webhook_events::claimed_at.lt(stale_before)),
        )
        .set(processed_webhook_events::claimed_at.eq(now))
        .execute(&mut conn)?;

        if taken_over == 1 {
            return Ok(WebhookClaim::Claimed);
        }

        let status = processed_webhook_events::table
            .filter(processed_webhook_events::event_id.eq(event_id))
            .select(processed_webhook_events::status)
            .first::<String>(&mut conn)
            .optional()?;

        // A row released in between counts as busy; the next delivery claims it.
        Ok(match status.as_deref() {
            Some(status) if status == WebhookEventStatus::Processed.as_str() => {
                WebhookClaim::AlreadyProcessed
            }
            _ => WebhookClaim::InProgress,
        })
    }

    async fn mark_processed(&self, event_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            processed_webhook_events::table.filter(processed_webhook_events::event_id.eq(event_id)),
        )
        .set((
            processed_webhook_events::status.eq(WebhookEventStatus::Processed.as_str()),
            processed_webhook_events::processed_at.eq(Some(Utc::now())),
        ))
        .execute(&mut conn)?;

        Ok(())
    }

    async fn release(&self, event_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(
            processed_webhook_events::table
                .filter(processed_webhook_events::event_id.eq(event_id))
                .filter(processed_webhook_events::status.eq(WebhookEventStatus::Processing.as_str())),
        )
        .execute(&mut conn)?;

        Ok(())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(
            processed_webhook_events::table.filter(processed_webhook_events::claimed_at.lt(cutoff)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }
}
