use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::domain::{
    repositories::message_queue::MessageQueue,
    value_objects::enums::notification_patterns::NotificationPattern,
};

#[derive(Debug, Error)]
#[error("failed to publish to {destination}: {source}")]
pub struct PublishError {
    pub destination: String,
    #[source]
    pub source: anyhow::Error,
}

/// `{pattern, data}` wrapper expected by the notification consumer.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub pattern: NotificationPattern,
    pub data: &'a T,
}

/// Fire-and-forget publishing on top of a [`MessageQueue`]. Nothing is retried here.
#[derive(Clone)]
pub struct EventPublisher {
    queue: Arc<dyn MessageQueue + Send + Sync>,
}

impl EventPublisher {
    pub fn new(queue: Arc<dyn MessageQueue + Send + Sync>) -> Self {
        Self { queue }
    }

    pub async fn publish_raw<T: Serialize>(
        &self,
        destination: &str,
        message: &T,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_string(message).map_err(|err| PublishError {
            destination: destination.to_string(),
            source: err.into(),
        })?;

        if let Err(err) = self.queue.push(destination, payload).await {
            error!(destination, error = ?err, "publisher: push failed");
            return Err(PublishError {
                destination: destination.to_string(),
                source: err,
            });
        }

        info!(destination, "publisher: message published");
        Ok(())
    }

    pub async fn publish_enveloped<T: Serialize>(
        &self,
        destination: &str,
        pattern: NotificationPattern,
        data: &T,
    ) -> Result<(), PublishError> {
        self.publish_raw(destination, &Envelope { pattern, data })
            .await
    }
}
