use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::debug;

use crate::domain::repositories::message_queue::MessageQueue;

/// One Redis list per destination; consumers pop from the head.
#[derive(Clone)]
pub struct RedisMessageQueue {
    connection: ConnectionManager,
}

impl RedisMessageQueue {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid redis url")?;
        let connection = client
            .get_connection_manager()
            .await
            .context("failed to connect to redis")?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    async fn push(&self, destination: &str, payload: String) -> Result<()> {
        let mut connection = self.connection.clone();
        let depth: i64 = connection
            .rpush(destination, payload)
            .await
            .with_context(|| format!("RPUSH to {destination} failed"))?;

        debug!(destination, depth, "queue: message pushed");
        Ok(())
    }
}
