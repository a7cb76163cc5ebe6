use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

/// Durable point-to-point transport. `destination` is a queue name.
#[automock]
#[async_trait]
pub trait MessageQueue {
    async fn push(&self, destination: &str, payload: String) -> Result<()>;
}
