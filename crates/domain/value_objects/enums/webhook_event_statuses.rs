use std::fmt::Display;

/// Stored state of a provider event in `processed_webhook_events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventStatus {
    Processing,
    Processed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Processing => "processing",
            WebhookEventStatus::Processed => "processed",
        }
    }
}

impl Display for WebhookEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of claiming an event id before handling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookClaim {
    /// This delivery owns the event: fresh id, or an earlier claim whose lease ran out.
    Claimed,
    /// Another delivery holds a live claim.
    InProgress,
    AlreadyProcessed,
}
