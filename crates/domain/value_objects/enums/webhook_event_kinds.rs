use std::fmt::Display;

/// Stripe event types this service reacts to. Everything else is `Unhandled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    InvoiceCreated,
    InvoiceUpdated,
    PaymentIntentSucceeded,
    Unhandled,
}

impl WebhookEventKind {
    pub fn from_event_type(value: &str) -> Self {
        match value {
            "invoice.created" => WebhookEventKind::InvoiceCreated,
            "invoice.updated" => WebhookEventKind::InvoiceUpdated,
            "payment_intent.succeeded" => WebhookEventKind::PaymentIntentSucceeded,
            _ => WebhookEventKind::Unhandled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventKind::InvoiceCreated => "invoice.created",
            WebhookEventKind::InvoiceUpdated => "invoice.updated",
            WebhookEventKind::PaymentIntentSucceeded => "payment_intent.succeeded",
            WebhookEventKind::Unhandled => "unhandled",
        }
    }
}

impl Display for WebhookEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
