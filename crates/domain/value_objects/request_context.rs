use tracing::{Span, field::Empty, info_span};
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Per-request identity threaded explicitly through every use case call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
    pub subject: Option<String>,
}

impl RequestContext {
    pub fn new(correlation_id: impl Into<String>, subject: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            subject,
        }
    }

    /// Reuses a non-blank inbound correlation id, otherwise generates one.
    pub fn from_header(correlation_id: Option<&str>, subject: Option<String>) -> Self {
        let correlation_id = correlation_id
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self::new(correlation_id, subject)
    }

    /// Ids discovered while the operation runs are filled in with `Span::current().record`.
    pub fn span(&self, operation: &'static str) -> Span {
        info_span!(
            "invoice_operation",
            operation,
            correlation_id = %self.correlation_id,
            subject = self.subject.as_deref().unwrap_or("anonymous"),
            user_id = Empty,
            customer_id = Empty,
            subscription_id = Empty,
            payment_intent_id = Empty,
            invoice_id = Empty,
        )
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::from_header(None, None)
    }
}
