use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Patterns understood by the notification consumer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationPattern {
    #[serde(rename = "payment-received-notification")]
    PaymentReceived,
    #[serde(rename = "payment-in-progress-notification")]
    PaymentInProgress,
}

impl NotificationPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPattern::PaymentReceived => "payment-received-notification",
            NotificationPattern::PaymentInProgress => "payment-in-progress-notification",
        }
    }
}

impl Display for NotificationPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
