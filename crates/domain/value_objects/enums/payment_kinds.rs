use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Discriminates what `invoice_id_provided_by_stripe` refers to: a Stripe invoice id
/// for subscriptions, a payment intent id for one-time payments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Subscription,
    OneTime,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Subscription => "subscription",
            PaymentKind::OneTime => "one_time",
        }
    }
}

impl Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
