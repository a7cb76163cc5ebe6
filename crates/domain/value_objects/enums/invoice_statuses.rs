use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Provider status vocabulary shared by invoices, payment intents and subscriptions.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    // invoice
    Draft,
    Open,
    Paid,
    Uncollectible,
    Void,
    // payment intent
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    // subscription
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Unpaid,
    Paused,
    #[default]
    Unknown,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Uncollectible => "uncollectible",
            InvoiceStatus::Void => "void",
            InvoiceStatus::RequiresPaymentMethod => "requires_payment_method",
            InvoiceStatus::RequiresConfirmation => "requires_confirmation",
            InvoiceStatus::RequiresAction => "requires_action",
            InvoiceStatus::Processing => "processing",
            InvoiceStatus::RequiresCapture => "requires_capture",
            InvoiceStatus::Canceled => "canceled",
            InvoiceStatus::Succeeded => "succeeded",
            InvoiceStatus::Incomplete => "incomplete",
            InvoiceStatus::IncompleteExpired => "incomplete_expired",
            InvoiceStatus::Trialing => "trialing",
            InvoiceStatus::Active => "active",
            InvoiceStatus::PastDue => "past_due",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paused => "paused",
            InvoiceStatus::Unknown => "unknown",
        }
    }

    /// Maps a raw provider value; anything outside the known vocabulary becomes `Unknown`.
    pub fn from_provider(value: &str) -> Self {
        match value.trim() {
            "draft" => InvoiceStatus::Draft,
            "open" => InvoiceStatus::Open,
            "paid" => InvoiceStatus::Paid,
            "uncollectible" => InvoiceStatus::Uncollectible,
            "void" => InvoiceStatus::Void,
            "requires_payment_method" => InvoiceStatus::RequiresPaymentMethod,
            "requires_confirmation" => InvoiceStatus::RequiresConfirmation,
            "requires_action" => InvoiceStatus::RequiresAction,
            "processing" => InvoiceStatus::Processing,
            "requires_capture" => InvoiceStatus::RequiresCapture,
            "canceled" => InvoiceStatus::Canceled,
            "succeeded" => InvoiceStatus::Succeeded,
            "incomplete" => InvoiceStatus::Incomplete,
            "incomplete_expired" => InvoiceStatus::IncompleteExpired,
            "trialing" => InvoiceStatus::Trialing,
            "active" => InvoiceStatus::Active,
            "past_due" => InvoiceStatus::PastDue,
            "unpaid" => InvoiceStatus::Unpaid,
            "paused" => InvoiceStatus::Paused,
            _ => InvoiceStatus::Unknown,
        }
    }

    pub fn from_optional(value: Option<&str>) -> Self {
        value.map(Self::from_provider).unwrap_or_default()
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, InvoiceStatus::Succeeded)
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
