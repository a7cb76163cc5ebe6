use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    entities::invoices::InvoiceEntity,
    value_objects::enums::notification_patterns::NotificationPattern,
};

pub const PAYMENT_NOTIFICATION_TYPE: &str = "payment";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub user_id: String,
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub notification_type: String,
    pub topic: String,
    pub body: String,
    pub read: bool,
    pub event_type: NotificationPattern,
    pub created_at: DateTime<Utc>,
}

impl NotificationMessage {
    fn for_invoice(
        invoice: &InvoiceEntity,
        pattern: NotificationPattern,
        topic: &str,
        body: &str,
    ) -> Self {
        Self {
            user_id: invoice.user_id.clone(),
            user_email: invoice.customer_email.clone(),
            full_name: invoice.customer_full_name.clone(),
            notification_type: PAYMENT_NOTIFICATION_TYPE.to_string(),
            topic: topic.to_string(),
            body: body.to_string(),
            read: false,
            event_type: pattern,
            created_at: Utc::now(),
        }
    }

    pub fn payment_in_progress(invoice: &InvoiceEntity) -> Self {
        Self::for_invoice(
            invoice,
            NotificationPattern::PaymentInProgress,
            "Payment in progress",
            "Waiting for payment",
        )
    }

    pub fn payment_successful(invoice: &InvoiceEntity) -> Self {
        Self::for_invoice(
            invoice,
            NotificationPattern::PaymentReceived,
            "Payment successful",
            "Your payment has been processed successfully.",
        )
    }

    pub fn payment_processing(invoice: &InvoiceEntity) -> Self {
        Self::for_invoice(
            invoice,
            NotificationPattern::PaymentInProgress,
            "Payment processing",
            "Your payment is being processed.",
        )
    }

    pub fn payment_received(invoice: &InvoiceEntity) -> Self {
        Self::for_invoice(
            invoice,
            NotificationPattern::PaymentReceived,
            "Payment received",
            "Your payment has been received successfully.",
        )
    }

    pub fn pattern(&self) -> NotificationPattern {
        self.event_type
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn invoice() -> InvoiceEntity {
        let now = Utc::now();
        InvoiceEntity {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            customer_id: "cus_1".to_string(),
            customer_email: "jane@example.com".to_string(),
            customer_full_name: Some("Jane Doe".to_string()),
            items: json!([]),
            subscription_id: None,
            job_id: None,
            status: "processing".to_string(),
            payment_kind: "one_time".to_string(),
            last_payment_intent_id: "pi_1".to_string(),
            invoice_id_provided_by_stripe: "pi_1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn payment_received_serializes_with_pattern_as_event_type() {
        let message = NotificationMessage::payment_received(&invoice());
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["userId"], "user-1");
        assert_eq!(value["userEmail"], "jane@example.com");
        assert_eq!(value["fullName"], "Jane Doe");
        assert_eq!(value["notificationType"], "payment");
        assert_eq!(value["topic"], "Payment received");
        assert_eq!(value["read"], false);
        assert_eq!(value["eventType"], "payment-received-notification");
    }

    #[test]
    fn processing_and_in_progress_share_a_pattern() {
        let invoice = invoice();
        assert_eq!(
            NotificationMessage::payment_processing(&invoice).pattern(),
            NotificationPattern::PaymentInProgress
        );
        assert_eq!(
            NotificationMessage::payment_in_progress(&invoice).body,
            "Waiting for payment"
        );
        assert_eq!(
            NotificationMessage::payment_successful(&invoice).pattern(),
            NotificationPattern::PaymentReceived
        );
    }
}
