use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::entities::invoices::InvoiceEntity;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDto {
    pub id: Uuid,
    pub user_id: String,
    pub customer_id: String,
    pub customer_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_full_name: Option<String>,
    pub items: Value,
    pub subscription_id: Option<String>,
    pub job_id: Option<String>,
    pub status: String,
    pub payment_kind: String,
    pub last_payment_intent_id: String,
    pub invoice_id_provided_by_stripe: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InvoiceEntity> for InvoiceDto {
    fn from(value: InvoiceEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            customer_id: value.customer_id,
            customer_email: value.customer_email,
            customer_full_name: value.customer_full_name,
            items: value.items,
            subscription_id: value.subscription_id,
            job_id: value.job_id,
            status: value.status,
            payment_kind: value.payment_kind,
            last_payment_intent_id: value.last_payment_intent_id,
            invoice_id_provided_by_stripe: value.invoice_id_provided_by_stripe,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSubscriptionCommand {
    pub user_id: String,
    pub email: String,
    pub items: Value,
    pub payment_method: String,
    pub job_id: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateOneTimePaymentCommand {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub items: Value,
    pub payment_method: String,
    pub currency: String,
    pub job_id: Option<String>,
    pub metadata: Option<Value>,
}

/// Body of a successful create-subscription / create-payment response.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceOperationResult {
    pub status: String,
    pub message: String,
    pub data: InvoiceDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
}

/// Price references of every item carrying a string `price` field, in order.
pub fn price_refs(items: &Value) -> Vec<String> {
    items
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("price").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn describe_items(items: &Value) -> String {
    price_refs(items).concat()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn price_refs_skips_items_without_price() {
        let items = json!([
            { "price": "price_basic", "quantity": 1 },
            { "quantity": 2 },
            { "price": "price_logo" }
        ]);

        assert_eq!(price_refs(&items), vec!["price_basic", "price_logo"]);
        assert_eq!(describe_items(&items), "price_basicprice_logo");
    }

    #[test]
    fn non_array_items_have_no_prices() {
        assert!(price_refs(&json!({ "price": "price_basic" })).is_empty());
        assert_eq!(describe_items(&Value::Null), "");
    }

    #[test]
    fn operation_result_omits_missing_payment_intent_id() {
        let now = Utc::now();
        let result = InvoiceOperationResult {
            status: "incomplete".to_string(),
            message: "New subscription created successfully.".to_string(),
            data: InvoiceDto {
                id: Uuid::new_v4(),
                user_id: "user-1".to_string(),
                customer_id: "cus_1".to_string(),
                customer_email: "a@b.co".to_string(),
                customer_full_name: None,
                items: json!([]),
                subscription_id: Some("sub_1".to_string()),
                job_id: None,
                status: "open".to_string(),
                payment_kind: "subscription".to_string(),
                last_payment_intent_id: "pi_1".to_string(),
                invoice_id_provided_by_stripe: "in_1".to_string(),
                created_at: now,
                updated_at: now,
            },
            payment_intent_id: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("paymentIntentId").is_none());
        assert_eq!(value["data"]["invoiceIdProvidedByStripe"], "in_1");
        assert_eq!(value["data"]["subscriptionId"], "sub_1");
    }
}
