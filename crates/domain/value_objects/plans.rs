use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const PLAN_DURATION_IN_DAYS: i32 = 30;

/// Published raw to the plans-to-create queue after an invoice is persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanCreationMessage {
    pub user_id: String,
    pub invoice_id: Uuid,
    pub description: String,
    pub items: Value,
    pub is_active: bool,
    pub status: String,
    pub duration_in_days: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Published raw to the invoice-status queue once a payment is confirmed by webhook.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatusUpdateMessage {
    pub user_id: String,
    pub invoice_id: Uuid,
    pub description: String,
    pub items: Value,
    pub is_active: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}
