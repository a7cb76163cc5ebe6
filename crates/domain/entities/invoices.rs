use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::invoice_statuses::InvoiceStatus;
use crate::infra::db::postgres::schema::invoices;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = invoices)]
pub struct InvoiceEntity {
    pub id: Uuid,
    pub user_id: String,
    pub customer_id: String,
    pub customer_email: String,
    pub customer_full_name: Option<String>,
    pub items: serde_json::Value,
    pub subscription_id: Option<String>,
    pub job_id: Option<String>,
    pub status: String,
    pub payment_kind: String,
    pub last_payment_intent_id: String,
    pub invoice_id_provided_by_stripe: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceEntity {
    pub fn status_tag(&self) -> InvoiceStatus {
        InvoiceStatus::from_provider(&self.status)
    }
}

/// Input of `InvoiceRepository::save`. A missing `id` means insert.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveInvoiceEntity {
    pub id: Option<Uuid>,
    pub user_id: String,
    pub customer_id: String,
    pub customer_email: String,
    pub customer_full_name: Option<String>,
    pub items: serde_json::Value,
    pub subscription_id: Option<String>,
    pub job_id: Option<String>,
    pub status: String,
    pub payment_kind: String,
    pub last_payment_intent_id: String,
    pub invoice_id_provided_by_stripe: String,
}

impl From<InvoiceEntity> for SaveInvoiceEntity {
    fn from(value: InvoiceEntity) -> Self {
        Self {
            id: Some(value.id),
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
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = invoices)]
pub struct InsertInvoiceEntity {
    pub id: Uuid,
    pub user_id: String,
    pub customer_id: String,
    pub customer_email: String,
    pub customer_full_name: Option<String>,
    pub items: serde_json::Value,
    pub subscription_id: Option<String>,
    pub job_id: Option<String>,
    pub status: String,
    pub payment_kind: String,
    pub last_payment_intent_id: String,
    pub invoice_id_provided_by_stripe: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable columns. `id` and `created_at` never change after insert.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = invoices)]
#[diesel(treat_none_as_null = true)]
pub struct UpdateInvoiceEntity {
    pub user_id: String,
    pub customer_id: String,
    pub customer_email: String,
    pub customer_full_name: Option<String>,
    pub items: serde_json::Value,
    pub subscription_id: Option<String>,
    pub job_id: Option<String>,
    pub status: String,
    pub payment_kind: String,
    pub last_payment_intent_id: String,
    pub invoice_id_provided_by_stripe: String,
    pub updated_at: DateTime<Utc>,
}

impl SaveInvoiceEntity {
    pub fn to_insert(&self, id: Uuid, now: DateTime<Utc>) -> InsertInvoiceEntity {
        InsertInvoiceEntity {
            id,
            user_id: self.user_id.clone(),
            customer_id: self.customer_id.clone(),
            customer_email: self.customer_email.clone(),
            customer_full_name: self.customer_full_name.clone(),
            items: self.items.clone(),
            subscription_id: self.subscription_id.clone(),
            job_id: self.job_id.clone(),
            status: self.status.clone(),
            payment_kind: self.payment_kind.clone(),
            last_payment_intent_id: self.last_payment_intent_id.clone(),
            invoice_id_provided_by_stripe: self.invoice_id_provided_by_stripe.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_update(&self, now: DateTime<Utc>) -> UpdateInvoiceEntity {
        UpdateInvoiceEntity {
            user_id: self.user_id.clone(),
            customer_id: self.customer_id.clone(),
            customer_email: self.customer_email.clone(),
            customer_full_name: self.customer_full_name.clone(),
            items: self.items.clone(),
            subscription_id: self.subscription_id.clone(),
            job_id: self.job_id.clone(),
            status: self.status.clone(),
            payment_kind: self.payment_kind.clone(),
            last_payment_intent_id: self.last_payment_intent_id.clone(),
            invoice_id_provided_by_stripe: self.invoice_id_provided_by_stripe.clone(),
            updated_at: now,
        }
    }
}
