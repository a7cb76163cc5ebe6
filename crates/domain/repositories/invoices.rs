use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::invoices::{InvoiceEntity, SaveInvoiceEntity},
    value_objects::enums::payment_kinds::PaymentKind,
};

#[automock]
#[async_trait]
pub trait InvoiceRepository {
    /// Upsert. With an `id` the row is updated in place; without one the record is
    /// inserted, or merged into the row sharing its natural key.
    async fn save(&self, invoice: SaveInvoiceEntity) -> Result<InvoiceEntity>;

    async fn find_by_customer_and_provider_invoice_id(
        &self,
        customer_id: &str,
        payment_kind: PaymentKind,
        provider_invoice_id: &str,
    ) -> Result<Option<InvoiceEntity>>;

    async fn list_all(&self) -> Result<Vec<InvoiceEntity>>;
}
