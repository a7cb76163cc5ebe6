use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::invoices},
};
use domain::{
    entities::invoices::{InvoiceEntity, SaveInvoiceEntity},
    repositories::invoices::InvoiceRepository,
    value_objects::enums::payment_kinds::PaymentKind,
};

pub struct InvoicePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl InvoicePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl InvoiceRepository for InvoicePostgres {
    async fn save(&self, invoice: SaveInvoiceEntity) -> Result<InvoiceEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        if let Some(invoice_id) = invoice.id {
            let updated = update(invoices::table.filter(invoices::id.eq(invoice_id)))
                .set(&invoice.to_update(now))
                .returning(InvoiceEntity::as_returning())
                .get_result::<InvoiceEntity>(&mut conn)
                .optional()?;

            if let Some(updated) = updated {
                return Ok(updated);
            }
        }

        let id = invoice.id.unwrap_or_else(Uuid::new_v4);

        // A row already holding the natural key absorbs the write.
        let saved = insert_into(invoices::table)
            .values(&invoice.to_insert(id, now))
            .on_conflict((
                invoices::customer_id,
                invoices::payment_kind,
                invoices::invoice_id_provided_by_stripe,
            ))
            .do_update()
            .set(&invoice.to_update(now))
            .returning(InvoiceEntity::as_returning())
            .get_result::<InvoiceEntity>(&mut conn)?;

        Ok(saved)
    }

    async fn find_by_customer_and_provider_invoice_id(
        &self,
        customer_id: &str,
        payment_kind: PaymentKind,
        provider_invoice_id: &str,
    ) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = invoices::table
            .filter(invoices::customer_id.eq(customer_id))
            .filter(invoices::payment_kind.eq(payment_kind.as_str()))
            .filter(invoices::invoice_id_provided_by_stripe.eq(provider_invoice_id))
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(invoice)
    }

    async fn list_all(&self) -> Result<Vec<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoices = invoices::table
            .order(invoices::created_at.desc())
            .select(InvoiceEntity::as_select())
            .load::<InvoiceEntity>(&mut conn)?;

        Ok(invoices)
    }
}
