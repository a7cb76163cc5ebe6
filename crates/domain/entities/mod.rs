pub mod invoices;
pub mod processed_webhook_events;
