pub mod invoices;
pub mod webhook_event_retention;
