pub mod invoices;
pub mod message_queue;
pub mod processed_webhook_events;
