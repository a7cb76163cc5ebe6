pub mod invoice_statuses;
pub mod notification_patterns;
pub mod payment_kinds;
pub mod webhook_event_kinds;
pub mod webhook_event_statuses;
