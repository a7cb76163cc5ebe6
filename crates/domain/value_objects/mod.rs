pub mod enums;
pub mod invoices;
pub mod notifications;
pub mod plans;
pub mod request_context;
