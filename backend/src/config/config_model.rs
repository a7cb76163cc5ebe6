use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub redis: Redis,
    pub queues: Queues,
    pub webhook_events: WebhookEvents,
    pub auth: Auth,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Redis {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queues {
    pub plans_to_create: String,
    pub invoice_status_on_related_plans: String,
    pub notification_events: String,
}

impl Default for Queues {
    fn default() -> Self {
        Self {
            plans_to_create: "plans-to-create".to_string(),
            invoice_status_on_related_plans: "invoice-status-on-related-plans".to_string(),
            notification_events: "notification-events".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookEvents {
    /// days
    pub retention_days: i64,
    /// seconds
    pub cleanup_interval: u64,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub jwt_secret: Option<String>,
}
