use anyhow::{Context, Result};
use std::str::FromStr;

use super::{
    config_model::{
        Auth, BackendServer, Database, DotEnvyConfig, Queues, Redis, Stripe, WebhookEvents,
    },
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup; `load` reads the process environment.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let required = |key: &str| optional(key).with_context(|| format!("{key} is missing"));

    let backend_server = BackendServer {
        port: parse(&required("SERVER_PORT_BACKEND")?, "SERVER_PORT_BACKEND")?,
        body_limit: parse(&required("SERVER_BODY_LIMIT")?, "SERVER_BODY_LIMIT")?,
        timeout: parse(&required("SERVER_TIMEOUT")?, "SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: match optional("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => parse(&raw, "DATABASE_MAX_CONNECTIONS")?,
            None => 10,
        },
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
        api_base: optional("STRIPE_API_BASE"),
    };

    let redis = Redis {
        url: required("REDIS_URL")?,
    };

    let defaults = Queues::default();
    let queues = Queues {
        plans_to_create: optional("QUEUE_PLANS_TO_CREATE").unwrap_or(defaults.plans_to_create),
        invoice_status_on_related_plans: optional("QUEUE_INVOICE_STATUS_ON_RELATED_PLANS")
            .unwrap_or(defaults.invoice_status_on_related_plans),
        notification_events: optional("QUEUE_NOTIFICATION_EVENTS")
            .unwrap_or(defaults.notification_events),
    };

    let webhook_events = WebhookEvents {
        retention_days: match optional("WEBHOOK_EVENT_RETENTION_DAYS") {
            Some(raw) => parse(&raw, "WEBHOOK_EVENT_RETENTION_DAYS")?,
            None => 30,
        },
        cleanup_interval: match optional("WEBHOOK_EVENT_CLEANUP_INTERVAL") {
            Some(raw) => parse(&raw, "WEBHOOK_EVENT_CLEANUP_INTERVAL")?,
            None => 3600,
        },
    };

    let auth = Auth {
        jwt_secret: optional("JWT_SECRET"),
    };

    let stage = match optional("STAGE") {
        Some(raw) => Stage::try_from(raw.as_str())?,
        None => Stage::default(),
    };

    Ok(DotEnvyConfig {
        stage,
        backend_server,
        database,
        stripe,
        redis,
        queues,
        webhook_events,
        auth,
    })
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{key} is invalid"))
}
