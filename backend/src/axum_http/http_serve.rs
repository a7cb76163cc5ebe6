use crate::{
    auth::AuthSettings,
    axum_http::{
        default_routers,
        routers::invoices::{self, InvoiceState, STRIPE_SIGNATURE_HEADER},
    },
    config::config_model::{BackendServer, DotEnvyConfig},
    usecases::{
        invoices::{DEFAULT_WEBHOOK_CLAIM_LEASE_SECONDS, InvoiceUseCase},
        webhook_event_retention::{WebhookEventRetentionUseCase, run_retention_loop},
    },
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        HeaderName, Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::{
        repositories::message_queue::MessageQueue,
        value_objects::request_context::CORRELATION_ID_HEADER,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            invoices::InvoicePostgres, processed_webhook_events::ProcessedWebhookEventPostgres,
        },
    },
    messaging::publisher::EventPublisher,
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use uuid::Uuid;

/// Generates a correlation id for requests that arrive without one.
#[derive(Clone, Default)]
pub struct MakeCorrelationId;

impl MakeRequestId for MakeCorrelationId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let correlation_id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(correlation_id))
    }
}

pub fn app(
    invoice_usecase: Arc<InvoiceUseCase>,
    auth: AuthSettings,
    server: &BackendServer,
) -> Result<Router> {
    let correlation_header = HeaderName::from_static(CORRELATION_ID_HEADER);

    let router = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/invoice",
            invoices::routes(InvoiceState {
                usecase: invoice_usecase,
                auth,
            }),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.timeout),
        ))
        .layer(RequestBodyLimitLayer::new(
            (server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([
                    AUTHORIZATION,
                    CONTENT_TYPE,
                    correlation_header.clone(),
                    HeaderName::from_static(STRIPE_SIGNATURE_HEADER),
                ])
                .expose_headers([correlation_header.clone()])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(correlation_header.clone()))
        .layer(SetRequestIdLayer::new(correlation_header, MakeCorrelationId));

    Ok(router)
}

pub async fn start(
    config: Arc<DotEnvyConfig>,
    db_pool: Arc<PgPoolSquad>,
    queue: Arc<dyn MessageQueue + Send + Sync>,
) -> Result<()> {
    let stripe_client = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        config.stripe.api_base.clone(),
    );

    let processed_events = Arc::new(ProcessedWebhookEventPostgres::new(Arc::clone(&db_pool)));

    // A claim has to outlive any request that can still be holding it.
    let claim_lease_seconds =
        (config.backend_server.timeout as i64 * 2).max(DEFAULT_WEBHOOK_CLAIM_LEASE_SECONDS);
    let invoice_usecase = InvoiceUseCase::new(
        Arc::new(InvoicePostgres::new(Arc::clone(&db_pool))),
        processed_events.clone(),
        Arc::new(stripe_client),
        EventPublisher::new(queue),
        config.queues.clone(),
    )
    .with_claim_lease(chrono::Duration::seconds(claim_lease_seconds));

    let retention = Arc::new(WebhookEventRetentionUseCase::new(
        processed_events,
        config.webhook_events.retention_days,
    ));
    tokio::spawn(run_retention_loop(
        retention,
        Duration::from_secs(config.webhook_events.cleanup_interval.max(60)),
    ));
    info!(
        retention_days = config.webhook_events.retention_days,
        "Webhook event retention loop started"
    );

    let auth = AuthSettings::new(config.auth.jwt_secret.clone());
    if !auth.is_enabled() {
        info!("JWT_SECRET not set, bearer identity disabled");
    }

    let app = app(Arc::new(invoice_usecase), auth, &config.backend_server)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(stage = %config.stage, "Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
