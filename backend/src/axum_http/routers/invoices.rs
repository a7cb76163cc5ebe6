use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::domain::value_objects::invoices::{
    CreateOneTimePaymentCommand, CreateSubscriptionCommand, InvoiceDto, InvoiceOperationResult,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    auth::AuthSettings,
    axum_http::{
        error_responses::{ApiResponse, AppError},
        request_scope::RequestScope,
        validation::ValidatedJson,
    },
    usecases::invoices::InvoiceUseCase,
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const DEFAULT_CURRENCY: &str = "usd";

#[derive(Clone)]
pub struct InvoiceState {
    pub usecase: Arc<InvoiceUseCase>,
    pub auth: AuthSettings,
}

impl FromRef<InvoiceState> for AuthSettings {
    fn from_ref(state: &InvoiceState) -> Self {
        state.auth.clone()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    #[serde(rename = "userId")]
    #[validate(required(message = "User ID is required"))]
    pub user_id: Option<String>,

    #[validate(
        required(message = "Email is required"),
        email(message = "Email must be valid")
    )]
    pub email: Option<String>,

    #[validate(required(message = "Items are required"))]
    pub items: Option<Value>,

    #[validate(required(message = "Payment method is required"))]
    pub payment_method: Option<String>,

    #[serde(rename = "jobId")]
    pub job_id: Option<String>,

    pub metadata: Option<Value>,
}

impl CreateSubscriptionRequest {
    fn into_command(self) -> CreateSubscriptionCommand {
        CreateSubscriptionCommand {
            user_id: self.user_id.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            items: self.items.unwrap_or(Value::Null),
            payment_method: self.payment_method.unwrap_or_default(),
            job_id: self.job_id,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[serde(rename = "userId")]
    #[validate(required(message = "User ID is required"))]
    pub user_id: Option<String>,

    #[validate(
        required(message = "Email is required"),
        email(message = "Email must be valid")
    )]
    pub email: Option<String>,

    #[validate(required(message = "Full name is required"))]
    pub full_name: Option<String>,

    #[validate(required(message = "Items are required"))]
    pub items: Option<Value>,

    #[validate(required(message = "Payment method is required"))]
    pub payment_method: Option<String>,

    pub currency: Option<String>,

    pub job_id: Option<String>,

    pub metadata: Option<Value>,
}

impl CreatePaymentRequest {
    fn into_command(self) -> CreateOneTimePaymentCommand {
        let currency = self
            .currency
            .filter(|currency| !currency.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        CreateOneTimePaymentCommand {
            user_id: self.user_id.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            full_name: self.full_name.unwrap_or_default(),
            items: self.items.unwrap_or(Value::Null),
            payment_method: self.payment_method.unwrap_or_default(),
            currency,
            job_id: self.job_id,
            metadata: self.metadata,
        }
    }
}

pub fn routes(state: InvoiceState) -> Router {
    Router::new()
        .route("/all", get(list_invoices))
        .route("/create-subscription", post(create_subscription))
        .route("/create-payment", post(create_payment))
        .route("/stripe_webhooks", post(stripe_webhooks))
        .with_state(state)
}

pub async fn list_invoices(
    State(state): State<InvoiceState>,
    RequestScope(context): RequestScope,
) -> Result<Json<Vec<InvoiceDto>>, AppError> {
    info!(correlation_id = %context.correlation_id, "invoices router: list_invoices");
    let invoices = state.usecase.list_invoices(&context).await?;
    Ok(Json(invoices))
}

pub async fn create_subscription(
    State(state): State<InvoiceState>,
    RequestScope(context): RequestScope,
    ValidatedJson(request): ValidatedJson<CreateSubscriptionRequest>,
) -> Result<Json<ApiResponse<InvoiceOperationResult>>, AppError> {
    info!(
        correlation_id = %context.correlation_id,
        user_id = ?request.user_id,
        "invoices router: create_subscription"
    );
    let result = state
        .usecase
        .create_subscription_and_invoice(&context, request.into_command())
        .await?;

    Ok(Json(ApiResponse::succeeded(
        "Subscription created successfully.",
        result,
    )))
}

pub async fn create_payment(
    State(state): State<InvoiceState>,
    RequestScope(context): RequestScope,
    ValidatedJson(request): ValidatedJson<CreatePaymentRequest>,
) -> Result<Json<ApiResponse<InvoiceOperationResult>>, AppError> {
    info!(
        correlation_id = %context.correlation_id,
        user_id = ?request.user_id,
        "invoices router: create_payment"
    );
    let result = state
        .usecase
        .create_one_time_payment_and_invoice(&context, request.into_command())
        .await?;

    Ok(Json(ApiResponse::succeeded(
        "Payment created successfully.",
        result,
    )))
}

pub async fn stripe_webhooks(
    State(state): State<InvoiceState>,
    RequestScope(context): RequestScope,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!(correlation_id = %context.correlation_id, "invoices router: stripe_webhooks");

    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return webhook_error("missing stripe-signature header");
    };

    match state
        .usecase
        .handle_stripe_webhook(&context, &body, signature)
        .await
    {
        Ok(()) => (StatusCode::OK, "Webhook processed successfully").into_response(),
        Err(err) => webhook_error(&err.to_string()),
    }
}

fn webhook_error(message: &str) -> Response {
    warn!(error = %message, "invoices router: webhook rejected");
    (StatusCode::BAD_REQUEST, format!("Webhook Error: {message}")).into_response()
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header::CONTENT_TYPE},
    };
    use chrono::Utc;
    use crates::{
        domain::{
            entities::invoices::{InvoiceEntity, SaveInvoiceEntity},
            repositories::{
                invoices::MockInvoiceRepository,
                message_queue::{MessageQueue, MockMessageQueue},
                processed_webhook_events::MockProcessedWebhookEventRepository,
            },
            value_objects::enums::webhook_event_statuses::WebhookClaim,
        },
        messaging::publisher::EventPublisher,
        payments::stripe_client::{
            StripeClient, StripeCustomer, StripeInvoice, StripePaymentIntent, StripePrice,
            StripeSubscription,
            WebhookVerificationError,
        },
    };
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        axum_http::http_serve,
        config::config_model::{BackendServer, Queues},
        usecases::invoices::{MockStripeGateway, StripeGateway},
    };

    const WEBHOOK_SECRET: &str = "whsec_router_test";

    struct Mocks {
        invoices: MockInvoiceRepository,
        events: MockProcessedWebhookEventRepository,
        queue: MockMessageQueue,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                invoices: MockInvoiceRepository::new(),
                events: MockProcessedWebhookEventRepository::new(),
                queue: MockMessageQueue::new(),
            }
        }

        fn app(mut self, stripe: Arc<dyn StripeGateway>) -> Router {
            let queue = Arc::new(std::mem::replace(&mut self.queue, MockMessageQueue::new()));
            self.app_with_queue(stripe, queue, 5)
        }

        fn app_with_queue(
            self,
            stripe: Arc<dyn StripeGateway>,
            queue: Arc<dyn MessageQueue + Send + Sync>,
            timeout: u64,
        ) -> Router {
            let usecase = InvoiceUseCase::new(
                Arc::new(self.invoices),
                Arc::new(self.events),
                stripe,
                EventPublisher::new(queue),
                Queues::default(),
            );
            let server = BackendServer {
                port: 0,
                body_limit: 1,
                timeout,
            };

            http_serve::app(Arc::new(usecase), AuthSettings::default(), &server).unwrap()
        }
    }

    fn persisted(invoice: SaveInvoiceEntity) -> InvoiceEntity {
        let now = Utc::now();
        InvoiceEntity {
            id: invoice.id.unwrap_or_else(Uuid::new_v4),
            user_id: invoice.user_id,
            customer_id: invoice.customer_id,
            customer_email: invoice.customer_email,
            customer_full_name: invoice.customer_full_name,
            items: invoice.items,
            subscription_id: invoice.subscription_id,
            job_id: invoice.job_id,
            status: invoice.status,
            payment_kind: invoice.payment_kind,
            last_payment_intent_id: invoice.last_payment_intent_id,
            invoice_id_provided_by_stripe: invoice.invoice_id_provided_by_stripe,
            created_at: now,
            updated_at: now,
        }
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header("x-correlation-id", "corr-123")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn sign(payload: &str) -> String {
        let timestamp = Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn webhook_request(payload: &str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/invoice/stripe_webhooks");
        if let Some(signature) = signature {
            builder = builder.header(STRIPE_SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(payload.to_string())).unwrap()
    }

    fn stripe_with_secret() -> Arc<dyn StripeGateway> {
        Arc::new(StripeClient::new(
            "sk_test".to_string(),
            Some(WEBHOOK_SECRET.to_string()),
            None,
        ))
    }

    #[tokio::test]
    async fn create_subscription_returns_envelope_and_echoes_correlation_id() {
        let mut mocks = Mocks::new();
        let mut stripe = MockStripeGateway::new();

        stripe.expect_create_customer().returning(|_, _| {
            Ok(StripeCustomer {
                id: "cus_1".to_string(),
                email: None,
            })
        });
        stripe.expect_create_subscription().returning(|_, _, _| {
            Ok(StripeSubscription {
                id: "sub_1".to_string(),
                status: "incomplete".to_string(),
                latest_invoice: Some(StripeInvoice {
                    id: "in_1".to_string(),
                    status: Some("open".to_string()),
                    payment_intent: Some(StripePaymentIntent {
                        id: "pi_1".to_string(),
                        status: "requires_confirmation".to_string(),
                        amount: Some(1000),
                        customer: Some("cus_1".to_string()),
                        invoice: Some("in_1".to_string()),
                    }),
                }),
            })
        });
        stripe.expect_confirm_payment_intent().returning(|_, _| {
            Ok(StripePaymentIntent {
                id: "pi_1".to_string(),
                status: "processing".to_string(),
                amount: Some(1000),
                customer: Some("cus_1".to_string()),
                invoice: Some("in_1".to_string()),
            })
        });
        mocks
            .invoices
            .expect_save()
            .returning(|invoice| Ok(persisted(invoice)));
        mocks.queue.expect_push().times(2).returning(|_, _| Ok(()));

        let response = mocks
            .app(Arc::new(stripe))
            .oneshot(json_request(
                "/api/v1/invoice/create-subscription",
                json!({
                    "userId": "user-1",
                    "email": "jane@example.com",
                    "items": [{ "price": "price_basic" }],
                    "payment_method": "pm_card_visa",
                    "jobId": "job-1"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-correlation-id"], "corr-123");

        let body = body_json(response).await;
        assert_eq!(body["status"], "succeeded");
        assert_eq!(body["data"]["status"], "incomplete");
        assert_eq!(body["data"]["message"], "New subscription created successfully.");
        assert_eq!(body["data"]["data"]["jobId"], "job-1");
    }

    #[tokio::test]
    async fn invalid_body_returns_field_errors() {
        let response = Mocks::new()
            .app(Arc::new(MockStripeGateway::new()))
            .oneshot(json_request(
                "/api/v1/invoice/create-subscription",
                json!({ "email": "not-an-email", "items": [] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["data"]["user_id"], "User ID is required");
        assert_eq!(body["data"]["email"], "Email must be valid");
        assert_eq!(body["data"]["payment_method"], "Payment method is required");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/invoice/create-payment")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = Mocks::new()
            .app(Arc::new(MockStripeGateway::new()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn provider_failure_returns_500_envelope() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_find_or_create_customer_by_email()
            .returning(|_, _| Err(anyhow!("stripe unavailable")));

        let response = Mocks::new()
            .app(Arc::new(stripe))
            .oneshot(json_request(
                "/api/v1/invoice/create-payment",
                json!({
                    "userId": "user-1",
                    "email": "jane@example.com",
                    "full_name": "Jane Doe",
                    "items": [{ "price": "p1" }],
                    "payment_method": "pm_card_visa"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("stripe unavailable"));
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn list_all_returns_invoice_array() {
        let mut mocks = Mocks::new();
        mocks.invoices.expect_list_all().returning(|| Ok(vec![]));

        let request = Request::builder()
            .uri("/api/v1/invoice/all")
            .body(Body::empty())
            .unwrap();
        let response = mocks
            .app(Arc::new(MockStripeGateway::new()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-correlation-id"));
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn signed_webhook_is_processed() {
        let mut mocks = Mocks::new();
        mocks
            .events
            .expect_try_claim()
            .withf(|event_id, event_type, _| {
                event_id == "evt_42" && event_type == "invoice.created"
            })
            .times(1)
            .returning(|_, _, _| Ok(WebhookClaim::Claimed));
        mocks
            .events
            .expect_mark_processed()
            .withf(|event_id| event_id == "evt_42")
            .times(1)
            .returning(|_| Ok(()));

        let payload = json!({
            "id": "evt_42",
            "type": "invoice.created",
            "data": { "object": { "id": "in_1" } }
        })
        .to_string();
        let signature = sign(&payload);

        let response = mocks
            .app(stripe_with_secret())
            .oneshot(webhook_request(&payload, Some(signature.as_str())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Webhook processed successfully");
    }

    #[tokio::test]
    async fn webhook_claimed_by_another_delivery_is_not_acknowledged() {
        let mut mocks = Mocks::new();
        mocks
            .events
            .expect_try_claim()
            .times(1)
            .returning(|_, _, _| Ok(WebhookClaim::InProgress));
        mocks.events.expect_mark_processed().never();

        let payload = json!({
            "id": "evt_43",
            "type": "invoice.created",
            "data": { "object": { "id": "in_1" } }
        })
        .to_string();
        let signature = sign(&payload);

        let response = mocks
            .app(stripe_with_secret())
            .oneshot(webhook_request(&payload, Some(signature.as_str())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("evt_43"));
    }

    /// Hangs on every push so the request outlives the server timeout.
    struct HangingQueue;

    #[async_trait::async_trait]
    impl MessageQueue for HangingQueue {
        async fn push(&self, _destination: &str, _payload: String) -> anyhow::Result<()> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_request_times_out_with_408() {
        let mut mocks = Mocks::new();
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_find_or_create_customer_by_email()
            .returning(|_, _| {
                Ok(StripeCustomer {
                    id: "cus_1".to_string(),
                    email: Some("jane@example.com".to_string()),
                })
            });
        stripe.expect_retrieve_price().returning(|price_id| {
            Ok(StripePrice {
                id: price_id.to_string(),
                unit_amount: Some(1000),
            })
        });
        stripe.expect_create_payment_intent().returning(|_, _, _, _| {
            Ok(StripePaymentIntent {
                id: "pi_1".to_string(),
                status: "succeeded".to_string(),
                amount: Some(1000),
                customer: Some("cus_1".to_string()),
                invoice: None,
            })
        });
        mocks
            .invoices
            .expect_save()
            .returning(|invoice| Ok(persisted(invoice)));

        let started = std::time::Instant::now();
        let response = mocks
            .app_with_queue(Arc::new(stripe), Arc::new(HangingQueue), 1)
            .oneshot(json_request(
                "/api/v1/invoice/create-payment",
                json!({
                    "userId": "user-1",
                    "email": "jane@example.com",
                    "full_name": "Jane Doe",
                    "items": [{ "price": "p1" }],
                    "payment_method": "pm_card_visa"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn tampered_webhook_is_rejected() {
        let payload = json!({ "id": "evt_1", "type": "invoice.created", "data": { "object": {} } })
            .to_string();
        let signature = sign(&payload);
        let tampered = payload.replace("evt_1", "evt_2");

        let response = Mocks::new()
            .app(stripe_with_secret())
            .oneshot(webhook_request(&tampered, Some(signature.as_str())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("Webhook Error: invalid stripe signature"));
    }

    #[tokio::test]
    async fn webhook_without_signature_header_is_rejected() {
        let response = Mocks::new()
            .app(Arc::new(MockStripeGateway::new()))
            .oneshot(webhook_request("{}", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_text(response).await,
            "Webhook Error: missing stripe-signature header"
        );
    }

    #[tokio::test]
    async fn webhook_without_configured_secret_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(WebhookVerificationError::MissingSecret));

        let response = Mocks::new()
            .app(Arc::new(stripe))
            .oneshot(webhook_request("{}", Some("t=1,v1=00")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("not configured"));
    }

    #[tokio::test]
    async fn health_check_and_fallback() {
        let app = Mocks::new().app(Arc::new(MockStripeGateway::new()));

        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health-check")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let missing = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
