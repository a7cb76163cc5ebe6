use std::sync::Arc;

use anyhow::{Result as AnyResult, anyhow};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use crates::{
    domain::{
        entities::invoices::{InvoiceEntity, SaveInvoiceEntity},
        repositories::{
            invoices::InvoiceRepository,
            processed_webhook_events::ProcessedWebhookEventRepository,
        },
        value_objects::{
            enums::{
                invoice_statuses::InvoiceStatus, notification_patterns::NotificationPattern,
                payment_kinds::PaymentKind, webhook_event_kinds::WebhookEventKind,
                webhook_event_statuses::WebhookClaim,
            },
            invoices::{
                CreateOneTimePaymentCommand, CreateSubscriptionCommand, InvoiceDto,
                InvoiceOperationResult, describe_items, price_refs,
            },
            notifications::NotificationMessage,
            plans::{PLAN_DURATION_IN_DAYS, PlanCreationMessage, PlanStatusUpdateMessage},
            request_context::RequestContext,
        },
    },
    messaging::publisher::{EventPublisher, PublishError},
    payments::stripe_client::{
        StripeClient, StripeCustomer, StripeEvent, StripePaymentIntent, StripePrice,
        StripeSubscription, WebhookVerificationError,
    },
};
use thiserror::Error;
use tracing::{Instrument, Span, error, info, warn};

use crate::config::config_model::Queues;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_customer(&self, email: &str, payment_method: &str)
    -> AnyResult<StripeCustomer>;

    /// Reuses the first customer registered under `email`, otherwise creates one.
    async fn find_or_create_customer_by_email(
        &self,
        email: &str,
        payment_method: &str,
    ) -> AnyResult<StripeCustomer>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_refs: Vec<String>,
        payment_method: &str,
    ) -> AnyResult<StripeSubscription>;

    async fn create_payment_intent(
        &self,
        customer_id: &str,
        payment_method: &str,
        amount: i64,
        currency: &str,
    ) -> AnyResult<StripePaymentIntent>;

    async fn confirm_payment_intent(
        &self,
        payment_intent_id: &str,
        payment_method: &str,
    ) -> AnyResult<StripePaymentIntent>;

    async fn retrieve_price(&self, price_id: &str) -> AnyResult<StripePrice>;

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookVerificationError>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_customer(
        &self,
        email: &str,
        payment_method: &str,
    ) -> AnyResult<StripeCustomer> {
        self.create_customer(email, payment_method).await
    }

    async fn find_or_create_customer_by_email(
        &self,
        email: &str,
        payment_method: &str,
    ) -> AnyResult<StripeCustomer> {
        if let Some(customer) = self.find_customer_by_email(email).await? {
            info!(customer_id = %customer.id, "stripe: reusing existing customer");
            return Ok(customer);
        }

        let customer = self.create_customer(email, payment_method).await?;
        info!(customer_id = %customer.id, "stripe: created new customer");
        Ok(customer)
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_refs: Vec<String>,
        payment_method: &str,
    ) -> AnyResult<StripeSubscription> {
        self.create_subscription(customer_id, &price_refs, payment_method)
            .await
    }

    async fn create_payment_intent(
        &self,
        customer_id: &str,
        payment_method: &str,
        amount: i64,
        currency: &str,
    ) -> AnyResult<StripePaymentIntent> {
        self.create_payment_intent(customer_id, payment_method, amount, currency)
            .await
    }

    async fn confirm_payment_intent(
        &self,
        payment_intent_id: &str,
        payment_method: &str,
    ) -> AnyResult<StripePaymentIntent> {
        self.confirm_payment_intent(payment_intent_id, payment_method)
            .await
    }

    async fn retrieve_price(&self, price_id: &str) -> AnyResult<StripePrice> {
        self.retrieve_price(price_id).await
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookVerificationError> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("payment provider error: {0:#}")]
    Provider(anyhow::Error),
    #[error("invalid stripe signature: {0}")]
    SignatureInvalid(String),
    #[error("stripe webhook secret is not configured")]
    ConfigurationMissing,
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("webhook event {0} is already being processed")]
    EventInProgress(String),
    #[error(transparent)]
    PublishFailed(#[from] PublishError),
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl InvoiceError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            InvoiceError::SignatureInvalid(_)
            | InvoiceError::ConfigurationMissing
            | InvoiceError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            InvoiceError::EventInProgress(_) => StatusCode::CONFLICT,
            InvoiceError::Provider(_)
            | InvoiceError::PublishFailed(_)
            | InvoiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WebhookVerificationError> for InvoiceError {
    fn from(err: WebhookVerificationError) -> Self {
        match err {
            WebhookVerificationError::MissingSecret => InvoiceError::ConfigurationMissing,
            WebhookVerificationError::InvalidSignature(reason) => {
                InvoiceError::SignatureInvalid(reason)
            }
            WebhookVerificationError::MalformedPayload(reason) => {
                InvoiceError::InvalidWebhook(reason)
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, InvoiceError>;

pub const SUBSCRIPTION_CREATED_MESSAGE: &str = "New subscription created successfully.";
pub const ONE_TIME_PAYMENT_MESSAGE: &str = "One-time payment processed successfully.";

/// How long a webhook claim stays exclusive before another delivery may take it over.
pub const DEFAULT_WEBHOOK_CLAIM_LEASE_SECONDS: i64 = 300;

pub struct InvoiceUseCase {
    invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
    processed_event_repo: Arc<dyn ProcessedWebhookEventRepository + Send + Sync>,
    stripe: Arc<dyn StripeGateway>,
    publisher: EventPublisher,
    queues: Queues,
    claim_lease: Duration,
}

impl InvoiceUseCase {
    pub fn new(
        invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
        processed_event_repo: Arc<dyn ProcessedWebhookEventRepository + Send + Sync>,
        stripe: Arc<dyn StripeGateway>,
        publisher: EventPublisher,
        queues: Queues,
    ) -> Self {
        Self {
            invoice_repo,
            processed_event_repo,
            stripe,
            publisher,
            queues,
            claim_lease: Duration::seconds(DEFAULT_WEBHOOK_CLAIM_LEASE_SECONDS),
        }
    }

    /// The lease must outlast the request timeout, or a live claim can be taken over.
    pub fn with_claim_lease(mut self, claim_lease: Duration) -> Self {
        self.claim_lease = claim_lease;
        self
    }

    pub async fn list_invoices(&self, context: &RequestContext) -> UseCaseResult<Vec<InvoiceDto>> {
        async move {
            let invoices = self.invoice_repo.list_all().await.map_err(|err| {
                error!(db_error = ?err, "invoices: failed to list invoices");
                InvoiceError::Storage(err)
            })?;

            info!(count = invoices.len(), "invoices: listed invoices");
            Ok(invoices.into_iter().map(InvoiceDto::from).collect())
        }
        .instrument(context.span("list_invoices"))
        .await
    }

    pub async fn create_subscription_and_invoice(
        &self,
        context: &RequestContext,
        command: CreateSubscriptionCommand,
    ) -> UseCaseResult<InvoiceOperationResult> {
        async move {
            let span = Span::current();
            span.record("user_id", command.user_id.as_str());
            info!(job_id = ?command.job_id, "invoices: creating subscription");

            let customer = self
                .stripe
                .create_customer(&command.email, &command.payment_method)
                .await
                .map_err(|err| {
                    error!(error = ?err, "invoices: failed to create stripe customer");
                    InvoiceError::Provider(err)
                })?;
            span.record("customer_id", customer.id.as_str());

            let subscription = self
                .stripe
                .create_subscription(
                    &customer.id,
                    price_refs(&command.items),
                    &command.payment_method,
                )
                .await
                .map_err(|err| {
                    error!(
                        customer_id = %customer.id,
                        error = ?err,
                        "invoices: failed to create subscription, customer left without one"
                    );
                    InvoiceError::Provider(err)
                })?;
            span.record("subscription_id", subscription.id.as_str());

            let latest_invoice = subscription.latest_invoice.clone().ok_or_else(|| {
                InvoiceError::Provider(anyhow!(
                    "subscription {} has no latest invoice",
                    subscription.id
                ))
            })?;
            let payment_intent = latest_invoice.payment_intent.clone().ok_or_else(|| {
                InvoiceError::Provider(anyhow!(
                    "invoice {} has no payment intent",
                    latest_invoice.id
                ))
            })?;
            span.record("payment_intent_id", payment_intent.id.as_str());

            let invoice = self
                .persist_new_invoice(SaveInvoiceEntity {
                    id: None,
                    user_id: command.user_id.clone(),
                    customer_id: customer.id.clone(),
                    customer_email: customer
                        .email
                        .clone()
                        .unwrap_or_else(|| command.email.clone()),
                    customer_full_name: None,
                    items: command.items.clone(),
                    subscription_id: Some(subscription.id.clone()),
                    job_id: command.job_id.clone(),
                    status: InvoiceStatus::from_optional(latest_invoice.status.as_deref())
                        .to_string(),
                    payment_kind: PaymentKind::Subscription.to_string(),
                    last_payment_intent_id: payment_intent.id.clone(),
                    invoice_id_provided_by_stripe: latest_invoice.id.clone(),
                })
                .await?;

            let confirmed = self
                .stripe
                .confirm_payment_intent(&payment_intent.id, &command.payment_method)
                .await
                .map_err(|err| {
                    warn!(
                        invoice_id = %invoice.id,
                        error = ?err,
                        "invoices: payment intent confirmation failed, awaiting webhook"
                    );
                    InvoiceError::Provider(err)
                })?;
            info!(status = %confirmed.status, "invoices: payment intent confirmed");

            self.publisher
                .publish_raw(
                    &self.queues.plans_to_create,
                    &PlanCreationMessage {
                        user_id: invoice.user_id.clone(),
                        invoice_id: invoice.id,
                        description: describe_items(&invoice.items),
                        items: invoice.items.clone(),
                        is_active: false,
                        status: subscription.status.clone(),
                        duration_in_days: PLAN_DURATION_IN_DAYS,
                        job_id: invoice.job_id.clone(),
                        metadata: command.metadata.clone(),
                    },
                )
                .await?;
            info!(is_active = false, "invoices: plan creation message sent");

            self.notify(NotificationMessage::payment_in_progress(&invoice))
                .await?;

            Ok(InvoiceOperationResult {
                status: subscription.status,
                message: SUBSCRIPTION_CREATED_MESSAGE.to_string(),
                data: invoice.into(),
                payment_intent_id: None,
            })
        }
        .instrument(context.span("create_subscription"))
        .await
    }

    pub async fn create_one_time_payment_and_invoice(
        &self,
        context: &RequestContext,
        command: CreateOneTimePaymentCommand,
    ) -> UseCaseResult<InvoiceOperationResult> {
        async move {
            let span = Span::current();
            span.record("user_id", command.user_id.as_str());
            info!(job_id = ?command.job_id, "invoices: creating one-time payment");

            let customer = self
                .stripe
                .find_or_create_customer_by_email(&command.email, &command.payment_method)
                .await
                .map_err(|err| {
                    error!(error = ?err, "invoices: failed to find or create stripe customer");
                    InvoiceError::Provider(err)
                })?;
            span.record("customer_id", customer.id.as_str());

            let total_amount = self.total_amount(&command.items).await?;
            info!(
                amount = total_amount,
                currency = %command.currency,
                "invoices: total amount calculated"
            );

            let payment_intent = self
                .stripe
                .create_payment_intent(
                    &customer.id,
                    &command.payment_method,
                    total_amount,
                    &command.currency,
                )
                .await
                .map_err(|err| {
                    error!(
                        customer_id = %customer.id,
                        error = ?err,
                        "invoices: failed to create payment intent"
                    );
                    InvoiceError::Provider(err)
                })?;
            span.record("payment_intent_id", payment_intent.id.as_str());
            info!(status = %payment_intent.status, "invoices: payment intent created");

            let invoice = self
                .persist_new_invoice(SaveInvoiceEntity {
                    id: None,
                    user_id: command.user_id.clone(),
                    customer_id: customer.id.clone(),
                    customer_email: command.email.clone(),
                    customer_full_name: Some(command.full_name.clone()),
                    items: command.items.clone(),
                    subscription_id: None,
                    job_id: command.job_id.clone(),
                    status: InvoiceStatus::from_provider(&payment_intent.status).to_string(),
                    payment_kind: PaymentKind::OneTime.to_string(),
                    last_payment_intent_id: payment_intent.id.clone(),
                    invoice_id_provided_by_stripe: payment_intent.id.clone(),
                })
                .await?;

            let is_active = invoice.status_tag().is_succeeded();

            self.publisher
                .publish_raw(
                    &self.queues.plans_to_create,
                    &PlanCreationMessage {
                        user_id: invoice.user_id.clone(),
                        invoice_id: invoice.id,
                        description: describe_items(&invoice.items),
                        items: invoice.items.clone(),
                        is_active,
                        status: payment_intent.status.clone(),
                        duration_in_days: PLAN_DURATION_IN_DAYS,
                        job_id: invoice.job_id.clone(),
                        metadata: command.metadata.clone(),
                    },
                )
                .await?;
            info!(is_active, "invoices: plan creation message sent");

            let notification = if is_active {
                NotificationMessage::payment_successful(&invoice)
            } else {
                NotificationMessage::payment_processing(&invoice)
            };
            self.notify(notification).await?;

            Ok(InvoiceOperationResult {
                status: payment_intent.status.clone(),
                message: ONE_TIME_PAYMENT_MESSAGE.to_string(),
                data: invoice.into(),
                payment_intent_id: Some(payment_intent.id),
            })
        }
        .instrument(context.span("create_one_time_payment"))
        .await
    }

    pub async fn handle_stripe_webhook(
        &self,
        context: &RequestContext,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<()> {
        async move {
            let event = self
                .stripe
                .verify_webhook_signature(payload, signature)
                .map_err(|err| {
                    warn!(error = %err, "invoices: webhook verification failed");
                    InvoiceError::from(err)
                })?;

            let kind = WebhookEventKind::from_event_type(&event.type_);
            info!(event_id = %event.id, event_type = %event.type_, "invoices: webhook received");

            if kind == WebhookEventKind::Unhandled {
                info!(event_type = %event.type_, "invoices: unhandled webhook event type");
                return Ok(());
            }

            let stale_before = Utc::now() - self.claim_lease;
            let claim = self
                .processed_event_repo
                .try_claim(&event.id, &event.type_, stale_before)
                .await
                .map_err(|err| {
                    error!(event_id = %event.id, db_error = ?err, "invoices: failed to claim webhook event");
                    InvoiceError::Storage(err)
                })?;

            match claim {
                WebhookClaim::Claimed => {}
                WebhookClaim::AlreadyProcessed => {
                    info!(event_id = %event.id, "invoices: webhook event already processed");
                    return Ok(());
                }
                WebhookClaim::InProgress => {
                    // Non-2xx so the provider redelivers once the other attempt settles.
                    warn!(event_id = %event.id, "invoices: webhook event claimed by another delivery");
                    return Err(InvoiceError::EventInProgress(event.id.clone()));
                }
            }

            let mut guard = ClaimGuard::new(Arc::clone(&self.processed_event_repo), &event.id);

            let outcome = match kind {
                WebhookEventKind::InvoiceCreated | WebhookEventKind::InvoiceUpdated => {
                    info!(event_type = %kind, "invoices: invoice event acknowledged");
                    Ok(())
                }
                WebhookEventKind::PaymentIntentSucceeded => {
                    self.handle_payment_intent_succeeded(&event).await
                }
                WebhookEventKind::Unhandled => Ok(()),
            };
            guard.disarm();

            match &outcome {
                Ok(()) => {
                    // Side effects already happened; a failed mark only shortens idempotency to the lease.
                    if let Err(err) = self.processed_event_repo.mark_processed(&event.id).await {
                        error!(
                            event_id = %event.id,
                            db_error = ?err,
                            "invoices: failed to mark webhook event processed"
                        );
                    }
                }
                Err(err) => {
                    warn!(event_id = %event.id, error = %err, "invoices: webhook handling failed, releasing claim");
                    if let Err(release_err) = self.processed_event_repo.release(&event.id).await {
                        error!(
                            event_id = %event.id,
                            db_error = ?release_err,
                            "invoices: failed to release webhook claim"
                        );
                    }
                }
            }

            outcome
        }
        .instrument(context.span("handle_stripe_webhook"))
        .await
    }

    async fn handle_payment_intent_succeeded(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let span = Span::current();
        let payment_intent: StripePaymentIntent = StripeClient::extract_payment_intent(event)
            .ok_or_else(|| {
                InvoiceError::InvalidWebhook(format!("event {} carries no payment intent", event.id))
            })?;
        span.record("payment_intent_id", payment_intent.id.as_str());

        let Some(customer_id) = payment_intent.customer.clone() else {
            warn!("invoices: payment intent has no customer, nothing to reconcile");
            return Ok(());
        };
        span.record("customer_id", customer_id.as_str());

        let (payment_kind, provider_invoice_id) = match payment_intent.invoice.as_deref() {
            Some(invoice_id) => (PaymentKind::Subscription, invoice_id.to_string()),
            None => (PaymentKind::OneTime, payment_intent.id.clone()),
        };

        let found = self
            .invoice_repo
            .find_by_customer_and_provider_invoice_id(
                &customer_id,
                payment_kind,
                &provider_invoice_id,
            )
            .await
            .map_err(|err| {
                error!(db_error = ?err, "invoices: failed to look up invoice");
                InvoiceError::Storage(err)
            })?;

        let invoice = match found {
            Some(invoice) => invoice,
            None => {
                warn!(
                    %payment_kind,
                    provider_invoice_id = %provider_invoice_id,
                    "invoices: webhook for unknown invoice ignored"
                );
                return Ok(());
            }
        };
        span.record("invoice_id", tracing::field::display(invoice.id));

        let mut update = SaveInvoiceEntity::from(invoice);
        update.status = InvoiceStatus::from_provider(&payment_intent.status).to_string();
        update.last_payment_intent_id = payment_intent.id.clone();

        let invoice = self.invoice_repo.save(update).await.map_err(|err| {
            error!(db_error = ?err, "invoices: failed to update invoice status");
            InvoiceError::Storage(err)
        })?;
        info!(status = %invoice.status, "invoices: invoice status updated");

        self.publisher
            .publish_raw(
                &self.queues.invoice_status_on_related_plans,
                &PlanStatusUpdateMessage {
                    user_id: invoice.user_id.clone(),
                    invoice_id: invoice.id,
                    description: describe_items(&invoice.items),
                    items: invoice.items.clone(),
                    is_active: true,
                    status: invoice.status.clone(),
                    job_id: invoice.job_id.clone(),
                },
            )
            .await?;
        info!(is_active = true, "invoices: plan status update message sent");

        self.notify(NotificationMessage::payment_received(&invoice))
            .await
    }

    async fn persist_new_invoice(&self, invoice: SaveInvoiceEntity) -> UseCaseResult<InvoiceEntity> {
        match self.invoice_repo.save(invoice.clone()).await {
            Ok(saved) => {
                Span::current().record("invoice_id", tracing::field::display(saved.id));
                info!(status = %saved.status, "invoices: invoice saved");
                Ok(saved)
            }
            Err(err) => {
                // Provider objects now exist without a local record.
                error!(
                    customer_id = %invoice.customer_id,
                    subscription_id = ?invoice.subscription_id,
                    payment_intent_id = %invoice.last_payment_intent_id,
                    provider_invoice_id = %invoice.invoice_id_provided_by_stripe,
                    db_error = ?err,
                    "invoices: failed to persist invoice, provider objects orphaned"
                );
                Err(InvoiceError::Storage(err))
            }
        }
    }

    async fn total_amount(&self, items: &serde_json::Value) -> UseCaseResult<i64> {
        let mut total = 0;
        for price_id in price_refs(items) {
            let price = self
                .stripe
                .retrieve_price(&price_id)
                .await
                .map_err(InvoiceError::Provider)?;
            total += price.unit_amount.unwrap_or(0);
        }
        Ok(total)
    }

    async fn notify(&self, notification: NotificationMessage) -> UseCaseResult<()> {
        let pattern: NotificationPattern = notification.pattern();
        self.publisher
            .publish_enveloped(&self.queues.notification_events, pattern, &notification)
            .await?;
        info!(%pattern, user_email = %notification.user_email, "invoices: notification sent");
        Ok(())
    }
}

/// Hands a webhook claim back when handling is dropped before it settles,
/// e.g. when the request times out.
struct ClaimGuard {
    repo: Arc<dyn ProcessedWebhookEventRepository + Send + Sync>,
    event_id: Option<String>,
}

impl ClaimGuard {
    fn new(repo: Arc<dyn ProcessedWebhookEventRepository + Send + Sync>, event_id: &str) -> Self {
        Self {
            repo,
            event_id: Some(event_id.to_string()),
        }
    }

    fn disarm(&mut self) {
        self.event_id = None;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let Some(event_id) = self.event_id.take() else {
            return;
        };
        warn!(event_id = %event_id, "invoices: webhook handling cancelled, releasing claim");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(event_id = %event_id, "invoices: no runtime to release webhook claim, lease will expire");
            return;
        };
        let repo = Arc::clone(&self.repo);
        runtime.spawn(async move {
            if let Err(err) = repo.release(&event_id).await {
                error!(event_id = %event_id, db_error = ?err, "invoices: failed to release webhook claim");
            }
        });
    }
}
