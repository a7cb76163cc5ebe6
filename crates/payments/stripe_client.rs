use anyhow::Result;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// API version every request is pinned to. Responses are parsed against this
/// shape: newer versions moved `payment_intent` off the invoice object.
pub const STRIPE_API_VERSION: &str = "2024-06-20";
pub const STRIPE_VERSION_HEADER: &str = "Stripe-Version";

/// Maximum age, in seconds, of a signed webhook payload.
pub const WEBHOOK_TOLERANCE_SECONDS: i64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: Option<String>,
    api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub latest_invoice: Option<StripeInvoice>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripeInvoice {
    pub id: String,
    pub status: Option<String>,
    pub payment_intent: Option<StripePaymentIntent>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: Option<i64>,
    pub customer: Option<String>,
    pub invoice: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripePrice {
    pub id: String,
    pub unit_amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookVerificationError {
    #[error("webhook secret is not configured")]
    MissingSecret,
    #[error("invalid stripe-signature: {0}")]
    InvalidSignature(String),
    #[error("invalid webhook payload: {0}")]
    MalformedPayload(String),
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: Option<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string());

        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            api_base,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        match details.and_then(|d| d.message) {
            Some(message) => anyhow::bail!("Stripe API request failed: {context}: {message}"),
            None => anyhow::bail!(
                "Stripe API request failed: {} (status {}, request_id={:?})",
                context,
                status,
                request_id
            ),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(STRIPE_VERSION_HEADER, STRIPE_API_VERSION)
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .authorized(self.http.post(self.url(path)))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, context).await?;

        Ok(resp.json().await?)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .authorized(self.http.get(self.url(path)))
            .query(query)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, context).await?;

        Ok(resp.json().await?)
    }

    /// Creates a customer with the payment method attached and set as the invoice default.
    pub async fn create_customer(&self, email: &str, payment_method: &str) -> Result<StripeCustomer> {
        // https://stripe.com/docs/api/customers/create
        let body = vec![
            ("email".to_string(), email.to_string()),
            ("payment_method".to_string(), payment_method.to_string()),
            (
                "invoice_settings[default_payment_method]".to_string(),
                payment_method.to_string(),
            ),
        ];

        self.post_form("customers", &body, "create customer").await
    }

    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<StripeCustomer>> {
        let customers: StripeList<StripeCustomer> = self
            .get_json(
                "customers",
                &[("email", email.to_string()), ("limit", "1".to_string())],
                "list customers",
            )
            .await?;

        Ok(customers.data.into_iter().next())
    }

    /// Creates an incomplete subscription whose first invoice's payment intent is expanded.
    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_refs: &[String],
        payment_method: &str,
    ) -> Result<StripeSubscription> {
        // https://stripe.com/docs/billing/subscriptions/build-subscriptions
        let mut body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("default_payment_method".to_string(), payment_method.to_string()),
            ("payment_behavior".to_string(), "default_incomplete".to_string()),
            (
                "payment_settings[save_default_payment_method]".to_string(),
                "on_subscription".to_string(),
            ),
            ("expand[]".to_string(), "latest_invoice.payment_intent".to_string()),
        ];

        for (idx, price) in price_refs.iter().enumerate() {
            body.push((format!("items[{idx}][price]"), price.clone()));
        }

        self.post_form("subscriptions", &body, "create subscription").await
    }

    /// Creates and immediately confirms a payment intent; redirect-based methods are disabled.
    pub async fn create_payment_intent(
        &self,
        customer_id: &str,
        payment_method: &str,
        amount: i64,
        currency: &str,
    ) -> Result<StripePaymentIntent> {
        // https://stripe.com/docs/api/payment_intents/create
        let body = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            ("customer".to_string(), customer_id.to_string()),
            ("payment_method".to_string(), payment_method.to_string()),
            ("confirm".to_string(), "true".to_string()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
            (
                "automatic_payment_methods[allow_redirects]".to_string(),
                "never".to_string(),
            ),
        ];

        self.post_form("payment_intents", &body, "create payment intent").await
    }

    pub async fn confirm_payment_intent(
        &self,
        payment_intent_id: &str,
        payment_method: &str,
    ) -> Result<StripePaymentIntent> {
        let body = vec![("payment_method".to_string(), payment_method.to_string())];

        self.post_form(
            &format!("payment_intents/{payment_intent_id}/confirm"),
            &body,
            "confirm payment intent",
        )
        .await
    }

    pub async fn retrieve_price(&self, price_id: &str) -> Result<StripePrice> {
        self.get_json(&format!("prices/{price_id}"), &[], "retrieve price")
            .await
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> std::result::Result<StripeEvent, WebhookVerificationError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or(WebhookVerificationError::MissingSecret)?;

        verify_signed_payload(secret, payload, signature_header, Utc::now().timestamp())
    }

    pub fn extract_payment_intent(event: &StripeEvent) -> Option<StripePaymentIntent> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

/// Checks `signature_header` (`t=...,v1=...[,v1=...]`) against `payload` at time `now`.
pub fn verify_signed_payload(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> std::result::Result<StripeEvent, WebhookVerificationError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        if let Some(rest) = part.trim().strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.trim().strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        WebhookVerificationError::InvalidSignature("missing timestamp".to_string())
    })?;
    let signed_at: i64 = timestamp.parse().map_err(|_| {
        WebhookVerificationError::InvalidSignature("malformed timestamp".to_string())
    })?;

    if signatures.is_empty() {
        return Err(WebhookVerificationError::InvalidSignature(
            "no v1 signature".to_string(),
        ));
    }

    if (now - signed_at).abs() > WEBHOOK_TOLERANCE_SECONDS {
        return Err(WebhookVerificationError::InvalidSignature(
            "timestamp outside the tolerance zone".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| WebhookVerificationError::InvalidSignature(err.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures
        .iter()
        .filter_map(|signature| hex::decode(signature).ok())
        .any(|provided| mac.clone().verify_slice(&provided).is_ok());

    if !matched {
        return Err(WebhookVerificationError::InvalidSignature(
            "no signatures found matching the expected signature for payload".to_string(),
        ));
    }

    serde_json::from_slice(payload)
        .map_err(|err| WebhookVerificationError::MalformedPayload(err.to_string()))
}
