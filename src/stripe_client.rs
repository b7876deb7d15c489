use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    CheckoutSession, Customer, Invoice, List, PaymentIntent, StripeErrorBody, Subscription,
};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;

/// API version sent with every request. Response shapes (notably
/// `invoice.payment_intent`) follow this version, not the account default.
pub const STRIPE_API_VERSION: &str = "2024-06-20";

/// Read-only slice of the payments API used by the pipeline.
///
/// Every call may fail with a vendor error; callers decide whether that
/// failure is fatal.
#[async_trait]
pub trait BillingApi: Send + Sync {
    async fn list_subscriptions(
        &self,
        status: &str,
        limit: u8,
    ) -> Result<List<Subscription>, AppError>;

    async fn list_invoices(&self, customer_id: &str, limit: u8) -> Result<List<Invoice>, AppError>;

    async fn get_customer(&self, customer_id: &str) -> Result<Customer, AppError>;

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, AppError>;

    async fn list_checkout_sessions(
        &self,
        subscription_id: &str,
        limit: u8,
    ) -> Result<List<CheckoutSession>, AppError>;

    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, AppError>;
}

fn object_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex is valid"))
}

/// Rejects ids that would alter the request path (slashes, dots, query chars).
pub fn validate_object_id(id: &str) -> Result<&str, AppError> {
    if object_id_regex().is_match(id) {
        Ok(id)
    } else {
        Err(AppError::InvalidInput(format!("Invalid Stripe object id: {:?}", id)))
    }
}

/// Client for the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    /// Creates a new `StripeClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API origin without the `/v1` suffix, e.g. `https://api.stripe.com`.
    /// * `secret_key` - Secret or restricted key used as bearer token.
    /// * `timeout` - Per-request timeout.
    pub fn new(base_url: String, secret_key: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Stripe client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.stripe_api_base.clone(),
            config.stripe_secret_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Issues a GET against `/v1/{path}` and decodes the JSON body.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = reqwest::Url::parse_with_params(&format!("{}/v1/{}", self.base_url, path), query)
            .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Stripe request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<StripeErrorBody>(&body) {
                Ok(parsed) => AppError::Stripe {
                    status: status.as_u16(),
                    kind: parsed.error.kind,
                    message: parsed
                        .error
                        .message
                        .or(parsed.error.code)
                        .unwrap_or_else(|| "Unknown error".to_string()),
                },
                Err(_) => AppError::Stripe {
                    status: status.as_u16(),
                    kind: None,
                    message: if body.is_empty() {
                        "Unknown error".to_string()
                    } else {
                        body
                    },
                },
            });
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Stripe response for {}: {}", path, e))
        })
    }
}

#[async_trait]
impl BillingApi for StripeClient {
    async fn list_subscriptions(
        &self,
        status: &str,
        limit: u8,
    ) -> Result<List<Subscription>, AppError> {
        self.get(
            "subscriptions",
            &[("status", status.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn list_invoices(&self, customer_id: &str, limit: u8) -> Result<List<Invoice>, AppError> {
        let customer_id = validate_object_id(customer_id)?;
        self.get(
            "invoices",
            &[("customer", customer_id.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Customer, AppError> {
        let customer_id = validate_object_id(customer_id)?;
        self.get(&format!("customers/{}", customer_id), &[]).await
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, AppError> {
        let invoice_id = validate_object_id(invoice_id)?;
        self.get(&format!("invoices/{}", invoice_id), &[]).await
    }

    async fn list_checkout_sessions(
        &self,
        subscription_id: &str,
        limit: u8,
    ) -> Result<List<CheckoutSession>, AppError> {
        let subscription_id = validate_object_id(subscription_id)?;
        self.get(
            "checkout/sessions",
            &[
                ("subscription", subscription_id.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, AppError> {
        let payment_intent_id = validate_object_id(payment_intent_id)?;
        self.get(&format!("payment_intents/{}", payment_intent_id), &[])
            .await
    }
}
