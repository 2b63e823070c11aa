//! PayChangu REST client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::{
    CheckoutCustomer, CheckoutSession, GatewayError, ProviderGateway, VerifiedTransaction,
};

const PAYCHANGU_API_BASE: &str = "https://api.paychangu.com";

/// Client configuration; `base_url` is overridable for tests and sandboxes.
#[derive(Debug, Clone)]
pub struct PayChanguConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub return_url: String,
    pub callback_url: String,
}

impl PayChanguConfig {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            base_url: PAYCHANGU_API_BASE.to_string(),
            timeout: Duration::from_secs(15),
            return_url: String::new(),
            callback_url: String::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_urls(mut self, return_url: String, callback_url: String) -> Self {
        self.return_url = return_url;
        self.callback_url = callback_url;
        self
    }
}

#[derive(Clone)]
pub struct PayChanguClient {
    http: Client,
    config: PayChanguConfig,
}

/// Envelope PayChangu wraps every response in.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CheckoutData {
    checkout_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    #[serde(default)]
    amount: Option<serde_json::Number>,
    #[serde(default)]
    currency: Option<String>,
}

impl PayChanguClient {
    pub fn new(config: PayChanguConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn map_error(status: StatusCode, body: &str) -> GatewayError {
        // Provider error bodies stay in the logs; the kind is all callers see.
        warn!(status = %status, body = %body, "PayChangu error response");
        GatewayError(format!("provider returned HTTP {}", status.as_u16()))
    }
}

#[async_trait]
impl ProviderGateway for PayChanguClient {
    #[instrument(skip(self, customer), fields(tx_ref = %tx_ref, amount = amount, currency = %currency))]
    async fn create_checkout(
        &self,
        amount: i64,
        currency: &str,
        tx_ref: &str,
        customer: &CheckoutCustomer,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = serde_json::json!({
            "amount": amount,
            "currency": currency,
            "tx_ref": tx_ref,
            "email": customer.email,
            "first_name": customer.first_name,
            "last_name": customer.last_name,
            "return_url": self.config.return_url,
            "callback_url": self.config.callback_url,
        });

        let url = format!("{}/payment", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError(format!("checkout request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError(format!("failed to read checkout response: {e}")))?;

        if !status.is_success() {
            return Err(Self::map_error(status, &text));
        }

        let envelope: Envelope<CheckoutData> = serde_json::from_str(&text)
            .map_err(|e| GatewayError(format!("malformed checkout response: {e}")))?;

        match envelope.data {
            Some(data) if envelope.status == "success" => {
                info!(tx_ref = %tx_ref, "checkout session created");
                Ok(CheckoutSession {
                    checkout_url: data.checkout_url,
                })
            }
            _ => Err(GatewayError(format!(
                "checkout rejected: {}",
                envelope.message.unwrap_or_else(|| envelope.status.clone())
            ))),
        }
    }

    #[instrument(skip(self), fields(tx_ref = %tx_ref))]
    async fn verify(&self, tx_ref: &str) -> Result<VerifiedTransaction, GatewayError> {
        let url = format!("{}/verify-payment/{}", self.config.base_url, tx_ref);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError(format!("verify request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError(format!("failed to read verify response: {e}")))?;

        if !status.is_success() {
            return Err(Self::map_error(status, &text));
        }

        let envelope: Envelope<VerifyData> = serde_json::from_str(&text)
            .map_err(|e| GatewayError(format!("malformed verify response: {e}")))?;

        let data = envelope
            .data
            .ok_or_else(|| GatewayError("verify response missing data".to_string()))?;

        // PayChangu reports amounts as numbers that are occasionally decimal
        // strings; normalize to whole units.
        let amount = data
            .amount
            .as_ref()
            .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)))
            .ok_or_else(|| GatewayError("verify response missing amount".to_string()))?;

        Ok(VerifiedTransaction {
            status: data.status,
            amount,
            currency: data.currency.unwrap_or_default(),
        })
    }
}
