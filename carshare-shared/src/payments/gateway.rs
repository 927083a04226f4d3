//! Payment gateway client
//!
//! [`PaymentGateway`] is the seam the API depends on. [`RapydClient`] talks
//! to the real gateway over HTTPS; [`super::mock::MockGateway`] stands in for
//! it in tests.
//!
//! Every gateway response is wrapped in an envelope:
//!
//! ```json
//! { "status": { "status": "SUCCESS", "message": "" }, "data": { ... } }
//! ```

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::signature::{generate_salt, timestamp, Credentials};

pub const DEFAULT_BASE_URL: &str = "https://sandboxapi.rapyd.net";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Non-2xx response; `message` is the gateway's `status.message`
    #[error("Payment gateway error: {message}")]
    Api { status: u16, message: String },

    #[error("Payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected payment gateway response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode payment gateway request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentMethod {
    pub id: Option<String>,

    /// Gateway type code, e.g. "us_visa_card"
    #[serde(rename = "type")]
    pub kind: String,

    pub name: String,
    pub image: String,
    pub category: String,
    pub supported_currencies: Vec<String>,
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateCustomer {
    pub name: String,
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePayment {
    /// Amount in cents
    pub amount: i64,

    /// Uppercase ISO currency code
    pub currency: String,

    pub payment_method: String,
    pub customer: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// Payment as reported by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,

    /// Gateway status code, e.g. "ACT", "CLO", "CAN"
    pub status: String,

    /// Amount in cents
    #[serde(default)]
    pub amount: i64,

    #[serde(default)]
    pub currency: String,

    #[serde(default)]
    pub payment_method: Option<String>,

    #[serde(default)]
    pub redirect_url: Option<String>,

    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: String,

    #[serde(default)]
    pub amount: Option<i64>,

    #[serde(default)]
    pub payment: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefundRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeStatus {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: EnvelopeStatus,

    data: Option<T>,
}

/// Gateway payment IDs are used in request paths, so only a safe alphabet
/// is accepted
pub fn is_valid_payment_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Payment methods offered in a country (ISO 3166 alpha-2)
    async fn list_payment_methods(&self, country: &str) -> Result<Vec<PaymentMethod>, GatewayError>;

    async fn create_customer(&self, customer: &CreateCustomer) -> Result<Customer, GatewayError>;

    async fn create_payment(&self, payment: &CreatePayment) -> Result<Payment, GatewayError>;

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError>;

    /// Refunds `amount` cents, or the full payment when None
    async fn refund_payment(
        &self,
        payment_id: &str,
        amount: Option<i64>,
    ) -> Result<Refund, GatewayError>;

    /// Checks the signature headers of a webhook delivery
    fn verify_webhook(&self, signature: &str, salt: &str, timestamp: &str, body: &[u8]) -> bool;
}

#[derive(Debug, Clone)]
pub struct RapydConfig {
    pub credentials: Credentials,
    pub base_url: String,
    pub timeout: Duration,
}

impl RapydConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTPS client for the Rapyd gateway
#[derive(Debug, Clone)]
pub struct RapydClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl RapydClient {
    pub fn new(config: RapydConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials,
        })
    }

    /// Sends a signed request and unwraps the response envelope
    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = match body {
            Some(b) => serde_json::to_string(b)?,
            None => String::new(),
        };

        let salt = generate_salt();
        let timestamp = timestamp();
        let signature =
            self.credentials
                .sign_request(method.as_str(), path, &salt, &timestamp, &body);

        debug!(method = %method, path, "Sending payment gateway request");

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json")
            .header("access_key", &self.credentials.access_key)
            .header("salt", &salt)
            .header("timestamp", &timestamp)
            .header("signature", signature);

        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes)
                .ok()
                .and_then(|e| e.status.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown error".to_string());

            warn!(method = %method, path, status = status.as_u16(), %message, "Payment gateway returned an error");

            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("missing data".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for RapydClient {
    async fn list_payment_methods(&self, country: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        let path = format!("/v1/payment_methods/country?country={}", country);
        self.request::<_, ()>(Method::GET, &path, None).await
    }

    async fn create_customer(&self, customer: &CreateCustomer) -> Result<Customer, GatewayError> {
        self.request(Method::POST, "/v1/customers", Some(customer)).await
    }

    async fn create_payment(&self, payment: &CreatePayment) -> Result<Payment, GatewayError> {
        self.request(Method::POST, "/v1/payments", Some(payment)).await
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        let path = format!("/v1/payments/{}", payment_id);
        self.request::<_, ()>(Method::GET, &path, None).await
    }

    async fn refund_payment(
        &self,
        payment_id: &str,
        amount: Option<i64>,
    ) -> Result<Refund, GatewayError> {
        let path = format!("/v1/payments/{}/refund", payment_id);
        self.request(Method::POST, &path, Some(&RefundRequest { amount }))
            .await
    }

    fn verify_webhook(&self, signature: &str, salt: &str, timestamp: &str, body: &[u8]) -> bool {
        self.credentials
            .verify_webhook_signature(signature, salt, timestamp, body)
    }
}
