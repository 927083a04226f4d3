//! In-memory payment gateway for tests and local development
//!
//! Records every call and answers deterministically. Webhook signatures are
//! checked with real HMACs over the mock's own credentials, so tests can sign
//! deliveries with [`MockGateway::sign_webhook`].

use async_trait::async_trait;
use std::sync::Mutex;

use super::gateway::{
    CreateCustomer, CreatePayment, Customer, GatewayError, Payment, PaymentGateway, PaymentMethod,
    Refund,
};
use super::signature::Credentials;

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ListPaymentMethods(String),
    CreateCustomer(CreateCustomer),
    CreatePayment(CreatePayment),
    GetPayment(String),
    RefundPayment(String, Option<i64>),
}

#[derive(Debug)]
pub struct MockGateway {
    credentials: Credentials,

    /// Status code returned for created and fetched payments
    payment_status: Mutex<String>,

    /// When set, every call fails with this gateway message
    failure: Mutex<Option<String>>,

    calls: Mutex<Vec<GatewayCall>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            credentials: Credentials::new("mock_access_key", "mock_secret_key"),
            payment_status: Mutex::new("ACT".to_string()),
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_payment_status(&self, status: &str) {
        if let Ok(mut s) = self.payment_status.lock() {
            *s = status.to_string();
        }
    }

    pub fn fail_with(&self, message: &str) {
        if let Ok(mut f) = self.failure.lock() {
            *f = Some(message.to_string());
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn sign_webhook(&self, salt: &str, timestamp: &str, body: &[u8]) -> String {
        self.credentials.webhook_signature(salt, timestamp, body)
    }

    fn record(&self, call: GatewayCall) -> Result<(), GatewayError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        match self.failure.lock().ok().and_then(|f| f.clone()) {
            Some(message) => Err(GatewayError::Api {
                status: 400,
                message,
            }),
            None => Ok(()),
        }
    }

    fn status(&self) -> String {
        self.payment_status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| "ACT".to_string())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn list_payment_methods(&self, country: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        self.record(GatewayCall::ListPaymentMethods(country.to_string()))?;

        Ok(vec![PaymentMethod {
            id: None,
            kind: format!("{}_visa_card", country.to_lowercase()),
            name: "Visa".to_string(),
            image: String::new(),
            category: "card".to_string(),
            supported_currencies: vec!["USD".to_string()],
            is_online: false,
        }])
    }

    async fn create_customer(&self, customer: &CreateCustomer) -> Result<Customer, GatewayError> {
        self.record(GatewayCall::CreateCustomer(customer.clone()))?;

        Ok(Customer {
            id: format!("cus_mock_{}", customer.email.len()),
        })
    }

    async fn create_payment(&self, payment: &CreatePayment) -> Result<Payment, GatewayError> {
        self.record(GatewayCall::CreatePayment(payment.clone()))?;

        let id = format!("payment_mock_{}", self.calls().len());
        Ok(Payment {
            redirect_url: Some(format!("https://sandbox.example/checkout/{id}")),
            id,
            status: self.status(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            payment_method: Some(payment.payment_method.clone()),
            failure_reason: None,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        self.record(GatewayCall::GetPayment(payment_id.to_string()))?;

        Ok(Payment {
            id: payment_id.to_string(),
            status: self.status(),
            amount: 13_500,
            currency: "USD".to_string(),
            payment_method: None,
            redirect_url: None,
            failure_reason: None,
        })
    }

    async fn refund_payment(
        &self,
        payment_id: &str,
        amount: Option<i64>,
    ) -> Result<Refund, GatewayError> {
        self.record(GatewayCall::RefundPayment(payment_id.to_string(), amount))?;

        Ok(Refund {
            id: format!("refund_{payment_id}"),
            status: "Completed".to_string(),
            amount,
            payment: Some(payment_id.to_string()),
        })
    }

    fn verify_webhook(&self, signature: &str, salt: &str, timestamp: &str, body: &[u8]) -> bool {
        self.credentials
            .verify_webhook_signature(signature, salt, timestamp, body)
    }
}
