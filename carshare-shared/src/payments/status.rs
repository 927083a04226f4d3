//! Mapping gateway payment states onto booking states
//!
//! Two sources report payment progress. Status polling sees a raw status code
//! and only moves bookings for the two terminal codes. Webhooks carry an event
//! type that maps directly to a booking status.

use serde::Deserialize;

use crate::models::booking::BookingStatus;

/// Payment completed ("closed")
pub const PAYMENT_STATUS_CLOSED: &str = "CLO";

pub const PAYMENT_STATUS_CANCELED: &str = "CAN";

/// Booking status implied by a polled payment status code
///
/// Any other code leaves the booking status untouched.
pub fn booking_status_for_payment(code: &str) -> Option<BookingStatus> {
    match code {
        PAYMENT_STATUS_CLOSED => Some(BookingStatus::Confirmed),
        PAYMENT_STATUS_CANCELED => Some(BookingStatus::Cancelled),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventType {
    PaymentCompleted,
    PaymentFailed,
    PaymentCancelled,
    PaymentRefunded,

    #[serde(other)]
    Unknown,
}

impl WebhookEventType {
    pub fn booking_status(&self) -> Option<BookingStatus> {
        match self {
            WebhookEventType::PaymentCompleted => Some(BookingStatus::Confirmed),
            WebhookEventType::PaymentFailed | WebhookEventType::PaymentCancelled => {
                Some(BookingStatus::Cancelled)
            }
            WebhookEventType::PaymentRefunded => Some(BookingStatus::Refunded),
            WebhookEventType::Unknown => None,
        }
    }
}

/// Webhook body: `{"id": ..., "type": "PAYMENT_COMPLETED", "data": {...}}`
///
/// `data` stays raw until the type is known, so events we do not handle are
/// accepted whatever their payload looks like.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,

    /// Raw type string, kept for logging
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookPayment {
    id: String,

    #[serde(default)]
    status: Option<String>,

    #[serde(default)]
    failure_reason: Option<String>,
}

/// What a webhook does to the bookings carrying `payment_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    pub payment_id: String,
    pub status: BookingStatus,
    pub payment_status: Option<String>,

    /// Replacement booking notes; set for failed payments only
    pub notes: Option<String>,
}

impl WebhookEvent {
    pub fn event_type(&self) -> WebhookEventType {
        serde_json::from_value(serde_json::Value::String(self.kind.clone()))
            .unwrap_or(WebhookEventType::Unknown)
    }

    /// Booking update for a handled event type, None for anything else
    ///
    /// # Errors
    ///
    /// Fails when a handled event has no payment ID in `data`.
    pub fn booking_update(&self) -> Result<Option<PaymentUpdate>, serde_json::Error> {
        let event_type = self.event_type();
        let Some(status) = event_type.booking_status() else {
            return Ok(None);
        };

        let payment: WebhookPayment = serde_json::from_value(self.data.clone())?;

        let notes = (event_type == WebhookEventType::PaymentFailed).then(|| {
            format!(
                "Payment failed: {}",
                payment
                    .failure_reason
                    .as_deref()
                    .filter(|r| !r.is_empty())
                    .unwrap_or("Unknown reason")
            )
        });

        Ok(Some(PaymentUpdate {
            payment_id: payment.id,
            status,
            payment_status: payment.status,
            notes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: &str) -> WebhookEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_polled_status_codes() {
        assert_eq!(booking_status_for_payment("CLO"), Some(BookingStatus::Confirmed));
        assert_eq!(booking_status_for_payment("CAN"), Some(BookingStatus::Cancelled));
        assert_eq!(booking_status_for_payment("ACT"), None);
        assert_eq!(booking_status_for_payment("ERR"), None);
        assert_eq!(booking_status_for_payment("clo"), None);
    }

    #[test]
    fn test_event_type_mapping() {
        let cases = [
            ("PAYMENT_COMPLETED", Some(BookingStatus::Confirmed)),
            ("PAYMENT_FAILED", Some(BookingStatus::Cancelled)),
            ("PAYMENT_CANCELLED", Some(BookingStatus::Cancelled)),
            ("PAYMENT_REFUNDED", Some(BookingStatus::Refunded)),
            ("CUSTOMER_CREATED", None),
        ];

        for (kind, expected) in cases {
            let e = event(&format!(r#"{{"type":"{kind}","data":{{"id":"p_1"}}}}"#));
            assert_eq!(e.event_type().booking_status(), expected, "{kind}");
        }
    }

    #[test]
    fn test_completed_update() {
        let e = event(r#"{"type":"PAYMENT_COMPLETED","data":{"id":"payment_1","status":"CLO"}}"#);

        assert_eq!(
            e.booking_update().unwrap(),
            Some(PaymentUpdate {
                payment_id: "payment_1".to_string(),
                status: BookingStatus::Confirmed,
                payment_status: Some("CLO".to_string()),
                notes: None,
            })
        );
    }

    #[test]
    fn test_failed_update_records_reason() {
        let e = event(
            r#"{"type":"PAYMENT_FAILED","data":{"id":"payment_1","status":"ERR","failure_reason":"card_declined"}}"#,
        );
        let update = e.booking_update().unwrap().unwrap();

        assert_eq!(update.status, BookingStatus::Cancelled);
        assert_eq!(update.notes.as_deref(), Some("Payment failed: card_declined"));
    }

    #[test]
    fn test_failed_update_without_reason() {
        let e = event(r#"{"type":"PAYMENT_FAILED","data":{"id":"payment_1","status":"ERR"}}"#);
        let update = e.booking_update().unwrap().unwrap();

        assert_eq!(update.notes.as_deref(), Some("Payment failed: Unknown reason"));
    }

    #[test]
    fn test_unknown_event_ignores_payload_shape() {
        let e = event(r#"{"type":"CUSTOMER_CREATED","data":[1,2,3]}"#);

        assert_eq!(e.event_type(), WebhookEventType::Unknown);
        assert_eq!(e.booking_update().unwrap(), None);
    }

    #[test]
    fn test_handled_event_requires_payment_id() {
        let e = event(r#"{"type":"PAYMENT_REFUNDED","data":{"status":"REF"}}"#);
        assert!(e.booking_update().is_err());
    }
}
