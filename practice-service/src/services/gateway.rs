//! Payment gateway clients.
//!
//! Thin wrappers over the Razorpay and Stripe HTTP APIs. The core only
//! ever talks to the [`PaymentGateway`] trait; webhook framing and
//! vendor payloads stay inside this module.

use crate::config::{RazorpayConfig, StripeConfig};
use crate::models::{Client, Gateway, Invoice, Payment};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use service_core::error::AppError;
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// A hosted payment page created for an invoice.
#[derive(Debug, Clone)]
pub struct PaymentLink {
    pub reference: String,
    pub url: String,
}

/// Gateway-side refund record.
#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub refund_id: String,
    pub amount: Option<Decimal>,
    pub status: String,
}

/// Outcome of a parsed webhook event.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    PaymentCaptured {
        transaction_id: String,
        amount: Decimal,
        invoice_id: Option<Uuid>,
        client_id: Option<Uuid>,
    },
    PaymentFailed {
        transaction_id: String,
        amount: Decimal,
        invoice_id: Option<Uuid>,
        client_id: Option<Uuid>,
    },
    Ignored {
        event: String,
    },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> Gateway;

    fn is_configured(&self) -> bool;

    async fn create_payment_link(
        &self,
        invoice: &Invoice,
        client: &Client,
    ) -> Result<PaymentLink, AppError>;

    async fn refund(
        &self,
        payment: &Payment,
        amount: Option<Decimal>,
    ) -> Result<RefundRecord, AppError>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;

    fn process_webhook_event(&self, payload: &[u8]) -> Result<WebhookOutcome, AppError>;
}

/// Convert a monetary amount to the smallest currency unit.
fn to_minor_units(amount: Decimal) -> Result<u64, AppError> {
    (amount * Decimal::from(100))
        .round()
        .to_u64()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid amount: {}", amount)))
}

/// Convert from the smallest currency unit.
fn from_minor_units(minor: u64) -> Decimal {
    Decimal::new(minor as i64, 2)
}

fn parse_uuid_note(notes: Option<&Value>, key: &str) -> Option<Uuid> {
    notes
        .and_then(|n| n.get(key))
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

// =============================================================================
// Razorpay
// =============================================================================

#[derive(Debug, Deserialize)]
struct RazorpayPaymentLink {
    id: String,
    short_url: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayRefund {
    id: String,
    amount: u64,
    status: String,
}

/// Razorpay client. India-focused gateway with UPI, cards, and
/// netbanking support.
pub struct RazorpayGateway {
    client: reqwest::Client,
    config: RazorpayConfig,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn kind(&self) -> Gateway {
        Gateway::Razorpay
    }

    fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    async fn create_payment_link(
        &self,
        invoice: &Invoice,
        client: &Client,
    ) -> Result<PaymentLink, AppError> {
        if !self.is_configured() {
            return Err(AppError::BadGateway(
                "Razorpay credentials not configured".to_string(),
            ));
        }

        let body = serde_json::json!({
            "amount": to_minor_units(invoice.total_amount)?,
            "currency": invoice.currency,
            "description": format!("Invoice {}", invoice.invoice_number),
            "customer": {
                "name": client.client_name,
                "email": client.email,
                "contact": client.whatsapp_number,
            },
            "notify": { "sms": true, "email": true },
            "reminder_enable": true,
            "notes": {
                "invoice_id": invoice.invoice_id,
                "client_id": invoice.client_id,
                "firm_id": invoice.firm_id,
            },
        });

        let response = self
            .client
            .post(format!("{}/v1/payment_links", self.config.api_base))
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(format!("Razorpay request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::BadGateway(format!(
                "Razorpay payment link failed ({}): {}",
                status, detail
            )));
        }

        let link: RazorpayPaymentLink = response
            .json()
            .await
            .map_err(|e| AppError::BadGateway(format!("Invalid Razorpay response: {}", e)))?;

        Ok(PaymentLink {
            reference: link.id,
            url: link.short_url,
        })
    }

    async fn refund(
        &self,
        payment: &Payment,
        amount: Option<Decimal>,
    ) -> Result<RefundRecord, AppError> {
        if !self.is_configured() {
            return Err(AppError::BadGateway(
                "Razorpay credentials not configured".to_string(),
            ));
        }

        let refund_amount = to_minor_units(amount.unwrap_or(payment.amount))?;
        let body = serde_json::json!({
            "amount": refund_amount,
            "speed": "normal",
        });

        let response = self
            .client
            .post(format!(
                "{}/v1/payments/{}/refund",
                self.config.api_base, payment.transaction_id
            ))
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(format!("Razorpay request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::BadGateway(format!(
                "Razorpay refund failed ({}): {}",
                status, detail
            )));
        }

        let refund: RazorpayRefund = response
            .json()
            .await
            .map_err(|e| AppError::BadGateway(format!("Invalid Razorpay response: {}", e)))?;

        Ok(RefundRecord {
            refund_id: refund.id,
            amount: Some(from_minor_units(refund.amount)),
            status: refund.status,
        })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        let mut mac = match HmacSha256::new_from_slice(
            self.config.webhook_secret.expose_secret().as_bytes(),
        ) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }

    fn process_webhook_event(&self, payload: &[u8]) -> Result<WebhookOutcome, AppError> {
        let body: Value = serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload: {}", e)))?;

        let event = body
            .get("event")
            .and_then(|e| e.as_str())
            .unwrap_or_default()
            .to_string();

        let entity = body
            .pointer("/payload/payment/entity")
            .cloned()
            .unwrap_or(Value::Null);
        let transaction_id = entity
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let amount = from_minor_units(entity.get("amount").and_then(|v| v.as_u64()).unwrap_or(0));
        let notes = entity.get("notes");
        let invoice_id = parse_uuid_note(notes, "invoice_id");
        let client_id = parse_uuid_note(notes, "client_id");

        match event.as_str() {
            "payment.captured" => Ok(WebhookOutcome::PaymentCaptured {
                transaction_id,
                amount,
                invoice_id,
                client_id,
            }),
            "payment.failed" => Ok(WebhookOutcome::PaymentFailed {
                transaction_id,
                amount,
                invoice_id,
                client_id,
            }),
            _ => Ok(WebhookOutcome::Ignored { event }),
        }
    }
}

// =============================================================================
// Stripe
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    amount: u64,
    status: String,
}

/// Stripe client, used for international clients.
pub struct StripeGateway {
    client: reqwest::Client,
    config: StripeConfig,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn kind(&self) -> Gateway {
        Gateway::Stripe
    }

    fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    async fn create_payment_link(
        &self,
        invoice: &Invoice,
        _client: &Client,
    ) -> Result<PaymentLink, AppError> {
        if !self.is_configured() {
            return Err(AppError::BadGateway(
                "Stripe credentials not configured".to_string(),
            ));
        }

        let amount = to_minor_units(invoice.total_amount)?;
        let form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            (
                "line_items[0][price_data][currency]".into(),
                invoice.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                format!("Invoice {}", invoice.invoice_number),
            ),
            ("line_items[0][quantity]".into(), "1".into()),
            ("metadata[invoice_id]".into(), invoice.invoice_id.to_string()),
            ("metadata[client_id]".into(), invoice.client_id.to_string()),
            ("metadata[firm_id]".into(), invoice.firm_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(format!("Stripe request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::BadGateway(format!(
                "Stripe checkout session failed ({}): {}",
                status, detail
            )));
        }

        let session: StripeCheckoutSession = response
            .json()
            .await
            .map_err(|e| AppError::BadGateway(format!("Invalid Stripe response: {}", e)))?;

        Ok(PaymentLink {
            reference: session.id,
            url: session.url,
        })
    }

    async fn refund(
        &self,
        payment: &Payment,
        amount: Option<Decimal>,
    ) -> Result<RefundRecord, AppError> {
        if !self.is_configured() {
            return Err(AppError::BadGateway(
                "Stripe credentials not configured".to_string(),
            ));
        }

        let mut form: Vec<(String, String)> = vec![(
            "payment_intent".into(),
            payment.transaction_id.clone(),
        )];
        if let Some(amount) = amount {
            form.push(("amount".into(), to_minor_units(amount)?.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/refunds", self.config.api_base))
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(format!("Stripe request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::BadGateway(format!(
                "Stripe refund failed ({}): {}",
                status, detail
            )));
        }

        let refund: StripeRefund = response
            .json()
            .await
            .map_err(|e| AppError::BadGateway(format!("Invalid Stripe response: {}", e)))?;

        Ok(RefundRecord {
            refund_id: refund.id,
            amount: Some(from_minor_units(refund.amount)),
            status: refund.status,
        })
    }

    /// Stripe signs `"{timestamp}.{payload}"` and sends the result in a
    /// `t=...,v1=...` header.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in signature.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value.to_string()),
                Some(("v1", value)) => candidates.push(value.to_string()),
                _ => {}
            }
        }

        let Some(timestamp) = timestamp else {
            return false;
        };

        let mut mac = match HmacSha256::new_from_slice(
            self.config.webhook_secret.expose_secret().as_bytes(),
        ) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        candidates.into_iter().any(|candidate| {
            hex::decode(candidate)
                .map(|expected| mac.clone().verify_slice(&expected).is_ok())
                .unwrap_or(false)
        })
    }

    fn process_webhook_event(&self, payload: &[u8]) -> Result<WebhookOutcome, AppError> {
        let body: Value = serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload: {}", e)))?;

        let event = body
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        let object = body
            .pointer("/data/object")
            .cloned()
            .unwrap_or(Value::Null);
        let transaction_id = object
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let amount = from_minor_units(
            object
                .get("amount_received")
                .or_else(|| object.get("amount"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        );
        let metadata = object.get("metadata");
        let invoice_id = parse_uuid_note(metadata, "invoice_id");
        let client_id = parse_uuid_note(metadata, "client_id");

        match event.as_str() {
            "payment_intent.succeeded" => Ok(WebhookOutcome::PaymentCaptured {
                transaction_id,
                amount,
                invoice_id,
                client_id,
            }),
            "payment_intent.payment_failed" => Ok(WebhookOutcome::PaymentFailed {
                transaction_id,
                amount,
                invoice_id,
                client_id,
            }),
            _ => Ok(WebhookOutcome::Ignored { event }),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Resolves a [`Gateway`] to its client. Manual payments never reach a
/// gateway.
#[derive(Clone)]
pub struct GatewayRegistry {
    razorpay: Arc<RazorpayGateway>,
    stripe: Arc<StripeGateway>,
}

impl GatewayRegistry {
    pub fn new(razorpay: RazorpayConfig, stripe: StripeConfig) -> Self {
        Self {
            razorpay: Arc::new(RazorpayGateway::new(razorpay)),
            stripe: Arc::new(StripeGateway::new(stripe)),
        }
    }

    pub fn for_kind(&self, kind: Gateway) -> Result<Arc<dyn PaymentGateway>, AppError> {
        match kind {
            Gateway::Razorpay => Ok(self.razorpay.clone()),
            Gateway::Stripe => Ok(self.stripe.clone()),
            Gateway::Manual => Err(AppError::BadRequest(anyhow::anyhow!(
                "Manual payments are not handled by a gateway"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn razorpay() -> RazorpayGateway {
        RazorpayGateway::new(RazorpayConfig {
            api_base: "https://api.razorpay.com".to_string(),
            key_id: "rzp_test_key".to_string(),
            key_secret: Secret::new("secret".to_string()),
            webhook_secret: Secret::new("whsec".to_string()),
        })
    }

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn razorpay_signature_roundtrip() {
        let gateway = razorpay();
        let payload = br#"{"event":"payment.captured"}"#;
        let signature = sign("whsec", payload);

        assert!(gateway.verify_webhook_signature(payload, &signature));
        assert!(!gateway.verify_webhook_signature(payload, &sign("wrong", payload)));
        assert!(!gateway.verify_webhook_signature(payload, "not-hex"));
    }

    #[test]
    fn razorpay_captured_event_parsed() {
        let gateway = razorpay();
        let invoice_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": {
                "id": "pay_123",
                "amount": 1180000u64,
                "notes": { "invoice_id": invoice_id.to_string() },
            }}},
        });

        let outcome = gateway
            .process_webhook_event(payload.to_string().as_bytes())
            .expect("webhook parses");

        match outcome {
            WebhookOutcome::PaymentCaptured {
                transaction_id,
                amount,
                invoice_id: parsed,
                ..
            } => {
                assert_eq!(transaction_id, "pay_123");
                assert_eq!(amount, Decimal::new(1180000, 2));
                assert_eq!(parsed, Some(invoice_id));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn unrecognized_event_is_ignored() {
        let gateway = razorpay();
        let payload = br#"{"event":"invoice.paid","payload":{}}"#;
        let outcome = gateway
            .process_webhook_event(payload)
            .expect("webhook parses");
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
    }

    #[test]
    fn stripe_signature_header_parsed() {
        let gateway = StripeGateway::new(StripeConfig {
            api_base: "https://api.stripe.com".to_string(),
            secret_key: Secret::new("sk_test".to_string()),
            webhook_secret: Secret::new("whsec_stripe".to_string()),
        });

        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let mut mac = HmacSha256::new_from_slice(b"whsec_stripe").expect("hmac key");
        mac.update(b"1700000000");
        mac.update(b".");
        mac.update(payload);
        let v1 = hex::encode(mac.finalize().into_bytes());
        let header = format!("t=1700000000,v1={}", v1);

        assert!(gateway.verify_webhook_signature(payload, &header));
        assert!(!gateway.verify_webhook_signature(payload, "t=1700000000,v1=deadbeef"));
    }
}
