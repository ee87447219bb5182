//! Payment model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    Manual,
    Razorpay,
    Stripe,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Manual => "manual",
            Gateway::Razorpay => "razorpay",
            Gateway::Stripe => "stripe",
        }
    }

    /// Unknown gateway names are a caller error, not a default.
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Gateway::Manual),
            "razorpay" => Some(Gateway::Razorpay),
            "stripe" => Some(Gateway::Stripe),
            _ => None,
        }
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "completed" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Payment record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub firm_id: Uuid,
    pub invoice_id: Uuid,
    pub client_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub gateway: String,
    pub transaction_id: String,
    pub status: String,
    pub payment_date: NaiveDate,
    pub reconciled: bool,
    pub reconciliation_date: Option<NaiveDate>,
    pub gateway_response: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub firm_id: Uuid,
    pub invoice_id: Uuid,
    pub client_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub gateway: Gateway,
    pub transaction_id: String,
    pub status: PaymentStatus,
    pub payment_date: NaiveDate,
    pub gateway_response: Option<String>,
}
