//! Notification log model and template types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Notification template type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    InvoiceSent,
    PaymentReminder,
    PaymentOverdue,
    AppointmentReminder,
    AppointmentCancelled,
    PaymentReceived,
    TaxDeadline,
    DocumentExpiry,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::InvoiceSent => "invoice_sent",
            TemplateType::PaymentReminder => "payment_reminder",
            TemplateType::PaymentOverdue => "payment_overdue",
            TemplateType::AppointmentReminder => "appointment_reminder",
            TemplateType::AppointmentCancelled => "appointment_cancelled",
            TemplateType::PaymentReceived => "payment_received",
            TemplateType::TaxDeadline => "tax_deadline",
            TemplateType::DocumentExpiry => "document_expiry",
        }
    }
}

/// Notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    WhatsApp,
    Email,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::WhatsApp => "whatsapp",
            NotificationChannel::Email => "email",
        }
    }
}

/// Delivery outcome recorded for each dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Skipped,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Skipped => "skipped",
        }
    }
}

/// Append-only record of a dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationLog {
    pub log_id: Uuid,
    pub firm_id: Uuid,
    pub client_id: Uuid,
    pub template_type: String,
    pub channel: String,
    pub status: String,
    pub message: String,
    pub created_utc: DateTime<Utc>,
}
