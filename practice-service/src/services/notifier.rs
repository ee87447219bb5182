//! Notification dispatch.
//!
//! The dispatcher resolves the client's firm settings, renders the
//! message for the template type, and delivers it over the WhatsApp
//! HTTP API. Missing configuration (channel disabled, no instance, no
//! number) is a skip, not an error; delivery failures are logged and
//! reported as a skip so callers never roll back on a notification.

use crate::config::WhatsAppConfig;
use crate::models::{DeliveryStatus, NotificationChannel, NotificationLog, TemplateType};
use crate::repository::{ClientStore, NotificationLogStore, SettingsStore, Store};
use crate::services::Clock;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use service_core::error::AppError;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Result of a successful delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub provider_id: Option<String>,
    pub channel: NotificationChannel,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Dispatch a templated notification to a client. Returns `Ok(None)`
    /// when the notification was skipped or could not be delivered.
    async fn dispatch(
        &self,
        client_id: Uuid,
        template_type: TemplateType,
        data: &Value,
    ) -> Result<Option<DeliveryReceipt>, AppError>;
}

/// Built-in message templates. Placeholders are `{key}` and are filled
/// from the dispatch data.
fn message_template(template_type: TemplateType) -> &'static str {
    match template_type {
        TemplateType::InvoiceSent => {
            "Dear {client_name}, invoice {invoice_number} for {amount} is ready. \
             Due by {due_date}. Pay online: {portal_link}"
        }
        TemplateType::PaymentReminder => {
            "Dear {client_name}, invoice {invoice_number} for {amount} is due on \
             {due_date}. Pay online: {portal_link}"
        }
        TemplateType::PaymentOverdue => {
            "Dear {client_name}, invoice {invoice_number} for {amount} is \
             {days_overdue} day(s) overdue. Please pay at the earliest: {portal_link}"
        }
        TemplateType::AppointmentReminder => {
            "Dear {client_name}, reminder for your appointment with {staff_name} on \
             {appointment_date} at {appointment_time}."
        }
        TemplateType::AppointmentCancelled => {
            "Dear {client_name}, your appointment on {appointment_date} at \
             {appointment_time} has been cancelled. Reason: {reason}"
        }
        TemplateType::PaymentReceived => {
            "Dear {client_name}, we received your payment of {amount} against \
             invoice {invoice_number}. Transaction: {transaction_id}"
        }
        TemplateType::TaxDeadline => {
            "Dear {client_name}, {deadline_name} is due on {deadline_date} \
             ({days_until} day(s) from now)."
        }
        TemplateType::DocumentExpiry => {
            "Dear {client_name}, your document {document_name} expires on \
             {expiry_date} ({days_until_expiry} day(s) from now)."
        }
    }
}

/// Fill `{key}` placeholders from the data object. Unknown placeholders
/// are left in place so a malformed payload is visible in the log.
fn render_template(template: &str, data: &Value) -> String {
    let mut message = template.to_string();
    if let Some(fields) = data.as_object() {
        for (key, value) in fields {
            let placeholder = format!("{{{}}}", key);
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            message = message.replace(&placeholder, &rendered);
        }
    }
    message
}

/// WhatsApp delivery over the messaging API.
pub struct WhatsAppDispatcher {
    store: Store,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppDispatcher {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: WhatsAppConfig) -> Self {
        Self {
            store,
            clock,
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn log(
        &self,
        firm_id: Uuid,
        client_id: Uuid,
        template_type: TemplateType,
        status: DeliveryStatus,
        message: String,
    ) {
        let log = NotificationLog {
            log_id: Uuid::new_v4(),
            firm_id,
            client_id,
            template_type: template_type.as_str().to_string(),
            channel: NotificationChannel::WhatsApp.as_str().to_string(),
            status: status.as_str().to_string(),
            message,
            created_utc: self.clock.now(),
        };

        if let Err(e) = self.store.notification_logs.append(&log).await {
            tracing::warn!(error = %e, client_id = %client_id, "Failed to write notification log");
        }
    }
}

#[async_trait]
impl NotificationDispatcher for WhatsAppDispatcher {
    #[tracing::instrument(skip(self, data), fields(client_id = %client_id, template = template_type.as_str()))]
    async fn dispatch(
        &self,
        client_id: Uuid,
        template_type: TemplateType,
        data: &Value,
    ) -> Result<Option<DeliveryReceipt>, AppError> {
        let client = self
            .store
            .clients
            .find(client_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

        let settings = match self.store.settings.find(client.firm_id).await? {
            Some(s) => s,
            None => {
                tracing::debug!(firm_id = %client.firm_id, "No firm settings, skipping notification");
                return Ok(None);
            }
        };

        if !self.config.enabled || !settings.enable_whatsapp_notifications {
            return Ok(None);
        }

        let instance = match &settings.whatsapp_instance {
            Some(instance) => instance.clone(),
            None => {
                tracing::warn!(firm_id = %client.firm_id, "WhatsApp instance not configured");
                return Ok(None);
            }
        };

        let number = match &client.whatsapp_number {
            Some(number) => number.clone(),
            None => {
                tracing::debug!(client_id = %client_id, "Client has no WhatsApp number");
                self.log(
                    client.firm_id,
                    client_id,
                    template_type,
                    DeliveryStatus::Skipped,
                    String::new(),
                )
                .await;
                return Ok(None);
            }
        };

        let message = render_template(message_template(template_type), data);

        let response = self
            .http
            .post(format!("{}/send-text", self.config.api_base))
            .bearer_auth(self.config.api_token.expose_secret())
            .json(&serde_json::json!({
                "instance_id": instance,
                "number": number,
                "text": message,
            }))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let provider_id = resp
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("message_id").and_then(|id| id.as_str().map(String::from)));

                self.log(
                    client.firm_id,
                    client_id,
                    template_type,
                    DeliveryStatus::Sent,
                    message,
                )
                .await;

                Ok(Some(DeliveryReceipt {
                    provider_id,
                    channel: NotificationChannel::WhatsApp,
                }))
            }
            Ok(resp) => {
                tracing::warn!(
                    status = %resp.status(),
                    client_id = %client_id,
                    "WhatsApp API rejected notification"
                );
                self.log(
                    client.firm_id,
                    client_id,
                    template_type,
                    DeliveryStatus::Failed,
                    message,
                )
                .await;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, client_id = %client_id, "WhatsApp API call failed");
                self.log(
                    client.firm_id,
                    client_id,
                    template_type,
                    DeliveryStatus::Failed,
                    message,
                )
                .await;
                Ok(None)
            }
        }
    }
}

/// A dispatch recorded by [`RecordingDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub client_id: Uuid,
    pub template_type: TemplateType,
    pub data: Value,
}

/// Recording dispatcher for tests. Every dispatch succeeds and is kept
/// for inspection.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<DispatchRecord>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<DispatchRecord> {
        self.sent.lock().expect("dispatcher lock poisoned").clone()
    }

    pub fn count(&self, template_type: TemplateType) -> usize {
        self.sent()
            .iter()
            .filter(|r| r.template_type == template_type)
            .count()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        client_id: Uuid,
        template_type: TemplateType,
        data: &Value,
    ) -> Result<Option<DeliveryReceipt>, AppError> {
        self.sent
            .lock()
            .expect("dispatcher lock poisoned")
            .push(DispatchRecord {
                client_id,
                template_type,
                data: data.clone(),
            });

        Ok(Some(DeliveryReceipt {
            provider_id: None,
            channel: NotificationChannel::WhatsApp,
        }))
    }
}

/// Dispatcher that always fails. Used to assert that financial state
/// changes survive collaborator failures.
pub struct FailingDispatcher;

#[async_trait]
impl NotificationDispatcher for FailingDispatcher {
    async fn dispatch(
        &self,
        _client_id: Uuid,
        _template_type: TemplateType,
        _data: &Value,
    ) -> Result<Option<DeliveryReceipt>, AppError> {
        Err(AppError::BadGateway("notification channel down".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_placeholders_from_data() {
        let message = render_template(
            message_template(TemplateType::PaymentReminder),
            &json!({
                "client_name": "Acme Traders",
                "invoice_number": "INV-0042",
                "amount": "11800.00",
                "due_date": "2026-02-15",
                "portal_link": "/portal/invoice/INV-0042",
            }),
        );

        assert!(message.contains("Acme Traders"));
        assert!(message.contains("INV-0042"));
        assert!(message.contains("2026-02-15"));
        assert!(!message.contains('{'));
    }

    #[test]
    fn leaves_unknown_placeholders_visible() {
        let message = render_template("Hello {missing}", &json!({"other": 1}));
        assert_eq!(message, "Hello {missing}");
    }
}
