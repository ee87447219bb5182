//! Sweep implementations.

use super::SweepSummary;
use crate::models::{
    tax_deadlines, Appointment, Document, Invoice, InvoiceStatus, ListInvoicesFilter,
    TemplateType,
};
use crate::repository::{
    AppointmentStore, ClientStore, DocumentStore, InvoiceStore, Store,
};
use crate::services::metrics::{record_error, record_reminder_dispatched};
use crate::services::{Clock, NotificationDispatcher, RecurrenceEngine};
use chrono::Duration;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Overdue day counts that trigger an escalation notice. Each bucket
/// fires once because the sweep runs once per calendar day; a missed
/// sweep day permanently skips that bucket (no backfill).
const OVERDUE_BUCKETS: [i64; 4] = [3, 7, 14, 30];

/// Days-until-due counts that trigger a payment reminder.
const DUE_BUCKETS: [i64; 2] = [3, 0];

/// Days-before-deadline counts for tax deadline broadcasts.
const TAX_DEADLINE_BUCKETS: [i64; 2] = [7, 1];

/// Window (in days) ahead of a document expiry during which daily
/// reminders go out.
const DOCUMENT_EXPIRY_WINDOW_DAYS: i64 = 30;

#[derive(Clone)]
pub struct ReminderScheduler {
    store: Store,
    notifier: Arc<dyn NotificationDispatcher>,
    recurrence: RecurrenceEngine,
    clock: Arc<dyn Clock>,
}

impl ReminderScheduler {
    pub fn new(
        store: Store,
        notifier: Arc<dyn NotificationDispatcher>,
        recurrence: RecurrenceEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            recurrence,
            clock,
        }
    }

    async fn client_name(&self, client_id: Uuid) -> String {
        match self.store.clients.find(client_id).await {
            Ok(Some(client)) => client.client_name,
            _ => String::new(),
        }
    }

    /// Daily sweep: payment reminders at 3 and 0 days before due,
    /// overdue notices at 3, 7, 14, and 30 days past due.
    #[tracing::instrument(skip(self))]
    pub async fn send_invoice_reminders(&self) -> Result<SweepSummary, AppError> {
        let today = self.clock.today();
        let invoices = self
            .store
            .invoices
            .list(&ListInvoicesFilter {
                statuses: Some(InvoiceStatus::open_statuses().to_vec()),
                ..Default::default()
            })
            .await?;

        let mut summary = SweepSummary::default();
        for invoice in invoices {
            summary.scanned += 1;

            let days_until_due = (invoice.due_date - today).num_days();
            let bucket = if DUE_BUCKETS.contains(&days_until_due) {
                Some((TemplateType::PaymentReminder, days_until_due))
            } else if days_until_due < 0 && OVERDUE_BUCKETS.contains(&(-days_until_due)) {
                Some((TemplateType::PaymentOverdue, -days_until_due))
            } else {
                None
            };

            let Some((template, days)) = bucket else {
                continue;
            };

            match self.send_invoice_reminder(&invoice, template, days).await {
                Ok(true) => summary.dispatched += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failed += 1;
                    record_error("sweep_entity", "invoice_reminders");
                    tracing::warn!(
                        error = %e,
                        invoice_id = %invoice.invoice_id,
                        "Failed to send invoice reminder"
                    );
                }
            }
        }

        Ok(summary)
    }

    async fn send_invoice_reminder(
        &self,
        invoice: &Invoice,
        template: TemplateType,
        days: i64,
    ) -> Result<bool, AppError> {
        let data = serde_json::json!({
            "client_name": self.client_name(invoice.client_id).await,
            "invoice_number": invoice.invoice_number,
            "amount": invoice.total_amount.to_string(),
            "due_date": invoice.due_date.to_string(),
            "portal_link": invoice.portal_link.clone().unwrap_or_default(),
            "days_overdue": if template == TemplateType::PaymentOverdue { days } else { 0 },
            "days_until_due": if template == TemplateType::PaymentReminder { days } else { 0 },
        });

        let receipt = self.notifier.dispatch(invoice.client_id, template, &data).await?;
        if receipt.is_some() {
            record_reminder_dispatched(template.as_str());
        }
        Ok(receipt.is_some())
    }

    /// Hourly sweep: 24-hour and 1-hour appointment reminders. The
    /// per-bucket sent markers keep each bucket to at most one dispatch
    /// even though the sweep runs every hour.
    #[tracing::instrument(skip(self))]
    pub async fn send_appointment_reminders(&self) -> Result<SweepSummary, AppError> {
        let today = self.clock.today();
        let now = self.clock.now().naive_utc();
        let mut summary = SweepSummary::default();

        let tomorrow = today + Duration::days(1);
        for appointment in self.store.appointments.scheduled_on(tomorrow).await? {
            summary.scanned += 1;
            if !appointment.send_reminder || appointment.reminder_24h_sent_utc.is_some() {
                continue;
            }
            self.process_appointment_bucket(&appointment, 24, &mut summary)
                .await;
        }

        let one_hour_later = now + Duration::hours(1);
        for appointment in self.store.appointments.scheduled_on(today).await? {
            summary.scanned += 1;
            if !appointment.send_reminder || appointment.reminder_1h_sent_utc.is_some() {
                continue;
            }
            let starts_at = appointment.starts_at();
            if !(now < starts_at && starts_at <= one_hour_later) {
                continue;
            }
            self.process_appointment_bucket(&appointment, 1, &mut summary)
                .await;
        }

        Ok(summary)
    }

    /// Dispatch one lead-time bucket and persist its sent marker. The
    /// marker is only skipped when the dispatch itself errored, so the
    /// bucket is retried on the next hourly run.
    async fn process_appointment_bucket(
        &self,
        appointment: &Appointment,
        hours_before: i64,
        summary: &mut SweepSummary,
    ) {
        let outcome = self.send_appointment_reminder(appointment, hours_before).await;
        match outcome {
            Ok(dispatched) => {
                if dispatched {
                    summary.dispatched += 1;
                }
                let mut updated = appointment.clone();
                let now = self.clock.now();
                if hours_before == 24 {
                    updated.reminder_24h_sent_utc = Some(now);
                } else {
                    updated.reminder_1h_sent_utc = Some(now);
                }
                updated.updated_utc = now;
                if let Err(e) = self.store.appointments.update(&updated).await {
                    summary.failed += 1;
                    record_error("sweep_entity", "appointment_reminders");
                    tracing::warn!(
                        error = %e,
                        appointment_id = %appointment.appointment_id,
                        "Failed to persist reminder marker"
                    );
                }
            }
            Err(e) => {
                summary.failed += 1;
                record_error("sweep_entity", "appointment_reminders");
                tracing::warn!(
                    error = %e,
                    appointment_id = %appointment.appointment_id,
                    hours_before = hours_before,
                    "Failed to send appointment reminder"
                );
            }
        }
    }

    async fn send_appointment_reminder(
        &self,
        appointment: &Appointment,
        hours_before: i64,
    ) -> Result<bool, AppError> {
        let data = serde_json::json!({
            "client_name": self.client_name(appointment.client_id).await,
            "appointment_date": appointment.appointment_date.to_string(),
            "appointment_time": appointment.appointment_time.format("%H:%M").to_string(),
            "staff_name": appointment.staff_name,
            "hours_before": hours_before,
        });

        let receipt = self
            .notifier
            .dispatch(
                appointment.client_id,
                TemplateType::AppointmentReminder,
                &data,
            )
            .await?;
        if receipt.is_some() {
            record_reminder_dispatched(TemplateType::AppointmentReminder.as_str());
        }
        Ok(receipt.is_some())
    }

    /// Daily sweep: statutory deadline broadcasts to every active client
    /// at 7 and 1 days before each calendar entry.
    #[tracing::instrument(skip(self))]
    pub async fn check_tax_deadlines(&self) -> Result<SweepSummary, AppError> {
        let today = self.clock.today();
        let mut summary = SweepSummary::default();

        for deadline in tax_deadlines() {
            let days_until = (deadline.date - today).num_days();
            if !TAX_DEADLINE_BUCKETS.contains(&days_until) {
                continue;
            }

            let clients = self.store.clients.list_active().await?;
            for client in clients {
                summary.scanned += 1;
                let data = serde_json::json!({
                    "client_name": client.client_name,
                    "deadline_name": deadline.label,
                    "deadline_date": deadline.date.to_string(),
                    "days_until": days_until,
                });

                match self
                    .notifier
                    .dispatch(client.client_id, TemplateType::TaxDeadline, &data)
                    .await
                {
                    Ok(Some(_)) => {
                        summary.dispatched += 1;
                        record_reminder_dispatched(TemplateType::TaxDeadline.as_str());
                    }
                    Ok(None) => {}
                    Err(e) => {
                        summary.failed += 1;
                        record_error("sweep_entity", "tax_deadlines");
                        tracing::warn!(
                            error = %e,
                            client_id = %client.client_id,
                            "Failed to send tax deadline reminder"
                        );
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Daily sweep: expiry reminders for documents expiring within the
    /// next 30 days. Fires once per sweep day per document.
    #[tracing::instrument(skip(self))]
    pub async fn check_document_expiry(&self) -> Result<SweepSummary, AppError> {
        let today = self.clock.today();
        let window_end = today + Duration::days(DOCUMENT_EXPIRY_WINDOW_DAYS);
        let documents = self
            .store
            .documents
            .expiring_within(today, window_end)
            .await?;

        let mut summary = SweepSummary::default();
        for document in documents {
            summary.scanned += 1;
            match self.send_document_expiry_reminder(&document, today).await {
                Ok(true) => summary.dispatched += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failed += 1;
                    record_error("sweep_entity", "document_expiry");
                    tracing::warn!(
                        error = %e,
                        document_id = %document.document_id,
                        "Failed to send document expiry reminder"
                    );
                }
            }
        }

        Ok(summary)
    }

    async fn send_document_expiry_reminder(
        &self,
        document: &Document,
        today: chrono::NaiveDate,
    ) -> Result<bool, AppError> {
        let Some(expiry_date) = document.expiry_date else {
            return Ok(false);
        };

        let data = serde_json::json!({
            "client_name": self.client_name(document.client_id).await,
            "document_name": document.document_name,
            "expiry_date": expiry_date.to_string(),
            "days_until_expiry": (expiry_date - today).num_days(),
        });

        let receipt = self
            .notifier
            .dispatch(document.client_id, TemplateType::DocumentExpiry, &data)
            .await?;
        if receipt.is_some() {
            record_reminder_dispatched(TemplateType::DocumentExpiry.as_str());
        }
        Ok(receipt.is_some())
    }

    /// Fixed-time sweep: generate successors for recurring invoices
    /// whose generation date has arrived.
    #[tracing::instrument(skip(self))]
    pub async fn generate_recurring_invoices(&self) -> Result<SweepSummary, AppError> {
        let today = self.clock.today();
        let due = self.store.invoices.recurring_due(today).await?;

        let mut summary = SweepSummary::default();
        for invoice in due {
            summary.scanned += 1;
            match self.recurrence.generate_successor(&invoice, today).await {
                Ok(Some(_)) => summary.dispatched += 1,
                Ok(None) => {}
                Err(e) => {
                    summary.failed += 1;
                    record_error("sweep_entity", "recurring_generation");
                    tracing::error!(
                        error = %e,
                        invoice_id = %invoice.invoice_id,
                        "Failed to generate recurring invoice"
                    );
                }
            }
        }

        Ok(summary)
    }
}
