//! In-memory repository backend.

use super::{
    AppointmentStore, ClientStore, DocumentStore, InvoiceStore, NotificationLogStore,
    PaymentStore, SettingsStore, StoreHealth,
};
use crate::models::{
    Appointment, AppointmentStatus, Client, ClientStatus, Document, DocumentVisibility,
    FirmSettings, Invoice, InvoiceStatus, LineItem, ListDocumentsFilter, ListInvoicesFilter,
    NotificationLog, Payment, PaymentStatus,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Map-backed store. Each entity lives in its own `RwLock`-guarded map,
/// mirroring the single-record read/write granularity of the SQL backend.
#[derive(Default)]
pub struct MemoryStore {
    invoices: RwLock<HashMap<Uuid, Invoice>>,
    line_items: RwLock<HashMap<Uuid, Vec<LineItem>>>,
    payments: RwLock<HashMap<Uuid, Payment>>,
    clients: RwLock<HashMap<Uuid, Client>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    documents: RwLock<HashMap<Uuid, Document>>,
    settings: RwLock<HashMap<Uuid, FirmSettings>>,
    notification_logs: RwLock<Vec<NotificationLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn insert(&self, invoice: &Invoice, items: &[LineItem]) -> Result<(), AppError> {
        // Enforce the one-successor-per-period guard the SQL schema
        // enforces with a unique index.
        if let (Some(original), Some(period)) = (invoice.generated_from, invoice.generation_period)
        {
            let invoices = self.invoices.read().await;
            let duplicate = invoices.values().any(|i| {
                i.generated_from == Some(original) && i.generation_period == Some(period)
            });
            if duplicate {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "successor already generated for period {}",
                    period
                )));
            }
        }

        self.invoices
            .write()
            .await
            .insert(invoice.invoice_id, invoice.clone());
        self.line_items
            .write()
            .await
            .insert(invoice.invoice_id, items.to_vec());
        Ok(())
    }

    async fn find(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.invoices.read().await.get(&invoice_id).cloned())
    }

    async fn line_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        Ok(self
            .line_items
            .read()
            .await
            .get(&invoice_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), AppError> {
        let mut invoices = self.invoices.write().await;
        if !invoices.contains_key(&invoice.invoice_id) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "invoice {} not found",
                invoice.invoice_id
            )));
        }
        invoices.insert(invoice.invoice_id, invoice.clone());
        Ok(())
    }

    async fn list(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let invoices = self.invoices.read().await;
        let mut result: Vec<Invoice> = invoices
            .values()
            .filter(|i| {
                if let Some(statuses) = &filter.statuses {
                    if !statuses.contains(&InvoiceStatus::from_string(&i.status)) {
                        return false;
                    }
                }
                if let Some(client_id) = filter.client_id {
                    if i.client_id != client_id {
                        return false;
                    }
                }
                if let Some(start) = filter.start_date {
                    if i.invoice_date < start {
                        return false;
                    }
                }
                if let Some(end) = filter.end_date {
                    if i.invoice_date > end {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        result.sort_by_key(|i| (i.invoice_date, i.invoice_number.clone()));
        Ok(result)
    }

    async fn recurring_due(&self, today: NaiveDate) -> Result<Vec<Invoice>, AppError> {
        let invoices = self.invoices.read().await;
        let mut result: Vec<Invoice> = invoices
            .values()
            .filter(|i| {
                i.is_recurring
                    && i.next_generation_date
                        .map(|d| d <= today)
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        result.sort_by_key(|i| i.next_generation_date);
        Ok(result)
    }

    async fn find_successor(
        &self,
        original_id: Uuid,
        period: NaiveDate,
    ) -> Result<Option<Invoice>, AppError> {
        let invoices = self.invoices.read().await;
        Ok(invoices
            .values()
            .find(|i| {
                i.generated_from == Some(original_id) && i.generation_period == Some(period)
            })
            .cloned())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert(&self, payment: &Payment) -> Result<(), AppError> {
        self.payments
            .write()
            .await
            .insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn find(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.payments.read().await.get(&payment_id).cloned())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|p| p.transaction_id == transaction_id)
            .cloned())
    }

    async fn update(&self, payment: &Payment) -> Result<(), AppError> {
        let mut payments = self.payments.write().await;
        if !payments.contains_key(&payment.payment_id) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "payment {} not found",
                payment.payment_id
            )));
        }
        payments.insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn list_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let payments = self.payments.read().await;
        let mut result: Vec<Payment> = payments
            .values()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect();
        result.sort_by_key(|p| p.created_utc);
        Ok(result)
    }

    async fn sum_completed(&self, invoice_id: Uuid) -> Result<Decimal, AppError> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .filter(|p| {
                p.invoice_id == invoice_id
                    && PaymentStatus::from_string(&p.status) == PaymentStatus::Completed
            })
            .map(|p| p.amount)
            .sum())
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn insert(&self, client: &Client) -> Result<(), AppError> {
        self.clients
            .write()
            .await
            .insert(client.client_id, client.clone());
        Ok(())
    }

    async fn find(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        Ok(self.clients.read().await.get(&client_id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Client>, AppError> {
        let clients = self.clients.read().await;
        let mut result: Vec<Client> = clients
            .values()
            .filter(|c| ClientStatus::from_string(&c.status) == ClientStatus::Active)
            .cloned()
            .collect();
        result.sort_by_key(|c| c.client_name.clone());
        Ok(result)
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn insert(&self, appointment: &Appointment) -> Result<(), AppError> {
        self.appointments
            .write()
            .await
            .insert(appointment.appointment_id, appointment.clone());
        Ok(())
    }

    async fn find(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppError> {
        Ok(self
            .appointments
            .read()
            .await
            .get(&appointment_id)
            .cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), AppError> {
        let mut appointments = self.appointments.write().await;
        if !appointments.contains_key(&appointment.appointment_id) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "appointment {} not found",
                appointment.appointment_id
            )));
        }
        appointments.insert(appointment.appointment_id, appointment.clone());
        Ok(())
    }

    async fn scheduled_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppError> {
        let appointments = self.appointments.read().await;
        let mut result: Vec<Appointment> = appointments
            .values()
            .filter(|a| {
                a.appointment_date == date
                    && AppointmentStatus::from_string(&a.status) == AppointmentStatus::Scheduled
            })
            .cloned()
            .collect();
        result.sort_by_key(|a| a.appointment_time);
        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, document: &Document) -> Result<(), AppError> {
        self.documents
            .write()
            .await
            .insert(document.document_id, document.clone());
        Ok(())
    }

    async fn find(&self, document_id: Uuid) -> Result<Option<Document>, AppError> {
        Ok(self.documents.read().await.get(&document_id).cloned())
    }

    async fn list(&self, filter: &ListDocumentsFilter) -> Result<Vec<Document>, AppError> {
        let documents = self.documents.read().await;
        let mut result: Vec<Document> = documents
            .values()
            .filter(|d| {
                if let Some(client_id) = filter.client_id {
                    if d.client_id != client_id {
                        return false;
                    }
                }
                if filter.client_accessible_only
                    && DocumentVisibility::from_string(&d.visibility)
                        != DocumentVisibility::ClientAccessible
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        result.sort_by_key(|d| (d.upload_date, d.document_name.clone()));
        Ok(result)
    }

    async fn expiring_within(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Document>, AppError> {
        let documents = self.documents.read().await;
        let mut result: Vec<Document> = documents
            .values()
            .filter(|d| d.expiry_date.map(|e| e >= start && e <= end).unwrap_or(false))
            .cloned()
            .collect();
        result.sort_by_key(|d| d.expiry_date);
        Ok(result)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn find(&self, firm_id: Uuid) -> Result<Option<FirmSettings>, AppError> {
        Ok(self.settings.read().await.get(&firm_id).cloned())
    }

    async fn upsert(&self, settings: &FirmSettings) -> Result<(), AppError> {
        self.settings
            .write()
            .await
            .insert(settings.firm_id, settings.clone());
        Ok(())
    }
}

#[async_trait]
impl NotificationLogStore for MemoryStore {
    async fn append(&self, log: &NotificationLog) -> Result<(), AppError> {
        self.notification_logs.write().await.push(log.clone());
        Ok(())
    }

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<NotificationLog>, AppError> {
        let logs = self.notification_logs.read().await;
        Ok(logs
            .iter()
            .filter(|l| l.client_id == client_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
