//! Repository traits for the persistence boundary.
//!
//! Core logic depends only on these traits. `services::database::Database`
//! implements them against PostgreSQL; `MemoryStore` backs tests and
//! single-process deployments without a database.

mod memory;

pub use memory::MemoryStore;

use crate::models::{
    Appointment, Client, Document, FirmSettings, Invoice, LineItem, ListDocumentsFilter,
    ListInvoicesFilter, NotificationLog, Payment,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn insert(&self, invoice: &Invoice, items: &[LineItem]) -> Result<(), AppError>;
    async fn find(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;
    async fn line_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError>;
    async fn update(&self, invoice: &Invoice) -> Result<(), AppError>;
    async fn list(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError>;
    /// Recurring invoices whose next generation date has arrived.
    async fn recurring_due(&self, today: NaiveDate) -> Result<Vec<Invoice>, AppError>;
    /// The successor generated from `original_id` for a given period, if any.
    async fn find_successor(
        &self,
        original_id: Uuid,
        period: NaiveDate,
    ) -> Result<Option<Invoice>, AppError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<(), AppError>;
    async fn find(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, AppError>;
    async fn update(&self, payment: &Payment) -> Result<(), AppError>;
    async fn list_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>, AppError>;
    /// Sum of all completed payment amounts against an invoice.
    async fn sum_completed(&self, invoice_id: Uuid) -> Result<Decimal, AppError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn insert(&self, client: &Client) -> Result<(), AppError>;
    async fn find(&self, client_id: Uuid) -> Result<Option<Client>, AppError>;
    async fn list_active(&self) -> Result<Vec<Client>, AppError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<(), AppError>;
    async fn find(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppError>;
    async fn update(&self, appointment: &Appointment) -> Result<(), AppError>;
    /// Scheduled appointments on a given date.
    async fn scheduled_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: &Document) -> Result<(), AppError>;
    async fn find(&self, document_id: Uuid) -> Result<Option<Document>, AppError>;
    async fn list(&self, filter: &ListDocumentsFilter) -> Result<Vec<Document>, AppError>;
    /// Documents whose expiry date falls within `[start, end]`.
    async fn expiring_within(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Document>, AppError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn find(&self, firm_id: Uuid) -> Result<Option<FirmSettings>, AppError>;
    async fn upsert(&self, settings: &FirmSettings) -> Result<(), AppError>;
}

#[async_trait]
pub trait NotificationLogStore: Send + Sync {
    async fn append(&self, log: &NotificationLog) -> Result<(), AppError>;
    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<NotificationLog>, AppError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;
}

/// Bundle of repositories handed to services and handlers.
#[derive(Clone)]
pub struct Store {
    pub invoices: Arc<dyn InvoiceStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub clients: Arc<dyn ClientStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub notification_logs: Arc<dyn NotificationLogStore>,
    pub health: Arc<dyn StoreHealth>,
}

impl Store {
    /// Build a store backed entirely by in-memory maps.
    pub fn in_memory() -> Self {
        let backend = Arc::new(MemoryStore::new());
        Self {
            invoices: backend.clone(),
            payments: backend.clone(),
            clients: backend.clone(),
            appointments: backend.clone(),
            documents: backend.clone(),
            settings: backend.clone(),
            notification_logs: backend.clone(),
            health: backend,
        }
    }

    /// Build a store backed by the given PostgreSQL database.
    pub fn postgres(db: Arc<crate::services::Database>) -> Self {
        Self {
            invoices: db.clone(),
            payments: db.clone(),
            clients: db.clone(),
            appointments: db.clone(),
            documents: db.clone(),
            settings: db.clone(),
            notification_logs: db.clone(),
            health: db,
        }
    }
}
