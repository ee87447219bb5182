//! Test fixture for practice-service integration tests.
//!
//! Wires the core services against the in-memory store, a pinned clock,
//! and a recording notification dispatcher.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use practice_service::config::{RazorpayConfig, StripeConfig};
use practice_service::models::{
    Appointment, AppointmentStatus, Client, ClientStatus, CreateInvoice, CreateLineItem,
    CreatePayment, Document, DocumentVisibility, FirmSettings, Frequency, Gateway, Invoice,
    Payment, PaymentStatus, PaymentTerms,
};
use practice_service::repository::{
    AppointmentStore, ClientStore, DocumentStore, InvoiceStore, SettingsStore, Store,
};
use practice_service::scheduler::ReminderScheduler;
use practice_service::services::{
    Clock, FixedClock, GatewayRegistry, InvoiceLedger, PaymentReconciler, RecordingDispatcher,
    RecurrenceEngine,
};
use rust_decimal::Decimal;
use secrecy::Secret;
use std::sync::Arc;
use uuid::Uuid;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub fn money(value: &str) -> Decimal {
    value.parse().expect("valid decimal")
}

/// Gateway registry with inert test credentials.
pub fn test_gateways() -> GatewayRegistry {
    GatewayRegistry::new(
        RazorpayConfig {
            api_base: "http://localhost:9999".to_string(),
            key_id: String::new(),
            key_secret: Secret::new(String::new()),
            webhook_secret: Secret::new("test-webhook-secret".to_string()),
        },
        StripeConfig {
            api_base: "http://localhost:9999".to_string(),
            secret_key: Secret::new(String::new()),
            webhook_secret: Secret::new("test-webhook-secret".to_string()),
        },
    )
}

pub struct TestContext {
    pub store: Store,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingDispatcher>,
    pub ledger: InvoiceLedger,
    pub reconciler: PaymentReconciler,
    pub recurrence: RecurrenceEngine,
    pub scheduler: ReminderScheduler,
    pub firm_id: Uuid,
}

impl TestContext {
    pub async fn new(today: NaiveDate) -> Self {
        let store = Store::in_memory();
        let clock = Arc::new(FixedClock::at_date(today));
        let notifier = Arc::new(RecordingDispatcher::new());
        let gateways = test_gateways();

        let ledger = InvoiceLedger::new(store.clone(), notifier.clone(), clock.clone());
        let reconciler = PaymentReconciler::new(
            store.clone(),
            notifier.clone(),
            gateways,
            clock.clone(),
        );
        let recurrence = RecurrenceEngine::new(store.clone(), ledger.clone(), clock.clone());
        let scheduler = ReminderScheduler::new(
            store.clone(),
            notifier.clone(),
            recurrence.clone(),
            clock.clone(),
        );

        let firm_id = Uuid::new_v4();
        let now = clock.now();
        store
            .settings
            .upsert(&FirmSettings {
                firm_id,
                firm_name: "Sharma & Associates".to_string(),
                enable_whatsapp_notifications: true,
                whatsapp_instance: Some("instance-1".to_string()),
                default_gateway: Gateway::Razorpay.as_str().to_string(),
                created_utc: now,
                updated_utc: now,
            })
            .await
            .expect("settings upsert");

        Self {
            store,
            clock,
            notifier,
            ledger,
            reconciler,
            recurrence,
            scheduler,
            firm_id,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn add_client(&self, name: &str) -> Client {
        let now = self.clock.now();
        let client = Client {
            client_id: Uuid::new_v4(),
            firm_id: self.firm_id,
            client_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            whatsapp_number: Some("+919876543210".to_string()),
            status: ClientStatus::Active.as_str().to_string(),
            portal_access_enabled: true,
            created_utc: now,
            updated_utc: now,
        };
        self.store.clients.insert(&client).await.expect("client insert");
        client
    }

    pub async fn add_inactive_client(&self, name: &str) -> Client {
        let mut client = self.add_client(name).await;
        client.status = ClientStatus::Inactive.as_str().to_string();
        // Re-insert with the updated status; the in-memory store upserts.
        self.store.clients.insert(&client).await.expect("client insert");
        client
    }

    pub fn invoice_input(&self, client: &Client, number: &str, total: &str) -> CreateInvoice {
        CreateInvoice {
            firm_id: self.firm_id,
            client_id: client.client_id,
            invoice_number: number.to_string(),
            currency: "INR".to_string(),
            invoice_date: self.today(),
            due_date: self.today(),
            tax_rate: Decimal::ZERO,
            payment_terms: PaymentTerms::Immediate,
            is_recurring: false,
            frequency: None,
            next_generation_date: None,
            end_date: None,
            auto_send_on_creation: false,
            items: vec![CreateLineItem {
                description: "Professional services".to_string(),
                quantity: Decimal::ONE,
                rate: money(total),
            }],
        }
    }

    /// Create a plain invoice due on the given date.
    pub async fn create_invoice_due(
        &self,
        client: &Client,
        number: &str,
        total: &str,
        due_date: NaiveDate,
    ) -> Invoice {
        let mut input = self.invoice_input(client, number, total);
        input.due_date = due_date;
        self.ledger.create_invoice(input).await.expect("invoice created")
    }

    /// Create a monthly recurring invoice with an explicit first
    /// generation date.
    pub async fn create_recurring_invoice(
        &self,
        client: &Client,
        number: &str,
        total: &str,
        due_date: NaiveDate,
        frequency: Frequency,
        next_generation_date: NaiveDate,
    ) -> Invoice {
        let mut input = self.invoice_input(client, number, total);
        input.due_date = due_date;
        input.payment_terms = PaymentTerms::Net30;
        input.is_recurring = true;
        input.frequency = Some(frequency);
        input.next_generation_date = Some(next_generation_date);
        self.ledger.create_invoice(input).await.expect("invoice created")
    }

    /// Record a completed manual payment against an invoice.
    pub async fn pay(&self, invoice: &Invoice, amount: &str) -> Payment {
        self.reconciler
            .record_payment(CreatePayment {
                firm_id: invoice.firm_id,
                invoice_id: invoice.invoice_id,
                client_id: invoice.client_id,
                amount: money(amount),
                currency: invoice.currency.clone(),
                gateway: Gateway::Manual,
                transaction_id: format!("txn-{}", Uuid::new_v4()),
                status: PaymentStatus::Completed,
                payment_date: self.today(),
                gateway_response: None,
            })
            .await
            .expect("payment recorded")
    }

    pub async fn add_appointment(
        &self,
        client: &Client,
        appointment_date: NaiveDate,
        appointment_time: NaiveTime,
    ) -> Appointment {
        let now = self.clock.now();
        let appointment = Appointment {
            appointment_id: Uuid::new_v4(),
            firm_id: self.firm_id,
            client_id: client.client_id,
            assigned_staff_id: Uuid::new_v4(),
            staff_name: "CA Priya Nair".to_string(),
            appointment_date,
            appointment_time,
            duration_minutes: 30,
            status: AppointmentStatus::Scheduled.as_str().to_string(),
            send_reminder: true,
            reminder_24h_sent_utc: None,
            reminder_1h_sent_utc: None,
            notes: None,
            created_utc: now,
            updated_utc: now,
        };
        self.store
            .appointments
            .insert(&appointment)
            .await
            .expect("appointment insert");
        appointment
    }

    pub async fn add_document(
        &self,
        client: &Client,
        name: &str,
        expiry_date: Option<NaiveDate>,
    ) -> Document {
        let now = self.clock.now();
        let document = Document {
            document_id: Uuid::new_v4(),
            firm_id: self.firm_id,
            client_id: client.client_id,
            document_name: name.to_string(),
            document_type: "PDF".to_string(),
            file_size_bytes: 128 * 1024,
            upload_date: self.today(),
            expiry_date,
            visibility: DocumentVisibility::ClientAccessible.as_str().to_string(),
            version_number: 1,
            previous_version: None,
            created_utc: now,
            updated_utc: now,
        };
        self.store
            .documents
            .insert(&document)
            .await
            .expect("document insert");
        document
    }

    pub async fn reload_invoice(&self, invoice: &Invoice) -> Invoice {
        self.store
            .invoices
            .find(invoice.invoice_id)
            .await
            .expect("store read")
            .expect("invoice exists")
    }
}
