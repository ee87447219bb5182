//! PostgreSQL backend for the repository traits.

use crate::models::{
    Appointment, Client, ClientStatus, Document, FirmSettings, Invoice, LineItem,
    ListDocumentsFilter, ListInvoicesFilter, NotificationLog, Payment,
};
use crate::repository::{
    AppointmentStore, ClientStore, DocumentStore, InvoiceStore, NotificationLogStore,
    PaymentStore, SettingsStore, StoreHealth,
};
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, firm_id, client_id, invoice_number, currency, \
     invoice_date, due_date, tax_rate, subtotal, tax_amount, total_amount, status, \
     payment_terms, is_recurring, frequency, next_generation_date, end_date, generated_from, \
     generation_period, auto_send_on_creation, portal_link, gateway_reference, created_utc, \
     updated_utc";

const PAYMENT_COLUMNS: &str = "payment_id, firm_id, invoice_id, client_id, amount, currency, \
     gateway, transaction_id, status, payment_date, reconciled, reconciliation_date, \
     gateway_response, created_utc, updated_utc";

const APPOINTMENT_COLUMNS: &str = "appointment_id, firm_id, client_id, assigned_staff_id, \
     staff_name, appointment_date, appointment_time, duration_minutes, status, send_reminder, \
     reminder_24h_sent_utc, reminder_1h_sent_utc, notes, created_utc, updated_utc";

const DOCUMENT_COLUMNS: &str = "document_id, firm_id, client_id, document_name, document_type, \
     file_size_bytes, upload_date, expiry_date, visibility, version_number, previous_version, \
     created_utc, updated_utc";

const CLIENT_COLUMNS: &str = "client_id, firm_id, client_name, email, whatsapp_number, status, \
     portal_access_enabled, created_utc, updated_utc";

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "practice-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for Database {
    async fn ping(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self, invoice, items), fields(invoice_id = %invoice.invoice_id))]
    async fn insert(&self, invoice: &Invoice, items: &[LineItem]) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        sqlx::query(&format!(
            r#"
            INSERT INTO invoices ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice.invoice_id)
        .bind(invoice.firm_id)
        .bind(invoice.client_id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.currency)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.tax_rate)
        .bind(invoice.subtotal)
        .bind(invoice.tax_amount)
        .bind(invoice.total_amount)
        .bind(&invoice.status)
        .bind(&invoice.payment_terms)
        .bind(invoice.is_recurring)
        .bind(&invoice.frequency)
        .bind(invoice.next_generation_date)
        .bind(invoice.end_date)
        .bind(invoice.generated_from)
        .bind(invoice.generation_period)
        .bind(invoice.auto_send_on_creation)
        .bind(&invoice.portal_link)
        .bind(&invoice.gateway_reference)
        .bind(invoice.created_utc)
        .bind(invoice.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Duplicate invoice: {}", db.message()))
            }
            other => db_error("Failed to insert invoice", other),
        })?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (line_item_id, invoice_id, description, quantity, rate, amount, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.line_item_id)
            .bind(item.invoice_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.rate)
            .bind(item.amount)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to insert line item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit invoice", e))?;

        timer.observe_duration();
        Ok(())
    }

    async fn find(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get invoice", e))?;

        timer.observe_duration();
        Ok(invoice)
    }

    async fn line_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        let items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, invoice_id, description, quantity, rate, amount, sort_order
            FROM invoice_line_items
            WHERE invoice_id = $1
            ORDER BY sort_order
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get line items", e))?;

        Ok(items)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn update(&self, invoice: &Invoice) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = $2, subtotal = $3, tax_amount = $4, total_amount = $5,
                next_generation_date = $6, portal_link = $7, gateway_reference = $8,
                updated_utc = $9
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(&invoice.status)
        .bind(invoice.subtotal)
        .bind(invoice.tax_amount)
        .bind(invoice.total_amount)
        .bind(invoice.next_generation_date)
        .bind(&invoice.portal_link)
        .bind(&invoice.gateway_reference)
        .bind(invoice.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update invoice", e))?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Invoice {} not found",
                invoice.invoice_id
            )));
        }
        Ok(())
    }

    async fn list(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let statuses: Option<Vec<String>> = filter.statuses.as_ref().map(|statuses| {
            statuses
                .iter()
                .map(|s| s.as_str().to_string())
                .collect()
        });

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE ($1::text[] IS NULL OR status = ANY($1))
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::date IS NULL OR invoice_date >= $3)
              AND ($4::date IS NULL OR invoice_date <= $4)
            ORDER BY invoice_date, invoice_number
            "#,
            INVOICE_COLUMNS
        ))
        .bind(statuses)
        .bind(filter.client_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list invoices", e))?;

        timer.observe_duration();
        Ok(invoices)
    }

    async fn recurring_due(&self, today: NaiveDate) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recurring_due"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE is_recurring AND next_generation_date <= $1
            ORDER BY next_generation_date
            "#,
            INVOICE_COLUMNS
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find due recurring invoices", e))?;

        timer.observe_duration();
        Ok(invoices)
    }

    async fn find_successor(
        &self,
        original_id: Uuid,
        period: NaiveDate,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE generated_from = $1 AND generation_period = $2
            "#,
            INVOICE_COLUMNS
        ))
        .bind(original_id)
        .bind(period)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find successor invoice", e))?;

        Ok(invoice)
    }
}

#[async_trait]
impl PaymentStore for Database {
    #[instrument(skip(self, payment), fields(payment_id = %payment.payment_id))]
    async fn insert(&self, payment: &Payment) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment"])
            .start_timer();

        sqlx::query(&format!(
            r#"
            INSERT INTO payments ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment.payment_id)
        .bind(payment.firm_id)
        .bind(payment.invoice_id)
        .bind(payment.client_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.gateway)
        .bind(&payment.transaction_id)
        .bind(&payment.status)
        .bind(payment.payment_date)
        .bind(payment.reconciled)
        .bind(payment.reconciliation_date)
        .bind(&payment.gateway_response)
        .bind(payment.created_utc)
        .bind(payment.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Duplicate payment: {}", db.message()))
            }
            other => db_error("Failed to insert payment", other),
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn find(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE payment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get payment", e))?;

        Ok(payment)
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE transaction_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get payment by transaction", e))?;

        Ok(payment)
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.payment_id))]
    async fn update(&self, payment: &Payment) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, reconciled = $3, reconciliation_date = $4,
                gateway_response = $5, updated_utc = $6
            WHERE payment_id = $1
            "#,
        )
        .bind(payment.payment_id)
        .bind(&payment.status)
        .bind(payment.reconciled)
        .bind(payment.reconciliation_date)
        .bind(&payment.gateway_response)
        .bind(payment.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update payment", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Payment {} not found",
                payment.payment_id
            )));
        }
        Ok(())
    }

    async fn list_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE invoice_id = $1 ORDER BY created_utc",
            PAYMENT_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list payments", e))?;

        Ok(payments)
    }

    async fn sum_completed(&self, invoice_id: Uuid) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_completed_payments"])
            .start_timer();

        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payments
            WHERE invoice_id = $1 AND status = 'completed'
            "#,
        )
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sum payments", e))?;

        timer.observe_duration();
        Ok(total)
    }
}

#[async_trait]
impl ClientStore for Database {
    async fn insert(&self, client: &Client) -> Result<(), AppError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO clients ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            CLIENT_COLUMNS
        ))
        .bind(client.client_id)
        .bind(client.firm_id)
        .bind(&client.client_name)
        .bind(&client.email)
        .bind(&client.whatsapp_number)
        .bind(&client.status)
        .bind(client.portal_access_enabled)
        .bind(client.created_utc)
        .bind(client.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert client", e))?;

        Ok(())
    }

    async fn find(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE client_id = $1",
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get client", e))?;

        Ok(client)
    }

    async fn list_active(&self) -> Result<Vec<Client>, AppError> {
        let clients = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE status = $1 ORDER BY client_name",
            CLIENT_COLUMNS
        ))
        .bind(ClientStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list clients", e))?;

        Ok(clients)
    }
}

#[async_trait]
impl AppointmentStore for Database {
    async fn insert(&self, appointment: &Appointment) -> Result<(), AppError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO appointments ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment.appointment_id)
        .bind(appointment.firm_id)
        .bind(appointment.client_id)
        .bind(appointment.assigned_staff_id)
        .bind(&appointment.staff_name)
        .bind(appointment.appointment_date)
        .bind(appointment.appointment_time)
        .bind(appointment.duration_minutes)
        .bind(&appointment.status)
        .bind(appointment.send_reminder)
        .bind(appointment.reminder_24h_sent_utc)
        .bind(appointment.reminder_1h_sent_utc)
        .bind(&appointment.notes)
        .bind(appointment.created_utc)
        .bind(appointment.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert appointment", e))?;

        Ok(())
    }

    async fn find(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppError> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {} FROM appointments WHERE appointment_id = $1",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get appointment", e))?;

        Ok(appointment)
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET status = $2, reminder_24h_sent_utc = $3, reminder_1h_sent_utc = $4,
                notes = $5, updated_utc = $6
            WHERE appointment_id = $1
            "#,
        )
        .bind(appointment.appointment_id)
        .bind(&appointment.status)
        .bind(appointment.reminder_24h_sent_utc)
        .bind(appointment.reminder_1h_sent_utc)
        .bind(&appointment.notes)
        .bind(appointment.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update appointment", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Appointment {} not found",
                appointment.appointment_id
            )));
        }
        Ok(())
    }

    async fn scheduled_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["appointments_scheduled_on"])
            .start_timer();

        let appointments = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {}
            FROM appointments
            WHERE appointment_date = $1 AND status = 'scheduled'
            ORDER BY appointment_time
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list appointments", e))?;

        timer.observe_duration();
        Ok(appointments)
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn insert(&self, document: &Document) -> Result<(), AppError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO documents ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(document.document_id)
        .bind(document.firm_id)
        .bind(document.client_id)
        .bind(&document.document_name)
        .bind(&document.document_type)
        .bind(document.file_size_bytes)
        .bind(document.upload_date)
        .bind(document.expiry_date)
        .bind(&document.visibility)
        .bind(document.version_number)
        .bind(document.previous_version)
        .bind(document.created_utc)
        .bind(document.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert document", e))?;

        Ok(())
    }

    async fn find(&self, document_id: Uuid) -> Result<Option<Document>, AppError> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE document_id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get document", e))?;

        Ok(document)
    }

    async fn list(&self, filter: &ListDocumentsFilter) -> Result<Vec<Document>, AppError> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            r#"
            SELECT {}
            FROM documents
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND (NOT $2 OR visibility = 'client_accessible')
            ORDER BY upload_date, document_name
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(filter.client_id)
        .bind(filter.client_accessible_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list documents", e))?;

        Ok(documents)
    }

    async fn expiring_within(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["documents_expiring"])
            .start_timer();

        let documents = sqlx::query_as::<_, Document>(&format!(
            r#"
            SELECT {}
            FROM documents
            WHERE expiry_date >= $1 AND expiry_date <= $2
            ORDER BY expiry_date
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list expiring documents", e))?;

        timer.observe_duration();
        Ok(documents)
    }
}

#[async_trait]
impl SettingsStore for Database {
    async fn find(&self, firm_id: Uuid) -> Result<Option<FirmSettings>, AppError> {
        let settings = sqlx::query_as::<_, FirmSettings>(
            r#"
            SELECT firm_id, firm_name, enable_whatsapp_notifications, whatsapp_instance,
                   default_gateway, created_utc, updated_utc
            FROM firm_settings
            WHERE firm_id = $1
            "#,
        )
        .bind(firm_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get firm settings", e))?;

        Ok(settings)
    }

    async fn upsert(&self, settings: &FirmSettings) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO firm_settings (firm_id, firm_name, enable_whatsapp_notifications,
                                       whatsapp_instance, default_gateway, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (firm_id) DO UPDATE
            SET firm_name = EXCLUDED.firm_name,
                enable_whatsapp_notifications = EXCLUDED.enable_whatsapp_notifications,
                whatsapp_instance = EXCLUDED.whatsapp_instance,
                default_gateway = EXCLUDED.default_gateway,
                updated_utc = EXCLUDED.updated_utc
            "#,
        )
        .bind(settings.firm_id)
        .bind(&settings.firm_name)
        .bind(settings.enable_whatsapp_notifications)
        .bind(&settings.whatsapp_instance)
        .bind(&settings.default_gateway)
        .bind(settings.created_utc)
        .bind(settings.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to upsert firm settings", e))?;

        Ok(())
    }
}

#[async_trait]
impl NotificationLogStore for Database {
    async fn append(&self, log: &NotificationLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notification_logs (log_id, firm_id, client_id, template_type, channel,
                                           status, message, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.log_id)
        .bind(log.firm_id)
        .bind(log.client_id)
        .bind(&log.template_type)
        .bind(&log.channel)
        .bind(&log.status)
        .bind(&log.message)
        .bind(log.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to append notification log", e))?;

        Ok(())
    }

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<NotificationLog>, AppError> {
        let logs = sqlx::query_as::<_, NotificationLog>(
            r#"
            SELECT log_id, firm_id, client_id, template_type, channel, status, message, created_utc
            FROM notification_logs
            WHERE client_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list notification logs", e))?;

        Ok(logs)
    }
}
