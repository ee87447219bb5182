//! Invoice ledger.
//!
//! Owns invoice totals, status derivation, and submission side effects.
//! Totals are recomputed before every persist; malformed line items are
//! rejected, never clamped.

use crate::models::{
    CreateInvoice, Invoice, InvoiceStatus, LineItem, TemplateType,
};
use crate::repository::{ClientStore, InvoiceStore, Store};
use crate::services::recurrence::advance_schedule;
use crate::services::{Clock, NotificationDispatcher};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Recompute item amounts, subtotal, tax, and total in place.
///
/// `total_amount = round(subtotal + subtotal * tax_rate / 100, 2)`.
pub fn recompute_totals(invoice: &mut Invoice, items: &mut [LineItem]) -> Result<(), AppError> {
    if invoice.tax_rate < Decimal::ZERO || invoice.tax_rate > Decimal::from(100) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tax rate must be between 0 and 100, got {}",
            invoice.tax_rate
        )));
    }

    let mut subtotal = Decimal::ZERO;
    for item in items.iter_mut() {
        if item.quantity < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item '{}' has negative quantity",
                item.description
            )));
        }
        if item.rate < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item '{}' has negative rate",
                item.description
            )));
        }

        item.amount = (item.quantity * item.rate).round_dp(2);
        subtotal += item.amount;
    }

    invoice.subtotal = subtotal.round_dp(2);
    invoice.tax_amount = (invoice.subtotal * invoice.tax_rate / Decimal::from(100)).round_dp(2);
    invoice.total_amount = (invoice.subtotal + invoice.tax_amount).round_dp(2);
    Ok(())
}

/// Derive the date-dependent status. Only promotes Unpaid to Overdue;
/// payment-derived and cancelled statuses are never reclassified here.
pub fn derive_status(invoice: &Invoice, today: NaiveDate) -> InvoiceStatus {
    let current = InvoiceStatus::from_string(&invoice.status);
    if current == InvoiceStatus::Unpaid && invoice.due_date < today {
        InvoiceStatus::Overdue
    } else {
        current
    }
}

/// Invoice ledger service.
#[derive(Clone)]
pub struct InvoiceLedger {
    store: Store,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl InvoiceLedger {
    pub fn new(store: Store, notifier: Arc<dyn NotificationDispatcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    /// Create and finalize an invoice.
    #[tracing::instrument(skip(self, input), fields(invoice_number = %input.invoice_number))]
    pub async fn create_invoice(&self, input: CreateInvoice) -> Result<Invoice, AppError> {
        self.store
            .clients
            .find(input.client_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

        let now = self.clock.now();
        let invoice_id = Uuid::new_v4();

        let invoice = Invoice {
            invoice_id,
            firm_id: input.firm_id,
            client_id: input.client_id,
            invoice_number: input.invoice_number,
            currency: input.currency,
            invoice_date: input.invoice_date,
            due_date: input.due_date,
            tax_rate: input.tax_rate,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            status: InvoiceStatus::Unpaid.as_str().to_string(),
            payment_terms: input.payment_terms.as_str().to_string(),
            is_recurring: input.is_recurring,
            frequency: input.frequency.map(|f| f.as_str().to_string()),
            next_generation_date: input.next_generation_date,
            end_date: input.end_date,
            generated_from: None,
            generation_period: None,
            auto_send_on_creation: input.auto_send_on_creation,
            portal_link: None,
            gateway_reference: None,
            created_utc: now,
            updated_utc: now,
        };

        let items: Vec<LineItem> = input
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| LineItem {
                line_item_id: Uuid::new_v4(),
                invoice_id,
                description: item.description,
                quantity: item.quantity,
                rate: item.rate,
                amount: Decimal::ZERO,
                sort_order: i as i32,
            })
            .collect();

        self.insert_and_submit(invoice, items).await
    }

    /// Persist and finalize an already-built invoice: totals recomputed,
    /// portal link assigned, auto-send performed, and the first
    /// generation date scheduled for recurring invoices.
    pub async fn insert_and_submit(
        &self,
        mut invoice: Invoice,
        mut items: Vec<LineItem>,
    ) -> Result<Invoice, AppError> {
        recompute_totals(&mut invoice, &mut items)?;

        let today = self.clock.today();
        invoice.status = derive_status(&invoice, today).as_str().to_string();

        if invoice.portal_link.is_none() {
            invoice.portal_link = Some(format!("/portal/invoice/{}", invoice.invoice_number));
        }

        self.store.invoices.insert(&invoice, &items).await?;

        tracing::info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total_amount,
            "Invoice finalized"
        );

        if invoice.auto_send_on_creation {
            self.send_invoice_notification(&invoice).await;
        }

        if invoice.is_recurring && invoice.next_generation_date.is_none() {
            if let Some(frequency) = invoice
                .frequency
                .as_deref()
                .and_then(crate::models::Frequency::from_string)
            {
                let first_generation = advance_schedule(invoice.invoice_date, frequency);
                invoice.next_generation_date = Some(first_generation);
                invoice.updated_utc = self.clock.now();
                self.store.invoices.update(&invoice).await?;

                tracing::info!(
                    invoice_id = %invoice.invoice_id,
                    next_generation_date = %first_generation,
                    "Recurring invoice scheduled"
                );
            }
        }

        Ok(invoice)
    }

    /// Notification failure never fails invoice submission.
    async fn send_invoice_notification(&self, invoice: &Invoice) {
        let client_name = match self.store.clients.find(invoice.client_id).await {
            Ok(Some(client)) => client.client_name,
            _ => String::new(),
        };

        let data = serde_json::json!({
            "client_name": client_name,
            "invoice_number": invoice.invoice_number,
            "amount": invoice.total_amount.to_string(),
            "due_date": invoice.due_date.to_string(),
            "portal_link": invoice.portal_link.clone().unwrap_or_default(),
        });

        if let Err(e) = self
            .notifier
            .dispatch(invoice.client_id, TemplateType::InvoiceSent, &data)
            .await
        {
            tracing::warn!(
                error = %e,
                invoice_id = %invoice.invoice_id,
                "Failed to send invoice notification"
            );
        }
    }

    /// Re-derive the date-dependent status and persist it if changed.
    pub async fn refresh_status(&self, invoice_id: Uuid) -> Result<Invoice, AppError> {
        let mut invoice = self
            .store
            .invoices
            .find(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let derived = derive_status(&invoice, self.clock.today());
        if derived.as_str() != invoice.status {
            invoice.status = derived.as_str().to_string();
            invoice.updated_utc = self.clock.now();
            self.store.invoices.update(&invoice).await?;
        }

        Ok(invoice)
    }

    /// Cancel an invoice. Cancellation is the only status override that
    /// is not a function of dates and payments.
    pub async fn cancel_invoice(&self, invoice_id: Uuid) -> Result<Invoice, AppError> {
        let mut invoice = self
            .store
            .invoices
            .find(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        if InvoiceStatus::from_string(&invoice.status) == InvoiceStatus::Paid {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Paid invoices cannot be cancelled"
            )));
        }

        invoice.status = InvoiceStatus::Cancelled.as_str().to_string();
        invoice.updated_utc = self.clock.now();
        self.store.invoices.update(&invoice).await?;

        tracing::info!(invoice_id = %invoice_id, "Invoice cancelled");
        Ok(invoice)
    }
}
