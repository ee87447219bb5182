//! Recurring invoice generation.
//!
//! The successor is persisted before the template's schedule advances.
//! If the process dies between the two writes, the next sweep finds the
//! existing successor for the period and repairs the schedule instead of
//! generating a duplicate.

use crate::models::{Frequency, Invoice, InvoiceStatus, LineItem, PaymentTerms};
use crate::repository::{InvoiceStore, Store};
use crate::services::metrics::record_invoice_generated;
use crate::services::{Clock, InvoiceLedger};
use chrono::{Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Advance a generation date by one frequency period. Calendar-correct:
/// month-end dates clamp to the last valid day of the target month, so
/// multi-year schedules do not drift.
pub fn advance_schedule(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    date + Months::new(frequency.months())
}

#[derive(Clone)]
pub struct RecurrenceEngine {
    store: Store,
    ledger: InvoiceLedger,
    clock: Arc<dyn Clock>,
}

impl RecurrenceEngine {
    pub fn new(store: Store, ledger: InvoiceLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ledger,
            clock,
        }
    }

    /// Generate the successor for a recurring template whose generation
    /// date has arrived. Returns `Ok(None)` when nothing was generated:
    /// not yet due, past the end date, or already generated this period.
    #[tracing::instrument(skip(self, original), fields(invoice_id = %original.invoice_id))]
    pub async fn generate_successor(
        &self,
        original: &Invoice,
        today: NaiveDate,
    ) -> Result<Option<Invoice>, AppError> {
        let Some(frequency) = original.frequency.as_deref() else {
            return Ok(None);
        };
        let frequency = Frequency::from_string(frequency).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Unsupported recurrence frequency: {}",
                frequency
            ))
        })?;

        let Some(period) = original.next_generation_date else {
            return Ok(None);
        };
        if period > today {
            return Ok(None);
        }
        if let Some(end) = original.end_date {
            if end < today {
                return Ok(None);
            }
        }

        // A successor for this period means a previous run died after
        // creating it but before the schedule advance was durable. Repair
        // the schedule; do not generate again.
        if self
            .store
            .invoices
            .find_successor(original.invoice_id, period)
            .await?
            .is_some()
        {
            tracing::warn!(
                invoice_id = %original.invoice_id,
                period = %period,
                "Successor already exists for period, repairing schedule"
            );
            self.advance_template(original, period, frequency).await?;
            return Ok(None);
        }

        let items = self.store.invoices.line_items(original.invoice_id).await?;
        let successor = self.build_successor(original, period, today);
        let successor_items: Vec<LineItem> = items
            .iter()
            .map(|item| LineItem {
                line_item_id: Uuid::new_v4(),
                invoice_id: successor.invoice_id,
                description: item.description.clone(),
                quantity: item.quantity,
                rate: item.rate,
                amount: Decimal::ZERO,
                sort_order: item.sort_order,
            })
            .collect();

        // Successor first; if this fails the schedule must not advance,
        // otherwise the billing cycle is silently skipped.
        let successor = self
            .ledger
            .insert_and_submit(successor, successor_items)
            .await?;

        self.advance_template(original, period, frequency).await?;

        record_invoice_generated(&original.firm_id.to_string());
        tracing::info!(
            invoice_id = %original.invoice_id,
            successor_id = %successor.invoice_id,
            period = %period,
            "Generated recurring invoice"
        );

        Ok(Some(successor))
    }

    fn build_successor(&self, original: &Invoice, period: NaiveDate, today: NaiveDate) -> Invoice {
        let terms = PaymentTerms::from_string(&original.payment_terms);
        let now = self.clock.now();

        Invoice {
            invoice_id: Uuid::new_v4(),
            firm_id: original.firm_id,
            client_id: original.client_id,
            invoice_number: format!("{}-{}", original.invoice_number, period.format("%Y%m")),
            currency: original.currency.clone(),
            invoice_date: today,
            due_date: today + Duration::days(terms.days()),
            tax_rate: original.tax_rate,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            status: InvoiceStatus::Unpaid.as_str().to_string(),
            payment_terms: original.payment_terms.clone(),
            // Recurrence stays on the template; successors are ordinary
            // invoices.
            is_recurring: false,
            frequency: None,
            next_generation_date: None,
            end_date: None,
            generated_from: Some(original.invoice_id),
            generation_period: Some(period),
            auto_send_on_creation: original.auto_send_on_creation,
            // Gateway references and portal links are per-invoice.
            portal_link: None,
            gateway_reference: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Advance the template's generation date by one period from the
    /// period just generated, not from today, so the cadence never
    /// drifts when a sweep runs late.
    async fn advance_template(
        &self,
        original: &Invoice,
        period: NaiveDate,
        frequency: Frequency,
    ) -> Result<(), AppError> {
        let mut template = original.clone();
        template.next_generation_date = Some(advance_schedule(period, frequency));
        template.updated_utc = self.clock.now();
        self.store.invoices.update(&template).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn monthly_advance_clamps_to_month_end() {
        assert_eq!(
            advance_schedule(date(2026, 1, 31), Frequency::Monthly),
            date(2026, 2, 28)
        );
    }

    #[test]
    fn quarterly_and_half_yearly_advance() {
        assert_eq!(
            advance_schedule(date(2026, 1, 15), Frequency::Quarterly),
            date(2026, 4, 15)
        );
        assert_eq!(
            advance_schedule(date(2026, 8, 31), Frequency::HalfYearly),
            date(2027, 2, 28)
        );
    }

    #[test]
    fn annual_advance_handles_leap_day() {
        // 2028 is a leap year, so a Feb 29 schedule survives intact.
        assert_eq!(
            advance_schedule(date(2027, 2, 28), Frequency::Annual),
            date(2028, 2, 28)
        );
        assert_eq!(
            advance_schedule(date(2028, 2, 29), Frequency::Annual),
            date(2029, 2, 28)
        );
    }
}
