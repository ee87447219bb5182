//! Payment reconciliation.
//!
//! Applies completed payments to an invoice's status. Reconciliation is
//! driven by the sum of all completed payments, so re-running it for the
//! same payment set is idempotent.

use crate::models::{
    CreatePayment, Gateway, Invoice, InvoiceStatus, Payment, PaymentStatus, TemplateType,
};
use crate::repository::{ClientStore, InvoiceStore, PaymentStore, Store};
use crate::services::gateway::{GatewayRegistry, PaymentGateway, RefundRecord, WebhookOutcome};
use crate::services::metrics::{record_error, record_payment_reconciled};
use crate::services::{derive_status, Clock, NotificationDispatcher};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentReconciler {
    store: Store,
    notifier: Arc<dyn NotificationDispatcher>,
    gateways: GatewayRegistry,
    clock: Arc<dyn Clock>,
}

impl PaymentReconciler {
    pub fn new(
        store: Store,
        notifier: Arc<dyn NotificationDispatcher>,
        gateways: GatewayRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            gateways,
            clock,
        }
    }

    /// Record a payment. Completed payments are reconciled immediately.
    #[tracing::instrument(skip(self, input), fields(invoice_id = %input.invoice_id))]
    pub async fn record_payment(&self, input: CreatePayment) -> Result<Payment, AppError> {
        let invoice = self
            .store
            .invoices
            .find(input.invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        // Single-payment check only; cumulative over-collection across
        // multiple payments is intentionally not enforced.
        if input.amount > invoice.total_amount {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount cannot exceed invoice total"
            )));
        }

        let now = self.clock.now();
        let payment = Payment {
            payment_id: Uuid::new_v4(),
            firm_id: input.firm_id,
            invoice_id: input.invoice_id,
            client_id: input.client_id,
            amount: input.amount,
            currency: input.currency,
            gateway: input.gateway.as_str().to_string(),
            transaction_id: input.transaction_id,
            status: input.status.as_str().to_string(),
            payment_date: input.payment_date,
            reconciled: false,
            reconciliation_date: None,
            gateway_response: input.gateway_response,
            created_utc: now,
            updated_utc: now,
        };

        self.store.payments.insert(&payment).await?;

        if input.status == PaymentStatus::Completed {
            self.reconcile(payment.payment_id).await?;
            return Ok(self
                .store
                .payments
                .find(payment.payment_id)
                .await?
                .unwrap_or(payment));
        }

        Ok(payment)
    }

    /// Apply all completed payments for the payment's invoice and mark
    /// the payment reconciled. Safe to retry.
    #[tracing::instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn reconcile(&self, payment_id: Uuid) -> Result<Invoice, AppError> {
        let mut payment = self
            .store
            .payments
            .find(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

        if PaymentStatus::from_string(&payment.status) != PaymentStatus::Completed {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only completed payments can be reconciled"
            )));
        }

        let mut invoice = self
            .store
            .invoices
            .find(payment.invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let total_paid = self.store.payments.sum_completed(invoice.invoice_id).await?;

        let mut status = derive_status(&invoice, self.clock.today());
        if status != InvoiceStatus::Cancelled {
            if total_paid >= invoice.total_amount {
                status = InvoiceStatus::Paid;
            } else if total_paid > Decimal::ZERO {
                status = InvoiceStatus::PartiallyPaid;
            }
        }

        invoice.status = status.as_str().to_string();
        invoice.updated_utc = self.clock.now();
        self.store.invoices.update(&invoice).await?;

        payment.reconciled = true;
        payment.reconciliation_date = Some(self.clock.today());
        payment.updated_utc = self.clock.now();
        self.store.payments.update(&payment).await?;

        record_payment_reconciled(&payment.gateway);
        tracing::info!(
            payment_id = %payment_id,
            invoice_id = %invoice.invoice_id,
            total_paid = %total_paid,
            status = %invoice.status,
            "Payment reconciled"
        );

        self.send_payment_confirmation(&payment, &invoice).await;

        Ok(invoice)
    }

    /// Confirmation failure never rolls back the reconciliation.
    async fn send_payment_confirmation(&self, payment: &Payment, invoice: &Invoice) {
        let client_name = match self.store.clients.find(payment.client_id).await {
            Ok(Some(client)) => client.client_name,
            _ => String::new(),
        };

        let data = serde_json::json!({
            "client_name": client_name,
            "invoice_number": invoice.invoice_number,
            "amount": payment.amount.to_string(),
            "payment_date": payment.payment_date.to_string(),
            "transaction_id": payment.transaction_id,
        });

        if let Err(e) = self
            .notifier
            .dispatch(payment.client_id, TemplateType::PaymentReceived, &data)
            .await
        {
            tracing::warn!(
                error = %e,
                payment_id = %payment.payment_id,
                "Failed to send payment confirmation"
            );
        }
    }

    /// Refund a completed payment and re-apply the remaining payments to
    /// the invoice status.
    #[tracing::instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn refund(
        &self,
        payment_id: Uuid,
        amount: Option<Decimal>,
        reason: Option<String>,
    ) -> Result<RefundRecord, AppError> {
        let mut payment = self
            .store
            .payments
            .find(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

        if PaymentStatus::from_string(&payment.status) != PaymentStatus::Completed {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only completed payments can be refunded"
            )));
        }

        let gateway = Gateway::from_string(&payment.gateway).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Unsupported payment gateway: {}",
                payment.gateway
            ))
        })?;

        let refund = match gateway {
            Gateway::Manual => RefundRecord {
                refund_id: format!("manual-{}", payment.payment_id),
                amount: Some(amount.unwrap_or(payment.amount)),
                status: "refunded".to_string(),
            },
            Gateway::Razorpay | Gateway::Stripe => {
                self.gateways
                    .for_kind(gateway)?
                    .refund(&payment, amount)
                    .await?
            }
        };

        payment.status = PaymentStatus::Refunded.as_str().to_string();
        if let Some(reason) = reason {
            payment.gateway_response = Some(format!("Refund: {}", reason));
        }
        payment.updated_utc = self.clock.now();
        self.store.payments.update(&payment).await?;

        self.reapply_payments(payment.invoice_id).await?;

        tracing::info!(
            payment_id = %payment_id,
            refund_id = %refund.refund_id,
            "Payment refunded"
        );

        Ok(refund)
    }

    /// Recompute an invoice's status from its surviving completed
    /// payments, falling back to the date-derived status when nothing
    /// remains paid.
    async fn reapply_payments(&self, invoice_id: Uuid) -> Result<(), AppError> {
        let mut invoice = self
            .store
            .invoices
            .find(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        if InvoiceStatus::from_string(&invoice.status) == InvoiceStatus::Cancelled {
            return Ok(());
        }

        let total_paid = self.store.payments.sum_completed(invoice_id).await?;
        let today = self.clock.today();

        let status = if total_paid >= invoice.total_amount {
            InvoiceStatus::Paid
        } else if total_paid > Decimal::ZERO {
            InvoiceStatus::PartiallyPaid
        } else if invoice.due_date < today {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Unpaid
        };

        invoice.status = status.as_str().to_string();
        invoice.updated_utc = self.clock.now();
        self.store.invoices.update(&invoice).await
    }

    /// Apply a verified gateway webhook event.
    #[tracing::instrument(skip(self, outcome))]
    pub async fn apply_webhook(
        &self,
        gateway: Gateway,
        outcome: WebhookOutcome,
    ) -> Result<(), AppError> {
        match outcome {
            WebhookOutcome::PaymentCaptured {
                transaction_id,
                amount,
                invoice_id,
                client_id,
            } => {
                if let Some(mut existing) =
                    self.store.payments.find_by_transaction(&transaction_id).await?
                {
                    existing.status = PaymentStatus::Completed.as_str().to_string();
                    existing.updated_utc = self.clock.now();
                    self.store.payments.update(&existing).await?;
                    self.reconcile(existing.payment_id).await?;
                    return Ok(());
                }

                let Some(invoice_id) = invoice_id else {
                    record_error("webhook", "payment_captured");
                    tracing::error!(
                        transaction_id = %transaction_id,
                        "Invoice reference missing from captured payment"
                    );
                    return Ok(());
                };

                let invoice = self
                    .store
                    .invoices
                    .find(invoice_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

                self.record_payment(CreatePayment {
                    firm_id: invoice.firm_id,
                    invoice_id: invoice.invoice_id,
                    client_id: client_id.unwrap_or(invoice.client_id),
                    amount,
                    currency: invoice.currency.clone(),
                    gateway,
                    transaction_id,
                    status: PaymentStatus::Completed,
                    payment_date: self.clock.today(),
                    gateway_response: None,
                })
                .await?;
                Ok(())
            }
            WebhookOutcome::PaymentFailed {
                transaction_id,
                amount,
                invoice_id,
                client_id,
            } => {
                if let Some(mut existing) =
                    self.store.payments.find_by_transaction(&transaction_id).await?
                {
                    existing.status = PaymentStatus::Failed.as_str().to_string();
                    existing.updated_utc = self.clock.now();
                    self.store.payments.update(&existing).await?;
                    return Ok(());
                }

                let Some(invoice_id) = invoice_id else {
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        "Invoice reference missing from failed payment"
                    );
                    return Ok(());
                };

                let invoice = self
                    .store
                    .invoices
                    .find(invoice_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

                self.record_payment(CreatePayment {
                    firm_id: invoice.firm_id,
                    invoice_id: invoice.invoice_id,
                    client_id: client_id.unwrap_or(invoice.client_id),
                    amount,
                    currency: invoice.currency.clone(),
                    gateway,
                    transaction_id,
                    status: PaymentStatus::Failed,
                    payment_date: self.clock.today(),
                    gateway_response: None,
                })
                .await?;
                Ok(())
            }
            WebhookOutcome::Ignored { event } => {
                tracing::debug!(event = %event, "Ignoring webhook event");
                Ok(())
            }
        }
    }
}
