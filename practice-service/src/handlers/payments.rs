//! Payment API handlers.

use crate::models::{CreatePayment, Gateway, Payment, PaymentStatus};
use crate::repository::{ClientStore, InvoiceStore, PaymentStore, SettingsStore};
use crate::services::{Clock, PaymentGateway};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

fn parse_gateway(name: &str) -> Result<Gateway, AppError> {
    Gateway::from_string(name).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Unsupported payment gateway: {}", name))
    })
}

#[derive(Debug, Deserialize, Default)]
pub struct CreatePaymentLinkRequest {
    /// Gateway name; the firm's default gateway is used when omitted.
    pub gateway: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentLinkResponse {
    pub success: bool,
    pub payment_link: String,
    pub gateway: String,
}

#[tracing::instrument(skip(state, request), fields(invoice_id = %invoice_id))]
pub async fn create_payment_link(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<CreatePaymentLinkRequest>,
) -> Result<(StatusCode, Json<CreatePaymentLinkResponse>), AppError> {
    let mut invoice = state
        .store
        .invoices
        .find(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let client = state
        .store
        .clients
        .find(invoice.client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    let gateway_kind = match request.gateway.as_deref() {
        Some(name) => parse_gateway(name)?,
        None => {
            let settings = state.store.settings.find(invoice.firm_id).await?;
            let default = settings
                .map(|s| s.default_gateway)
                .unwrap_or_else(|| Gateway::Razorpay.as_str().to_string());
            parse_gateway(&default)?
        }
    };

    let gateway = state.gateways.for_kind(gateway_kind)?;
    let link = gateway.create_payment_link(&invoice, &client).await?;

    invoice.gateway_reference = Some(link.reference.clone());
    invoice.updated_utc = state.clock.now();
    state.store.invoices.update(&invoice).await?;

    Ok((
        StatusCode::OK,
        Json(CreatePaymentLinkResponse {
            success: true,
            payment_link: link.url,
            gateway: gateway_kind.as_str().to_string(),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub invoice_total: Decimal,
    pub total_paid: Decimal,
    pub balance: Decimal,
    pub status: String,
    pub payments: Vec<Payment>,
}

#[tracing::instrument(skip(state), fields(invoice_id = %invoice_id))]
pub async fn get_invoice_payment_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let invoice = state.ledger.refresh_status(invoice_id).await?;
    let payments = state.store.payments.list_for_invoice(invoice_id).await?;
    let total_paid = state.store.payments.sum_completed(invoice_id).await?;

    Ok(Json(PaymentStatusResponse {
        invoice_total: invoice.total_amount,
        total_paid,
        balance: invoice.total_amount - total_paid,
        status: invoice.status,
        payments,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManualPaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, message = "Payment method cannot be empty"))]
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ManualPaymentResponse {
    pub success: bool,
    pub payment_id: Uuid,
    pub invoice_status: String,
}

/// Record a manual payment (cash, cheque, bank transfer).
#[tracing::instrument(skip(state, request), fields(invoice_id = %invoice_id))]
pub async fn process_manual_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<ManualPaymentRequest>,
) -> Result<(StatusCode, Json<ManualPaymentResponse>), AppError> {
    request.validate()?;

    let invoice = state
        .store
        .invoices
        .find(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let transaction_id = request
        .transaction_id
        .unwrap_or_else(|| format!("manual-{}", Uuid::new_v4()));

    let payment = state
        .reconciler
        .record_payment(CreatePayment {
            firm_id: invoice.firm_id,
            invoice_id: invoice.invoice_id,
            client_id: invoice.client_id,
            amount: request.amount,
            currency: invoice.currency.clone(),
            gateway: Gateway::Manual,
            transaction_id,
            status: PaymentStatus::Completed,
            payment_date: state.clock.today(),
            gateway_response: request
                .notes
                .map(|notes| format!("{}: {}", request.payment_method, notes)),
        })
        .await?;

    let invoice = state
        .store
        .invoices
        .find(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok((
        StatusCode::CREATED,
        Json(ManualPaymentResponse {
            success: true,
            payment_id: payment.payment_id,
            invoice_status: invoice.status,
        }),
    ))
}

#[derive(Debug, Deserialize, Default)]
pub struct RefundRequest {
    /// Amount to refund; full refund when omitted.
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub success: bool,
    pub refund_id: String,
    pub status: String,
}

#[tracing::instrument(skip(state, request), fields(payment_id = %payment_id))]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, AppError> {
    let refund = state
        .reconciler
        .refund(payment_id, request.amount, request.reason)
        .await?;

    Ok(Json(RefundResponse {
        success: true,
        refund_id: refund.refund_id,
        status: refund.status,
    }))
}
