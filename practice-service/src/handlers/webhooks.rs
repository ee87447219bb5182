//! Gateway webhook handler.

use crate::models::Gateway;
use crate::services::PaymentGateway;
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::json;
use service_core::error::AppError;

fn signature_header(gateway: Gateway) -> &'static str {
    match gateway {
        Gateway::Razorpay => "x-razorpay-signature",
        Gateway::Stripe => "stripe-signature",
        Gateway::Manual => "",
    }
}

/// Receive a payment event from a gateway. The signature is verified
/// before anything is parsed; a verified capture marks the payment
/// completed and reconciles the invoice.
#[tracing::instrument(skip(state, headers, body), fields(gateway = %gateway_name))]
pub async fn gateway_webhook(
    State(state): State<AppState>,
    Path(gateway_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let gateway_kind = Gateway::from_string(&gateway_name).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unsupported payment gateway: {}",
            gateway_name
        ))
    })?;

    let gateway = state.gateways.for_kind(gateway_kind)?;

    let signature = headers
        .get(signature_header(gateway_kind))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing webhook signature")))?;

    if !gateway.verify_webhook_signature(&body, signature) {
        tracing::warn!(gateway = %gateway_name, "Webhook signature verification failed");
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let outcome = gateway.process_webhook_event(&body)?;
    state.reconciler.apply_webhook(gateway_kind, outcome).await?;

    Ok(Json(json!({ "status": "processed" })))
}
