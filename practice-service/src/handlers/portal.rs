//! Client portal read endpoints.

use crate::models::{format_file_size, ListDocumentsFilter, ListInvoicesFilter};
use crate::repository::{ClientStore, DocumentStore, InvoiceStore};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct PortalInvoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: String,
    pub portal_link: Option<String>,
}

#[tracing::instrument(skip(state), fields(client_id = %client_id))]
pub async fn list_client_invoices(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<PortalInvoice>>, AppError> {
    state
        .store
        .clients
        .find(client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    let invoices = state
        .store
        .invoices
        .list(&ListInvoicesFilter {
            client_id: Some(client_id),
            ..Default::default()
        })
        .await?;

    Ok(Json(
        invoices
            .into_iter()
            .map(|i| PortalInvoice {
                invoice_id: i.invoice_id,
                invoice_number: i.invoice_number,
                invoice_date: i.invoice_date,
                due_date: i.due_date,
                total_amount: i.total_amount,
                currency: i.currency,
                status: i.status,
                portal_link: i.portal_link,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct PortalDocument {
    pub document_id: Uuid,
    pub document_name: String,
    pub document_type: String,
    pub file_size: String,
    pub upload_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
}

/// Only client-accessible documents are listed on the portal.
#[tracing::instrument(skip(state), fields(client_id = %client_id))]
pub async fn list_client_documents(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<PortalDocument>>, AppError> {
    state
        .store
        .clients
        .find(client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    let documents = state
        .store
        .documents
        .list(&ListDocumentsFilter {
            client_id: Some(client_id),
            client_accessible_only: true,
        })
        .await?;

    Ok(Json(
        documents
            .into_iter()
            .map(|d| PortalDocument {
                document_id: d.document_id,
                document_name: d.document_name,
                document_type: d.document_type,
                file_size: format_file_size(d.file_size_bytes),
                upload_date: d.upload_date,
                expiry_date: d.expiry_date,
            })
            .collect(),
    ))
}
