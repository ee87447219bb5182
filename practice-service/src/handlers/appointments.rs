//! Appointment handlers.

use crate::models::{AppointmentStatus, TemplateType};
use crate::repository::{AppointmentStore, ClientStore};
use crate::services::{Clock, NotificationDispatcher};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Deserialize, Default)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelAppointmentResponse {
    pub success: bool,
    pub status: String,
}

/// Cancel an appointment and notify the client. Notification failure
/// does not undo the cancellation.
#[tracing::instrument(skip(state, request), fields(appointment_id = %appointment_id))]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<CancelAppointmentResponse>, AppError> {
    let mut appointment = state
        .store
        .appointments
        .find(appointment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Appointment not found")))?;

    if AppointmentStatus::from_string(&appointment.status) == AppointmentStatus::Cancelled {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Appointment is already cancelled"
        )));
    }

    appointment.status = AppointmentStatus::Cancelled.as_str().to_string();
    if let Some(reason) = &request.reason {
        appointment.notes = Some(match &appointment.notes {
            Some(notes) => format!("{}\n\nCancellation Reason: {}", notes, reason),
            None => format!("Cancellation Reason: {}", reason),
        });
    }
    appointment.updated_utc = state.clock.now();
    state.store.appointments.update(&appointment).await?;

    let client_name = match state.store.clients.find(appointment.client_id).await {
        Ok(Some(client)) => client.client_name,
        _ => String::new(),
    };
    let data = serde_json::json!({
        "client_name": client_name,
        "appointment_date": appointment.appointment_date.to_string(),
        "appointment_time": appointment.appointment_time.format("%H:%M").to_string(),
        "staff_name": appointment.staff_name,
        "reason": request.reason.unwrap_or_else(|| "Not specified".to_string()),
    });

    if let Err(e) = state
        .notifier
        .dispatch(
            appointment.client_id,
            TemplateType::AppointmentCancelled,
            &data,
        )
        .await
    {
        tracing::warn!(
            error = %e,
            appointment_id = %appointment_id,
            "Failed to send cancellation notification"
        );
    }

    Ok(Json(CancelAppointmentResponse {
        success: true,
        status: appointment.status,
    }))
}
