// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AvailabilityQuery, AvailableSlots,
    CreateAppointmentRequest, Page, Principal, RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::state::AppointmentCellState;

fn principal(user: &User) -> Result<Principal, AppError> {
    Ok(Principal::from_user(user)?)
}

// ==============================================================================
// APPOINTMENT MUTATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let principal = principal(&user)?;
    let appointment = state.booking.create_appointment(request, &principal).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    }))))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let principal = principal(&user)?;
    let appointment = state
        .booking
        .reschedule_appointment(appointment_id, request, &principal)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let principal = principal(&user)?;
    let appointment = state
        .booking
        .update_status(appointment_id, &request.status, &principal)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": format!("Appointment is {}", appointment.status)
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let principal = principal(&user)?;
    state.booking.soft_delete_appointment(appointment_id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// READS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let principal = principal(&user)?;
    let appointment = state.booking.get_appointment(appointment_id, &principal).await?;
    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Page<Appointment>>, AppError> {
    let principal = principal(&user)?;
    Ok(Json(state.queries.list_appointments(query, &principal).await?))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Page<Appointment>>, AppError> {
    let principal = principal(&user)?;
    Ok(Json(state.queries.list_my_appointments(query, &principal).await?))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Page<Appointment>>, AppError> {
    let principal = principal(&user)?;
    Ok(Json(state.queries.list_doctor_appointments(doctor_id, query, &principal).await?))
}

#[axum::debug_handler]
pub async fn list_department_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Path(department_id): Path<Uuid>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Page<Appointment>>, AppError> {
    let principal = principal(&user)?;
    Ok(Json(state.queries.list_department_appointments(department_id, query, &principal).await?))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppointmentCellState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailableSlots>, AppError> {
    let date = query
        .date
        .ok_or_else(|| AppointmentError::Validation("date query parameter is required".to_string()))?;
    debug!("Availability requested for doctor {} on {}", doctor_id, date);

    Ok(Json(state.booking.get_available_slots(doctor_id, &date).await?))
}
