// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

use crate::services::slot_grid::TimeSlot;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub patient_name: String,
    pub requesting_user_id: Uuid,
    pub doctor_id: Uuid,
    pub department_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Active appointments hold their slot: not cancelled and not soft-deleted.
    pub fn is_active(&self) -> bool {
        !self.is_deleted && self.status.holds_slot()
    }

    pub fn occupies(&self, doctor_id: Uuid, date: NaiveDate, time_slot: TimeSlot) -> bool {
        self.is_active()
            && self.doctor_id == doctor_id
            && self.date == date
            && self.time_slot == time_slot
    }

    pub fn revision(&self) -> Revision {
        Revision {
            status: self.status,
            doctor_id: self.doctor_id,
            department_id: self.department_id,
            date: self.date,
            time_slot: self.time_slot,
            updated_at: self.updated_at,
        }
    }
}

/// The stored state a write was derived from. Stores apply an update only
/// while the row still matches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub status: AppointmentStatus,
    pub doctor_id: Uuid,
    pub department_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Cancelled appointments release their slot even before soft-deletion.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| AppointmentError::Validation(format!(
                "Invalid status '{}'; expected one of pending, confirmed, cancelled, completed",
                value
            )))
    }
}

// ==============================================================================
// DIRECTORY RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub department_id: Uuid,
    pub name: String,
    pub working_hours_start: String,
    pub working_hours_end: String,
    #[serde(default)]
    pub slot_interval_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
}

/// Directory record whose appointment list gets the new id appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackReference {
    Doctor(Uuid),
    Department(Uuid),
    Patient(Uuid),
}

impl BackReference {
    pub fn table(&self) -> &'static str {
        match self {
            BackReference::Doctor(_) => "doctors",
            BackReference::Department(_) => "departments",
            BackReference::Patient(_) => "patients",
        }
    }

    pub fn record_id(&self) -> Uuid {
        match self {
            BackReference::Doctor(id) | BackReference::Department(id) | BackReference::Patient(id) => *id,
        }
    }
}

// ==============================================================================
// PRINCIPALS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    GroupAdmin,
    Other(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "patient" => Role::Patient,
            "doctor" => Role::Doctor,
            "admin" => Role::Admin,
            "groupAdmin" | "group_admin" | "groupadmin" => Role::GroupAdmin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::GroupAdmin)
    }
}

/// The acting identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub linked_doctor_id: Option<Uuid>,
    pub linked_patient_id: Option<Uuid>,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role, linked_doctor_id: None, linked_patient_id: None }
    }

    pub fn with_linked_doctor(mut self, doctor_id: Uuid) -> Self {
        self.linked_doctor_id = Some(doctor_id);
        self
    }

    pub fn with_linked_patient(mut self, patient_id: Uuid) -> Self {
        self.linked_patient_id = Some(patient_id);
        self
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Booking request. Fields are optional on the wire so that a missing field
/// surfaces as a validation error instead of a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub department_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Query string accepted by every list view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

/// Restricts a listing to what a principal may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    Doctor(Uuid),
    Patient { user_id: Uuid, patient_id: Option<Uuid> },
    RequestedBy(Uuid),
}

impl AccessScope {
    pub fn admits(&self, appointment: &Appointment) -> bool {
        match self {
            AccessScope::Doctor(doctor_id) => appointment.doctor_id == *doctor_id,
            AccessScope::Patient { user_id, patient_id } => {
                appointment.requesting_user_id == *user_id
                    || (patient_id.is_some() && appointment.patient_id == *patient_id)
            }
            AccessScope::RequestedBy(user_id) => appointment.requesting_user_id == *user_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub scope: Option<AccessScope>,
}

impl AppointmentFilter {
    /// Soft-deleted records never match, whatever else is set.
    pub fn matches(&self, appointment: &Appointment) -> bool {
        !appointment.is_deleted
            && self.status.map_or(true, |status| appointment.status == status)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.department_id.map_or(true, |id| appointment.department_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == Some(id))
            && self.scope.as_ref().map_or(true, |scope| scope.admits(appointment))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, page_size: Option<u32>, default_size: u32, max_size: u32) -> Self {
        let max_size = max_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(default_size).clamp(1, max_size),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: u64) -> Self {
        let total_pages = total.div_ceil(pagination.page_size as u64) as u32;
        Self {
            items,
            page: pagination.page,
            page_size: pagination.page_size,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlots {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub available: Vec<TimeSlot>,
    pub booked: Vec<TimeSlot>,
}

// ==============================================================================
// NOTIFICATION EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentEventKind {
    #[serde(rename = "appointment.created")]
    Created,
    #[serde(rename = "appointment.updated")]
    Updated,
    #[serde(rename = "appointment.status_changed")]
    StatusChanged,
    #[serde(rename = "appointment.deleted")]
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentEvent {
    pub kind: AppointmentEventKind,
    pub appointment: Appointment,
    pub occurred_at: DateTime<Utc>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid schedule configuration: {0}")]
    InvalidScheduleConfig(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("No patient record is linked to this account")]
    PatientNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Slot {time_slot} on {date} is already booked for doctor {doctor_id}; refresh availability and choose another slot")]
    SlotConflict { doctor_id: Uuid, date: NaiveDate, time_slot: TimeSlot },

    #[error("Appointment {id} was changed by another request; reload it and try again")]
    StaleWrite { id: Uuid },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl AppointmentError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        AppointmentError::NotFound { entity, id }
    }

    /// Stable error kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            AppointmentError::Validation(_) => "validation_error",
            AppointmentError::InvalidScheduleConfig(_) => "invalid_schedule_config",
            AppointmentError::NotFound { .. } | AppointmentError::PatientNotFound => "not_found",
            AppointmentError::Forbidden(_) => "forbidden",
            AppointmentError::InvalidStatusTransition { .. } => "invalid_status_transition",
            AppointmentError::SlotConflict { .. } => "slot_conflict",
            AppointmentError::StaleWrite { .. } => "stale_write",
            AppointmentError::DependencyUnavailable(_) => "dependency_unavailable",
        }
    }
}

impl From<AppointmentError> for shared_models::error::AppError {
    fn from(err: AppointmentError) -> Self {
        use shared_models::error::AppError;

        let message = err.to_string();
        match err {
            AppointmentError::Validation(_) | AppointmentError::InvalidScheduleConfig(_) => {
                AppError::ValidationError(message)
            }
            AppointmentError::NotFound { .. } | AppointmentError::PatientNotFound => AppError::NotFound(message),
            AppointmentError::Forbidden(_) => AppError::Forbidden(message),
            AppointmentError::InvalidStatusTransition { .. } => AppError::InvalidTransition(message),
            AppointmentError::SlotConflict { .. } => AppError::Conflict(message),
            AppointmentError::StaleWrite { .. } => AppError::StaleWrite(message),
            AppointmentError::DependencyUnavailable(_) => AppError::Unavailable(message),
        }
    }
}
