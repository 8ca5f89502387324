// libs/appointment-cell/src/services/supabase.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{
    SupabaseClient, SupabaseError, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION,
};

use crate::models::{
    AccessScope, Appointment, AppointmentError, AppointmentFilter, BackReference, Department,
    Doctor, Page, Pagination, Patient, Revision,
};
use crate::services::directory::Directory;
use crate::services::slot_grid::TimeSlot;
use crate::services::store::AppointmentStore;

const APPOINTMENTS: &str = "/rest/v1/appointments";

fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn dependency_error(context: &str, err: SupabaseError) -> AppointmentError {
    if err.is_unavailable() {
        error!("{} failed, backend unavailable: {}", context, err);
    } else {
        warn!("{} failed: {}", context, err);
    }
    AppointmentError::DependencyUnavailable(format!("{}: {}", context, err))
}

/// PostgREST-backed store. Uniqueness of active (doctor, date, slot) tuples is
/// enforced by the partial unique index in `migrations/001_appointments.sql`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    fn write_error(&self, context: &str, candidate: &Appointment, err: SupabaseError) -> AppointmentError {
        match err {
            SupabaseError::Conflict { code: Some(code), message } if code == UNIQUE_VIOLATION => {
                warn!("{} hit the active slot index: {}", context, message);
                AppointmentError::SlotConflict {
                    doctor_id: candidate.doctor_id,
                    date: candidate.date,
                    time_slot: candidate.time_slot,
                }
            }
            SupabaseError::Conflict { code: Some(code), message } if code == FOREIGN_KEY_VIOLATION => {
                warn!("{} references a missing record: {}", context, message);
                missing_reference(candidate, &message)
                    .unwrap_or_else(|| AppointmentError::DependencyUnavailable(format!("{}: {}", context, message)))
            }
            other => dependency_error(context, other),
        }
    }

    /// Filters a PATCH to the row state described by `expected`.
    fn revision_params(expected: &Revision) -> String {
        format!(
            "status=eq.{}&doctor_id=eq.{}&department_id=eq.{}&date=eq.{}&time_slot=eq.{}&updated_at=eq.{}",
            expected.status,
            expected.doctor_id,
            expected.department_id,
            date_param(expected.date),
            expected.time_slot,
            expected.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        )
    }

    fn filter_params(filter: &AppointmentFilter) -> Vec<String> {
        let mut params = vec!["is_deleted=eq.false".to_string()];

        if let Some(status) = filter.status {
            params.push(format!("status=eq.{}", status));
        }
        if let Some(doctor_id) = filter.doctor_id {
            params.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(department_id) = filter.department_id {
            params.push(format!("department_id=eq.{}", department_id));
        }
        if let Some(patient_id) = filter.patient_id {
            params.push(format!("patient_id=eq.{}", patient_id));
        }

        match &filter.scope {
            None => {}
            Some(AccessScope::Doctor(doctor_id)) => {
                // Combined with a caller-supplied doctor filter this may yield nothing, which is intended.
                params.push(format!("doctor_id=eq.{}", doctor_id));
            }
            Some(AccessScope::RequestedBy(user_id)) => {
                params.push(format!("requesting_user_id=eq.{}", user_id));
            }
            Some(AccessScope::Patient { user_id, patient_id: Some(patient_id) }) => {
                params.push(format!("or=(requesting_user_id.eq.{},patient_id.eq.{})", user_id, patient_id));
            }
            Some(AccessScope::Patient { user_id, patient_id: None }) => {
                params.push(format!("requesting_user_id=eq.{}", user_id));
            }
        }

        params
    }
}

/// Names the missing record from the `Key (column)=(..)` detail of a foreign
/// key violation.
fn missing_reference(candidate: &Appointment, message: &str) -> Option<AppointmentError> {
    if message.contains("(doctor_id)") {
        Some(AppointmentError::not_found("doctor", candidate.doctor_id))
    } else if message.contains("(department_id)") {
        Some(AppointmentError::not_found("department", candidate.department_id))
    } else if message.contains("(patient_id)") {
        candidate.patient_id.map(|id| AppointmentError::not_found("patient", id))
    } else {
        None
    }
}

#[derive(Deserialize)]
struct SlotRow {
    time_slot: TimeSlot,
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::DependencyUnavailable(format!("encode appointment: {}", e)))?;

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(Method::POST, APPOINTMENTS, Some(&self.service_key), Some(body),
                                  Some(return_representation()))
            .await
            .map_err(|e| self.write_error("Insert appointment", &appointment, e))?;

        rows.into_iter().next().ok_or_else(|| {
            AppointmentError::DependencyUnavailable("Insert returned no appointment".to_string())
        })
    }

    async fn update(
        &self,
        appointment: Appointment,
        expected: &Revision,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "{}?id=eq.{}&is_deleted=eq.false&{}",
            APPOINTMENTS, appointment.id, Self::revision_params(expected)
        );
        let mut body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::DependencyUnavailable(format!("encode appointment: {}", e)))?;
        if let Value::Object(fields) = &mut body {
            fields.remove("id");
            fields.remove("created_at");
        }

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(&self.service_key), Some(body),
                                  Some(return_representation()))
            .await
            .map_err(|e| self.write_error("Update appointment", &appointment, e))?;

        if let Some(saved) = rows.into_iter().next() {
            return Ok(saved);
        }

        // Nothing matched: either the row is gone or it moved past `expected`.
        match self.find_active(appointment.id).await? {
            Some(_) => {
                warn!("Update of {} rejected: record changed since it was read", appointment.id);
                Err(AppointmentError::StaleWrite { id: appointment.id })
            }
            None => Err(AppointmentError::not_found("appointment", appointment.id)),
        }
    }

    async fn find_active(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}&is_deleted=eq.false", APPOINTMENTS, id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(&self.service_key), None)
            .await
            .map_err(|e| dependency_error("Fetch appointment", e))?;

        Ok(rows.into_iter().next())
    }

    async fn occupied_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> Result<BTreeSet<TimeSlot>, AppointmentError> {
        let mut path = format!(
            "{}?select=time_slot&doctor_id=eq.{}&date=eq.{}&status=neq.cancelled&is_deleted=eq.false",
            APPOINTMENTS, doctor_id, date_param(date)
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<SlotRow> = self
            .supabase
            .request(Method::GET, &path, Some(&self.service_key), None)
            .await
            .map_err(|e| dependency_error("Fetch occupied slots", e))?;

        Ok(rows.into_iter().map(|row| row.time_slot).collect())
    }

    async fn query(
        &self,
        filter: &AppointmentFilter,
        pagination: Pagination,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let mut params = Self::filter_params(filter);
        params.push("order=date.asc,time_slot.asc,created_at.asc".to_string());
        params.push(format!("limit={}", pagination.page_size));
        params.push(format!("offset={}", pagination.offset()));

        let path = format!("{}?{}", APPOINTMENTS, params.join("&"));
        debug!("Querying appointments: {}", path);

        let (items, total): (Vec<Appointment>, Option<u64>) = self
            .supabase
            .request_with_count(&path, Some(&self.service_key))
            .await
            .map_err(|e| dependency_error("List appointments", e))?;

        let total = total.unwrap_or((pagination.offset() + items.len()) as u64);
        Ok(Page::new(items, pagination, total))
    }
}

/// Directory lookups against the clinic's PostgREST tables.
pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    async fn first<T>(&self, path: String, context: &str) -> Result<Option<T>, AppointmentError>
    where T: serde::de::DeserializeOwned + Send {
        let rows: Vec<T> = self
            .supabase
            .request(Method::GET, &path, Some(&self.service_key), None)
            .await
            .map_err(|e| dependency_error(context, e))?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl Directory for SupabaseDirectory {
    async fn doctor(&self, id: Uuid) -> Result<Option<Doctor>, AppointmentError> {
        self.first(
            format!("/rest/v1/doctors?id=eq.{}&select=id,department_id,name,working_hours_start,working_hours_end,slot_interval_minutes", id),
            "Fetch doctor",
        )
        .await
    }

    async fn department(&self, id: Uuid) -> Result<Option<Department>, AppointmentError> {
        self.first(format!("/rest/v1/departments?id=eq.{}&select=id,name", id), "Fetch department")
            .await
    }

    async fn patient(&self, id: Uuid) -> Result<Option<Patient>, AppointmentError> {
        self.first(format!("/rest/v1/patients?id=eq.{}&select=id,user_id,name", id), "Fetch patient")
            .await
    }

    async fn patient_for_user(&self, user_id: Uuid) -> Result<Option<Patient>, AppointmentError> {
        self.first(
            format!("/rest/v1/patients?user_id=eq.{}&select=id,user_id,name&limit=1", user_id),
            "Fetch patient for user",
        )
        .await
    }

    async fn record_appointment(
        &self,
        target: BackReference,
        appointment_id: Uuid,
    ) -> Result<(), AppointmentError> {
        let body = json!({
            "target_table": target.table(),
            "record_id": target.record_id(),
            "appointment_id": appointment_id,
        });

        let _: Value = self
            .supabase
            .request(Method::POST, "/rest/v1/rpc/append_appointment_ref", Some(&self.service_key), Some(body))
            .await
            .map_err(|e| dependency_error("Append appointment reference", e))?;
        Ok(())
    }
}
