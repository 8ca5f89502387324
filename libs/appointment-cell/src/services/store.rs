// libs/appointment-cell/src/services/store.rs
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentFilter, Page, Pagination, Revision};
use crate::services::slot_grid::TimeSlot;

/// Persistence for appointment records.
///
/// Every read excludes soft-deleted rows. `insert` and `update` must enforce
/// uniqueness of (doctor, date, slot) across active appointments atomically and
/// report violations as `SlotConflict`; callers treat their own pre-check as a
/// hint only. `update` is conditional on the `Revision` the caller read and
/// fails with `StaleWrite` once the row has moved on.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Replaces a stored, non-deleted record with the same id, provided it
    /// still matches `expected`.
    async fn update(
        &self,
        appointment: Appointment,
        expected: &Revision,
    ) -> Result<Appointment, AppointmentError>;

    async fn find_active(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Slots held by active appointments for the doctor on that date.
    async fn occupied_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> Result<BTreeSet<TimeSlot>, AppointmentError>;

    /// Filtered page sorted by (date, time_slot) ascending.
    async fn query(
        &self,
        filter: &AppointmentFilter,
        pagination: Pagination,
    ) -> Result<Page<Appointment>, AppointmentError>;
}

/// Process-local store. The uniqueness check and the write share one write
/// lock, which makes them a single atomic decision.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_holder<'a>(
        appointments: &'a HashMap<Uuid, Appointment>,
        candidate: &Appointment,
    ) -> Option<&'a Appointment> {
        if !candidate.is_active() {
            return None;
        }
        appointments.values().find(|existing| {
            existing.id != candidate.id
                && existing.occupies(candidate.doctor_id, candidate.date, candidate.time_slot)
        })
    }

    fn conflict(candidate: &Appointment) -> AppointmentError {
        AppointmentError::SlotConflict {
            doctor_id: candidate.doctor_id,
            date: candidate.date,
            time_slot: candidate.time_slot,
        }
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;

        if appointments.contains_key(&appointment.id) {
            return Err(AppointmentError::Validation(format!(
                "Appointment {} already exists", appointment.id
            )));
        }

        if let Some(holder) = Self::find_holder(&appointments, &appointment) {
            warn!("Insert rejected: slot held by appointment {}", holder.id);
            return Err(Self::conflict(&appointment));
        }

        appointments.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);
        Ok(appointment)
    }

    async fn update(
        &self,
        appointment: Appointment,
        expected: &Revision,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;

        match appointments.get(&appointment.id) {
            Some(existing) if !existing.is_deleted => {
                if existing.revision() != *expected {
                    warn!("Update of {} rejected: record changed since it was read", appointment.id);
                    return Err(AppointmentError::StaleWrite { id: appointment.id });
                }
            }
            _ => return Err(AppointmentError::not_found("appointment", appointment.id)),
        }

        if let Some(holder) = Self::find_holder(&appointments, &appointment) {
            warn!("Update of {} rejected: slot held by appointment {}", appointment.id, holder.id);
            return Err(Self::conflict(&appointment));
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find_active(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        Ok(appointments.get(&id).filter(|apt| !apt.is_deleted).cloned())
    }

    async fn occupied_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> Result<BTreeSet<TimeSlot>, AppointmentError> {
        let appointments = self.appointments.read().await;
        Ok(appointments
            .values()
            .filter(|apt| Some(apt.id) != exclude_id)
            .filter(|apt| apt.is_active() && apt.doctor_id == doctor_id && apt.date == date)
            .map(|apt| apt.time_slot)
            .collect())
    }

    async fn query(
        &self,
        filter: &AppointmentFilter,
        pagination: Pagination,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;

        let mut matching: Vec<&Appointment> = appointments
            .values()
            .filter(|apt| filter.matches(apt))
            .collect();
        matching.sort_by(|a, b| {
            (a.date, a.time_slot, a.created_at).cmp(&(b.date, b.time_slot, b.created_at))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.page_size as usize)
            .cloned()
            .collect();

        Ok(Page::new(items, pagination, total))
    }
}
