// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentError, AppointmentEvent, AppointmentEventKind, AppointmentStatus,
    AvailableSlots, BackReference, CreateAppointmentRequest, Department, Doctor, Patient,
    Principal, RescheduleAppointmentRequest,
};
use crate::services::availability::AvailabilityIndex;
use crate::services::clock::{Clock, SystemClock};
use crate::services::directory::Directory;
use crate::services::lifecycle::{AppointmentLifecycleService, StatusChange};
use crate::services::notifications::NotificationSink;
use crate::services::policy;
use crate::services::slot_grid::{doctor_slot_grid, TimeSlot};
use crate::services::store::AppointmentStore;

/// Sole writer of appointment records: create, reschedule, status changes and
/// soft-deletion, each followed by best-effort back-references and events.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn NotificationSink>,
    availability: AvailabilityIndex,
    lifecycle_service: AppointmentLifecycleService,
    clock: Arc<dyn Clock>,
    default_slot_interval: u32,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn NotificationSink>,
        config: &AppConfig,
    ) -> Self {
        Self {
            availability: AvailabilityIndex::new(Arc::clone(&store)),
            store,
            directory,
            notifier,
            lifecycle_service: AppointmentLifecycleService::new(),
            clock: Arc::new(SystemClock),
            default_slot_interval: config.default_slot_interval_minutes,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ==========================================================================
    // CREATE
    // ==========================================================================

    #[instrument(skip_all, fields(principal_id = %principal.id))]
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        principal: &Principal,
    ) -> Result<Appointment, AppointmentError> {
        policy::ensure_can_book(principal)?;

        let department_id = required(request.department_id, "department_id")?;
        let doctor_id = required(request.doctor_id, "doctor_id")?;
        let raw_date = required(non_blank(request.date), "date")?;
        let raw_slot = required(non_blank(request.time_slot), "time_slot")?;

        let time_slot = TimeSlot::parse(&raw_slot)?;
        let date = parse_appointment_date(&raw_date)?;
        self.ensure_not_past(date)?;

        debug!("Booking doctor {} in department {} on {} at {}", doctor_id, department_id, date, time_slot);

        let department = self.load_department(department_id).await?;
        let doctor = self.load_doctor(doctor_id).await?;
        ensure_doctor_in_department(&doctor, &department)?;
        self.ensure_slot_in_grid(&doctor, time_slot)?;

        let patient = self.resolve_patient(principal, request.patient_id).await?;
        let patient_name = non_blank(request.patient_name).unwrap_or_else(|| patient.name.clone());

        self.availability.ensure_free(doctor_id, date, time_slot, None).await?;

        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Some(patient.id),
            patient_name,
            requesting_user_id: principal.id,
            doctor_id,
            department_id,
            date,
            time_slot,
            status: AppointmentStatus::Pending,
            notes: non_blank(request.notes),
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert(appointment).await?;
        info!("Appointment {} booked with doctor {} on {} at {}", created.id, doctor_id, date, time_slot);

        self.record_back_references(&created, &[
            BackReference::Doctor(doctor_id),
            BackReference::Department(department_id),
            BackReference::Patient(patient.id),
        ])
        .await;
        self.notify(AppointmentEventKind::Created, &created).await;

        Ok(created)
    }

    // ==========================================================================
    // RESCHEDULE
    // ==========================================================================

    #[instrument(skip_all, fields(appointment_id = %id, principal_id = %principal.id))]
    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        request: RescheduleAppointmentRequest,
        principal: &Principal,
    ) -> Result<Appointment, AppointmentError> {
        let existing = self.load_appointment(id).await?;
        policy::authorize(principal, &existing)?;

        let doctor_id = request.doctor_id.unwrap_or(existing.doctor_id);
        let department_id = request.department_id.unwrap_or(existing.department_id);

        let date = match non_blank(request.date) {
            Some(raw) => parse_appointment_date(&raw)?,
            None => existing.date,
        };

        let time_slot = match non_blank(request.time_slot) {
            Some(raw) => TimeSlot::parse(&raw)?,
            None => existing.time_slot,
        };

        let doctor_changed = doctor_id != existing.doctor_id;
        let department_changed = department_id != existing.department_id;
        let placement_changed = doctor_changed || date != existing.date || time_slot != existing.time_slot;

        if placement_changed {
            self.lifecycle_service.ensure_reschedulable(existing.status)?;
            // Applies to the effective date, so a slot-only move cannot keep a past date.
            self.ensure_not_past(date)?;
        }

        if doctor_changed || department_changed || time_slot != existing.time_slot {
            let doctor = self.load_doctor(doctor_id).await?;
            if doctor_changed || department_changed {
                let department = self.load_department(department_id).await?;
                ensure_doctor_in_department(&doctor, &department)?;
            }
            self.ensure_slot_in_grid(&doctor, time_slot)?;
        }

        if placement_changed {
            self.availability
                .ensure_free(doctor_id, date, time_slot, Some(existing.id))
                .await?;
        }

        let read = existing.revision();
        let mut updated = existing;
        updated.doctor_id = doctor_id;
        updated.department_id = department_id;
        updated.date = date;
        updated.time_slot = time_slot;
        if let Some(notes) = request.notes {
            updated.notes = non_blank(Some(notes));
        }
        updated.updated_at = self.clock.now();

        let saved = self.store.update(updated, &read).await?;
        info!("Appointment {} rescheduled to doctor {} on {} at {}", saved.id, doctor_id, date, time_slot);

        let mut new_targets = Vec::new();
        if doctor_changed {
            new_targets.push(BackReference::Doctor(doctor_id));
        }
        if department_changed {
            new_targets.push(BackReference::Department(department_id));
        }
        self.record_back_references(&saved, &new_targets).await;
        self.notify(AppointmentEventKind::Updated, &saved).await;

        Ok(saved)
    }

    // ==========================================================================
    // STATUS
    // ==========================================================================

    #[instrument(skip_all, fields(appointment_id = %id, principal_id = %principal.id))]
    pub async fn update_status(
        &self,
        id: Uuid,
        raw_status: &str,
        principal: &Principal,
    ) -> Result<Appointment, AppointmentError> {
        let existing = self.load_appointment(id).await?;
        policy::authorize(principal, &existing)?;

        let requested: AppointmentStatus = raw_status.parse()?;

        match self.lifecycle_service.validate_status_transition(existing.status, requested)? {
            StatusChange::Unchanged => {
                debug!("Appointment {} already {}, nothing to write", id, requested);
                Ok(existing)
            }
            StatusChange::Transition { from, to } => {
                let read = existing.revision();
                let mut updated = existing;
                updated.status = to;
                updated.updated_at = self.clock.now();

                let saved = self.store.update(updated, &read).await?;
                info!("Appointment {} moved from {} to {}", saved.id, from, to);

                self.notify(AppointmentEventKind::StatusChanged, &saved).await;
                Ok(saved)
            }
        }
    }

    // ==========================================================================
    // DELETE / READ
    // ==========================================================================

    #[instrument(skip_all, fields(appointment_id = %id, principal_id = %principal.id))]
    pub async fn soft_delete_appointment(
        &self,
        id: Uuid,
        principal: &Principal,
    ) -> Result<(), AppointmentError> {
        let existing = self.load_appointment(id).await?;
        policy::authorize(principal, &existing)?;

        let now = self.clock.now();
        let read = existing.revision();
        let mut deleted = existing;
        deleted.is_deleted = true;
        deleted.deleted_at = Some(now);
        deleted.updated_at = now;

        let saved = self.store.update(deleted, &read).await?;
        info!("Appointment {} soft-deleted", saved.id);

        self.notify(AppointmentEventKind::Deleted, &saved).await;
        Ok(())
    }

    pub async fn get_appointment(
        &self,
        id: Uuid,
        principal: &Principal,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_appointment(id).await?;
        policy::authorize(principal, &appointment)?;
        Ok(appointment)
    }

    /// Open and taken slots for a doctor on a date. Needs no principal.
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        raw_date: &str,
    ) -> Result<AvailableSlots, AppointmentError> {
        let date = parse_appointment_date(raw_date)?;
        let doctor = self.load_doctor(doctor_id).await?;
        let grid = doctor_slot_grid(&doctor, self.default_slot_interval)?;

        self.availability.available_slots(doctor_id, date, &grid).await
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn load_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .find_active(id)
            .await?
            .ok_or_else(|| AppointmentError::not_found("appointment", id))
    }

    async fn load_doctor(&self, id: Uuid) -> Result<Doctor, AppointmentError> {
        self.directory
            .doctor(id)
            .await?
            .ok_or_else(|| AppointmentError::not_found("doctor", id))
    }

    async fn load_department(&self, id: Uuid) -> Result<Department, AppointmentError> {
        self.directory
            .department(id)
            .await?
            .ok_or_else(|| AppointmentError::not_found("department", id))
    }

    /// Staff book on behalf of an explicit patient; everyone else books for
    /// the patient record linked to their own identity.
    async fn resolve_patient(
        &self,
        principal: &Principal,
        requested: Option<Uuid>,
    ) -> Result<Patient, AppointmentError> {
        if principal.role.is_staff() {
            let patient_id = requested.ok_or_else(|| {
                AppointmentError::Validation("patient_id is required when booking on behalf of a patient".to_string())
            })?;
            return self
                .directory
                .patient(patient_id)
                .await?
                .ok_or_else(|| AppointmentError::not_found("patient", patient_id));
        }

        let linked = match principal.linked_patient_id {
            Some(patient_id) => self.directory.patient(patient_id).await?,
            None => self.directory.patient_for_user(principal.id).await?,
        };
        let patient = linked.ok_or(AppointmentError::PatientNotFound)?;

        if let Some(patient_id) = requested {
            if patient_id != patient.id {
                warn!("Principal {} tried to book for patient {}", principal.id, patient_id);
                return Err(AppointmentError::Forbidden(
                    "You may only book appointments for your own patient record".to_string(),
                ));
            }
        }
        Ok(patient)
    }

    fn ensure_not_past(&self, date: NaiveDate) -> Result<(), AppointmentError> {
        let today = self.clock.today();
        if date < today {
            return Err(AppointmentError::Validation(format!(
                "Appointment date {} is in the past (today is {})",
                date, today
            )));
        }
        Ok(())
    }

    fn ensure_slot_in_grid(&self, doctor: &Doctor, time_slot: TimeSlot) -> Result<(), AppointmentError> {
        let grid = doctor_slot_grid(doctor, self.default_slot_interval)?;
        if !grid.contains(&time_slot) {
            return Err(AppointmentError::Validation(format!(
                "Time slot {} is outside the working hours of doctor {} ({}-{})",
                time_slot, doctor.id, doctor.working_hours_start, doctor.working_hours_end
            )));
        }
        Ok(())
    }

    async fn record_back_references(&self, appointment: &Appointment, targets: &[BackReference]) {
        for target in targets {
            if let Err(e) = self.directory.record_appointment(*target, appointment.id).await {
                warn!("Could not append appointment {} to {} {}: {}",
                      appointment.id, target.table(), target.record_id(), e);
            }
        }
    }

    async fn notify(&self, kind: AppointmentEventKind, appointment: &Appointment) {
        let event = AppointmentEvent {
            kind,
            appointment: appointment.clone(),
            occurred_at: self.clock.now(),
        };
        if let Err(e) = self.notifier.publish(&event).await {
            warn!("Failed to publish {:?} for appointment {}: {}", kind, appointment.id, e);
        }
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; the time of day is dropped.
pub fn parse_appointment_date(raw: &str) -> Result<NaiveDate, AppointmentError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
        .map_err(|_| {
            AppointmentError::Validation(format!(
                "Invalid date '{}': expected YYYY-MM-DD or an RFC 3339 timestamp",
                raw
            ))
        })
}

fn ensure_doctor_in_department(doctor: &Doctor, department: &Department) -> Result<(), AppointmentError> {
    if doctor.department_id != department.id {
        return Err(AppointmentError::Validation(format!(
            "Doctor {} does not belong to department {}",
            doctor.id, department.id
        )));
    }
    Ok(())
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppointmentError> {
    value.ok_or_else(|| AppointmentError::Validation(format!("{} is required", field)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
