// libs/appointment-cell/src/services/availability.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{AppointmentError, AvailableSlots};
use crate::services::slot_grid::TimeSlot;
use crate::services::store::AppointmentStore;

/// Read-only view over which slots active appointments hold.
pub struct AvailabilityIndex {
    store: Arc<dyn AppointmentStore>,
}

impl AvailabilityIndex {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn occupied_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> Result<BTreeSet<TimeSlot>, AppointmentError> {
        self.store.occupied_slots(doctor_id, date, exclude_id).await
    }

    /// Optimistic pre-check ahead of a write. The store still decides.
    pub async fn ensure_free(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time_slot: TimeSlot,
        exclude_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let occupied = self.occupied_slots(doctor_id, date, exclude_id).await?;
        if occupied.contains(&time_slot) {
            warn!("Slot {} on {} already held for doctor {}", time_slot, date, doctor_id);
            return Err(AppointmentError::SlotConflict { doctor_id, date, time_slot });
        }
        Ok(())
    }

    /// Splits a doctor's grid into open and taken slots for a date.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        grid: &[TimeSlot],
    ) -> Result<AvailableSlots, AppointmentError> {
        let occupied = self.occupied_slots(doctor_id, date, None).await?;
        let (booked, available) = partition_grid(grid, &occupied);

        debug!("Doctor {} on {}: {} available, {} booked", doctor_id, date, available.len(), booked.len());
        Ok(AvailableSlots { doctor_id, date, available, booked })
    }
}

/// Returns `(booked, available)`, both in grid order. Occupied slots that fall
/// outside the grid are not reported.
pub fn partition_grid(grid: &[TimeSlot], occupied: &BTreeSet<TimeSlot>) -> (Vec<TimeSlot>, Vec<TimeSlot>) {
    grid.iter().copied().partition(|slot| occupied.contains(slot))
}
