// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// What applying a requested status to a stored one amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Target equals the current status; nothing to write.
    Unchanged,
    Transition { from: AppointmentStatus, to: AppointmentStatus },
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<StatusChange, AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status == new_status {
            return Ok(StatusChange::Unchanged);
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(StatusChange::Transition { from: current_status, to: new_status })
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    /// Doctor, date and slot may only move while the appointment is still open.
    pub fn ensure_reschedulable(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        if current_status.is_terminal() {
            warn!("Reschedule attempted on {} appointment", current_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: current_status,
            });
        }
        Ok(())
    }
}
