// libs/appointment-cell/src/services/slot_grid.rs
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::models::{AppointmentError, Doctor};

pub const DEFAULT_SLOT_INTERVAL_MINUTES: u32 = 30;

const MINUTES_PER_DAY: u16 = 24 * 60;

fn slot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]{2}):([0-9]{2})$").expect("slot pattern is valid"))
}

/// A bookable time of day, stored as minutes since midnight and rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(u16);

impl TimeSlot {
    /// Parses a zero-padded 24-hour `HH:MM` label.
    pub fn parse(label: &str) -> Result<Self, AppointmentError> {
        let captures = slot_pattern().captures(label.trim()).ok_or_else(|| {
            AppointmentError::Validation(format!("Invalid time slot '{}': expected HH:MM", label))
        })?;

        let hours: u16 = captures[1].parse().unwrap_or(u16::MAX);
        let minutes: u16 = captures[2].parse().unwrap_or(u16::MAX);
        if hours > 23 || minutes > 59 {
            return Err(AppointmentError::Validation(format!(
                "Invalid time slot '{}': must be between 00:00 and 23:59",
                label
            )));
        }

        Ok(TimeSlot(hours * 60 + minutes))
    }

    pub fn minutes_of_day(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeSlot {
    type Err = AppointmentError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        TimeSlot::parse(label)
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        TimeSlot::parse(&label).map_err(serde::de::Error::custom)
    }
}

/// Ordered slot labels from `start` (inclusive) to `end` (exclusive).
///
/// Works purely in minutes-of-day, so the grid never depends on the current
/// date or clock. Regenerated on every call because working hours can change.
pub fn generate_slot_grid(
    start: &str,
    end: &str,
    interval_minutes: u32,
) -> Result<Vec<TimeSlot>, AppointmentError> {
    let invalid = |reason: String| AppointmentError::InvalidScheduleConfig(reason);

    let start_slot = TimeSlot::parse(start)
        .map_err(|_| invalid(format!("working hours start '{}' is not HH:MM", start)))?;
    let end_slot = TimeSlot::parse(end)
        .map_err(|_| invalid(format!("working hours end '{}' is not HH:MM", end)))?;

    if start_slot >= end_slot {
        return Err(invalid(format!("working hours start {} must be before end {}", start_slot, end_slot)));
    }
    if interval_minutes == 0 {
        return Err(invalid("slot interval must be greater than zero".to_string()));
    }

    let step = interval_minutes.min(MINUTES_PER_DAY as u32) as u16;
    let grid: Vec<TimeSlot> = (start_slot.0..end_slot.0)
        .step_by(step as usize)
        .map(TimeSlot)
        .collect();

    debug!("Generated {} slots between {} and {} every {} minutes",
           grid.len(), start_slot, end_slot, interval_minutes);
    Ok(grid)
}

/// Slot grid for a doctor, using their own interval when the directory sets one.
pub fn doctor_slot_grid(doctor: &Doctor, default_interval: u32) -> Result<Vec<TimeSlot>, AppointmentError> {
    generate_slot_grid(
        &doctor.working_hours_start,
        &doctor.working_hours_end,
        doctor.slot_interval_minutes.unwrap_or(default_interval),
    )
}
