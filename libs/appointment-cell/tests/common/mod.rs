#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    CreateAppointmentRequest, Department, Doctor, Patient, Principal,
};
use appointment_cell::services::clock::FixedClock;
use appointment_cell::services::directory::{Directory, InMemoryDirectory};
use appointment_cell::services::notifications::{BroadcastNotificationSink, NotificationSink};
use appointment_cell::services::store::InMemoryAppointmentStore;
use appointment_cell::AppointmentCellState;
use shared_utils::test_utils::{TestConfig, TestUser};

/// 2030-01-10 10:00 UTC.
pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2030, 1, 10, 10, 0, 0).unwrap()))
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 10).unwrap()
}

pub const BOOKING_DATE: &str = "2030-01-15";

pub fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()
}

pub fn principal(user: &TestUser) -> Principal {
    Principal::from_user(&user.to_user()).expect("test users carry uuid ids")
}

/// In-memory scheduling core with one patient and two doctors in two departments.
pub struct Fixture {
    pub config: TestConfig,
    pub state: Arc<AppointmentCellState>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub sink: Arc<BroadcastNotificationSink>,
    pub department: Department,
    pub other_department: Department,
    /// Works 09:00-11:00 on the default 30 minute grid.
    pub doctor: Doctor,
    /// Works 08:00-12:00 with a 20 minute grid, in `other_department`.
    pub other_doctor: Doctor,
    pub patient: Patient,
    pub patient_user: TestUser,
    pub admin_user: TestUser,
    pub doctor_user: TestUser,
}

impl Fixture {
    pub async fn new() -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemoryAppointmentStore::new());
        let sink = Arc::new(BroadcastNotificationSink::new(64));
        Self::with_collaborators(store, directory.clone(), directory, sink.clone(), sink).await
    }

    /// Same seed data, but lets a test swap in its own directory or sink
    /// wrappers around the in-memory ones.
    pub async fn with_collaborators(
        store: Arc<InMemoryAppointmentStore>,
        directory: Arc<InMemoryDirectory>,
        directory_seam: Arc<dyn Directory>,
        sink: Arc<BroadcastNotificationSink>,
        sink_seam: Arc<dyn NotificationSink>,
    ) -> Self {
        let config = TestConfig::default();

        let department = Department { id: Uuid::new_v4(), name: "General Practice".to_string() };
        let other_department = Department { id: Uuid::new_v4(), name: "Dermatology".to_string() };
        let doctor = Doctor {
            id: Uuid::new_v4(),
            department_id: department.id,
            name: "Dr. Grid".to_string(),
            working_hours_start: "09:00".to_string(),
            working_hours_end: "11:00".to_string(),
            slot_interval_minutes: None,
        };
        let other_doctor = Doctor {
            id: Uuid::new_v4(),
            department_id: other_department.id,
            name: "Dr. Skin".to_string(),
            working_hours_start: "08:00".to_string(),
            working_hours_end: "12:00".to_string(),
            slot_interval_minutes: Some(20),
        };

        let patient_id = Uuid::new_v4();
        let patient_user = TestUser::patient("patient@example.com").with_linked_patient(patient_id);
        let patient = Patient {
            id: patient_id,
            user_id: Some(patient_user.uuid()),
            name: "Pat Example".to_string(),
        };
        let admin_user = TestUser::admin("admin@example.com");
        let doctor_user = TestUser::doctor("doctor@example.com").with_linked_doctor(doctor.id);

        directory.add_department(department.clone()).await;
        directory.add_department(other_department.clone()).await;
        directory.add_doctor(doctor.clone()).await;
        directory.add_doctor(other_doctor.clone()).await;
        directory.add_patient(patient.clone()).await;

        let state = Arc::new(AppointmentCellState::new(
            config.to_arc(),
            store.clone(),
            directory_seam,
            sink_seam,
            fixed_clock(),
        ));

        Self {
            config,
            state,
            store,
            directory,
            sink,
            department,
            other_department,
            doctor,
            other_doctor,
            patient,
            patient_user,
            admin_user,
            doctor_user,
        }
    }

    pub fn request(&self, slot: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            department_id: Some(self.department.id),
            doctor_id: Some(self.doctor.id),
            date: Some(BOOKING_DATE.to_string()),
            time_slot: Some(slot.to_string()),
            ..Default::default()
        }
    }

    pub fn patient_principal(&self) -> Principal {
        principal(&self.patient_user)
    }

    pub fn admin_principal(&self) -> Principal {
        principal(&self.admin_user)
    }

    pub fn doctor_principal(&self) -> Principal {
        principal(&self.doctor_user)
    }

    /// A second patient with their own linked record.
    pub async fn add_patient(&self, email: &str, name: &str) -> (TestUser, Patient) {
        let patient_id = Uuid::new_v4();
        let user = TestUser::patient(email).with_linked_patient(patient_id);
        let patient = Patient { id: patient_id, user_id: Some(user.uuid()), name: name.to_string() };
        self.directory.add_patient(patient.clone()).await;
        (user, patient)
    }

    pub fn labels(slots: &[appointment_cell::services::slot_grid::TimeSlot]) -> Vec<String> {
        slots.iter().map(ToString::to_string).collect()
    }
}
