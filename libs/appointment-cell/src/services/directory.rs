// libs/appointment-cell/src/services/directory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AppointmentError, BackReference, Department, Doctor, Patient};

/// Doctor, department and patient records owned outside the scheduling core.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn doctor(&self, id: Uuid) -> Result<Option<Doctor>, AppointmentError>;

    async fn department(&self, id: Uuid) -> Result<Option<Department>, AppointmentError>;

    async fn patient(&self, id: Uuid) -> Result<Option<Patient>, AppointmentError>;

    /// Patient record linked to an identity, if the account has one.
    async fn patient_for_user(&self, user_id: Uuid) -> Result<Option<Patient>, AppointmentError>;

    /// Appends an appointment id to a record's appointment list. Not authoritative.
    async fn record_appointment(
        &self,
        target: BackReference,
        appointment_id: Uuid,
    ) -> Result<(), AppointmentError>;
}

/// Initial directory contents, loadable from JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub patients: Vec<Patient>,
}

impl DirectorySeed {
    pub fn from_json(raw: &str) -> Result<Self, AppointmentError> {
        serde_json::from_str(raw)
            .map_err(|e| AppointmentError::Validation(format!("Invalid directory seed: {}", e)))
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
    departments: RwLock<HashMap<Uuid, Department>>,
    patients: RwLock<HashMap<Uuid, Patient>>,
    back_references: RwLock<HashMap<BackReference, Vec<Uuid>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        debug!("Seeding directory with {} departments, {} doctors, {} patients",
               seed.departments.len(), seed.doctors.len(), seed.patients.len());
        Self {
            doctors: RwLock::new(seed.doctors.into_iter().map(|d| (d.id, d)).collect()),
            departments: RwLock::new(seed.departments.into_iter().map(|d| (d.id, d)).collect()),
            patients: RwLock::new(seed.patients.into_iter().map(|p| (p.id, p)).collect()),
            back_references: RwLock::default(),
        }
    }

    pub async fn add_doctor(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }

    pub async fn add_department(&self, department: Department) {
        self.departments.write().await.insert(department.id, department);
    }

    pub async fn add_patient(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }

    /// Appointment ids appended to a record so far, in append order.
    pub async fn back_references(&self, target: BackReference) -> Vec<Uuid> {
        self.back_references
            .read()
            .await
            .get(&target)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn doctor(&self, id: Uuid) -> Result<Option<Doctor>, AppointmentError> {
        Ok(self.doctors.read().await.get(&id).cloned())
    }

    async fn department(&self, id: Uuid) -> Result<Option<Department>, AppointmentError> {
        Ok(self.departments.read().await.get(&id).cloned())
    }

    async fn patient(&self, id: Uuid) -> Result<Option<Patient>, AppointmentError> {
        Ok(self.patients.read().await.get(&id).cloned())
    }

    async fn patient_for_user(&self, user_id: Uuid) -> Result<Option<Patient>, AppointmentError> {
        Ok(self
            .patients
            .read()
            .await
            .values()
            .find(|patient| patient.user_id == Some(user_id))
            .cloned())
    }

    async fn record_appointment(
        &self,
        target: BackReference,
        appointment_id: Uuid,
    ) -> Result<(), AppointmentError> {
        let known = match target {
            BackReference::Doctor(id) => self.doctors.read().await.contains_key(&id),
            BackReference::Department(id) => self.departments.read().await.contains_key(&id),
            BackReference::Patient(id) => self.patients.read().await.contains_key(&id),
        };
        if !known {
            return Err(AppointmentError::not_found(target.table(), target.record_id()));
        }

        let mut refs = self.back_references.write().await;
        let list = refs.entry(target).or_default();
        if !list.contains(&appointment_id) {
            list.push(appointment_id);
        }
        Ok(())
    }
}
