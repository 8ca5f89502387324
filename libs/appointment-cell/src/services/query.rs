// libs/appointment-cell/src/services/query.rs
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    AccessScope, Appointment, AppointmentError, AppointmentFilter, AppointmentListQuery,
    AppointmentStatus, Page, Pagination, Principal,
};
use crate::services::policy;
use crate::services::store::AppointmentStore;

/// Read side: every list goes through the principal's policy scope.
pub struct AppointmentQueryService {
    store: Arc<dyn AppointmentStore>,
    default_page_size: u32,
    max_page_size: u32,
}

impl AppointmentQueryService {
    pub fn new(store: Arc<dyn AppointmentStore>, config: &AppConfig) -> Self {
        Self {
            store,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    pub async fn list_appointments(
        &self,
        query: AppointmentListQuery,
        principal: &Principal,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let scope = policy::list_scope(principal)?;
        self.run(query, scope).await
    }

    /// Appointments the caller booked, or that belong to their linked record.
    pub async fn list_my_appointments(
        &self,
        query: AppointmentListQuery,
        principal: &Principal,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let scope = policy::own_scope(principal)?;
        self.run(query, scope).await
    }

    pub async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        mut query: AppointmentListQuery,
        principal: &Principal,
    ) -> Result<Page<Appointment>, AppointmentError> {
        query.doctor_id = Some(doctor_id);
        self.list_appointments(query, principal).await
    }

    pub async fn list_department_appointments(
        &self,
        department_id: Uuid,
        mut query: AppointmentListQuery,
        principal: &Principal,
    ) -> Result<Page<Appointment>, AppointmentError> {
        query.department_id = Some(department_id);
        self.list_appointments(query, principal).await
    }

    async fn run(
        &self,
        query: AppointmentListQuery,
        scope: Option<AccessScope>,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let pagination = Pagination::new(query.page, query.page_size, self.default_page_size, self.max_page_size);
        let status = query
            .status
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(str::parse::<AppointmentStatus>)
            .transpose()?;

        let filter = AppointmentFilter {
            status,
            doctor_id: query.doctor_id,
            department_id: query.department_id,
            patient_id: query.patient_id,
            scope,
        };
        debug!("Listing appointments with {:?} ({:?})", filter, pagination);

        self.store.query(&filter, pagination).await
    }
}
