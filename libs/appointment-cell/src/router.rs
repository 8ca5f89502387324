// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentCellState;

pub fn appointment_routes(state: Arc<AppointmentCellState>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::create_appointment))
        .route("/mine", get(handlers::list_my_appointments))
        .route("/doctors/{doctor_id}", get(handlers::list_doctor_appointments))
        .route("/departments/{department_id}", get(handlers::list_department_appointments))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::reschedule_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

/// Open slot lookups are public.
pub fn availability_routes(state: Arc<AppointmentCellState>) -> Router {
    Router::new()
        .route("/doctors/{doctor_id}", get(handlers::get_available_slots))
        .with_state(state)
}
