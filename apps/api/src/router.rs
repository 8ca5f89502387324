use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, availability_routes, AppointmentCellState};

pub fn create_router(state: Arc<AppointmentCellState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/availability", availability_routes(state))
}
