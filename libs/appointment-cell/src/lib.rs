pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use router::{appointment_routes, availability_routes};
pub use state::AppointmentCellState;
