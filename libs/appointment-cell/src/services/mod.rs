pub mod availability;
pub mod booking;
pub mod clock;
pub mod directory;
pub mod lifecycle;
pub mod notifications;
pub mod policy;
pub mod query;
pub mod slot_grid;
pub mod store;
pub mod supabase;
