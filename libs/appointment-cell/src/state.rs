// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use shared_config::{AppConfig, StorageBackend};
use shared_database::supabase::SupabaseClient;

use crate::services::booking::AppointmentBookingService;
use crate::services::clock::{Clock, SystemClock};
use crate::services::directory::{Directory, DirectorySeed, InMemoryDirectory};
use crate::services::notifications::NotificationSink;
use crate::services::query::AppointmentQueryService;
use crate::services::store::{AppointmentStore, InMemoryAppointmentStore};
use crate::services::supabase::{SupabaseAppointmentStore, SupabaseDirectory};

/// Shared by every appointment and availability handler.
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub booking: AppointmentBookingService,
    pub queries: AppointmentQueryService,
}

impl AppointmentCellState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let booking = AppointmentBookingService::new(Arc::clone(&store), directory, notifier, &config)
            .with_clock(clock);
        let queries = AppointmentQueryService::new(store, &config);

        Self { config, booking, queries }
    }

    /// Wires the store and directory selected by `APPOINTMENT_STORAGE`.
    pub fn from_config(config: Arc<AppConfig>, notifier: Arc<dyn NotificationSink>) -> Result<Self> {
        let (store, directory): (Arc<dyn AppointmentStore>, Arc<dyn Directory>) = match config.storage_backend {
            StorageBackend::Memory => {
                let directory = match &config.directory_seed_path {
                    Some(path) => {
                        let raw = std::fs::read_to_string(path)
                            .with_context(|| format!("reading directory seed {}", path))?;
                        let seed = DirectorySeed::from_json(&raw)
                            .with_context(|| format!("parsing directory seed {}", path))?;
                        InMemoryDirectory::from_seed(seed)
                    }
                    None => InMemoryDirectory::new(),
                };
                info!("Using in-memory appointment storage");
                let store: Arc<dyn AppointmentStore> = Arc::new(InMemoryAppointmentStore::new());
                let directory: Arc<dyn Directory> = Arc::new(directory);
                (store, directory)
            }
            StorageBackend::Supabase => {
                anyhow::ensure!(
                    config.is_supabase_configured(),
                    "APPOINTMENT_STORAGE=supabase needs SUPABASE_URL, SUPABASE_ANON_PUBLIC_KEY and SUPABASE_SERVICE_ROLE_KEY"
                );
                let supabase = Arc::new(SupabaseClient::new(&config));
                info!("Using Supabase appointment storage at {}", supabase.get_base_url());
                let store: Arc<dyn AppointmentStore> =
                    Arc::new(SupabaseAppointmentStore::new(Arc::clone(&supabase), &config));
                let directory: Arc<dyn Directory> = Arc::new(SupabaseDirectory::new(supabase, &config));
                (store, directory)
            }
        };

        Ok(Self::new(config, store, directory, notifier, Arc::new(SystemClock)))
    }
}
