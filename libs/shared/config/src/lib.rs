use std::env;
use std::str::FromStr;
use tracing::warn;

/// Where appointment records and directory lookups are served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "in-memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub storage_backend: StorageBackend,
    pub default_slot_interval_minutes: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub notification_channel_capacity: usize,
    pub server_port: u16,
    /// JSON file of departments, doctors and patients for the memory backend.
    pub directory_seed_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            storage_backend: env::var("APPOINTMENT_STORAGE")
                .ok()
                .and_then(|raw| match raw.parse() {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        warn!("{}, falling back to memory storage", e);
                        None
                    }
                })
                .unwrap_or(StorageBackend::Memory),
            default_slot_interval_minutes: parse_or("SLOT_INTERVAL_MINUTES", 30),
            default_page_size: parse_or("DEFAULT_PAGE_SIZE", 10),
            max_page_size: parse_or("MAX_PAGE_SIZE", 100),
            notification_channel_capacity: parse_or("NOTIFICATION_CHANNEL_CAPACITY", 256),
            server_port: parse_or("SERVER_PORT", 3000),
            directory_seed_path: env::var("DIRECTORY_SEED_PATH").ok().filter(|p| !p.trim().is_empty()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Authentication always needs the JWT secret; the Supabase backend
    /// additionally needs a reachable project and a service key.
    pub fn is_configured(&self) -> bool {
        if self.supabase_jwt_secret.is_empty() {
            return false;
        }
        match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => self.is_supabase_configured(),
        }
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_role_key.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            supabase_service_role_key: String::new(),
            storage_backend: StorageBackend::Memory,
            default_slot_interval_minutes: 30,
            default_page_size: 10,
            max_page_size: 100,
            notification_channel_capacity: 256,
            server_port: 3000,
            directory_seed_path: None,
        }
    }
}

fn parse_or<T: FromStr + std::fmt::Display + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_known_names() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("Supabase".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn memory_backend_only_needs_jwt_secret() {
        let mut config = AppConfig::default();
        assert!(!config.is_configured());

        config.supabase_jwt_secret = "secret".to_string();
        assert!(config.is_configured());

        config.storage_backend = StorageBackend::Supabase;
        assert!(!config.is_configured());
    }
}
