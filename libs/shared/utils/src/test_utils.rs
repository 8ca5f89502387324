use std::sync::Arc;
use chrono::{Duration, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Points the Supabase settings at a mock server (e.g. `wiremock::MockServer::uri()`).
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            storage_backend: StorageBackend::Memory,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub linked_doctor_id: Option<Uuid>,
    pub linked_patient_id: Option<Uuid>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "patient")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            linked_doctor_id: None,
            linked_patient_id: None,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn group_admin(email: &str) -> Self {
        Self::new(email, "groupAdmin")
    }

    pub fn with_linked_doctor(mut self, doctor_id: Uuid) -> Self {
        self.linked_doctor_id = Some(doctor_id);
        self
    }

    pub fn with_linked_patient(mut self, patient_id: Uuid) -> Self {
        self.linked_patient_id = Some(patient_id);
        self
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test user ids are generated as UUIDs")
    }

    pub fn app_metadata(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("role".to_string(), json!(self.role));
        if let Some(doctor_id) = self.linked_doctor_id {
            meta.insert("doctor_id".to_string(), json!(doctor_id));
        }
        if let Some(patient_id) = self.linked_patient_id {
            meta.insert("patient_id".to_string(), json!(patient_id));
        }
        Value::Object(meta)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            app_metadata: Some(self.app_metadata()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": user.app_metadata(),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// PostgREST row shapes for the tables the scheduling core reads and writes.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn department_row(department_id: Uuid, name: &str) -> Value {
        json!({
            "id": department_id,
            "name": name
        })
    }

    pub fn doctor_row(doctor_id: Uuid, department_id: Uuid, start: &str, end: &str) -> Value {
        json!({
            "id": doctor_id,
            "department_id": department_id,
            "name": "Dr. Test",
            "working_hours_start": start,
            "working_hours_end": end,
            "slot_interval_minutes": null
        })
    }

    pub fn patient_row(patient_id: Uuid, user_id: Uuid, name: &str) -> Value {
        json!({
            "id": patient_id,
            "user_id": user_id,
            "name": name
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        doctor_id: Uuid,
        department_id: Uuid,
        date: NaiveDate,
        time_slot: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": appointment_id,
            "patient_id": Uuid::new_v4(),
            "patient_name": "Test Patient",
            "requesting_user_id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "department_id": department_id,
            "date": date.format("%Y-%m-%d").to_string(),
            "time_slot": time_slot,
            "status": status,
            "notes": null,
            "is_deleted": false,
            "deleted_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}
