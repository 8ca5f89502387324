use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_RANGE, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// PostgREST answers 409 for unique and foreign key violations alike;
    /// `code` carries the Postgres SQLSTATE from the error body.
    #[error("Constraint conflict ({}): {message}", .code.as_deref().unwrap_or("unknown"))]
    Conflict { code: Option<String>, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

pub const UNIQUE_VIOLATION: &str = "23505";
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

impl SupabaseError {
    /// Errors that say the backend could not be reached or answered with a 5xx.
    pub fn is_unavailable(&self) -> bool {
        match self {
            SupabaseError::Transport(_) => true,
            SupabaseError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| SupabaseError::InvalidHeader(format!("apikey: {}", e)))?;
        headers.insert("apikey", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SupabaseError::InvalidHeader(format!("authorization: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        let (data, _) = self.send(method, path, auth_token, body, extra_headers).await?;
        Ok(data)
    }

    /// Like `request`, but asks PostgREST for an exact row count and returns
    /// the total parsed from the `Content-Range` header.
    pub async fn request_with_count<T>(&self, path: &str, auth_token: Option<&str>)
                                       -> Result<(T, Option<u64>), SupabaseError>
    where T: DeserializeOwned {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let (data, response_headers) = self
            .send(Method::GET, path, auth_token, None, Some(headers))
            .await?;

        let total = response_headers
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);

        Ok((data, total))
    }

    async fn send<T>(&self, method: Method, path: &str,
                     auth_token: Option<&str>, body: Option<Value>,
                     extra_headers: Option<HeaderMap>)
                     -> Result<(T, HeaderMap), SupabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SupabaseError::Auth(error_text),
                StatusCode::NOT_FOUND => SupabaseError::NotFound(error_text),
                StatusCode::CONFLICT => SupabaseError::Conflict {
                    code: postgres_error_code(&error_text),
                    message: error_text,
                },
                _ => SupabaseError::Api { status: status.as_u16(), message: error_text },
            });
        }

        let response_headers = response.headers().clone();
        let data = response
            .json::<T>()
            .await
            .map_err(|e| SupabaseError::Decode(e.to_string()))?;
        Ok((data, response_headers))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// SQLSTATE from a PostgREST error body such as `{"code":"23505","message":..}`.
fn postgres_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("code")?
        .as_str()
        .map(str::to_string)
}

/// `Content-Range: 0-9/42` -> `Some(42)`; `*/0` -> `Some(0)`; `0-9/*` -> `None`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next().and_then(|total| total.trim().parse().ok())
}
