use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};

use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the decoded `User` in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !request.headers().contains_key(axum::http::header::AUTHORIZATION) {
        return Err(AppError::Auth("Missing authorization header".to_string()));
    }

    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(bearer.token(), &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
