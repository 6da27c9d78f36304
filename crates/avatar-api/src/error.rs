//! HTTP error response conversion
//!
//! Handlers return `Result<Json<AvatarResponse>, HttpAvatarError>`. Every
//! failure renders as the same `{success: false, message, code}` envelope the
//! success path uses.

use avatar_core::{AvatarError, DeleteOutcome, ErrorMetadata, GeneratedAvatar, LogLevel, UserId};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON envelope of every avatar endpoint.
#[derive(Debug, Default, Serialize)]
pub struct AvatarResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine-readable error code for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DeleteOutcome>,
}

impl AvatarResponse {
    pub fn generated(avatar: GeneratedAvatar) -> Self {
        Self {
            success: true,
            user: Some(avatar.user),
            full: Some(avatar.full),
            thumb: Some(avatar.thumb),
            ..Default::default()
        }
    }

    pub fn deleted(user: UserId, outcome: DeleteOutcome) -> Self {
        Self {
            success: true,
            user: Some(user),
            deleted: Some(outcome),
            ..Default::default()
        }
    }

    pub fn resolved(user: UserId, url: String) -> Self {
        Self {
            success: true,
            user: Some(user),
            url: Some(url),
            ..Default::default()
        }
    }
}

/// Wrapper type for AvatarError to implement IntoResponse
/// (orphan rules: both the trait and the error type are foreign here)
#[derive(Debug)]
pub struct HttpAvatarError(pub AvatarError);

impl From<AvatarError> for HttpAvatarError {
    fn from(err: AvatarError) -> Self {
        HttpAvatarError(err)
    }
}

fn log_error(error: &AvatarError) {
    let code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, code = code, "Avatar request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, code = code, "Avatar request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, code = code, "Avatar request failed");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAvatarError {
    fn into_response(self) -> Response {
        let error = &self.0;

        let status =
            StatusCode::from_u16(error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(error);

        // Internal details only leave the process outside production, and only for 5xx.
        let details = if !is_production_env() && status.is_server_error() {
            Some(error.to_string())
        } else {
            None
        };

        let body = Json(AvatarResponse {
            success: false,
            message: Some(error.client_message()),
            code: Some(error.error_code().to_string()),
            details,
            ..Default::default()
        });

        (status, body).into_response()
    }
}
