//! Avatar endpoints

use std::sync::Arc;

use avatar_core::{AvatarError, AvatarSize, UploadErrorCode, UploadOutcome, UserId};
use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::Caller;
use crate::error::{AvatarResponse, HttpAvatarError};
use crate::state::AppState;
use crate::utils::upload::read_upload_form;

/// Upload a new avatar and generate its variants in one request.
///
/// The `user` form field targets another user's avatar; it is honored only
/// for callers allowed to edit other avatars.
#[tracing::instrument(skip(state, multipart), fields(actor = %caller.0.id))]
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    multipart: Multipart,
) -> Result<Json<AvatarResponse>, HttpAvatarError> {
    let temp_dir = tempfile::Builder::new()
        .prefix("avatar-upload-")
        .tempdir()
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create upload temp dir");
            let code = UploadErrorCode::NoTmpDir;
            AvatarError::UploadRejected {
                code,
                message: state.avatars.validator().message(code),
            }
        })?;

    let form = read_upload_form(multipart, temp_dir.path()).await;
    let user = state.avatars.target_user(&caller.0, form.user);

    let mut session = state.avatars.session();
    if let UploadOutcome::Rejected { code, message } = session.upload(&form.files, user).await {
        return Err(AvatarError::UploadRejected { code, message }.into());
    }

    let avatar = session.generate(user, None).await?;

    Ok(Json(AvatarResponse::generated(avatar)))
}

/// Delete a user's avatar. Succeeds when there is nothing to delete.
///
/// Another user's avatar requires the edit-others capability; without it the
/// request is refused with 403 and nothing is touched.
#[tracing::instrument(skip(state), fields(actor = %caller.0.id))]
pub async fn delete_avatar(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(user): Path<UserId>,
) -> Result<Json<AvatarResponse>, HttpAvatarError> {
    let user = state.avatars.authorize_target(&caller.0, user)?;
    let outcome = state.avatars.delete(user).await;

    for failure in outcome.failures() {
        tracing::warn!(
            user_id = %user,
            operation = ?failure.operation,
            path = %failure.path.display(),
            message = %failure.message,
            "Avatar cleanup step failed"
        );
    }

    Ok(Json(AvatarResponse::deleted(user, outcome)))
}

#[derive(Debug, Deserialize)]
pub struct AvatarQuery {
    /// `full`, `thumb` or a pixel size
    pub size: Option<String>,
}

/// Public URL of a user's avatar; empty when the user has none.
pub async fn get_avatar(
    State(state): State<Arc<AppState>>,
    Path(user): Path<UserId>,
    Query(query): Query<AvatarQuery>,
) -> Result<Json<AvatarResponse>, HttpAvatarError> {
    let size = match query.size.as_deref() {
        Some(size) => size.parse::<AvatarSize>().map_err(AvatarError::InvalidInput)?,
        None => AvatarSize::default(),
    };

    let url = state.avatars.avatar(user, size).await;

    Ok(Json(AvatarResponse::resolved(user, url)))
}
