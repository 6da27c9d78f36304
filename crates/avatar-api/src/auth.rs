//! Caller identity
//!
//! Authentication belongs to the host platform, which sits in front of this
//! service and forwards the authenticated user id in `x-user-id`.

use avatar_core::{Actor, AvatarError, ConfiguredTypes, UploadErrorCode, UserId};
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::HttpAvatarError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated actor of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = HttpAvatarError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<UserId>().ok());

        match user {
            Some(user) => Ok(Caller(Actor::new(user))),
            None => {
                let code = UploadErrorCode::NotAuthenticated;
                Err(HttpAvatarError(AvatarError::UploadRejected {
                    code,
                    message: code.message(0, &ConfiguredTypes::default()),
                }))
            }
        }
    }
}
