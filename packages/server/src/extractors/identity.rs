use axum::{extract::FromRequestParts, http::request::Parts};
use common::session::model::UNKNOWN_EMAIL;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// Caller identity forwarded by the upstream gateway.
///
/// Add this as a handler parameter to require an `X-User-Id` header.
/// The id is used as given; sanitizing happens when keys are derived.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub user_id: String,
    pub email: String,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER).ok_or(AppError::IdentityMissing)?;
        let email = header(parts, USER_EMAIL_HEADER).unwrap_or(UNKNOWN_EMAIL);

        Ok(CallerIdentity {
            user_id: user_id.to_string(),
            email: email.to_string(),
        })
    }
}
