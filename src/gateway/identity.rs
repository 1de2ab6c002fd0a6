//! Caller identity
//!
//! Authentication happens upstream. The identity proxy forwards the resolved
//! user in request headers; a request without a user id is anonymous.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::types::ApiError;
use crate::market::Identity;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Authenticated caller, rejected with 401 when `x-user-id` is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub Identity);

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("Sign in required"))?;

        Ok(CurrentUser(Identity::new(
            id,
            header(parts, USER_NAME_HEADER).unwrap_or_default(),
            header(parts, USER_EMAIL_HEADER).unwrap_or_default(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};

    use super::*;

    async fn extract(req: Request<()>) -> Result<CurrentUser, ApiError> {
        let (mut parts, _) = req.into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_identity_from_headers() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "u1")
            .header(USER_NAME_HEADER, " Uma ")
            .header(USER_EMAIL_HEADER, "uma@unc.edu")
            .body(())
            .unwrap();

        let CurrentUser(who) = extract(req).await.unwrap();
        assert_eq!(who, Identity::new("u1", "Uma", "uma@unc.edu"));
    }

    #[tokio::test]
    async fn test_missing_id_is_unauthorized() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "   ")
            .header(USER_NAME_HEADER, "Uma")
            .body(())
            .unwrap();

        let err = extract(req).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
