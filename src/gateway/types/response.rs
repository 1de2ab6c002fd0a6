//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError`: Error carried out of a handler
//! - `error_codes`: Standard error code constants

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::settlement::SettlementError;
use crate::store::StoreError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap `data` in a success envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// ============================================================================
// ApiError
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::MISSING_IDENTITY, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error_codes::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn into_err<T>(self) -> Result<T, Self> {
        Err(self)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Store call failed");
        match e {
            StoreError::Conflict(msg) => Self::new(StatusCode::CONFLICT, error_codes::CONFLICT, msg),
            StoreError::OutOfRange(msg) => Self::bad_request(msg),
            StoreError::Unavailable(_) | StoreError::Corrupt(_) => {
                Self::service_unavailable("Store unavailable")
            }
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(e: SettlementError) -> Self {
        let code = match &e {
            SettlementError::Validation(_) => error_codes::MISSING_FIELD,
            SettlementError::EmptyCart => error_codes::EMPTY_CART,
            SettlementError::ListingUnavailable(_) => error_codes::LISTING_UNAVAILABLE,
            SettlementError::ListingAlreadySold(_) => error_codes::LISTING_ALREADY_SOLD,
            SettlementError::GuardUnavailable(_) | SettlementError::Store(_) => {
                error_codes::SERVICE_UNAVAILABLE
            }
        };
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, code, e.to_string())
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const MISSING_FIELD: i32 = 1002;
    pub const EMPTY_CART: i32 = 1003;

    // Identity errors (2xxx)
    pub const MISSING_IDENTITY: i32 = 2001;
    pub const FORBIDDEN: i32 = 2003;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4090;
    pub const LISTING_UNAVAILABLE: i32 = 4091;
    pub const LISTING_ALREADY_SOLD: i32 = 4092;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::ListingId;
    use crate::settlement::ValidationError;

    #[test]
    fn test_settlement_error_mapping() {
        let e = ApiError::from(SettlementError::ListingUnavailable(ListingId::from("l1")));
        assert_eq!(e.status, StatusCode::CONFLICT);
        assert_eq!(e.code, error_codes::LISTING_UNAVAILABLE);
        assert_eq!(e.msg, "Listing l1 is no longer available");

        let e = ApiError::from(SettlementError::from(ValidationError::missing("buyer.email")));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, error_codes::MISSING_FIELD);
    }

    #[test]
    fn test_store_error_mapping() {
        let e = ApiError::from(StoreError::OutOfRange("price".into()));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, error_codes::INVALID_PARAMETER);

        let e = ApiError::from(StoreError::Corrupt("bad row".into()));
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_envelope_has_no_data() {
        let body = serde_json::to_value(ApiResponse::<()>::error(4001, "nope")).unwrap();
        assert_eq!(body["code"], 4001);
        assert_eq!(body["msg"], "nope");
        assert!(body.get("data").is_none());
    }
}
