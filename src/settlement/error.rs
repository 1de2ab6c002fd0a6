//! Settlement Error Types

use serde::Serialize;
use thiserror::Error;

use crate::market::{ListingId, SaleId};
use crate::notify::NotifyError;
use crate::store::StoreError;

/// A required order field is missing or blank
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing required field: {field}")]
pub struct ValidationError {
    pub field: &'static str,
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self { field }
    }
}

/// Failure of one settlement step. Recorded in the report, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Uniqueness constraint rejected the write
    #[error("Store conflict: {0}")]
    StoreConflict(String),

    /// Stored row could not be decoded
    #[error("Corrupt store data: {0}")]
    StoreCorrupt(String),

    /// Amount or counter would leave its column range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// The ledger already holds a record for this listing
    #[error("Sale already recorded as {0}")]
    AlreadyRecorded(SaleId),

    #[error("User has no id")]
    MissingUserId,

    #[error("Notification unavailable: {0}")]
    NotificationUnavailable(String),
}

impl From<StoreError> for StepError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => StepError::StoreUnavailable(msg),
            StoreError::Conflict(msg) => StepError::StoreConflict(msg),
            StoreError::Corrupt(msg) => StepError::StoreCorrupt(msg),
            StoreError::OutOfRange(msg) => StepError::OutOfRange(msg),
        }
    }
}

impl From<NotifyError> for StepError {
    fn from(e: NotifyError) -> Self {
        StepError::NotificationUnavailable(e.to_string())
    }
}

/// Settlement rejected before any side effect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another buyer already holds this listing
    #[error("Listing {0} was already sold")]
    ListingAlreadySold(ListingId),

    /// Listing no longer in the active store
    #[error("Listing {0} is no longer available")]
    ListingUnavailable(ListingId),

    #[error("Cart is empty")]
    EmptyCart,

    /// Reservation store unreachable; single-fire cannot be guaranteed
    #[error("Settlement guard unavailable: {0}")]
    GuardUnavailable(String),

    /// Failed to load the listing or cart to settle
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SettlementError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::Validation(_) => "MISSING_FIELD",
            SettlementError::ListingAlreadySold(_) => "LISTING_ALREADY_SOLD",
            SettlementError::ListingUnavailable(_) => "LISTING_UNAVAILABLE",
            SettlementError::EmptyCart => "EMPTY_CART",
            SettlementError::GuardUnavailable(_) => "GUARD_UNAVAILABLE",
            SettlementError::Store(_) => "STORE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            SettlementError::Validation(_) | SettlementError::EmptyCart => 400,
            SettlementError::ListingAlreadySold(_) | SettlementError::ListingUnavailable(_) => 409,
            SettlementError::GuardUnavailable(_) | SettlementError::Store(_) => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SettlementError::from(ValidationError::missing("seller.email")).code(),
            "MISSING_FIELD"
        );
        assert_eq!(SettlementError::EmptyCart.code(), "EMPTY_CART");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(
            SettlementError::ListingAlreadySold(ListingId::from("l1")).http_status(),
            409
        );
        assert_eq!(
            SettlementError::GuardUnavailable("down".into()).http_status(),
            503
        );
    }

    #[test]
    fn test_display() {
        let err = SettlementError::from(ValidationError::missing("buyer.email"));
        assert_eq!(err.to_string(), "Missing required field: buyer.email");

        let err = SettlementError::ListingUnavailable(ListingId::from("l9"));
        assert_eq!(err.to_string(), "Listing l9 is no longer available");
    }

    #[test]
    fn test_store_error_kind_is_kept() {
        assert_eq!(
            StepError::from(StoreError::Conflict("dup".into())),
            StepError::StoreConflict("dup".into())
        );
        assert_eq!(
            StepError::from(StoreError::Corrupt("bad price".into())),
            StepError::StoreCorrupt("bad price".into())
        );
        assert_eq!(
            StepError::from(StoreError::OutOfRange("total".into())),
            StepError::OutOfRange("total".into())
        );
        assert_eq!(
            StepError::from(StoreError::Unavailable("down".into())),
            StepError::StoreUnavailable("down".into())
        );

        let value = serde_json::to_value(StepError::StoreCorrupt("x".into())).unwrap();
        assert_eq!(value["kind"], "store_corrupt");
    }

    #[test]
    fn test_step_error_json() {
        let value = serde_json::to_value(StepError::MissingUserId).unwrap();
        assert_eq!(value["kind"], "missing_user_id");
    }
}
