//! Gateway types module
//!
//! ## Submodules
//! - [`response`]: `ApiResponse`, `ApiError` and error codes
//! - [`dto`]: request and response bodies

pub mod dto;
pub mod response;

// Re-export commonly used types at module root
pub use dto::{
    AddToCartRequest, BuyNowRequest, CartCheckoutView, CartView, CheckoutLineResult,
    CheckoutLineView, CreateListingRequest, DeletedData, LineError, SchoolFilterQuery,
    StatsInitData,
};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
