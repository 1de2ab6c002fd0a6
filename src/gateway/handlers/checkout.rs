//! Checkout handlers: Buy Now and Cart Checkout

use std::sync::Arc;

use axum::{Json, extract::State};

use super::super::identity::CurrentUser;
use super::super::state::AppState;
use super::super::types::{ApiResult, BuyNowRequest, CartCheckoutView, ok};
use crate::settlement::SettlementOutcome;

/// POST /api/v1/checkout/buy-now
///
/// A listing that is already gone answers 409 "no longer available".
pub async fn buy_now(
    State(state): State<Arc<AppState>>,
    CurrentUser(buyer): CurrentUser,
    Json(req): Json<BuyNowRequest>,
) -> ApiResult<SettlementOutcome> {
    let outcome = state.coordinator.buy_now(&req.listing_id, buyer).await?;
    ok(outcome)
}

/// POST /api/v1/checkout/cart
///
/// Each line settles independently; the response lists every line's result.
pub async fn checkout_cart(
    State(state): State<Arc<AppState>>,
    CurrentUser(buyer): CurrentUser,
) -> ApiResult<CartCheckoutView> {
    let report = state.coordinator.checkout_cart(buyer).await?;
    ok(CartCheckoutView::from(report))
}
