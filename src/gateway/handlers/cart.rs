//! Cart handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::debug;

use super::super::identity::CurrentUser;
use super::super::state::AppState;
use super::super::types::{
    AddToCartRequest, ApiError, ApiResult, CartView, DeletedData, error_codes, ok,
};
use crate::market::{CartEntry, CartEntryId};

/// GET /api/v1/cart
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<CartView> {
    let items = state.stores.carts.query_by_buyer(&user.id).await?;
    let view = CartView::new(items).map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            e.to_string(),
        )
    })?;
    ok(view)
}

/// POST /api/v1/cart
///
/// Copies a snapshot of the listing into the caller's cart. Nothing is
/// reserved: other buyers can still purchase the listing.
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AddToCartRequest>,
) -> ApiResult<CartEntry> {
    let listing = state
        .stores
        .listings
        .get(&req.listing_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Listing {} not found", req.listing_id)))?;

    let entry = CartEntry::from_listing(&listing, user.id);
    state.stores.carts.insert(&entry).await?;
    debug!(cart_entry_id = %entry.id, listing_id = %entry.listing_id, "Added to cart");
    ok(entry)
}

/// DELETE /api/v1/cart/{id}
pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<DeletedData> {
    let id = CartEntryId::new(id);
    let entry = state
        .stores
        .carts
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Cart entry {} not found", id)))?;

    if entry.buyer_id != user.id {
        return ApiError::forbidden("Cart entry belongs to another user").into_err();
    }

    let deleted = state.stores.carts.delete_by_id(&id).await?;
    ok(DeletedData { deleted })
}
