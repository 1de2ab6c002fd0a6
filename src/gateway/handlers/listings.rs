//! Listing handlers: browse, post, retract

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use tracing::info;

use super::super::identity::CurrentUser;
use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, CreateListingRequest, DeletedData, SchoolFilterQuery, ok,
};
use crate::market::{Category, ItemSnapshot, Listing, ListingId, School};

/// GET /api/v1/listings
pub async fn list_all(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Listing>> {
    ok(state.stores.listings.query_all().await?)
}

/// GET /api/v1/listings/category/{category}?schools=Duke,NC%20State
pub async fn list_by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(filter): Query<SchoolFilterQuery>,
) -> ApiResult<Vec<Listing>> {
    let category: Category = category
        .parse()
        .map_err(|e: crate::market::CategoryError| ApiError::bad_request(e.to_string()))?;
    let schools = filter.schools();

    ok(state
        .stores
        .listings
        .query_by_category(category, &schools)
        .await?)
}

/// POST /api/v1/listings
///
/// The seller is the caller; name and e-mail are required so the listing
/// can later be settled and the seller notified.
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    CurrentUser(seller): CurrentUser,
    Json(req): Json<CreateListingRequest>,
) -> ApiResult<Listing> {
    if req.name.trim().is_empty() {
        return ApiError::bad_request("name is required").into_err();
    }
    if seller.name.trim().is_empty() || seller.email.trim().is_empty() {
        return ApiError::bad_request("Seller name and e-mail are required to post").into_err();
    }

    let listing = Listing {
        id: ListingId::generate(),
        item: ItemSnapshot {
            name: req.name.trim().to_string(),
            category: req.category,
            price: req.price,
            description: req.description,
            picture: req.picture.filter(|p| !p.trim().is_empty()),
        },
        school: req.school.map(School::new).unwrap_or_default(),
        seller,
        created_at: Utc::now(),
    };
    state.stores.listings.insert(&listing).await?;

    info!(
        listing_id = %listing.id,
        seller = %listing.seller.id,
        category = %listing.item.category,
        "Listing posted"
    );
    ok(listing)
}

/// DELETE /api/v1/listings/{id}
///
/// Only the seller may retract their own listing.
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<DeletedData> {
    let id = ListingId::new(id);
    let listing = state
        .stores
        .listings
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Listing {} not found", id)))?;

    if listing.seller.id != user.id {
        return ApiError::forbidden("Only the seller can delete this listing").into_err();
    }

    let deleted = state.stores.listings.delete_by_id(&id).await?;
    info!(listing_id = %id, seller = %user.id, "Listing deleted by seller");
    ok(DeletedData { deleted })
}
