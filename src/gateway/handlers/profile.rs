//! Profile and order history handlers

use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use tracing::info;

use super::super::identity::CurrentUser;
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, StatsInitData, ok};
use crate::market::{Listing, SaleRecord, UserStats};

/// GET /api/v1/me/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<UserStats> {
    match state.stores.stats.select_by_user_id(&user.id).await? {
        Some(stats) => ok(stats),
        None => ApiError::not_found("Stats not initialized").into_err(),
    }
}

/// POST /api/v1/me/stats
///
/// Signup hook. Creates the caller's zeroed row; an existing row is left
/// as it is and returned.
pub async fn init_stats(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<StatsInitData> {
    let fresh = UserStats::new_member(&user, Utc::now().date_naive());
    let created = state.stores.stats.insert(&fresh).await?;
    if created {
        info!(user_id = %user.id, "Stats row initialized");
    }

    let stats = state
        .stores
        .stats
        .select_by_user_id(&user.id)
        .await?
        .unwrap_or(fresh);
    ok(StatsInitData { created, stats })
}

/// GET /api/v1/me/listings
pub async fn my_listings(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<Listing>> {
    ok(state.stores.listings.query_by_seller(&user.id).await?)
}

/// GET /api/v1/me/sales
pub async fn my_sales(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<SaleRecord>> {
    ok(state.stores.ledger.query_by_seller(&user.id).await?)
}

/// GET /api/v1/me/purchases
pub async fn my_purchases(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<SaleRecord>> {
    ok(state.stores.ledger.query_by_buyer(&user.id).await?)
}
