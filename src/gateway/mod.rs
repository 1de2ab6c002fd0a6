//! HTTP Gateway
//!
//! Axum front end of the marketplace. The identity provider sits in front of
//! the gateway and forwards the signed-in user as headers (see [`identity`]).
//!
//! ```text
//! /api/v1/health
//! /api/v1/listings[/category/{category}][/{id}]
//! /api/v1/cart[/{id}]
//! /api/v1/checkout/{buy-now,cart}
//! /api/v1/me/{stats,listings,sales,purchases}
//! ```

pub mod handlers;
pub mod identity;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::GatewayConfig;
use state::AppState;

/// Build the full `/api/v1` router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        // Listings
        .route(
            "/api/v1/listings",
            get(handlers::list_all).post(handlers::create_listing),
        )
        .route(
            "/api/v1/listings/category/{category}",
            get(handlers::list_by_category),
        )
        .route("/api/v1/listings/{id}", delete(handlers::delete_listing))
        // Cart
        .route(
            "/api/v1/cart",
            get(handlers::get_cart).post(handlers::add_to_cart),
        )
        .route("/api/v1/cart/{id}", delete(handlers::remove_from_cart))
        // Checkout
        .route("/api/v1/checkout/buy-now", post(handlers::buy_now))
        .route("/api/v1/checkout/cart", post(handlers::checkout_cart))
        // Profile
        .route(
            "/api/v1/me/stats",
            get(handlers::get_stats).post(handlers::init_stats),
        )
        .route("/api/v1/me/listings", get(handlers::my_listings))
        .route("/api/v1/me/sales", get(handlers::my_sales))
        .route("/api/v1/me/purchases", get(handlers::my_purchases))
        .with_state(state)
}

/// Start HTTP Gateway server
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let backend = state.backend();
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.inspect_err(|e| {
        error!(addr = %addr, error = %e, "Failed to bind gateway (port in use?)");
    })?;

    info!(addr = %addr, backend, "Gateway listening");
    axum::serve(listener, app).await
}
