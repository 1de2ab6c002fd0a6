//! Marketplace domain model
//!
//! - [`ids`] - Opaque identifiers (ListingId, CartEntryId, SaleId, UserId)
//! - [`models`] - Listing, CartEntry, SaleRecord, UserStats and friends

pub mod ids;
pub mod models;

pub use ids::{CartEntryId, ListingId, SaleId, UserId};
pub use models::{
    CartEntry, Category, CategoryError, Identity, ItemSnapshot, Listing, SaleRecord, School,
    StatsDelta, UserStats,
};
