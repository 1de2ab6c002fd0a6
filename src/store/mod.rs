//! Store Ports
//!
//! The four logical stores the marketplace runs on, plus the settlement
//! reservation that backs the single-fire guarantee.
//!
//! Every port has two backends:
//! - [`memory`]: `DashMap`-backed, used by tests and by the gateway when no
//!   PostgreSQL URL is configured
//! - [`postgres`]: `sqlx` against the schema in [`crate::db::schema`]

pub mod memory;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::market::{
    CartEntry, CartEntryId, Category, Identity, Listing, ListingId, SaleId, SaleRecord, School,
    StatsDelta, UserId, UserStats,
};

pub use memory::{MemoryCartStore, MemoryListingStore, MemorySaleLedger, MemoryUserStatsStore};
pub use postgres::{PgCartStore, PgListingStore, PgSaleLedger, PgUserStatsStore};

/// Store-level failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend unreachable or the call failed
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Uniqueness constraint hit
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Row could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Value does not fit the column (numeric overflow)
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

/// SQLSTATE `numeric_value_out_of_range`
const PG_NUMERIC_OUT_OF_RANGE: &str = "22003";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                StoreError::Corrupt(e.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(e.to_string())
            }
            sqlx::Error::Database(db)
                if db.code().is_some_and(|c| c == PG_NUMERIC_OUT_OF_RANGE) =>
            {
                StoreError::OutOfRange(e.to_string())
            }
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

// ============================================================================
// Settlement key
// ============================================================================

/// Idempotency key of one settlement: a buyer completing one listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettlementKey {
    pub listing_id: ListingId,
    pub buyer_id: UserId,
}

impl SettlementKey {
    pub fn new(listing_id: ListingId, buyer_id: UserId) -> Self {
        Self {
            listing_id,
            buyer_id,
        }
    }
}

impl fmt::Display for SettlementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.listing_id, self.buyer_id)
    }
}

/// Result of reserving a settlement key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// First claim: the caller owns the settlement and its sale id
    Granted(SaleId),
    /// Same listing and buyer already reserved
    Duplicate(SaleId),
    /// Listing already reserved by another buyer
    SoldToOther(UserId),
}

/// Result of appending to the sale ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Append {
    Inserted,
    /// A record for this listing already exists
    AlreadyRecorded(SaleId),
}

// ============================================================================
// Ports
// ============================================================================

/// Active listings
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn insert(&self, listing: &Listing) -> Result<(), StoreError>;

    async fn get(&self, id: &ListingId) -> Result<Option<Listing>, StoreError>;

    /// Delete by id. Returns `false` when the listing was already gone,
    /// which callers must treat as success.
    async fn delete_by_id(&self, id: &ListingId) -> Result<bool, StoreError>;

    /// Listings in a category, optionally restricted to some schools.
    /// An empty school slice means no school filter.
    async fn query_by_category(
        &self,
        category: Category,
        schools: &[School],
    ) -> Result<Vec<Listing>, StoreError>;

    async fn query_all(&self) -> Result<Vec<Listing>, StoreError>;

    async fn query_by_seller(&self, seller_id: &UserId) -> Result<Vec<Listing>, StoreError>;
}

/// Buyer carts
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn insert(&self, entry: &CartEntry) -> Result<(), StoreError>;

    async fn get(&self, id: &CartEntryId) -> Result<Option<CartEntry>, StoreError>;

    async fn delete_by_id(&self, id: &CartEntryId) -> Result<bool, StoreError>;

    /// Remove every entry pointing at `listing_id`, whoever the buyer is.
    /// Returns the number of entries removed.
    async fn delete_by_listing_id(&self, listing_id: &ListingId) -> Result<u64, StoreError>;

    async fn query_by_buyer(&self, buyer_id: &UserId) -> Result<Vec<CartEntry>, StoreError>;
}

/// Append-only sale ledger with durable settlement reservations
#[async_trait]
pub trait SaleLedger: Send + Sync {
    /// Reserve `key` before any settlement side effect.
    /// At most one buyer can ever hold a reservation for a listing.
    async fn reserve(&self, key: &SettlementKey) -> Result<Reservation, StoreError>;

    /// Append a record. The ledger holds at most one record per listing.
    async fn insert(&self, record: &SaleRecord) -> Result<Append, StoreError>;

    async fn query_by_buyer(&self, buyer_id: &UserId) -> Result<Vec<SaleRecord>, StoreError>;

    async fn query_by_seller(&self, seller_id: &UserId) -> Result<Vec<SaleRecord>, StoreError>;
}

/// Per-user aggregate counters
#[async_trait]
pub trait UserStatsStore: Send + Sync {
    async fn select_by_user_id(&self, user_id: &UserId) -> Result<Option<UserStats>, StoreError>;

    /// Signup hook. Returns `false` if the row already existed (left untouched).
    async fn insert(&self, row: &UserStats) -> Result<bool, StoreError>;

    /// Atomically add `delta` to the user's row, creating the row from
    /// `identity` when it does not exist yet. Returns the row after the update.
    async fn apply(&self, identity: &Identity, delta: StatsDelta) -> Result<UserStats, StoreError>;
}

// ============================================================================
// Bundle
// ============================================================================

/// The four stores, shared by the settlement engine and the gateway
#[derive(Clone)]
pub struct MarketStores {
    pub listings: Arc<dyn ListingStore>,
    pub carts: Arc<dyn CartStore>,
    pub ledger: Arc<dyn SaleLedger>,
    pub stats: Arc<dyn UserStatsStore>,
}

impl MarketStores {
    pub fn in_memory() -> Self {
        Self {
            listings: Arc::new(MemoryListingStore::new()),
            carts: Arc::new(MemoryCartStore::new()),
            ledger: Arc::new(MemorySaleLedger::new()),
            stats: Arc::new(MemoryUserStatsStore::new()),
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            listings: Arc::new(PgListingStore::new(pool.clone())),
            carts: Arc::new(PgCartStore::new(pool.clone())),
            ledger: Arc::new(PgSaleLedger::new(pool.clone())),
            stats: Arc::new(PgUserStatsStore::new(pool)),
        }
    }
}
