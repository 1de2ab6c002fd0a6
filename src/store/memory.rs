//! In-memory store backends
//!
//! `DashMap` shards give per-key locking, so the stats increment and the
//! reservation check-and-insert are atomic without a global lock.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{
    Append, CartStore, ListingStore, Reservation, SaleLedger, SettlementKey, StoreError,
    UserStatsStore,
};
use crate::market::{
    CartEntry, CartEntryId, Category, Identity, Listing, ListingId, SaleId, SaleRecord, School,
    StatsDelta, UserId, UserStats,
};

// ============================================================================
// Listings
// ============================================================================

#[derive(Default)]
pub struct MemoryListingStore {
    rows: DashMap<ListingId, Listing>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect<F>(&self, keep: F) -> Vec<Listing>
    where
        F: Fn(&Listing) -> bool,
    {
        let mut out: Vec<Listing> = self
            .rows
            .iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect();
        // Newest first
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn insert(&self, listing: &Listing) -> Result<(), StoreError> {
        match self.rows.entry(listing.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "listing {} already exists",
                listing.id
            ))),
            Entry::Vacant(v) => {
                v.insert(listing.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &ListingId) -> Result<Option<Listing>, StoreError> {
        Ok(self.rows.get(id).map(|r| r.value().clone()))
    }

    async fn delete_by_id(&self, id: &ListingId) -> Result<bool, StoreError> {
        Ok(self.rows.remove(id).is_some())
    }

    async fn query_by_category(
        &self,
        category: Category,
        schools: &[School],
    ) -> Result<Vec<Listing>, StoreError> {
        Ok(self.collect(|l| {
            l.item.category == category && (schools.is_empty() || schools.contains(&l.school))
        }))
    }

    async fn query_all(&self) -> Result<Vec<Listing>, StoreError> {
        Ok(self.collect(|_| true))
    }

    async fn query_by_seller(&self, seller_id: &UserId) -> Result<Vec<Listing>, StoreError> {
        Ok(self.collect(|l| &l.seller.id == seller_id))
    }
}

// ============================================================================
// Carts
// ============================================================================

#[derive(Default)]
pub struct MemoryCartStore {
    rows: DashMap<CartEntryId, CartEntry>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn insert(&self, entry: &CartEntry) -> Result<(), StoreError> {
        self.rows.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn get(&self, id: &CartEntryId) -> Result<Option<CartEntry>, StoreError> {
        Ok(self.rows.get(id).map(|r| r.value().clone()))
    }

    async fn delete_by_id(&self, id: &CartEntryId) -> Result<bool, StoreError> {
        Ok(self.rows.remove(id).is_some())
    }

    async fn delete_by_listing_id(&self, listing_id: &ListingId) -> Result<u64, StoreError> {
        let doomed: Vec<CartEntryId> = self
            .rows
            .iter()
            .filter(|r| &r.value().listing_id == listing_id)
            .map(|r| r.key().clone())
            .collect();

        // A concurrent prune may win the remove; only count our own
        let removed = doomed
            .iter()
            .filter(|id| self.rows.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn query_by_buyer(&self, buyer_id: &UserId) -> Result<Vec<CartEntry>, StoreError> {
        let mut out: Vec<CartEntry> = self
            .rows
            .iter()
            .filter(|r| &r.value().buyer_id == buyer_id)
            .map(|r| r.value().clone())
            .collect();
        out.sort_by(|a, b| a.added_at.cmp(&b.added_at));
        Ok(out)
    }
}

// ============================================================================
// Sale ledger
// ============================================================================

#[derive(Default)]
pub struct MemorySaleLedger {
    /// listing -> (buyer holding the reservation, sale id)
    reservations: DashMap<ListingId, (UserId, SaleId)>,
    /// listing -> record (one record per listing)
    records: DashMap<ListingId, SaleRecord>,
}

impl MemorySaleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records, for tests and diagnostics
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect<F>(&self, keep: F) -> Vec<SaleRecord>
    where
        F: Fn(&SaleRecord) -> bool,
    {
        let mut out: Vec<SaleRecord> = self
            .records
            .iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect();
        out.sort_by(|a, b| b.sold_at.cmp(&a.sold_at));
        out
    }
}

#[async_trait]
impl SaleLedger for MemorySaleLedger {
    async fn reserve(&self, key: &SettlementKey) -> Result<Reservation, StoreError> {
        match self.reservations.entry(key.listing_id.clone()) {
            Entry::Occupied(e) => {
                let (holder, sale_id) = e.get();
                if holder == &key.buyer_id {
                    Ok(Reservation::Duplicate(sale_id.clone()))
                } else {
                    Ok(Reservation::SoldToOther(holder.clone()))
                }
            }
            Entry::Vacant(v) => {
                let sale_id = SaleId::generate();
                v.insert((key.buyer_id.clone(), sale_id.clone()));
                Ok(Reservation::Granted(sale_id))
            }
        }
    }

    async fn insert(&self, record: &SaleRecord) -> Result<Append, StoreError> {
        match self.records.entry(record.listing_id.clone()) {
            Entry::Occupied(e) => Ok(Append::AlreadyRecorded(e.get().id.clone())),
            Entry::Vacant(v) => {
                v.insert(record.clone());
                Ok(Append::Inserted)
            }
        }
    }

    async fn query_by_buyer(&self, buyer_id: &UserId) -> Result<Vec<SaleRecord>, StoreError> {
        Ok(self.collect(|r| &r.buyer.id == buyer_id))
    }

    async fn query_by_seller(&self, seller_id: &UserId) -> Result<Vec<SaleRecord>, StoreError> {
        Ok(self.collect(|r| &r.seller.id == seller_id))
    }
}

// ============================================================================
// User stats
// ============================================================================

#[derive(Default)]
pub struct MemoryUserStatsStore {
    rows: DashMap<UserId, UserStats>,
}

impl MemoryUserStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStatsStore for MemoryUserStatsStore {
    async fn select_by_user_id(&self, user_id: &UserId) -> Result<Option<UserStats>, StoreError> {
        Ok(self.rows.get(user_id).map(|r| r.value().clone()))
    }

    async fn insert(&self, row: &UserStats) -> Result<bool, StoreError> {
        match self.rows.entry(row.user_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(v) => {
                v.insert(row.clone());
                Ok(true)
            }
        }
    }

    async fn apply(&self, identity: &Identity, delta: StatsDelta) -> Result<UserStats, StoreError> {
        // The RefMut holds the shard lock for the read-add-write
        let mut row = self
            .rows
            .entry(identity.id.clone())
            .or_insert_with(|| UserStats::new_member(identity, Utc::now().date_naive()));
        row.apply(&delta)
            .map_err(|e| StoreError::OutOfRange(format!("stats for {}: {}", identity.id, e)))?;
        Ok(row.clone())
    }
}
