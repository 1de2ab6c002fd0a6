//! Data models for the marketplace stores

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{CartEntryId, ListingId, SaleId, UserId};
use crate::money::{Price, PriceError, checked_accumulate};

// ============================================================================
// Category
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown category: {0}")]
pub struct CategoryError(pub String);

/// Listing category (URL slug form on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    DormStuff,
    Supplies,
    /// Older clients still send `class-notes`
    #[serde(alias = "class-notes")]
    ClassMaterials,
    Clothes,
    Electronics,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::DormStuff,
        Category::Supplies,
        Category::ClassMaterials,
        Category::Clothes,
        Category::Electronics,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DormStuff => "dorm-stuff",
            Category::Supplies => "supplies",
            Category::ClassMaterials => "class-materials",
            Category::Clothes => "clothes",
            Category::Electronics => "electronics",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dorm-stuff" => Ok(Category::DormStuff),
            "supplies" => Ok(Category::Supplies),
            "class-materials" | "class-notes" => Ok(Category::ClassMaterials),
            "clothes" => Ok(Category::Clothes),
            "electronics" => Ok(Category::Electronics),
            "other" => Ok(Category::Other),
            _ => Err(CategoryError(s.to_string())),
        }
    }
}

// ============================================================================
// School
// ============================================================================

/// School affiliation. Free text; the known campuses are provided as constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct School(String);

impl School {
    pub const UNC_CHAPEL_HILL: &'static str = "UNC Chapel Hill";
    pub const NC_STATE: &'static str = "NC State";
    pub const DUKE: &'static str = "Duke";
    /// Stored when the poster left the field empty
    pub const UNSPECIFIED: &'static str = "n/a";

    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            Self(Self::UNSPECIFIED.to_string())
        } else {
            Self(name.trim().to_string())
        }
    }

    pub fn unspecified() -> Self {
        Self(Self::UNSPECIFIED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_specified(&self) -> bool {
        !self.0.is_empty() && self.0 != Self::UNSPECIFIED
    }
}

impl Default for School {
    fn default() -> Self {
        Self::unspecified()
    }
}

impl fmt::Display for School {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Identity & item snapshot
// ============================================================================

/// Resolved user identity as handed over by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Identity {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Item fields copied into carts and sale records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub name: String,
    pub category: Category,
    pub price: Price,
    #[serde(default)]
    pub description: String,
    /// Path into blob storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

// ============================================================================
// Store rows
// ============================================================================

/// An item available for sale. Lives in the listings store only while unsold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    #[serde(flatten)]
    pub item: ItemSnapshot,
    pub school: School,
    pub seller: Identity,
    pub created_at: DateTime<Utc>,
}

/// A buyer's saved intent to purchase a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: CartEntryId,
    pub listing_id: ListingId,
    #[serde(flatten)]
    pub item: ItemSnapshot,
    pub school: School,
    pub seller: Identity,
    pub buyer_id: UserId,
    pub added_at: DateTime<Utc>,
}

impl CartEntry {
    /// Snapshot a listing into `buyer_id`'s cart
    pub fn from_listing(listing: &Listing, buyer_id: UserId) -> Self {
        Self {
            id: CartEntryId::generate(),
            listing_id: listing.id.clone(),
            item: listing.item.clone(),
            school: listing.school.clone(),
            seller: listing.seller.clone(),
            buyer_id,
            added_at: Utc::now(),
        }
    }
}

/// Immutable receipt of a completed purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: SaleId,
    pub listing_id: ListingId,
    #[serde(flatten)]
    pub item: ItemSnapshot,
    pub seller: Identity,
    pub buyer: Identity,
    pub school: School,
    pub sold_at: DateTime<Utc>,
}

/// Per-user running totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub items_sold: i64,
    pub items_bought: i64,
    pub total_money_made: Decimal,
    pub total_money_spent: Decimal,
    pub member_since: NaiveDate,
}

impl UserStats {
    /// Fresh row as written at signup
    pub fn new_member(identity: &Identity, member_since: NaiveDate) -> Self {
        Self {
            user_id: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            items_sold: 0,
            items_bought: 0,
            total_money_made: Decimal::ZERO,
            total_money_spent: Decimal::ZERO,
            member_since,
        }
    }

    /// Add `delta`. On overflow the row is left untouched.
    pub fn apply(&mut self, delta: &StatsDelta) -> Result<(), PriceError> {
        let items_sold = self
            .items_sold
            .checked_add(delta.items_sold)
            .ok_or(PriceError::Overflow)?;
        let items_bought = self
            .items_bought
            .checked_add(delta.items_bought)
            .ok_or(PriceError::Overflow)?;
        let made = checked_accumulate(self.total_money_made, delta.money_made)?;
        let spent = checked_accumulate(self.total_money_spent, delta.money_spent)?;

        self.items_sold = items_sold;
        self.items_bought = items_bought;
        self.total_money_made = made;
        self.total_money_spent = spent;
        Ok(())
    }
}

/// Increment applied atomically to a stats row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsDelta {
    pub items_sold: i64,
    pub items_bought: i64,
    pub money_made: Decimal,
    pub money_spent: Decimal,
}

impl StatsDelta {
    /// Seller side of one sale
    pub fn sale(price: Price) -> Self {
        Self {
            items_sold: 1,
            money_made: price.inner(),
            ..Self::default()
        }
    }

    /// Buyer side of one sale
    pub fn purchase(price: Price) -> Self {
        Self {
            items_bought: 1,
            money_spent: price.inner(),
            ..Self::default()
        }
    }
}
