//! Settlement orders and reports

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{SettlementError, StepError};
use crate::market::{
    CartEntry, CartEntryId, Category, Identity, ItemSnapshot, Listing, ListingId, SaleId,
    SaleRecord, School,
};
use crate::money::Price;
use crate::notify::{NotificationReceipt, SellerNotice};
use crate::store::SettlementKey;

/// Raw purchase request for one item, as assembled from a listing or a
/// cart line. Nothing is trusted until [`super::validation::validate`] runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOrder {
    pub listing_id: ListingId,
    pub item_name: String,
    pub category: Category,
    pub price: Option<Price>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub school: School,
    pub seller: Identity,
    pub buyer: Identity,
}

impl SettlementOrder {
    /// Buy Now: settle straight from the active listing
    pub fn from_listing(listing: &Listing, buyer: Identity) -> Self {
        Self::from_snapshot(
            listing.id.clone(),
            &listing.item,
            &listing.school,
            &listing.seller,
            buyer,
        )
    }

    /// Cart checkout: settle from the snapshot copied into the cart
    pub fn from_cart_entry(entry: &CartEntry, buyer: Identity) -> Self {
        Self::from_snapshot(
            entry.listing_id.clone(),
            &entry.item,
            &entry.school,
            &entry.seller,
            buyer,
        )
    }

    fn from_snapshot(
        listing_id: ListingId,
        item: &ItemSnapshot,
        school: &School,
        seller: &Identity,
        buyer: Identity,
    ) -> Self {
        Self {
            listing_id,
            item_name: item.name.clone(),
            category: item.category,
            price: Some(item.price),
            description: item.description.clone(),
            picture: item.picture.clone(),
            school: school.clone(),
            seller: seller.clone(),
            buyer,
        }
    }
}

/// Order that passed validation. Only constructible through `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidOrder {
    pub(super) listing_id: ListingId,
    pub(super) item: ItemSnapshot,
    pub(super) school: School,
    pub(super) seller: Identity,
    pub(super) buyer: Identity,
}

impl ValidOrder {
    pub fn listing_id(&self) -> &ListingId {
        &self.listing_id
    }

    pub fn item(&self) -> &ItemSnapshot {
        &self.item
    }

    pub fn price(&self) -> Price {
        self.item.price
    }

    pub fn seller(&self) -> &Identity {
        &self.seller
    }

    pub fn buyer(&self) -> &Identity {
        &self.buyer
    }

    pub fn key(&self) -> SettlementKey {
        SettlementKey::new(self.listing_id.clone(), self.buyer.id.clone())
    }

    pub fn sale_record(&self, id: SaleId, sold_at: DateTime<Utc>) -> SaleRecord {
        SaleRecord {
            id,
            listing_id: self.listing_id.clone(),
            item: self.item.clone(),
            seller: self.seller.clone(),
            buyer: self.buyer.clone(),
            school: self.school.clone(),
            sold_at,
        }
    }

    pub fn notice(&self) -> SellerNotice {
        SellerNotice {
            seller: self.seller.clone(),
            buyer: self.buyer.clone(),
            item: self.item.clone(),
            school: self.school.clone(),
        }
    }
}

/// Settlement side effects, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SaleLedger,
    ListingRetraction,
    CartPruning,
    SellerStats,
    BuyerStats,
    SellerNotification,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::SaleLedger,
        Step::ListingRetraction,
        Step::CartPruning,
        Step::SellerStats,
        Step::BuyerStats,
        Step::SellerNotification,
    ];
}

/// Per-step outcome of one settlement. Partial failure is expected and
/// never rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub sale_id: SaleId,
    pub listing_id: ListingId,
    pub succeeded: BTreeSet<Step>,
    pub failed: BTreeMap<Step, StepError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationReceipt>,
}

impl SettlementReport {
    pub fn new(sale_id: SaleId, listing_id: ListingId) -> Self {
        Self {
            sale_id,
            listing_id,
            succeeded: BTreeSet::new(),
            failed: BTreeMap::new(),
            notification: None,
        }
    }

    pub fn record(&mut self, step: Step, result: Result<(), StepError>) {
        match result {
            Ok(()) => {
                self.succeeded.insert(step);
            }
            Err(e) => {
                self.failed.insert(step, e);
            }
        }
    }

    /// Every step succeeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure(&self, step: Step) -> Option<&StepError> {
        self.failed.get(&step)
    }
}

/// Result of a settlement call that got past validation and the guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled(SettlementReport),
    /// Same buyer and listing were already settled; nothing was done
    Duplicate { sale_id: SaleId },
}

impl SettlementOutcome {
    pub fn report(&self) -> Option<&SettlementReport> {
        match self {
            SettlementOutcome::Settled(report) => Some(report),
            SettlementOutcome::Duplicate { .. } => None,
        }
    }

    pub fn sale_id(&self) -> &SaleId {
        match self {
            SettlementOutcome::Settled(report) => &report.sale_id,
            SettlementOutcome::Duplicate { sale_id } => sale_id,
        }
    }
}

/// One cart line's settlement
#[derive(Debug, Clone)]
pub struct CartLine {
    pub cart_entry_id: CartEntryId,
    pub listing_id: ListingId,
    pub outcome: Result<SettlementOutcome, SettlementError>,
}

/// Independent per-line results of a cart checkout
#[derive(Debug, Clone, Default)]
pub struct CartCheckoutReport {
    pub lines: Vec<CartLine>,
}

impl CartCheckoutReport {
    /// Lines that settled with every step succeeding
    pub fn fully_settled(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(&l.outcome, Ok(o) if o.report().is_some_and(SettlementReport::is_complete)))
            .count()
    }

    pub fn line(&self, listing_id: &ListingId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.listing_id == listing_id)
    }
}
