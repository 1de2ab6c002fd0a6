//! Request and response bodies

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::{CartEntry, CartEntryId, Category, ListingId, SaleId, School, UserStats};
use crate::money::{Price, PriceError, checked_total};
use crate::settlement::{CartCheckoutReport, SettlementOutcome, SettlementReport};

use super::response::ApiError;

// ============================================================================
// Listings
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub name: String,
    pub category: Category,
    pub price: Price,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
}

/// `?schools=Duke,NC State`
#[derive(Debug, Default, Deserialize)]
pub struct SchoolFilterQuery {
    #[serde(default)]
    pub schools: Option<String>,
}

impl SchoolFilterQuery {
    /// Parsed filter. Empty means every school; so does any `all` entry.
    pub fn schools(&self) -> Vec<School> {
        let Some(raw) = self.schools.as_deref() else {
            return Vec::new();
        };
        let names: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if names.iter().any(|s| s.eq_ignore_ascii_case("all")) {
            return Vec::new();
        }
        names.into_iter().map(School::new).collect()
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedData {
    pub deleted: bool,
}

// ============================================================================
// Cart
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub listing_id: ListingId,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartEntry>,
    pub total: Decimal,
}

impl CartView {
    pub fn new(items: Vec<CartEntry>) -> Result<Self, PriceError> {
        let total = checked_total(items.iter().map(|e| e.item.price))?;
        Ok(Self { items, total })
    }
}

// ============================================================================
// Checkout
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BuyNowRequest {
    pub listing_id: ListingId,
}

#[derive(Debug, Serialize)]
pub struct LineError {
    pub code: i32,
    pub msg: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutLineResult {
    Settled { report: SettlementReport },
    Duplicate { sale_id: SaleId },
    Rejected { error: LineError },
}

#[derive(Debug, Serialize)]
pub struct CheckoutLineView {
    pub cart_entry_id: CartEntryId,
    pub listing_id: ListingId,
    #[serde(flatten)]
    pub result: CheckoutLineResult,
}

#[derive(Debug, Serialize)]
pub struct CartCheckoutView {
    pub lines: Vec<CheckoutLineView>,
    pub fully_settled: usize,
}

impl From<CartCheckoutReport> for CartCheckoutView {
    fn from(report: CartCheckoutReport) -> Self {
        let fully_settled = report.fully_settled();
        let lines = report
            .lines
            .into_iter()
            .map(|line| {
                let result = match line.outcome {
                    Ok(SettlementOutcome::Settled(report)) => CheckoutLineResult::Settled { report },
                    Ok(SettlementOutcome::Duplicate { sale_id }) => {
                        CheckoutLineResult::Duplicate { sale_id }
                    }
                    Err(e) => {
                        let e = ApiError::from(e);
                        CheckoutLineResult::Rejected {
                            error: LineError {
                                code: e.code,
                                msg: e.msg,
                            },
                        }
                    }
                };
                CheckoutLineView {
                    cart_entry_id: line.cart_entry_id,
                    listing_id: line.listing_id,
                    result,
                }
            })
            .collect();

        Self {
            lines,
            fully_settled,
        }
    }
}

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatsInitData {
    /// `false` when the row already existed
    pub created: bool,
    pub stats: UserStats,
}
