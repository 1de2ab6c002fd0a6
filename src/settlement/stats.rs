//! Stats Reconciliation
//!
//! The buyer's action updates the seller's row, so the two sides are two
//! explicit commands rather than one generic write.

use std::sync::Arc;

use tracing::debug;

use super::error::StepError;
use crate::market::{Identity, StatsDelta, UserStats};
use crate::money::Price;
use crate::store::UserStatsStore;

pub struct StatsReconciler {
    store: Arc<dyn UserStatsStore>,
}

impl StatsReconciler {
    pub fn new(store: Arc<dyn UserStatsStore>) -> Self {
        Self { store }
    }

    /// items_sold +1, total_money_made +price
    pub async fn credit_seller(&self, seller: &Identity, price: Price) -> Result<UserStats, StepError> {
        if seller.id.is_blank() {
            return Err(StepError::MissingUserId);
        }
        let row = self.store.apply(seller, StatsDelta::sale(price)).await?;
        debug!(user_id = %row.user_id, items_sold = row.items_sold, "Seller credited");
        Ok(row)
    }

    /// items_bought +1, total_money_spent +price
    pub async fn record_purchase(&self, buyer: &Identity, price: Price) -> Result<UserStats, StepError> {
        if buyer.id.is_blank() {
            return Err(StepError::MissingUserId);
        }
        let row = self.store.apply(buyer, StatsDelta::purchase(price)).await?;
        debug!(user_id = %row.user_id, items_bought = row.items_bought, "Purchase recorded");
        Ok(row)
    }
}
