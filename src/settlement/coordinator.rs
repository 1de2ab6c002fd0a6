//! Settlement Coordinator
//!
//! Drives one purchase through the guard and the five side effects.
//! Steps run concurrently; each failure is logged and recorded, never
//! rolled back.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::error::{SettlementError, StepError};
use super::stats::StatsReconciler;
use super::types::{
    CartCheckoutReport, CartLine, SettlementOrder, SettlementOutcome, SettlementReport, Step,
    ValidOrder,
};
use super::validation::validate;
use crate::market::{CartEntry, Identity, ListingId, SaleId, SaleRecord};
use crate::notify::{NotificationReceipt, Notifier, SellerNotice};
use crate::store::{Append, MarketStores, Reservation};

pub struct SettlementCoordinator {
    stores: MarketStores,
    stats: StatsReconciler,
    notifier: Arc<Notifier>,
}

impl SettlementCoordinator {
    pub fn new(stores: MarketStores, notifier: Arc<Notifier>) -> Self {
        let stats = StatsReconciler::new(stores.stats.clone());
        Self {
            stores,
            stats,
            notifier,
        }
    }

    pub fn stores(&self) -> &MarketStores {
        &self.stores
    }

    /// Settle one item.
    ///
    /// Validation and the reservation both happen before any side effect,
    /// so every `Err` leaves the stores untouched.
    pub async fn settle_sale(
        &self,
        order: SettlementOrder,
    ) -> Result<SettlementOutcome, SettlementError> {
        let order = validate(order).inspect_err(|e| {
            warn!(field = e.field, "Settlement rejected: missing field");
        })?;
        let key = order.key();

        let sale_id = match self.stores.ledger.reserve(&key).await {
            Ok(Reservation::Granted(sale_id)) => sale_id,
            Ok(Reservation::Duplicate(sale_id)) => {
                info!(key = %key, sale_id = %sale_id, "Duplicate settlement ignored");
                return Ok(SettlementOutcome::Duplicate { sale_id });
            }
            Ok(Reservation::SoldToOther(holder)) => {
                warn!(key = %key, holder = %holder, "Listing already sold to another buyer");
                return Err(SettlementError::ListingAlreadySold(key.listing_id));
            }
            Err(e) => {
                error!(key = %key, error = %e, "Settlement guard unavailable");
                return Err(SettlementError::GuardUnavailable(e.to_string()));
            }
        };

        let report = self.run_steps(&order, sale_id).await;

        if report.is_complete() {
            info!(sale_id = %report.sale_id, listing_id = %report.listing_id, "Sale settled");
        } else {
            warn!(
                sale_id = %report.sale_id,
                listing_id = %report.listing_id,
                failed = ?report.failed.keys().collect::<Vec<_>>(),
                "Sale settled with failed steps"
            );
        }

        Ok(SettlementOutcome::Settled(report))
    }

    /// Buy Now: load the listing and settle it for `buyer`
    pub async fn buy_now(
        &self,
        listing_id: &ListingId,
        buyer: Identity,
    ) -> Result<SettlementOutcome, SettlementError> {
        let Some(listing) = self.stores.listings.get(listing_id).await? else {
            return Err(SettlementError::ListingUnavailable(listing_id.clone()));
        };
        self.settle_sale(SettlementOrder::from_listing(&listing, buyer))
            .await
    }

    /// Settle every line of `buyer`'s cart
    pub async fn checkout_cart(&self, buyer: Identity) -> Result<CartCheckoutReport, SettlementError> {
        let entries = self.stores.carts.query_by_buyer(&buyer.id).await?;
        if entries.is_empty() {
            return Err(SettlementError::EmptyCart);
        }
        Ok(self.settle_cart(&buyer, &entries).await)
    }

    /// Settle cart lines independently. One line failing has no effect on
    /// the others; there is no cross-line atomicity.
    pub async fn settle_cart(&self, buyer: &Identity, entries: &[CartEntry]) -> CartCheckoutReport {
        let lines = join_all(entries.iter().map(|entry| async move {
            let outcome = self
                .settle_sale(SettlementOrder::from_cart_entry(entry, buyer.clone()))
                .await;
            CartLine {
                cart_entry_id: entry.id.clone(),
                listing_id: entry.listing_id.clone(),
                outcome,
            }
        }))
        .await;

        let report = CartCheckoutReport { lines };
        info!(
            buyer = %buyer.id,
            lines = report.lines.len(),
            fully_settled = report.fully_settled(),
            "Cart checkout finished"
        );
        report
    }

    async fn run_steps(&self, order: &ValidOrder, sale_id: SaleId) -> SettlementReport {
        let record = order.sale_record(sale_id.clone(), Utc::now());
        let notice = order.notice();
        let price = order.price();

        let (ledger, retraction, pruning, seller_stats, buyer_stats, notification) = tokio::join!(
            self.append_ledger(&record),
            self.retract_listing(order.listing_id()),
            self.prune_carts(order.listing_id()),
            self.stats.credit_seller(order.seller(), price),
            self.stats.record_purchase(order.buyer(), price),
            self.notify_seller(&notice),
        );

        let mut report = SettlementReport::new(sale_id, order.listing_id().clone());
        report.record(Step::SaleLedger, ledger);
        report.record(Step::ListingRetraction, retraction);
        report.record(Step::CartPruning, pruning);
        report.record(
            Step::SellerStats,
            seller_stats
                .map(|_| ())
                .inspect_err(|e| step_failed(Step::SellerStats, &record, e)),
        );
        report.record(
            Step::BuyerStats,
            buyer_stats
                .map(|_| ())
                .inspect_err(|e| step_failed(Step::BuyerStats, &record, e)),
        );
        match notification {
            Ok(receipt) => {
                report.notification = Some(receipt);
                report.record(Step::SellerNotification, Ok(()));
            }
            Err(e) => report.record(Step::SellerNotification, Err(e)),
        }
        report
    }

    async fn append_ledger(&self, record: &SaleRecord) -> Result<(), StepError> {
        let result = match self.stores.ledger.insert(record).await {
            Ok(Append::Inserted) => Ok(()),
            Ok(Append::AlreadyRecorded(existing)) => Err(StepError::AlreadyRecorded(existing)),
            Err(e) => Err(e.into()),
        };
        result.inspect_err(|e| step_failed(Step::SaleLedger, record, e))
    }

    async fn retract_listing(&self, listing_id: &ListingId) -> Result<(), StepError> {
        match self.stores.listings.delete_by_id(listing_id).await {
            Ok(existed) => {
                // Already gone counts as retracted
                debug!(listing_id = %listing_id, existed, "Listing retracted");
                Ok(())
            }
            Err(e) => {
                error!(listing_id = %listing_id, error = %e, "Listing retraction failed");
                Err(e.into())
            }
        }
    }

    async fn prune_carts(&self, listing_id: &ListingId) -> Result<(), StepError> {
        match self.stores.carts.delete_by_listing_id(listing_id).await {
            Ok(removed) => {
                debug!(listing_id = %listing_id, removed, "Cart entries pruned");
                Ok(())
            }
            Err(e) => {
                error!(listing_id = %listing_id, error = %e, "Cart pruning failed");
                Err(e.into())
            }
        }
    }

    async fn notify_seller(&self, notice: &SellerNotice) -> Result<NotificationReceipt, StepError> {
        self.notifier.notify(notice).await.map_err(|e| {
            warn!(seller = %notice.seller.id, error = %e, "Seller notification unavailable");
            StepError::from(e)
        })
    }
}

fn step_failed(step: Step, record: &SaleRecord, e: &StepError) {
    error!(
        step = ?step,
        sale_id = %record.id,
        listing_id = %record.listing_id,
        error = %e,
        "Settlement step failed"
    );
}
