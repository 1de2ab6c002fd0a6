//! Integration Tests for the Settlement Engine
//!
//! Full settlement flows against the in-memory stores. Failures are
//! injected through the flaky store wrappers and mock notification channels.

#[cfg(test)]
mod settlement_flow_tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::market::{
        CartEntry, Category, Identity, ItemSnapshot, Listing, ListingId, School, UserId, UserStats,
    };
    use crate::money::Price;
    use crate::notify::mock::MockChannel;
    use crate::notify::{MailtoHandoff, NotificationChannel, NotificationReceipt, Notifier};
    use crate::settlement::{
        SettlementCoordinator, SettlementError, SettlementOrder, SettlementOutcome,
        SettlementReport, Step, StepError, ValidationError,
    };
    use crate::store::memory::flaky::{FlakyListingStore, FlakySaleLedger, FlakyUserStatsStore};
    use crate::store::{
        CartStore, ListingStore, MarketStores, MemoryCartStore, MemoryListingStore,
        MemorySaleLedger, MemoryUserStatsStore, SaleLedger, UserStatsStore,
    };

    /// Coordinator wired to in-memory stores, with handles on every layer
    struct TestHarness {
        coordinator: SettlementCoordinator,
        listings: Arc<MemoryListingStore>,
        flaky_listings: Arc<FlakyListingStore>,
        carts: Arc<MemoryCartStore>,
        ledger: Arc<MemorySaleLedger>,
        flaky_ledger: Arc<FlakySaleLedger>,
        stats: Arc<MemoryUserStatsStore>,
        flaky_stats: Arc<FlakyUserStatsStore>,
    }

    impl TestHarness {
        fn new() -> Self {
            Self::with_channels(vec![Arc::new(MockChannel::ok("email"))])
        }

        fn with_channels(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
            let listings = Arc::new(MemoryListingStore::new());
            let flaky_listings = Arc::new(FlakyListingStore::new(listings.clone()));
            let carts = Arc::new(MemoryCartStore::new());
            let ledger = Arc::new(MemorySaleLedger::new());
            let flaky_ledger = Arc::new(FlakySaleLedger::new(ledger.clone()));
            let stats = Arc::new(MemoryUserStatsStore::new());
            let flaky_stats = Arc::new(FlakyUserStatsStore::new(stats.clone()));

            let stores = MarketStores {
                listings: flaky_listings.clone(),
                carts: carts.clone(),
                ledger: flaky_ledger.clone(),
                stats: flaky_stats.clone(),
            };
            let coordinator = SettlementCoordinator::new(stores, Arc::new(Notifier::new(channels)));

            Self {
                coordinator,
                listings,
                flaky_listings,
                carts,
                ledger,
                flaky_ledger,
                stats,
                flaky_stats,
            }
        }

        async fn list(&self, id: &str, price: &str, seller: &Identity) -> Listing {
            let listing = Listing {
                id: ListingId::from(id),
                item: ItemSnapshot {
                    name: format!("Item {}", id),
                    category: Category::ClassMaterials,
                    price: Price::parse(price).unwrap(),
                    description: "Gently used".to_string(),
                    picture: None,
                },
                school: School::new(School::UNC_CHAPEL_HILL),
                seller: seller.clone(),
                created_at: Utc::now(),
            };
            self.listings.insert(&listing).await.unwrap();
            listing
        }

        async fn add_to_cart(&self, listing: &Listing, buyer: &Identity) -> CartEntry {
            let entry = CartEntry::from_listing(listing, buyer.id.clone());
            self.carts.insert(&entry).await.unwrap();
            entry
        }

        async fn stats_of(&self, who: &Identity) -> Option<UserStats> {
            self.stats.select_by_user_id(&who.id).await.unwrap()
        }

        async fn cart_of(&self, who: &Identity) -> Vec<CartEntry> {
            self.carts.query_by_buyer(&who.id).await.unwrap()
        }
    }

    fn seller() -> Identity {
        Identity::new("seller-1", "Sam Seller", "sam@unc.edu")
    }

    fn buyer() -> Identity {
        Identity::new("buyer-1", "Bea Buyer", "bea@unc.edu")
    }

    fn other_buyer(n: u32) -> Identity {
        Identity::new(
            format!("buyer-{}", n + 100),
            format!("Buyer {}", n),
            format!("buyer{}@duke.edu", n),
        )
    }

    fn settled(outcome: SettlementOutcome) -> SettlementReport {
        match outcome {
            SettlementOutcome::Settled(report) => report,
            other => panic!("expected Settled, got {:?}", other),
        }
    }

    // ========================================================================
    // Happy Path
    // ========================================================================

    /// One valid purchase touches every store exactly once
    #[tokio::test]
    async fn test_single_settlement_applies_every_step() {
        let h = TestHarness::new();
        let listing = h.list("l1", "15.50", &seller()).await;
        h.add_to_cart(&listing, &buyer()).await;
        h.add_to_cart(&listing, &other_buyer(1)).await;

        let report = settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());

        assert!(report.is_complete(), "failed: {:?}", report.failed);
        assert_eq!(report.succeeded.len(), Step::ALL.len());

        // Ledger
        let purchases = h.ledger.query_by_buyer(&buyer().id).await.unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].id, report.sale_id);
        assert_eq!(purchases[0].seller.email, "sam@unc.edu");
        assert_eq!(purchases[0].item.price, Price::parse("15.50").unwrap());

        // Listing and carts
        assert!(h.listings.get(&listing.id).await.unwrap().is_none());
        assert!(h.cart_of(&buyer()).await.is_empty());
        assert!(h.cart_of(&other_buyer(1)).await.is_empty());

        // Stats
        let s = h.stats_of(&seller()).await.unwrap();
        assert_eq!(s.items_sold, 1);
        assert_eq!(s.total_money_made, Decimal::new(1550, 2));
        let b = h.stats_of(&buyer()).await.unwrap();
        assert_eq!(b.items_bought, 1);
        assert_eq!(b.total_money_spent, Decimal::new(1550, 2));

        assert_eq!(
            report.notification,
            Some(NotificationReceipt::Sent {
                channel: "email".to_string()
            })
        );
    }

    /// S(2, 40.00) sells 15.50 to B(1, 20.00)
    #[tokio::test]
    async fn test_stats_scenario_from_existing_rows() {
        let h = TestHarness::new();
        let since = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();

        let mut s = UserStats::new_member(&seller(), since);
        s.items_sold = 2;
        s.total_money_made = Decimal::new(4000, 2);
        h.stats.insert(&s).await.unwrap();

        let mut b = UserStats::new_member(&buyer(), since);
        b.items_bought = 1;
        b.total_money_spent = Decimal::new(2000, 2);
        h.stats.insert(&b).await.unwrap();

        let listing = h.list("l1", "15.50", &seller()).await;
        settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());

        let s = h.stats_of(&seller()).await.unwrap();
        assert_eq!(s.items_sold, 3);
        assert_eq!(s.total_money_made, Decimal::new(5550, 2));
        assert_eq!(s.member_since, since);

        let b = h.stats_of(&buyer()).await.unwrap();
        assert_eq!(b.items_bought, 2);
        assert_eq!(b.total_money_spent, Decimal::new(3550, 2));
    }

    /// Every buyer holding the listing in a cart loses it; other lines stay
    #[tokio::test]
    async fn test_cart_pruning_crosses_buyers() {
        let h = TestHarness::new();
        let sold = h.list("l1", "10", &seller()).await;
        let unsold = h.list("l2", "12", &seller()).await;

        for n in 0..3 {
            h.add_to_cart(&sold, &other_buyer(n)).await;
        }
        h.add_to_cart(&unsold, &other_buyer(0)).await;

        settled(h.coordinator.buy_now(&sold.id, buyer()).await.unwrap());

        assert!(h.cart_of(&other_buyer(1)).await.is_empty());
        assert!(h.cart_of(&other_buyer(2)).await.is_empty());
        let remaining = h.cart_of(&other_buyer(0)).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].listing_id, unsold.id);
    }

    /// Listing already gone is not a failure
    #[tokio::test]
    async fn test_retracting_absent_listing_succeeds() {
        let h = TestHarness::new();
        let listing = h.list("l1", "8", &seller()).await;
        let order = SettlementOrder::from_listing(&listing, buyer());
        h.listings.delete_by_id(&listing.id).await.unwrap();

        let report = settled(h.coordinator.settle_sale(order).await.unwrap());

        assert!(report.succeeded.contains(&Step::ListingRetraction));
        assert!(report.is_complete());
    }

    // ========================================================================
    // Single-Fire Guard
    // ========================================================================

    /// Same (listing, buyer) twice: one record, one credit
    #[tokio::test]
    async fn test_repeat_settlement_is_duplicate() {
        let h = TestHarness::new();
        let listing = h.list("l1", "15.50", &seller()).await;
        let order = SettlementOrder::from_listing(&listing, buyer());

        let first = settled(h.coordinator.settle_sale(order.clone()).await.unwrap());
        let second = h.coordinator.settle_sale(order).await.unwrap();

        assert_eq!(
            second,
            SettlementOutcome::Duplicate {
                sale_id: first.sale_id.clone()
            }
        );
        assert_eq!(h.ledger.len(), 1);
        assert_eq!(h.stats_of(&seller()).await.unwrap().items_sold, 1);
        assert_eq!(h.stats_of(&buyer()).await.unwrap().items_bought, 1);
    }

    /// Two buyers race for one listing: exactly one wins
    #[tokio::test]
    async fn test_racing_buyers_one_wins() {
        let h = TestHarness::new();
        let listing = h.list("l1", "30", &seller()).await;
        let a = SettlementOrder::from_listing(&listing, buyer());
        let b = SettlementOrder::from_listing(&listing, other_buyer(1));

        let (ra, rb) = tokio::join!(
            h.coordinator.settle_sale(a),
            h.coordinator.settle_sale(b)
        );

        let results = [ra, rb];
        let wins = results
            .iter()
            .filter(|r| matches!(r, Ok(SettlementOutcome::Settled(_))))
            .count();
        let losses = results
            .iter()
            .filter(|r| matches!(r, Err(SettlementError::ListingAlreadySold(id)) if id == &listing.id))
            .count();
        assert_eq!((wins, losses), (1, 1));
        assert_eq!(h.ledger.len(), 1);
        assert_eq!(h.stats_of(&seller()).await.unwrap().items_sold, 1);
    }

    /// Missing seller e-mail: rejected, nothing written, nothing reserved
    #[tokio::test]
    async fn test_missing_seller_email_has_no_side_effects() {
        let h = TestHarness::new();
        let listing = h.list("l1", "15.50", &seller()).await;
        h.add_to_cart(&listing, &other_buyer(1)).await;

        let mut order = SettlementOrder::from_listing(&listing, buyer());
        order.seller.email = "  ".to_string();

        let err = h.coordinator.settle_sale(order).await.unwrap_err();
        assert_eq!(
            err,
            SettlementError::Validation(ValidationError::missing("seller.email"))
        );

        assert_eq!(h.flaky_ledger.reserve_faults.calls(), 0);
        assert_eq!(h.flaky_ledger.faults.calls(), 0);
        assert_eq!(h.flaky_listings.faults.calls(), 0);
        assert_eq!(h.flaky_stats.faults.calls(), 0);
        assert!(h.ledger.is_empty());
        assert!(h.listings.get(&listing.id).await.unwrap().is_some());
        assert_eq!(h.cart_of(&other_buyer(1)).await.len(), 1);
        assert!(h.stats_of(&seller()).await.is_none());

        // Not reserved: a corrected order still goes through
        let report = settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());
        assert!(report.is_complete());
    }

    /// Guard store down: refuse rather than risk a double settlement
    #[tokio::test]
    async fn test_guard_unavailable_has_no_side_effects() {
        let h = TestHarness::new();
        let listing = h.list("l1", "5", &seller()).await;
        h.flaky_ledger.reserve_faults.fail_all(true);

        let err = h.coordinator.buy_now(&listing.id, buyer()).await.unwrap_err();

        assert!(matches!(err, SettlementError::GuardUnavailable(_)));
        assert!(h.listings.get(&listing.id).await.unwrap().is_some());
        assert!(h.ledger.is_empty());
        assert!(h.stats_of(&buyer()).await.is_none());
    }

    // ========================================================================
    // Partial Failure
    // ========================================================================

    /// Both remote strategies down and no handoff: only notification fails
    #[tokio::test]
    async fn test_notification_failure_is_isolated() {
        let api = Arc::new(MockChannel::failing("emailjs-api"));
        let form = Arc::new(MockChannel::failing("emailjs-form"));
        let h = TestHarness::with_channels(vec![api.clone(), form.clone()]);
        let listing = h.list("l1", "15.50", &seller()).await;

        let report = settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());

        assert_eq!(api.calls(), 1);
        assert_eq!(form.calls(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failure(Step::SellerNotification),
            Some(StepError::NotificationUnavailable(_))
        ));
        assert!(report.notification.is_none());
        for step in [
            Step::SaleLedger,
            Step::ListingRetraction,
            Step::CartPruning,
            Step::SellerStats,
            Step::BuyerStats,
        ] {
            assert!(report.succeeded.contains(&step), "{:?}", step);
        }
        assert_eq!(h.ledger.len(), 1);
    }

    /// Remote strategies down, handoff enabled: caller gets the mailto URL
    #[tokio::test]
    async fn test_handoff_after_remote_failures() {
        let h = TestHarness::with_channels(vec![
            Arc::new(MockChannel::failing("emailjs-api")),
            Arc::new(MockChannel::failing("emailjs-form")),
            Arc::new(MailtoHandoff::new("TriDealz")),
        ]);
        let listing = h.list("l1", "15.50", &seller()).await;

        let report = settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());

        assert!(report.is_complete());
        match report.notification {
            Some(NotificationReceipt::Handoff { mailto_url }) => {
                assert!(mailto_url.starts_with("mailto:sam@unc.edu?subject="));
            }
            other => panic!("expected handoff, got {:?}", other),
        }
    }

    /// Retraction failure leaves the other steps in place
    #[tokio::test]
    async fn test_retraction_failure_is_reported() {
        let h = TestHarness::new();
        let listing = h.list("l1", "9", &seller()).await;
        h.flaky_listings.faults.fail_listing(&listing.id);

        let report = settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());

        assert_eq!(
            report.failed.keys().copied().collect::<Vec<_>>(),
            vec![Step::ListingRetraction]
        );
        // Listing still visible; the ledger and stats are not rolled back
        assert!(h.listings.get(&listing.id).await.unwrap().is_some());
        assert_eq!(h.ledger.len(), 1);
        assert_eq!(h.stats_of(&seller()).await.unwrap().items_sold, 1);
    }

    /// Seller without an id: sale recorded, seller credit refused
    #[tokio::test]
    async fn test_seller_without_id_fails_only_seller_stats() {
        let h = TestHarness::new();
        let anonymous = Identity::new("", "Sam Seller", "sam@unc.edu");
        let listing = h.list("l1", "4", &anonymous).await;

        let report = settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());

        assert_eq!(
            report.failure(Step::SellerStats),
            Some(&StepError::MissingUserId)
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(h.ledger.len(), 1);
    }

    /// Buyer stats store down for this buyer only
    #[tokio::test]
    async fn test_buyer_stats_failure_is_reported() {
        let h = TestHarness::new();
        let listing = h.list("l1", "4", &seller()).await;
        h.flaky_stats.faults.fail_user(&buyer().id);

        let report = settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());

        assert!(matches!(
            report.failure(Step::BuyerStats),
            Some(StepError::StoreUnavailable(_))
        ));
        assert!(report.succeeded.contains(&Step::SellerStats));
        assert!(h.stats_of(&buyer()).await.is_none());
    }

    // ========================================================================
    // Cart Checkout
    // ========================================================================

    /// Item 2's ledger insert fails; items 1 and 3 fully settle
    #[tokio::test]
    async fn test_cart_checkout_isolates_line_failure() {
        let h = TestHarness::new();
        let mut items = Vec::new();
        for (id, price) in [("l1", "10"), ("l2", "20"), ("l3", "30")] {
            let listing = h.list(id, price, &seller()).await;
            h.add_to_cart(&listing, &buyer()).await;
            items.push(listing);
        }
        h.flaky_ledger.faults.fail_listing(&items[1].id);

        let report = h.coordinator.checkout_cart(buyer()).await.unwrap();

        assert_eq!(report.lines.len(), 3);
        assert_eq!(report.fully_settled(), 2);
        for ok in [&items[0], &items[2]] {
            let line = report.line(&ok.id).unwrap();
            let line_report = line.outcome.as_ref().unwrap().report().unwrap();
            assert!(line_report.is_complete(), "{}", ok.id);
        }

        let broken = report.line(&items[1].id).unwrap();
        let broken = broken.outcome.as_ref().unwrap().report().unwrap();
        assert!(matches!(
            broken.failure(Step::SaleLedger),
            Some(StepError::StoreUnavailable(_))
        ));
        assert!(broken.succeeded.contains(&Step::ListingRetraction));

        assert_eq!(h.ledger.len(), 2);
        assert!(h.cart_of(&buyer()).await.is_empty());
        let s = h.stats_of(&seller()).await.unwrap();
        assert_eq!(s.items_sold, 3);
        assert_eq!(s.total_money_made, Decimal::new(60, 0));
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let h = TestHarness::new();
        let err = h.coordinator.checkout_cart(buyer()).await.unwrap_err();
        assert_eq!(err, SettlementError::EmptyCart);
    }

    #[tokio::test]
    async fn test_buy_now_missing_listing() {
        let h = TestHarness::new();
        let err = h
            .coordinator
            .buy_now(&ListingId::from("gone"), buyer())
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::ListingUnavailable(ListingId::from("gone")));
        assert_eq!(err.http_status(), 409);
    }

    /// Same listing twice in one cart settles once
    #[tokio::test]
    async fn test_duplicate_cart_lines_settle_once() {
        let h = TestHarness::new();
        let listing = h.list("l1", "7", &seller()).await;
        h.add_to_cart(&listing, &buyer()).await;
        h.add_to_cart(&listing, &buyer()).await;

        let report = h.coordinator.checkout_cart(buyer()).await.unwrap();

        let duplicates = report
            .lines
            .iter()
            .filter(|l| matches!(l.outcome, Ok(SettlementOutcome::Duplicate { .. })))
            .count();
        assert_eq!(report.fully_settled(), 1);
        assert_eq!(duplicates, 1);
        assert_eq!(h.stats_of(&buyer()).await.unwrap().items_bought, 1);
    }

    // ========================================================================
    // Money Bounds
    // ========================================================================

    /// Two sales at the largest listable price both settle and accumulate
    #[tokio::test]
    async fn test_two_maximal_sales_accumulate() {
        let h = TestHarness::new();
        let first = h.list("l1", "9999999999.99", &seller()).await;
        let second = h.list("l2", "9999999999.99", &seller()).await;

        let a = settled(h.coordinator.buy_now(&first.id, other_buyer(1)).await.unwrap());
        let b = settled(h.coordinator.buy_now(&second.id, other_buyer(2)).await.unwrap());
        assert!(a.is_complete());
        assert!(b.is_complete());

        let s = h.stats_of(&seller()).await.unwrap();
        assert_eq!(s.items_sold, 2);
        assert_eq!(s.total_money_made, Decimal::new(1_999_999_999_998, 2));
    }

    /// A seller already at the aggregate ceiling: seller credit is refused,
    /// everything else settles and the row is left as it was
    #[tokio::test]
    async fn test_stats_overflow_is_reported() {
        let h = TestHarness::new();
        let since = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
        let mut s = UserStats::new_member(&seller(), since);
        s.items_sold = 7;
        s.total_money_made = crate::money::max_total();
        h.stats.insert(&s).await.unwrap();

        let listing = h.list("l1", "0.01", &seller()).await;
        let report = settled(h.coordinator.buy_now(&listing.id, buyer()).await.unwrap());

        assert!(matches!(
            report.failure(Step::SellerStats),
            Some(StepError::OutOfRange(_))
        ));
        assert_eq!(report.failed.len(), 1);
        assert!(report.succeeded.contains(&Step::BuyerStats));
        assert_eq!(h.ledger.len(), 1);
        assert_eq!(h.stats_of(&seller()).await.unwrap(), s);
    }

    // ========================================================================
    // Concurrency
    // ========================================================================

    /// Many buyers, one seller, all at once: no lost increments
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_settlements_same_seller() {
        let h = Arc::new(TestHarness::new());
        let mut ids = Vec::new();
        for n in 0..20 {
            ids.push(h.list(&format!("l{}", n), "2.50", &seller()).await.id);
        }

        let tasks: Vec<_> = ids
            .into_iter()
            .enumerate()
            .map(|(n, id)| {
                let h = h.clone();
                tokio::spawn(async move { h.coordinator.buy_now(&id, other_buyer(n as u32)).await })
            })
            .collect();
        for t in futures::future::join_all(tasks).await {
            settled(t.unwrap().unwrap());
        }

        let s = h.stats_of(&seller()).await.unwrap();
        assert_eq!(s.items_sold, 20);
        assert_eq!(s.total_money_made, Decimal::new(5000, 2));
        assert_eq!(
            h.ledger
                .query_by_seller(&UserId::from("seller-1"))
                .await
                .unwrap()
                .len(),
            20
        );
    }
}
