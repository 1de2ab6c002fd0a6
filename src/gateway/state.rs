use std::sync::Arc;

use crate::db::Database;
use crate::settlement::SettlementCoordinator;
use crate::store::MarketStores;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub stores: MarketStores,
    pub coordinator: Arc<SettlementCoordinator>,
    /// PostgreSQL pool, `None` when running on in-memory stores
    pub pg_db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(coordinator: Arc<SettlementCoordinator>, pg_db: Option<Arc<Database>>) -> Self {
        Self {
            stores: coordinator.stores().clone(),
            coordinator,
            pg_db,
        }
    }

    pub fn backend(&self) -> &'static str {
        if self.pg_db.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}
