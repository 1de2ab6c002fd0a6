//! Campus Market - Peer-to-peer marketplace for college students
//!
//! Students list items, browse by category and school, and check out
//! single items or a whole cart. Checkout runs through the settlement
//! engine, which turns one purchase into a sale record, store cleanup,
//! stats updates and a seller notification exactly once.
//!
//! # Modules
//!
//! - [`money`] - Decimal price type
//! - [`market`] - Identifiers and store rows (Listing, CartEntry, SaleRecord, UserStats)
//! - [`store`] - Store ports with in-memory and PostgreSQL backends
//! - [`db`] - PostgreSQL pool and schema
//! - [`notify`] - Seller notification channels (e-mail API, form upload, mailto)
//! - [`settlement`] - Settlement engine (validation, guard, side effects)
//! - [`gateway`] - HTTP API
//! - [`config`] / [`logging`] - Ambient setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod market;
pub mod money;
pub mod notify;
pub mod settlement;
pub mod store;

// Convenient re-exports at crate root
pub use market::{CartEntry, Category, Identity, Listing, ListingId, SaleId, SaleRecord, UserId};
pub use money::Price;
pub use notify::Notifier;
pub use settlement::{SettlementCoordinator, SettlementError, SettlementOrder, SettlementOutcome};
pub use store::MarketStores;
