//! Checkout Settlement Engine
//!
//! Keeps the four marketplace stores consistent when a buyer completes a
//! purchase, without a transaction coordinator.
//!
//! # Flow
//!
//! ```text
//! SettlementOrder → validate → reserve(listing, buyer) ─┬→ ledger append
//!                                                       ├→ listing retraction
//!                                                       ├→ cart pruning (all buyers)
//!                                                       ├→ seller stats credit
//!                                                       ├→ buyer stats purchase
//!                                                       └→ seller notification
//! ```
//!
//! # Invariants
//!
//! 1. **Reserve-Before-Effect**: nothing is written until the reservation is granted
//! 2. **Single-Fire**: a granted reservation is never released, so a
//!    `(listing, buyer)` pair settles at most once
//! 3. **No Rollback**: failed steps are reported, successful ones stand
//! 4. **Atomic Counters**: stats are store-side increments

pub mod coordinator;
pub mod error;
pub mod stats;
pub mod types;
pub mod validation;

#[cfg(test)]
mod integration_tests;

pub use coordinator::SettlementCoordinator;
pub use error::{SettlementError, StepError, ValidationError};
pub use stats::StatsReconciler;
pub use types::{
    CartCheckoutReport, CartLine, SettlementOrder, SettlementOutcome, SettlementReport, Step,
    ValidOrder,
};
pub use validation::validate;
