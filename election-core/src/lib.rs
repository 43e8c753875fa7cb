//! Read-side engine for a ledger-backed election contract.
//!
//! Builds candidate snapshots from live ledger reads or from the ordered event
//! log, ranks candidates, resolves the winner and answers whether an actor may
//! vote right now. Writes go through [`actions::ElectionActions`], which gates
//! them locally and lets the [`scheduler`] reconcile afterwards.

pub mod actions;
pub mod builder;
pub mod eligibility;
pub mod error;
pub mod ledger;
#[cfg(any(test, feature = "memory-ledger"))]
pub mod memory;
pub mod projector;
pub mod scheduler;
pub mod state;
pub mod tally;
pub mod winner;

pub use error::{ElectionError, Result};
