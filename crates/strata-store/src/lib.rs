//! Persistence contract for the strata versioned catalog.
//!
//! The engine requires exactly two storage capabilities:
//! - compare-and-swap on the single [`GlobalPointer`] record, and
//! - durable, idempotent writes of the append-only commit-log, key-list,
//!   global-state-log, and ref-log records.
//!
//! [`Store`] captures that contract; [`InMemoryStore`] is the reference
//! implementation for tests and embedding. Database bindings (SQL
//! transactions, single-row conditional updates on NoSQL stores) implement
//! the same trait out of tree.
//!
//! [`GlobalPointer`]: strata_model::GlobalPointer

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::Store;
