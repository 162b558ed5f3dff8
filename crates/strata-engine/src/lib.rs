//! The strata database adapter.
//!
//! This crate is the heart of strata. [`DatabaseAdapter`] provides atomic,
//! multi-key transactions over a branching history of content references:
//! - `commit` / `merge` / `transplant` with key-level conflict detection and
//!   an optimistic CAS retry loop over the single global pointer
//! - the read path: `values`, `keys`, `commit_log`, `diff`,
//!   `hash_on_reference`, global-state lookups
//! - reference management: `create`, `delete`, `assign`, `named_ref(s)`,
//!   the ref log, and repository lifecycle
//!
//! The adapter treats content and commit metadata as opaque bytes and
//! persists them through any [`Store`] implementation.
//!
//! [`Store`]: strata_store::Store

pub mod adapter;
pub mod commit;
pub mod config;
pub mod error;
mod keylist;
pub mod merge;
pub mod readpath;
pub mod refs;

pub use adapter::DatabaseAdapter;
pub use commit::{CommitAttempt, CommitValidator};
pub use config::{AdapterConfig, DEFAULT_COMMIT_RETRIES, DEFAULT_KEY_LIST_DISTANCE};
pub use error::{AdapterError, AdapterResult};
pub use readpath::{CommitLogIter, Difference};
pub use refs::{GetNamedRefsParams, RefLogIter, ReferenceInfo};
