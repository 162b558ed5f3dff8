//! Garbage-collection support for the strata versioned catalog.
//!
//! Identifying expired content is a two-pass walk over every reference,
//! live and dead:
//!
//! 1. **Live-set construction** ([`GcWalker::live_contents`]): walk each
//!    reference's commit log from its HEAD. Every put in a commit at or
//!    after the cutoff goes into a per-content-id bloom filter. At the
//!    first expired commit, the keys live at that commit are captured and
//!    their current-at-cutoff values added too, preserving time-travel
//!    reads up to the cutoff. Dead references (recovered from the ref log)
//!    use their drop time as the cutoff.
//! 2. **Expired identification** ([`GcWalker::identify_expired`]): re-walk
//!    every reference and report each put whose value is absent from its
//!    content id's filter.
//!
//! Each reference is an independent unit of work; orchestration of the
//! units (thread pool sizing, distribution) is the caller's concern beyond
//! the built-in scoped-thread sharding.

pub mod bloom;
pub mod config;
pub mod error;
pub mod identify;
pub mod liveset;

pub use bloom::ContentBloomFilter;
pub use config::GcParams;
pub use error::{GcError, GcResult};
pub use identify::{identify_expired_contents, ExpiredContent, IdentifiedResult};
pub use liveset::{GcWalker, LiveContentsResult, ReferenceHandle, ReferenceResult};

#[cfg(test)]
mod tests;
