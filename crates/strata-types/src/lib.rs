//! Foundation types for the strata versioned catalog.
//!
//! This crate provides the identity and content types used throughout the
//! strata engine. Every other strata crate depends on `strata-types`.
//!
//! # Key Types
//!
//! - [`Hash`] — Content-addressed identifier (BLAKE3 hash) with the
//!   all-zeros no-ancestor sentinel marking the beginning of history
//! - [`ContentKey`] — Validated multi-segment key naming a content entity
//! - [`ContentId`] — Stable identifier that survives key rename/retype
//! - [`ContentType`] — Opaque content-type discriminator
//! - [`KeyWithBytes`] / [`KeyWithType`] — put and key-list record atoms
//! - [`ContentAndState`] — reference-local bytes plus optional global state

pub mod content;
pub mod error;
pub mod hash;
pub mod key;

pub use content::{ContentAndState, ContentId, ContentIdAndBytes, ContentType, KeyWithBytes, KeyWithType};
pub use error::TypeError;
pub use hash::Hash;
pub use key::ContentKey;
