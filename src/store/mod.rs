// src/store/mod.rs

//! Shared state store.
//!
//! - [`shared`] owns the `logs`, `artifacts` and `metrics` namespaces plus
//!   generic in-memory slots, behind a single async lock.
//! - [`persist`] implements the read-merge-atomic-write protocol for the
//!   state document that external dashboards read.

pub mod persist;
pub mod shared;

pub use shared::{OWNED_NAMESPACES, SharedStore};
