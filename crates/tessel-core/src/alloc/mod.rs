//! Optimized allocation and collection types for Tessel.
//!
//! This module provides:
//! - Re-exports of optimized hash collections using AHash
//! - `HandleTable`, a dense slot table addressed by generational handles

pub mod handle_table;

pub use handle_table::{Handle, HandleTable};

// Re-export optimized hash collections
pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};
