//! Tessel Core
//!
//! Shared building blocks for the Tessel shader API: generational handle
//! tables, hashed collections, logging bootstrap and profiling hooks.

pub mod alloc;
pub mod logging;
pub mod profiling;
