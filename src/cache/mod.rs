//! In-memory cache for registry lookups
//!
//! This module provides a concurrency-safe store that keeps fetched records
//! together with the time they were fetched. There is no TTL and no eviction:
//! staleness is surfaced to the caller through the timestamp, and the user
//! decides whether to refresh.

mod memory;

pub use memory::MemoryCache;
