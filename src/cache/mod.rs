//! Durable storage for the lookup table
//!
//! This module persists the last good row set to disk together with its
//! fingerprint, so a restarted process has something to serve before its
//! first successful fetch. Unreadable or corrupt snapshots degrade to
//! "absent" rather than failing startup.

mod store;

pub use store::{CacheRecord, DurableStore, StoreError};
