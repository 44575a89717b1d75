//! Country Lookup Library
//!
//! A refreshable, disk-backed cache mapping country codes to a branch and
//! legal entity, populated from a remote JSON feed.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod lookup;
pub mod refresh;
pub mod remote;

pub use config::{LookupConfig, StalePolicy};
pub use data::{BranchEntity, Fingerprint, Row, TableIndex};
pub use lookup::{LookupCache, LookupError};
pub use refresh::{RefreshEvent, RefreshOutcome};
pub use remote::{FetchError, HttpSource, RemoteSource};
