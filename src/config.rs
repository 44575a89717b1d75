//! Lookup cache configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DurableStore;

/// Default time-to-live of a refreshed table (15 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

/// Default background refresh interval (15 minutes)
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(900);

/// Default bound on a single fetch
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default service name used in the snapshot file name
pub const DEFAULT_SERVICE_NAME: &str = "countrylookup";

/// What a query does when its table is expired and the refresh fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Answer from the last good table, however old
    #[default]
    ServeStale,
    /// Report the table as unavailable
    FailOnError,
}

/// Configuration for a `LookupCache`
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Feed URL
    pub url: String,
    /// PEM file holding the client certificate and private key, if any
    pub client_cert: Option<PathBuf>,
    /// How long a refreshed table counts as fresh
    pub ttl: Duration,
    /// Directory holding the snapshot file
    pub cache_dir: PathBuf,
    /// Identity of this service, part of the snapshot file name
    pub service_name: String,
    /// Upper bound on one fetch
    pub refresh_timeout: Duration,
    /// Period of the background refresh
    pub refresh_interval: Duration,
    /// Behavior on refresh failure with an expired table
    pub stale_policy: StalePolicy,
    /// Whether to run the background refresh
    pub background_refresh: bool,
}

impl LookupConfig {
    /// Creates a configuration for `url` with every other option defaulted
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_cert: None,
            ttl: DEFAULT_TTL,
            cache_dir: std::env::temp_dir(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            stale_policy: StalePolicy::default(),
            background_refresh: true,
        }
    }

    pub fn with_client_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_cert = Some(path.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    pub fn with_background_refresh(mut self, enabled: bool) -> Self {
        self.background_refresh = enabled;
        self
    }

    /// Snapshot store derived from `cache_dir` and `service_name`
    pub fn store(&self) -> DurableStore {
        DurableStore::new(&self.cache_dir, &self.service_name)
    }
}
