//! Public lookup API
//!
//! `LookupCache` answers country code queries from the active table. Fresh
//! tables are answered without any I/O. An expired table triggers a
//! single-flight refresh first; if that refresh fails, the stale table keeps
//! answering (or, under `StalePolicy::FailOnError`, the query reports
//! `Unavailable`).

mod active;

pub(crate) use active::ActiveTable;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{LookupConfig, StalePolicy};
use crate::data::{BranchEntity, Fingerprint, TableIndex};
use crate::refresh::{
    try_recv, RefreshCoordinator, RefreshEvent, RefreshHandle, RefreshOutcome, RefreshScheduler,
};
use crate::remote::{FetchError, HttpSource, RemoteSource};

/// Errors visible to lookup callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The table is valid but has no row for this country code
    #[error("No entry for country code '{0}'")]
    NotFound(String),

    /// No table has ever been loaded, or the policy forbids serving a stale one
    #[error("Lookup table unavailable")]
    Unavailable,
}

/// Country code lookup backed by a refreshable remote table
///
/// Owns its background refresh task; the task stops when the cache is shut
/// down or dropped.
#[derive(Debug)]
pub struct LookupCache {
    table: Arc<ActiveTable>,
    coordinator: Arc<RefreshCoordinator>,
    ttl: Duration,
    stale_policy: StalePolicy,
    scheduler: Option<RefreshHandle>,
}

impl LookupCache {
    /// Creates a cache that fetches over HTTP(S) as configured
    ///
    /// Fails only if the client certificate cannot be loaded. Must be called
    /// from within a Tokio runtime when background refresh is enabled.
    pub fn new(config: &LookupConfig) -> Result<Self, FetchError> {
        let source = HttpSource::new(config)?;
        Ok(Self::with_source(config, Arc::new(source)))
    }

    /// Creates a cache over an arbitrary feed source
    ///
    /// Seeds the table from the durable snapshot, if one exists, before
    /// anything touches the network.
    pub fn with_source(config: &LookupConfig, source: Arc<dyn RemoteSource>) -> Self {
        let table = Arc::new(ActiveTable::default());
        let coordinator = RefreshCoordinator::new(
            source,
            config.store(),
            Arc::clone(&table),
            config.refresh_timeout,
        );
        coordinator.restore();

        let scheduler = config.background_refresh.then(|| {
            RefreshScheduler::new(Arc::clone(&coordinator), config.refresh_interval).spawn()
        });

        Self {
            table,
            coordinator,
            ttl: config.ttl,
            stale_policy: config.stale_policy,
            scheduler,
        }
    }

    /// Looks up the branch and legal entity for a country code
    pub async fn get(&self, country_code: &str) -> Result<BranchEntity, LookupError> {
        let (current, fresh) = self.table.view(self.ttl);

        let Some(stale) = current else {
            // Cold start: nothing to serve until an attempt succeeds.
            return match self.coordinator.refresh_if_expired(self.ttl).await {
                RefreshOutcome::Updated { index, .. } => answer(&index, country_code),
                RefreshOutcome::Unchanged => match self.table.current() {
                    Some(index) => answer(&index, country_code),
                    None => Err(LookupError::Unavailable),
                },
                RefreshOutcome::Failed(_) => Err(LookupError::Unavailable),
            };
        };

        if fresh {
            return answer(&stale, country_code);
        }

        match self.coordinator.refresh_if_expired(self.ttl).await {
            RefreshOutcome::Updated { index, .. } => answer(&index, country_code),
            RefreshOutcome::Unchanged => {
                answer(&self.table.current().unwrap_or(stale), country_code)
            }
            RefreshOutcome::Failed(e) => match self.stale_policy {
                StalePolicy::ServeStale => {
                    tracing::debug!(error = %e, country_code, "serving stale lookup table");
                    answer(&self.table.current().unwrap_or(stale), country_code)
                }
                StalePolicy::FailOnError => Err(LookupError::Unavailable),
            },
        }
    }

    /// Alias of [`LookupCache::get`]
    pub async fn get_branch_and_legal_entity(
        &self,
        country_code: &str,
    ) -> Result<BranchEntity, LookupError> {
        self.get(country_code).await
    }

    /// Forces a refresh attempt, joining one already in flight
    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.coordinator.refresh_once().await
    }

    /// The active table, for callers that need a consistent view across
    /// several lookups
    pub fn snapshot(&self) -> Option<Arc<TableIndex>> {
        self.table.current()
    }

    /// Number of country codes in the active table
    pub fn len(&self) -> usize {
        self.table.current().map_or(0, |index| index.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fingerprint of the active table
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.coordinator.fingerprint()
    }

    /// Next pending background refresh event, if any
    pub fn try_recv_event(&mut self) -> Option<RefreshEvent> {
        self.scheduler.as_mut().and_then(try_recv)
    }

    /// Stops the background refresh and waits for it to exit
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.scheduler.take() {
            handle.shutdown().await;
        }
    }
}

fn answer(index: &TableIndex, country_code: &str) -> Result<BranchEntity, LookupError> {
    index
        .lookup(country_code)
        .cloned()
        .ok_or_else(|| LookupError::NotFound(country_code.to_string()))
}
