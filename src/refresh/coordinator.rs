//! Single-flight refresh of the lookup table
//!
//! A refresh fetches the feed, fingerprints it, and only rebuilds, persists
//! and swaps the table when the fingerprint changed. At most one refresh runs
//! at a time; callers arriving while one is in flight share its outcome.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

use crate::cache::{CacheRecord, DurableStore};
use crate::data::{parse_rows, Fingerprint, ParseError, Row, TableIndex};
use crate::lookup::ActiveTable;
use crate::remote::{FetchError, RemoteSource};

/// Errors that end a refresh attempt
///
/// None of these reach a lookup caller; they only decide whether the active
/// table is replaced.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The refresh task panicked or was cancelled by runtime shutdown
    #[error("Refresh task aborted: {0}")]
    Aborted(String),
}

/// Result of one refresh attempt
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// New content was installed
    Updated {
        index: Arc<TableIndex>,
        fingerprint: Fingerprint,
    },
    /// Remote content matches the active table
    Unchanged,
    /// The attempt failed; the active table was left as it was
    Failed(RefreshError),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RefreshOutcome::Failed(_))
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshOutcome::Updated { index, fingerprint } => {
                write!(f, "updated ({} entries, {})", index.len(), fingerprint.short())
            }
            RefreshOutcome::Unchanged => f.write_str("unchanged"),
            RefreshOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Fingerprint of the active table and whether it reached the disk
#[derive(Debug, Clone)]
struct KnownContent {
    fingerprint: Fingerprint,
    persisted: bool,
}

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Orchestrates fetch, fingerprint comparison, persistence and swap
pub struct RefreshCoordinator {
    source: Arc<dyn RemoteSource>,
    store: DurableStore,
    table: Arc<ActiveTable>,
    fetch_timeout: Duration,
    known: Mutex<Option<KnownContent>>,
    in_flight: Mutex<Option<InFlight>>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("store", &self.store)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("known", &*lock(&self.known))
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub(crate) fn new(
        source: Arc<dyn RemoteSource>,
        store: DurableStore,
        table: Arc<ActiveTable>,
        fetch_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            store,
            table,
            fetch_timeout,
            known: Mutex::new(None),
            in_flight: Mutex::new(None),
        })
    }

    /// Seeds the active table from the durable snapshot
    ///
    /// The seeded table is served but counts as expired, so the first query
    /// still triggers a refresh. Returns whether a snapshot was found.
    pub(crate) fn restore(&self) -> bool {
        let Some(record) = self.store.load() else {
            tracing::debug!(path = %self.store.path().display(), "no snapshot to restore");
            return false;
        };

        let index = TableIndex::build(&record.rows);
        tracing::info!(
            path = %self.store.path().display(),
            entries = index.len(),
            fingerprint = record.fingerprint.short(),
            written_at = %record.written_at,
            "restored lookup table from snapshot"
        );
        self.table.seed(Arc::new(index));
        *lock(&self.known) = Some(KnownContent {
            fingerprint: record.fingerprint,
            persisted: true,
        });
        true
    }

    /// Fingerprint of the active table, if any
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        lock(&self.known).as_ref().map(|known| known.fingerprint.clone())
    }

    /// Runs one refresh, or joins the one already in flight
    ///
    /// The attempt runs on its own task, so a caller that stops waiting does
    /// not abandon a half-done persist and swap. Must be called from within a
    /// Tokio runtime.
    pub async fn refresh_once(self: &Arc<Self>) -> RefreshOutcome {
        self.join_or_start(None).await
    }

    /// Like [`RefreshCoordinator::refresh_once`], but skips the fetch when
    /// the active table became fresh while the caller was deciding to refresh
    ///
    /// # Arguments
    /// * `ttl` - How long a successful refresh keeps the table fresh
    ///
    /// # Returns
    /// * `RefreshOutcome::Unchanged` without fetching if a flight that ended
    ///   just before this call left the table fresh
    /// * The outcome of the joined or started flight otherwise
    pub(crate) async fn refresh_if_expired(self: &Arc<Self>, ttl: Duration) -> RefreshOutcome {
        self.join_or_start(Some(ttl)).await
    }

    async fn join_or_start(self: &Arc<Self>, ttl: Option<Duration>) -> RefreshOutcome {
        let flight = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    // A flight installs and marks fresh before it empties the
                    // slot, so this check cannot miss a just-finished refresh.
                    if let Some(ttl) = ttl {
                        if let (Some(_), true) = self.table.view(ttl) {
                            tracing::debug!("lookup table already refreshed, skipping fetch");
                            return RefreshOutcome::Unchanged;
                        }
                    }
                    let flight = self.launch();
                    *in_flight = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Builds the shared future for a new flight
    ///
    /// The attempt task is spawned on first poll, outside the slot lock. It
    /// owns a `FlightGuard`, so the slot is emptied even if the task panics
    /// or is cancelled.
    fn launch(self: &Arc<Self>) -> InFlight {
        let guard = FlightGuard(Arc::clone(self));
        async move {
            tokio::spawn(async move { guard.coordinator().attempt().await })
                .await
                .unwrap_or_else(|e| RefreshOutcome::Failed(RefreshError::Aborted(e.to_string())))
        }
        .boxed()
        .shared()
    }

    async fn attempt(&self) -> RefreshOutcome {
        let bytes = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return self.failed(e.into()),
            Err(_) => {
                let e = FetchError::Network(format!(
                    "fetch timed out after {:?}",
                    self.fetch_timeout
                ));
                return self.failed(e.into());
            }
        };

        let rows = match parse_rows(&bytes) {
            Ok(rows) => rows,
            Err(e) => return self.failed(e.into()),
        };
        let fingerprint = Fingerprint::of_rows(&rows);

        let previously_persisted = lock(&self.known)
            .as_ref()
            .filter(|known| known.fingerprint == fingerprint)
            .map(|known| known.persisted);

        if let Some(persisted) = previously_persisted {
            if !persisted && self.persist(fingerprint.clone(), rows) {
                if let Some(known) = lock(&self.known).as_mut() {
                    known.persisted = true;
                }
            }
            self.table.mark_fresh();
            tracing::debug!(fingerprint = fingerprint.short(), "lookup table unchanged");
            return RefreshOutcome::Unchanged;
        }

        let index = Arc::new(TableIndex::build(&rows));
        let persisted = self.persist(fingerprint.clone(), rows);
        *lock(&self.known) = Some(KnownContent {
            fingerprint: fingerprint.clone(),
            persisted,
        });
        self.table.install(Arc::clone(&index));

        tracing::info!(
            entries = index.len(),
            fingerprint = fingerprint.short(),
            persisted,
            "lookup table updated"
        );
        RefreshOutcome::Updated { index, fingerprint }
    }

    /// Writes the snapshot, reporting but swallowing failure
    fn persist(&self, fingerprint: Fingerprint, rows: Vec<Row>) -> bool {
        match self.store.save(&CacheRecord::new(fingerprint, rows)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist lookup table snapshot");
                false
            }
        }
    }

    fn failed(&self, error: RefreshError) -> RefreshOutcome {
        match &error {
            RefreshError::Fetch(FetchError::HttpStatus(status)) => {
                tracing::warn!(status, "lookup feed returned an error status");
            }
            _ => tracing::warn!(error = %error, "lookup table refresh failed"),
        }
        RefreshOutcome::Failed(error)
    }
}

/// Empties the in-flight slot when dropped
struct FlightGuard(Arc<RefreshCoordinator>);

impl FlightGuard {
    fn coordinator(&self) -> &RefreshCoordinator {
        &self.0
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let finished = lock(&self.0.in_flight).take();
        drop(finished);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
