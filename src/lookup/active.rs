//! The currently installed table and its freshness

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

use crate::data::TableIndex;

#[derive(Debug, Default)]
struct Slot {
    index: Option<Arc<TableIndex>>,
    /// Set by successful refreshes only; a seeded table has none
    refreshed_at: Option<Instant>,
}

/// Shared slot holding the active `TableIndex`
///
/// The lock only guards an `Arc` and a timestamp, and is never held across
/// I/O or an await point. Readers clone the `Arc` and release the lock before
/// looking anything up.
#[derive(Debug, Default)]
pub(crate) struct ActiveTable {
    slot: RwLock<Slot>,
}

impl ActiveTable {
    /// Returns the active index, if any
    pub(crate) fn current(&self) -> Option<Arc<TableIndex>> {
        self.read(|slot| slot.index.clone())
    }

    /// Returns the active index and whether it is still within `ttl`
    pub(crate) fn view(&self, ttl: Duration) -> (Option<Arc<TableIndex>>, bool) {
        self.read(|slot| {
            let fresh = slot
                .refreshed_at
                .is_some_and(|at| at.elapsed() <= ttl);
            (slot.index.clone(), fresh)
        })
    }

    /// Installs a table restored from disk without marking it fresh
    pub(crate) fn seed(&self, index: Arc<TableIndex>) {
        self.write(|slot| slot.index = Some(index));
    }

    /// Installs a freshly fetched table
    pub(crate) fn install(&self, index: Arc<TableIndex>) {
        self.write(|slot| {
            slot.index = Some(index);
            slot.refreshed_at = Some(Instant::now());
        });
    }

    /// Restarts the TTL clock after a refresh that found no change
    pub(crate) fn mark_fresh(&self) {
        self.write(|slot| slot.refreshed_at = Some(Instant::now()));
    }

    fn read<T>(&self, f: impl FnOnce(&Slot) -> T) -> T {
        let guard = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut Slot)) {
        let mut guard = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
