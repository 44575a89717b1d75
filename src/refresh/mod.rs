//! Refresh of the lookup table
//!
//! The coordinator performs single-flight refreshes on demand; the scheduler
//! drives it periodically from a background task.

mod coordinator;
mod scheduler;

pub use coordinator::{RefreshCoordinator, RefreshError, RefreshOutcome};
pub use scheduler::{try_recv, RefreshEvent, RefreshHandle, RefreshScheduler};
