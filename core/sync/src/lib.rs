//! gembasync sync engine
//!
//! Keeps a local directory holding the newest posted version of every
//! remote file name:
//! - Newest-version selection over the remote catalog
//! - Pure plan/apply reconciliation against the local manifest
//! - Atomic manifest persistence
//! - Retry with exponential backoff for transient errors
//! - Periodic and on-demand scheduling

pub mod engine;
pub mod manifest;
pub mod reconcile;
pub mod retry;
pub mod scheduler;
pub mod selector;

pub use engine::{FetchFailure, SyncConfig, SyncEngine, SyncReport};
pub use manifest::{Manifest, ManifestStore};
pub use reconcile::{FetchOutcome, ReconcilePlan};
pub use retry::{RetryConfig, RetryExecutor};
pub use scheduler::{SyncScheduler, SyncSchedulerHandle};
pub use selector::{select_newest, NewestSet};
