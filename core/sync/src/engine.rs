//! Sync orchestrator: one reconciliation run end to end.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use gembasync_common::{Error, FileName, RemoteVersionRecord, Result, VersionId};
use gembasync_storage::{LocalCache, RemoteStore};

use crate::manifest::ManifestStore;
use crate::reconcile::{FetchOutcome, ReconcilePlan};
use crate::retry::{RetryConfig, RetryExecutor};
use crate::selector::select_newest;

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory the files are materialized in.
    pub output_dir: PathBuf,
    /// Location of the manifest JSON file.
    pub manifest_path: PathBuf,
    /// Maximum number of content fetches in flight.
    pub fetch_concurrency: usize,
    /// Retries for transient transport errors.
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("svg_files"),
            manifest_path: PathBuf::from("downloaded_ids.json"),
            fetch_concurrency: 4,
            max_retries: 3,
        }
    }
}

/// A record of the fetch set that could not be materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub name: FileName,
    pub version_id: VersionId,
    pub reason: String,
}

/// Counts and failures of one completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Entries carried forward without a fetch.
    pub unchanged: usize,
    /// Stale names replaced with their newest version.
    pub updated: usize,
    /// Names fetched for the first time.
    pub new: usize,
    pub failed: usize,
    /// Stale entries whose name left the catalog.
    pub dropped: usize,
    pub duration: Duration,
    pub failures: Vec<FetchFailure>,
}

impl SyncReport {
    fn from_outcomes(
        plan: &ReconcilePlan,
        outcomes: &HashMap<FileName, FetchOutcome>,
        duration: Duration,
    ) -> Self {
        let succeeded = |records: &[RemoteVersionRecord]| {
            records
                .iter()
                .filter(|r| matches!(outcomes.get(&r.name), Some(FetchOutcome::Succeeded)))
                .count()
        };

        let failures: Vec<FetchFailure> = plan
            .fetch_set()
            .filter_map(|r| {
                let reason = match outcomes.get(&r.name) {
                    Some(FetchOutcome::Succeeded) => return None,
                    Some(FetchOutcome::Failed(reason)) => reason.clone(),
                    None => "no fetch outcome".to_string(),
                };
                Some(FetchFailure {
                    name: r.name.clone(),
                    version_id: r.version_id.clone(),
                    reason,
                })
            })
            .collect();

        Self {
            unchanged: plan.unchanged.len(),
            updated: succeeded(&plan.to_fetch_update),
            new: succeeded(&plan.to_fetch_new),
            failed: failures.len(),
            dropped: plan.dropped.len(),
            duration,
            failures,
        }
    }

    /// Number of files written during the run.
    pub fn fetched(&self) -> usize {
        self.updated + self.new
    }
}

/// Reconciles the local cache with the newest remote versions.
pub struct SyncEngine<P: RemoteStore + ?Sized> {
    remote: Arc<P>,
    cache: LocalCache,
    manifest: ManifestStore,
    retry_executor: RetryExecutor,
    /// Held for the whole of a run so runs never overlap.
    run_lock: Mutex<()>,
    config: SyncConfig,
}

impl<P: RemoteStore + 'static> SyncEngine<P> {
    /// Create a new sync engine.
    pub fn new(remote: P, config: SyncConfig) -> Self {
        Self::from_arc(Arc::new(remote), config)
    }
}

impl<P: RemoteStore + ?Sized> SyncEngine<P> {
    /// Create a new sync engine from an Arc-wrapped remote.
    ///
    /// The output directory is created by the first successful fetch.
    pub fn from_arc(remote: Arc<P>, config: SyncConfig) -> Self {
        let cache = LocalCache::new(&config.output_dir);
        let manifest = ManifestStore::new(config.manifest_path.clone());
        let retry_executor = RetryExecutor::new(RetryConfig::new(config.max_retries));

        Self {
            remote,
            cache,
            manifest,
            retry_executor,
            run_lock: Mutex::new(()),
            config,
        }
    }

    /// Replace the retry policy.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_executor = RetryExecutor::new(config);
        self
    }

    /// Compute what a run would do, without fetching or persisting anything.
    pub async fn plan(&self) -> Result<ReconcilePlan> {
        let manifest = self.manifest.load().await;
        let catalog = self.fetch_catalog().await?;
        Ok(ReconcilePlan::new(&select_newest(&catalog), &manifest))
    }

    /// Run one full reconciliation.
    ///
    /// # Errors
    /// - `CatalogUnavailable` if the catalog cannot be listed; nothing is
    ///   fetched and the manifest is left untouched
    /// - `Persistence` if the next manifest cannot be saved; files already
    ///   written stay in the cache
    pub async fn run(&self) -> Result<SyncReport> {
        let _guard = self.run_lock.lock().await;
        let start = Instant::now();

        info!("Starting sync against {} remote", self.remote.name());

        let manifest = self.manifest.load().await;
        let catalog = self.fetch_catalog().await?;
        let newest = select_newest(&catalog);
        let plan = ReconcilePlan::new(&newest, &manifest);

        debug!(
            "Catalog has {} records for {} names; {} to update, {} new, {} unchanged",
            catalog.len(),
            newest.len(),
            plan.to_fetch_update.len(),
            plan.to_fetch_new.len(),
            plan.unchanged.len()
        );

        let outcomes = self.fetch_all(&plan).await;
        let next = plan.apply(&outcomes);
        self.manifest.save(&next).await?;

        let report = SyncReport::from_outcomes(&plan, &outcomes, start.elapsed());
        info!(
            "Sync completed in {:?}: {} unchanged, {} updated, {} new, {} failed, {} dropped",
            report.duration, report.unchanged, report.updated, report.new, report.failed, report.dropped
        );
        Ok(report)
    }

    async fn fetch_catalog(&self) -> Result<Vec<RemoteVersionRecord>> {
        self.retry_executor
            .execute(|| self.remote.fetch_catalog())
            .await
            .map_err(|e| Error::CatalogUnavailable(e.to_string()))
    }

    /// Fetch every record of the fetch set with bounded concurrency.
    async fn fetch_all(&self, plan: &ReconcilePlan) -> HashMap<FileName, FetchOutcome> {
        let records: Vec<RemoteVersionRecord> = plan.fetch_set().cloned().collect();

        stream::iter(records)
            .map(|record| self.fetch_one(record))
            .buffer_unordered(self.config.fetch_concurrency.max(1))
            .collect()
            .await
    }

    async fn fetch_one(&self, record: RemoteVersionRecord) -> (FileName, FetchOutcome) {
        let outcome = match self.materialize(&record).await {
            Ok(path) => {
                debug!("Fetched {} ({}) to {}", record.name, record.version_id, path.display());
                FetchOutcome::Succeeded
            }
            Err(e) => {
                warn!("{}: {}", record.name, e);
                FetchOutcome::Failed(e.to_string())
            }
        };
        (record.name, outcome)
    }

    /// Fetch one version and write it to the cache under its name.
    async fn materialize(&self, record: &RemoteVersionRecord) -> Result<PathBuf> {
        let fetch_error = |reason: String| Error::ContentFetch {
            version_id: record.version_id.to_string(),
            reason,
        };

        record
            .name
            .as_component()
            .map_err(|e| fetch_error(e.to_string()))?;

        let data = self
            .retry_executor
            .execute(|| self.remote.fetch_content(&record.version_id))
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .ok_or_else(|| fetch_error("no file associated with this id".to_string()))?;

        self.cache
            .write(&record.name, &data)
            .await
            .map_err(|e| fetch_error(e.to_string()))
    }
}
