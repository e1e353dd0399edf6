//! In-memory remote store for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use gembasync_common::{Error, FileName, RemoteVersionRecord, Result, VersionId};

use crate::provider::{CatalogProvider, CatalogPublisher, ContentFetcher};

/// In-memory remote store.
///
/// Useful for testing and development. Catalog records and content are
/// kept separately so a record can point at content that does not exist,
/// the same way a file-store blob can go missing behind a BAQ row.
pub struct MemoryProvider {
    records: Arc<RwLock<Vec<RemoteVersionRecord>>>,
    content: Arc<RwLock<HashMap<VersionId, Vec<u8>>>>,
    /// Version ids whose fetch fails with a transport error.
    broken: Arc<RwLock<HashSet<VersionId>>>,
    catalog_offline: AtomicBool,
    fetches: AtomicUsize,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            content: Arc::new(RwLock::new(HashMap::new())),
            broken: Arc::new(RwLock::new(HashSet::new())),
            catalog_offline: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Add a version with content under an explicit id and timestamp.
    pub fn insert_version(
        &self,
        name: &str,
        version_id: &str,
        posted_at: DateTime<Utc>,
        data: impl Into<Vec<u8>>,
    ) -> RemoteVersionRecord {
        let record = self.insert_record(name, version_id, posted_at);
        self.content
            .write()
            .unwrap()
            .insert(record.version_id.clone(), data.into());
        record
    }

    /// Add a catalog record that has no content behind it.
    ///
    /// # Panics
    /// - `version_id` is empty
    pub fn insert_record(
        &self,
        name: &str,
        version_id: &str,
        posted_at: DateTime<Utc>,
    ) -> RemoteVersionRecord {
        let record = RemoteVersionRecord::new(
            FileName::new(name),
            VersionId::new(version_id).expect("memory provider version ids are non-empty"),
            posted_at,
        );
        self.records.write().unwrap().push(record.clone());
        record
    }

    /// Make every fetch of `version_id` fail with a network error.
    pub fn break_version(&self, version_id: &str) {
        if let Ok(id) = VersionId::new(version_id) {
            self.broken.write().unwrap().insert(id);
        }
    }

    /// Toggle catalog availability.
    pub fn set_catalog_offline(&self, offline: bool) {
        self.catalog_offline.store(offline, Ordering::SeqCst);
    }

    /// Number of content fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of records in the catalog.
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_catalog(&self) -> Result<Vec<RemoteVersionRecord>> {
        if self.catalog_offline.load(Ordering::SeqCst) {
            return Err(Error::Network("catalog offline".to_string()));
        }
        Ok(self.records.read().unwrap().clone())
    }
}

#[async_trait]
impl ContentFetcher for MemoryProvider {
    async fn fetch_content(&self, version_id: &VersionId) -> Result<Option<Vec<u8>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.broken.read().unwrap().contains(version_id) {
            return Err(Error::Network(format!("connection reset fetching {}", version_id)));
        }

        Ok(self.content.read().unwrap().get(version_id).cloned())
    }
}

#[async_trait]
impl CatalogPublisher for MemoryProvider {
    async fn publish(&self, name: &FileName, data: Vec<u8>) -> Result<RemoteVersionRecord> {
        let version_id = VersionId::new(Uuid::new_v4().to_string())?;
        let record = RemoteVersionRecord::new(name.clone(), version_id.clone(), Utc::now());

        self.content.write().unwrap().insert(version_id, data);
        self.records.write().unwrap().push(record.clone());

        Ok(record)
    }

    async fn retire(&self, record: &RemoteVersionRecord) -> Result<()> {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| r.version_id != record.version_id);

        if records.len() == before {
            return Err(Error::NotFound(format!("Version not found: {}", record.version_id)));
        }
        Ok(())
    }

    async fn purge_content(&self, version_id: &VersionId) -> Result<()> {
        self.content
            .write()
            .unwrap()
            .remove(version_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Content not found: {}", version_id)))
    }
}
