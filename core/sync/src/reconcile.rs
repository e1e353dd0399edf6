//! Diffing the manifest against the newest remote versions.
//!
//! Planning and applying are pure: no I/O, no clock. The engine feeds
//! them a manifest and a catalog and does the fetching in between.

use std::collections::{HashMap, HashSet};

use gembasync_common::{FileName, LocalManifestEntry, RemoteVersionRecord};

use crate::manifest::Manifest;
use crate::selector::NewestSet;

/// Outcome of fetching one record of the fetch set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Bytes were obtained and written to the cache.
    Succeeded,
    /// Not found, transport error or write failure.
    Failed(String),
}

/// What a run has to do to bring the manifest up to date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Manifest entries that no longer reference the newest version.
    pub stale: Vec<LocalManifestEntry>,
    /// Manifest entries carried forward as-is.
    pub unchanged: Vec<LocalManifestEntry>,
    /// Newest records replacing a stale entry, by name.
    pub to_fetch_update: Vec<RemoteVersionRecord>,
    /// Newest records for names the manifest has never seen, by name.
    pub to_fetch_new: Vec<RemoteVersionRecord>,
    /// Stale entries whose name is gone from the catalog.
    pub dropped: Vec<LocalManifestEntry>,
}

impl ReconcilePlan {
    /// Build the plan for `manifest` against the newest set.
    pub fn new(newest: &NewestSet, manifest: &Manifest) -> Self {
        let mut stale = Vec::new();
        let mut unchanged = Vec::new();

        for entry in manifest.entries() {
            match newest.get(&entry.name) {
                Some(record) if record.version_id == entry.version_id => {
                    unchanged.push(entry.clone())
                }
                _ => stale.push(entry.clone()),
            }
        }

        let current: HashSet<&FileName> = unchanged.iter().map(|e| &e.name).collect();
        let stale_names: HashSet<&FileName> = stale
            .iter()
            .map(|e| &e.name)
            .filter(|name| !current.contains(name))
            .collect();
        let known: HashSet<&FileName> = manifest.entries().iter().map(|e| &e.name).collect();

        let mut to_fetch_update = Vec::new();
        let mut to_fetch_new = Vec::new();
        for (name, record) in newest {
            if stale_names.contains(name) {
                to_fetch_update.push(record.clone());
            } else if !known.contains(name) {
                to_fetch_new.push(record.clone());
            }
        }

        let dropped = stale
            .iter()
            .filter(|e| !newest.contains_key(&e.name))
            .cloned()
            .collect();

        Self {
            stale,
            unchanged,
            to_fetch_update,
            to_fetch_new,
            dropped,
        }
    }

    /// Every record that has to be fetched: updates first, then new names.
    pub fn fetch_set(&self) -> impl Iterator<Item = &RemoteVersionRecord> {
        self.to_fetch_update.iter().chain(self.to_fetch_new.iter())
    }

    /// Number of records in the fetch set.
    pub fn fetch_len(&self) -> usize {
        self.to_fetch_update.len() + self.to_fetch_new.len()
    }

    /// Whether the run has nothing to fetch.
    pub fn is_current(&self) -> bool {
        self.fetch_len() == 0
    }

    /// Build the next manifest from per-record outcomes.
    ///
    /// Successful records come first in fetch-set order, followed by the
    /// unchanged entries. Records without a successful outcome are left
    /// out so the next run retries them.
    pub fn apply(&self, outcomes: &HashMap<FileName, FetchOutcome>) -> Manifest {
        let succeeded = self
            .fetch_set()
            .filter(|r| matches!(outcomes.get(&r.name), Some(FetchOutcome::Succeeded)))
            .map(RemoteVersionRecord::to_entry);

        Manifest::from_entries(succeeded.chain(self.unchanged.iter().cloned()))
    }
}
