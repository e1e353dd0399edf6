//! The local manifest: which version of each name has been materialized.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use gembasync_common::{Error, LocalManifestEntry, Result};

/// Ordered list of manifest entries without exact duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<LocalManifestEntry>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manifest, keeping the first of any exact duplicate entries.
    pub fn from_entries(entries: impl IntoIterator<Item = LocalManifestEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|e| seen.insert(e.clone()))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[LocalManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the on-disk JSON array.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.entries)?)
    }

    /// Parse the on-disk JSON array.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let entries: Vec<LocalManifestEntry> = serde_json::from_slice(data)?;
        Ok(Self::from_entries(entries))
    }
}

/// Persists a [`Manifest`] as a JSON file.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest.
    ///
    /// A missing or unreadable file yields an empty manifest.
    pub async fn load(&self) -> Manifest {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No manifest at {}, starting empty", self.path.display());
                return Manifest::new();
            }
            Err(e) => {
                warn!("Could not read manifest {}: {}", self.path.display(), e);
                return Manifest::new();
            }
        };

        match Manifest::from_json(&data) {
            Ok(manifest) => {
                debug!("Loaded {} manifest entries", manifest.len());
                manifest
            }
            Err(e) => {
                warn!("Manifest {} is malformed, starting empty: {}", self.path.display(), e);
                Manifest::new()
            }
        }
    }

    /// Replace the manifest file with `manifest`.
    ///
    /// The new content is written to a temporary file next to the target
    /// and renamed over it. On failure the previous file is untouched.
    pub async fn save(&self, manifest: &Manifest) -> Result<()> {
        let data = manifest.to_json()?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await
            .map_err(|e| Error::Persistence(format!("Manifest writer panicked: {}", e)))??;

        debug!("Saved {} manifest entries to {}", manifest.len(), self.path.display());
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let persistence = |e: std::io::Error| {
        Error::Persistence(format!("Failed to write manifest {}: {}", path.display(), e))
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(persistence)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(persistence)?;
    tmp.write_all(data).map_err(persistence)?;
    tmp.as_file().sync_all().map_err(persistence)?;
    tmp.persist(path).map_err(|e| persistence(e.error))?;
    Ok(())
}
