//! Local file cache.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tokio::fs;
use tracing::debug;

use gembasync_common::{Error, FileName, Result};

/// Directory holding exactly one file per remote name.
///
/// Each write lands in a temporary sibling first and is renamed into
/// place, so readers never see a half-written file. The directory is
/// created on the first write.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    /// Create a cache rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path a given name is materialized at.
    ///
    /// # Errors
    /// - Name is not a single safe path component
    pub fn path_for(&self, name: &FileName) -> Result<PathBuf> {
        Ok(self.root.join(name.as_component()?))
    }

    /// Write `data` as the file for `name`, replacing any previous copy.
    ///
    /// # Errors
    /// - Name is not a single safe path component
    /// - Root directory cannot be created or written
    pub async fn write(&self, name: &FileName, data: &[u8]) -> Result<PathBuf> {
        let target = self.path_for(name)?;
        let root = self.root.clone();
        let path = target.clone();
        let data = data.to_vec();
        let len = data.len();

        tokio::task::spawn_blocking(move || write_atomic(&root, &path, &data))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        debug!("Wrote {} bytes to {}", len, target.display());
        Ok(target)
    }

    /// Read the cached file for `name`.
    pub async fn read(&self, name: &FileName) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        Ok(fs::read(&path).await?)
    }
}

/// The temp name is fixed-length, independent of the target name.
fn write_atomic(root: &Path, target: &Path, data: &[u8]) -> Result<()> {
    std::fs::create_dir_all(root)?;

    let mut tmp = Builder::new().prefix(".gemba").suffix(".tmp").tempfile_in(root)?;
    tmp.write_all(data)?;
    tmp.persist(target).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
