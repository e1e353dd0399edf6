//! Remote collaborator traits.
//!
//! The sync engine only ever talks to the remote system through these
//! traits. Providers own their transport, authentication and encoding.

use async_trait::async_trait;

use gembasync_common::{FileName, RemoteVersionRecord, Result, VersionId};

/// Lists every file version the remote system currently knows about.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Get the provider name (e.g., "epicor", "memory").
    fn name(&self) -> &str;

    /// Fetch the complete remote catalog.
    ///
    /// # Postconditions
    /// - Returns every version record, possibly many per name
    /// - An empty catalog is a valid answer, not an error
    ///
    /// # Errors
    /// - Network/authentication errors
    async fn fetch_catalog(&self) -> Result<Vec<RemoteVersionRecord>>;
}

/// Retrieves the bytes of one specific version.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the content of `version_id`.
    ///
    /// Returns `Ok(None)` when the remote system has no content for the
    /// id. That is a normal outcome, not an error.
    ///
    /// # Errors
    /// - Network/authentication errors
    /// - Content could not be decoded
    async fn fetch_content(&self, version_id: &VersionId) -> Result<Option<Vec<u8>>>;
}

/// Creates and retires versions on the remote system.
#[async_trait]
pub trait CatalogPublisher: Send + Sync {
    /// Store `data` as a new version of `name`, posted now.
    ///
    /// # Postconditions
    /// - The new version appears in subsequent catalogs
    /// - Returns the record describing the new version
    async fn publish(&self, name: &FileName, data: Vec<u8>) -> Result<RemoteVersionRecord>;

    /// Remove a version from the catalog.
    ///
    /// The stored content is left in place; see [`CatalogPublisher::purge_content`].
    async fn retire(&self, record: &RemoteVersionRecord) -> Result<()>;

    /// Delete the stored content of a version.
    async fn purge_content(&self, version_id: &VersionId) -> Result<()>;
}

/// A remote system the sync engine can reconcile against.
pub trait RemoteStore: CatalogProvider + ContentFetcher {}

impl<T: CatalogProvider + ContentFetcher + ?Sized> RemoteStore for T {}
