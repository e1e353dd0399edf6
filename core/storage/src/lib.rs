//! Remote catalog access and the local file cache for gembasync.
//!
//! The sync engine is written against the traits in [`provider`]; this crate
//! supplies the Epicor Kinetic implementation, an in-memory one for tests,
//! and the directory the synchronized files are materialized in.

pub mod epicor;
pub mod local;
pub mod memory;
pub mod provider;

pub use epicor::{Credentials, EpicorConfig, EpicorProvider};
pub use local::LocalCache;
pub use memory::MemoryProvider;
pub use provider::{CatalogProvider, CatalogPublisher, ContentFetcher, RemoteStore};
