//! Common utilities and types shared across gembasync crates.
//!
//! This module provides the error type and the record types that flow
//! between the remote catalog, the reconciliation engine and the manifest.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{FileName, LocalManifestEntry, RemoteVersionRecord, VersionId};
