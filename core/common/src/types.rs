//! Common types used throughout gembasync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User-facing name of a remote file.
///
/// Many versions may share one name; the local cache holds at most one
/// file per name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileName(String);

impl FileName {
    /// Create a file name from any string.
    ///
    /// Names come from the remote system and are not validated here; use
    /// [`FileName::as_component`] before touching the filesystem.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the name as a single path component.
    ///
    /// # Errors
    /// - Name is empty, `.` or `..`
    /// - Name contains a path separator or NUL
    pub fn as_component(&self) -> crate::Result<&str> {
        let name = self.0.as_str();
        if name.is_empty() || name == "." || name == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "'{}' is not a usable file name",
                name
            )));
        }
        if name.contains('/') || name.contains('\\') || name.contains('\0') {
            return Err(crate::Error::InvalidInput(format!(
                "File name cannot contain separators: {}",
                name
            )));
        }
        Ok(name)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FileName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque identifier of one specific version of a file.
///
/// On Epicor this is the file-store row id (`FileSysRowID`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Create a new VersionId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "VersionId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VersionId {
    type Error = crate::Error;

    fn try_from(id: String) -> crate::Result<Self> {
        Self::new(id)
    }
}

impl From<VersionId> for String {
    fn from(id: VersionId) -> Self {
        id.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One version of one named file as known to the remote system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVersionRecord {
    pub name: FileName,
    pub version_id: VersionId,
    pub posted_at: DateTime<Utc>,
    /// Provider-specific passthrough (company, keys, row state).
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
}

impl RemoteVersionRecord {
    /// Create a record without passthrough metadata.
    pub fn new(name: FileName, version_id: VersionId, posted_at: DateTime<Utc>) -> Self {
        Self {
            name,
            version_id,
            posted_at,
            extra: None,
        }
    }

    /// The manifest entry this record becomes once materialized locally.
    pub fn to_entry(&self) -> LocalManifestEntry {
        LocalManifestEntry {
            name: self.name.clone(),
            version_id: self.version_id.clone(),
        }
    }
}

/// A version the local cache believes it has materialized.
///
/// Serialized with the field names the dashboard reads
/// (`{"SysID": ..., "FileName": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalManifestEntry {
    #[serde(rename = "SysID")]
    pub version_id: VersionId,
    #[serde(rename = "FileName")]
    pub name: FileName,
}

impl LocalManifestEntry {
    pub fn new(name: impl Into<String>, version_id: VersionId) -> Self {
        Self {
            name: FileName::new(name),
            version_id,
        }
    }
}
