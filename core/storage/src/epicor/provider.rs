//! Epicor Kinetic remote store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use gembasync_common::{Error, FileName, RemoteVersionRecord, Result, VersionId};

use super::auth::EpicorConfig;
use super::client::{EpicorClient, GembaFileRow};
use crate::provider::{CatalogProvider, CatalogPublisher, ContentFetcher};

/// Format written into `PostDate` when publishing.
const POST_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Remote store backed by the `AccessGembaFiles` BAQ and the Epicor file store.
pub struct EpicorProvider {
    client: EpicorClient,
}

impl EpicorProvider {
    /// Create a provider for the given company.
    pub fn new(config: &EpicorConfig) -> Result<Self> {
        Ok(Self {
            client: EpicorClient::new(config)?,
        })
    }
}

/// Parse a `PostDate` value.
///
/// Accepts RFC 3339 and the naive ISO-8601 shapes Epicor emits; naive
/// values are read as UTC.
pub fn parse_post_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Turn a BAQ row into a catalog record, or `None` if it is unusable.
fn record_from_row(row: &GembaFileRow) -> Option<RemoteVersionRecord> {
    if row.file_name.trim().is_empty() {
        warn!("Skipping row without a file name (SysRowID {})", row.sys_row_id);
        return None;
    }
    let version_id = match VersionId::new(row.file_sys_row_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            warn!("Skipping {}: row has no file id", row.file_name);
            return None;
        }
    };
    let Some(posted_at) = parse_post_date(&row.post_date) else {
        warn!(
            "Skipping {} ({}): unparseable PostDate '{}'",
            row.file_name, version_id, row.post_date
        );
        return None;
    };

    let mut record = RemoteVersionRecord::new(FileName::new(row.file_name.clone()), version_id, posted_at);
    record.extra = serde_json::to_value(row).ok();
    Some(record)
}

#[async_trait]
impl CatalogProvider for EpicorProvider {
    fn name(&self) -> &str {
        "epicor"
    }

    async fn fetch_catalog(&self) -> Result<Vec<RemoteVersionRecord>> {
        let rows = self.client.list_rows().await?;
        let total = rows.len();
        let records: Vec<_> = rows.iter().filter_map(record_from_row).collect();
        debug!("Catalog has {} usable rows of {}", records.len(), total);
        Ok(records)
    }
}

#[async_trait]
impl ContentFetcher for EpicorProvider {
    async fn fetch_content(&self, version_id: &VersionId) -> Result<Option<Vec<u8>>> {
        let data = self.client.read_all_bytes(version_id.as_str()).await?;
        if data.is_none() {
            debug!("No file associated with {}", version_id);
        }
        Ok(data)
    }
}

#[async_trait]
impl CatalogPublisher for EpicorProvider {
    async fn publish(&self, name: &FileName, data: Vec<u8>) -> Result<RemoteVersionRecord> {
        name.as_component()?;

        let file_id = self.client.create_file(name.as_str(), &data).await?;
        let version_id = VersionId::new(file_id)?;
        info!("Stored {} as file {}", name, version_id);

        let posted_at = Utc::now();
        let mut row = self.client.new_row().await?;
        row.file_name = name.as_str().to_string();
        row.file_sys_row_id = version_id.as_str().to_string();
        row.post_date = posted_at.format(POST_DATE_FORMAT).to_string();
        row.row_mod = "A".to_string();

        self.client.patch_row(&row).await?;
        info!("Posted {} version {}", name, version_id);

        let mut record = RemoteVersionRecord::new(name.clone(), version_id, posted_at);
        record.extra = serde_json::to_value(&row).ok();
        Ok(record)
    }

    async fn retire(&self, record: &RemoteVersionRecord) -> Result<()> {
        let mut row = match &record.extra {
            Some(extra) => serde_json::from_value::<GembaFileRow>(extra.clone())?,
            None => GembaFileRow {
                file_name: record.name.as_str().to_string(),
                file_sys_row_id: record.version_id.as_str().to_string(),
                post_date: record.posted_at.format(POST_DATE_FORMAT).to_string(),
                ..Default::default()
            },
        };
        if row.file_sys_row_id != record.version_id.as_str() {
            return Err(Error::InvalidInput(format!(
                "Row metadata does not belong to version {}",
                record.version_id
            )));
        }

        row.delete = true;
        row.row_mod = "D".to_string();
        self.client.patch_row(&row).await?;
        info!("Retired {} version {}", record.name, record.version_id);
        Ok(())
    }

    async fn purge_content(&self, version_id: &VersionId) -> Result<()> {
        self.client.delete_file(version_id.as_str()).await?;
        info!("Deleted stored file {}", version_id);
        Ok(())
    }
}
