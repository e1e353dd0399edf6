//! Epicor Kinetic REST API client.

use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

use gembasync_common::{Error, Result};

use super::auth::{Credentials, EpicorConfig};

/// File-store service path under the OData root.
const FILE_STORE_SVC: &str = "Ice.LIB.FileStoreSvc";
/// Foreign row id used for files not attached to any business object.
const NIL_FOREIGN_ROW: &str = "00000000-0000-0000-0000-000000000000";

/// One row of the `AccessGembaFiles` BAQ (user table `UD05`).
///
/// Any column may come back as `null`, e.g. a blank row left by an
/// interrupted publish; such values read as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GembaFileRow {
    #[serde(rename = "UD05_Company", default, deserialize_with = "null_as_default")]
    pub company: String,
    /// File-store id of the content this row points at.
    #[serde(rename = "UD05_Key1", default, deserialize_with = "null_as_default")]
    pub file_sys_row_id: String,
    #[serde(rename = "UD05_Key2", default, deserialize_with = "null_as_default")]
    pub key2: String,
    #[serde(rename = "UD05_Character01", default, deserialize_with = "null_as_default")]
    pub file_name: String,
    /// Posting timestamp as written by the publisher.
    #[serde(rename = "UD05_ShortChar01", default, deserialize_with = "null_as_default")]
    pub post_date: String,
    #[serde(rename = "UD05_CheckBox02", default, deserialize_with = "null_as_default")]
    pub delete: bool,
    /// `"A"`, `"U"`, `"D"` or empty.
    #[serde(rename = "RowMod", default, deserialize_with = "null_as_default")]
    pub row_mod: String,
    #[serde(rename = "RowIdent", default, deserialize_with = "null_as_default")]
    pub row_ident: String,
    #[serde(rename = "SysRowID", default, deserialize_with = "null_as_default")]
    pub sys_row_id: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// OData collection envelope.
#[derive(Debug, Deserialize)]
struct ValueResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

/// Envelope of file-store method responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReturnObj {
    #[serde(default)]
    return_obj: Option<String>,
}

/// Epicor Kinetic API client.
pub struct EpicorClient {
    http: Client,
    base: Url,
    credentials: Credentials,
    baq_name: String,
}

impl EpicorClient {
    /// Create a new client.
    ///
    /// # Errors
    /// - Invalid configuration (see [`EpicorConfig::validate`])
    /// - HTTP client could not be built
    pub fn new(config: &EpicorConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .user_agent(concat!("gembasync/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base: config.odata_base()?,
            credentials: config.credentials.clone(),
            baq_name: config.baq_name.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid request path '{}': {}", path, e)))
    }

    fn baq_url(&self, method: &str) -> Result<Url> {
        self.url(&format!("BaqSvc/{}/{}", self.baq_name, method))
    }

    fn file_store_url(&self, method: &str) -> Result<Url> {
        self.url(&format!("{}/{}", FILE_STORE_SVC, method))
    }

    /// Execute the BAQ and return every row.
    pub async fn list_rows(&self) -> Result<Vec<GembaFileRow>> {
        let url = self.baq_url("Data")?;
        debug!("Sending GET request for {} BAQ", self.baq_name);

        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .headers(self.credentials.headers(false)?)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list {} rows: {}", self.baq_name, e)))?;

        let rows: ValueResponse<GembaFileRow> = self.handle_response(response, started).await?;
        if rows.value.is_empty() {
            warn!("No data in {} response", self.baq_name);
        }
        Ok(rows.value)
    }

    /// Ask the BAQ for a blank row, initialized by its GetNew directives.
    pub async fn new_row(&self) -> Result<GembaFileRow> {
        let url = self.baq_url("GetNew")?;
        debug!("Sending GET request for {} GetNew", self.baq_name);

        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .headers(self.credentials.headers(false)?)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get new row: {}", e)))?;

        let rows: ValueResponse<GembaFileRow> = self.handle_response(response, started).await?;
        rows.value
            .into_iter()
            .next()
            .ok_or_else(|| Error::Network("GetNew response did not contain a row".to_string()))
    }

    /// Write a row back through the updatable BAQ.
    pub async fn patch_row(&self, row: &GembaFileRow) -> Result<serde_json::Value> {
        let url = self.baq_url("Data")?;
        debug!("Sending PATCH request for {} BAQ", self.baq_name);

        let started = Instant::now();
        let response = self
            .http
            .patch(url)
            .headers(self.credentials.headers(true)?)
            .json(row)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to patch row: {}", e)))?;

        self.handle_response(response, started).await
    }

    /// Read the content stored under a file-store id.
    ///
    /// Returns `Ok(None)` when no file is associated with the id.
    pub async fn read_all_bytes(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let url = self.file_store_url("ReadAllBytes")?;
        debug!("Sending POST request for {}/ReadAllBytes", FILE_STORE_SVC);

        let started = Instant::now();
        let response = self
            .http
            .post(url)
            .headers(self.credentials.headers(true)?)
            .json(&serde_json::json!({ "id": id }))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to read file {}: {}", id, e)))?;

        let body: ReturnObj = match self.handle_response(response, started).await {
            Ok(body) => body,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match body.return_obj {
            Some(encoded) if !encoded.is_empty() => {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| {
                        Error::Serialization(format!("Invalid base64 content for {}: {}", id, e))
                    })?;
                Ok(Some(data))
            }
            _ => Ok(None),
        }
    }

    /// Store a new file and return its file-store id.
    pub async fn create_file(&self, file_name: &str, data: &[u8]) -> Result<String> {
        let url = self.file_store_url("Create")?;
        debug!("Sending POST request for {}/Create", FILE_STORE_SVC);

        let payload = serde_json::json!({
            "bytes": base64::engine::general_purpose::STANDARD.encode(data),
            "foreignSysRowID": NIL_FOREIGN_ROW,
            "relatedToSchemaName": "",
            "relatedToTable": "",
            "fileName": file_name,
            "companyID": self.company_id(),
            "tenantID": "",
            "secCode": "",
        });

        let started = Instant::now();
        let response = self
            .http
            .post(url)
            .headers(self.credentials.headers(true)?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create file: {}", e)))?;

        let body: ReturnObj = self.handle_response(response, started).await?;
        match body.return_obj {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::Network(
                "No id returned, file may not have been created".to_string(),
            )),
        }
    }

    /// Delete a stored file.
    pub async fn delete_file(&self, id: &str) -> Result<()> {
        let url = self.file_store_url("Delete")?;
        debug!("Sending POST request for {}/Delete", FILE_STORE_SVC);

        let started = Instant::now();
        let response = self
            .http
            .post(url)
            .headers(self.credentials.headers(true)?)
            .json(&serde_json::json!({ "id": id }))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete file {}: {}", id, e)))?;

        self.check_status(response, started).await.map(|_| ())
    }

    /// Company segment of the OData root.
    fn company_id(&self) -> &str {
        self.base
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_default()
    }

    /// Map non-success statuses onto the common error type.
    async fn check_status(
        &self,
        response: reqwest::Response,
        started: Instant,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        debug!("Request finished with {} in {:?}", status, started.elapsed());

        if status.is_success() {
            return Ok(response);
        }

        warn!("Response returned status of {}", status);
        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound("Resource not found".to_string())),
            StatusCode::UNAUTHORIZED => Err(Error::Authentication(
                "API key or credentials rejected".to_string(),
            )),
            StatusCode::FORBIDDEN => Err(Error::PermissionDenied("Access denied".to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Network(format!("API error: {} - {}", status, body)))
            }
        }
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        started: Instant,
    ) -> Result<T> {
        let response = self.check_status(response, started).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response: {}", e)))?;
        debug!("Returned {:.3} MiB", bytes.len() as f64 / (1024.0 * 1024.0));

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Serialization(format!("Didn't receive valid JSON in response: {}", e)))
    }
}
