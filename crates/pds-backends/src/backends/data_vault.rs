//! Data Vault Backend
//!
//! Stores payloads in a remote data vault over HTTP. The vault mints the
//! identifiers itself (same DRI framing as the local codec) and returns them
//! as `content_dri`.
//!
//! Required settings:
//! - `api_url`: base URL of the vault, e.g. `https://vault.example`
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | save | `POST {api_url}/api/v1/files` (multipart, part `file`) |
//! | load | `GET {api_url}/api/v1/files/{dri}` |
//! | load_table | `GET {api_url}/api/v1/files?table={table}` |
//! | usage_policy | `GET {api_url}/api/meta/usage` |

use async_trait::async_trait;
use pds_core::{BackendSettings, Dri, RawRecord, StoredRecord};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{Capability, CapabilitySet, StorageBackend};
use crate::error::{BackendError, Result};

/// Type name of the data vault backend
pub const DATA_VAULT_BACKEND_TYPE: &str = "data_vault";

/// Settings key holding the vault base URL
pub const API_URL_KEY: &str = "api_url";

const FILES_ENDPOINT: &str = "/api/v1/files";
const USAGE_POLICY_ENDPOINT: &str = "/api/meta/usage";

#[derive(Debug, Deserialize)]
struct SaveResponse {
    content_dri: String,
}

#[derive(Debug, Deserialize)]
struct VaultFile {
    content_dri: String,
    content: String,
    #[serde(default)]
    metadata: Option<String>,
}

/// Remote data vault backend
pub struct DataVaultBackend {
    settings: RwLock<BackendSettings>,
    http_client: reqwest::Client,
}

impl DataVaultBackend {
    /// Create an unconfigured data vault backend
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(BackendSettings::new()),
            http_client: reqwest::Client::new(),
        }
    }

    /// Configure the vault base URL up front
    pub fn with_api_url(self, api_url: impl Into<String>) -> Self {
        Self {
            settings: RwLock::new(BackendSettings::new().with(API_URL_KEY, api_url.into())),
            ..self
        }
    }

    /// Use a caller-provided HTTP client (timeouts, proxies)
    pub fn with_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Check the vault answers at all
    pub async fn ping(&self) -> std::result::Result<(), String> {
        match self.load(&Dri::from_backend("ping")).await {
            Ok(_) => Ok(()),
            Err(BackendError::Unavailable(reason)) => Err(reason),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn api_url(&self) -> Result<String> {
        let settings = self.settings.read().await;
        settings
            .get_str(API_URL_KEY)
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| BackendError::NotConfigured(format!("missing '{}' setting", API_URL_KEY)))
    }
}

impl Default for DataVaultBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for DataVaultBackend {
    fn backend_type(&self) -> &str {
        DATA_VAULT_BACKEND_TYPE
    }

    fn description(&self) -> &str {
        "remote data vault"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::required().with(Capability::UsagePolicy)
    }

    fn preview_settings(&self) -> BackendSettings {
        BackendSettings::new()
            .with("oca_schema_namespace", "pds")
            .with("oca_schema_dri", "ejHFuhg2v1ZrL5uQrHe3Arcxy62GWNakjTwL38swC9RB")
    }

    async fn settings(&self) -> BackendSettings {
        self.settings.read().await.clone()
    }

    async fn configure(&self, update: BackendSettings) -> Result<()> {
        self.settings.write().await.merge(update);
        Ok(())
    }

    async fn save(&self, payload: &str, metadata: Option<&str>) -> Result<Dri> {
        let url = format!("{}{}", self.api_url().await?, FILES_ENDPOINT);
        debug!(url = %url, "Saving record to data vault");

        let file = Part::text(payload.to_string())
            .file_name("data")
            .mime_str("application/json")?;
        let mut form = Form::new().part("file", file);
        if let Some(metadata) = metadata {
            form = form.text("metadata", metadata.to_string());
        }

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let saved: SaveResponse = response.json().await?;
        info!(dri = %saved.content_dri, "Saved record to data vault");
        Ok(Dri::from_backend(saved.content_dri))
    }

    async fn load(&self, dri: &Dri) -> Result<Option<RawRecord>> {
        let url = format!("{}{}/{}", self.api_url().await?, FILES_ENDPOINT, dri);
        debug!(url = %url, "Loading record from data vault");

        let response = self.http_client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.error_for_status()?.text().await?;

        // The vault reports a missing file as a JSON body with an "errors" key
        match serde_json::from_str::<Value>(&body) {
            Ok(json) if json.get("errors").is_some() => {
                debug!(dri = %dri, "Data vault reported record missing");
                Ok(None)
            }
            _ => Ok(Some(RawRecord::new(body))),
        }
    }

    async fn load_table(&self, table: &str) -> Result<Vec<StoredRecord>> {
        let url = format!("{}{}", self.api_url().await?, FILES_ENDPOINT);

        let files: Vec<VaultFile> = self
            .http_client
            .get(&url)
            .query(&[("table", table)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(files
            .into_iter()
            .map(|file| StoredRecord {
                dri: Dri::from_backend(file.content_dri),
                content: file.content,
                metadata: file.metadata,
            })
            .collect())
    }

    async fn usage_policy(&self) -> Result<String> {
        let url = format!("{}{}", self.api_url().await?, USAGE_POLICY_ENDPOINT);

        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "Data vault has no usage policy");
            return Err(BackendError::Http(format!(
                "usage policy request failed with status {}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}
