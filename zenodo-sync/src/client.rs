#![doc = "Deposit-client integration for the CLI: bridges the core trait abstraction to the real HTTP API."]
//
//! # ZenodoClient (CLI <-> core)
//!
//! Implements [`Depositor`] against the Zenodo deposition HTTP API for one
//! configured stage. The trait and all data types live in
//! `zenodo_sync_core::contract`; this module owns transport only.
//!
//! Every operation runs the same precondition guard first: the stage token
//! must be configured (a missing token fails before any network I/O) and the
//! host must be reachable. Transient transport failures are retried with a
//! short exponential backoff; every request carries a bounded timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use zenodo_sync_core::checksum::versioned_filename;
use zenodo_sync_core::config::StageConfig;
use zenodo_sync_core::contract::{
    ApiError, Deposition, DepositionFile, DepositionState, Depositor, EditOutcome,
};
use zenodo_sync_core::models::DepositionMetadata;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

pub struct ZenodoClient {
    http: reqwest::Client,
    config: StageConfig,
}

impl ZenodoClient {
    pub fn new(config: StageConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        info!(stage = %config.stage, host = %config.host, "Initialized Zenodo client");
        Ok(ZenodoClient { http, config })
    }

    fn token(&self) -> Result<&str, ApiError> {
        self.config
            .token
            .as_deref()
            .ok_or_else(|| ApiError::MissingToken {
                stage: self.config.stage.to_string(),
                env_var: self.config.stage.token_env().to_owned(),
            })
    }

    /// Precondition guard for every operation. The token check comes first
    /// and costs no I/O; only then is reachability probed.
    async fn guard(&self) -> Result<&str, ApiError> {
        let token = self.token()?;
        let probe = self
            .http
            .head(&self.config.host)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match probe {
            Ok(_) => Ok(token),
            Err(err) if err.is_connect() || err.is_timeout() => Err(ApiError::Offline {
                host: self.config.host.clone(),
            }),
            // Any HTTP-level response means the host answered.
            Err(_) => Ok(token),
        }
    }

    fn url(&self, path: &str, token: &str) -> String {
        format!("{}{}?access_token={}", self.config.host, path, token)
    }

    /// Send with bounded retry on transient transport failures.
    async fn send<B>(&self, build: B) -> Result<reqwest::Response, ApiError>
    where
        B: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(err) if attempt + 1 < RETRY_ATTEMPTS && (err.is_connect() || err.is_timeout()) => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(ApiError::Transport(err.to_string())),
            }
        }
    }

    /// Decode a response, surfacing the remote error payload on status >= 300.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if status.as_u16() >= 300 {
            let payload = response.text().await.unwrap_or_default();
            return Err(ApiError::Remote {
                status: status.as_u16(),
                payload,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawLinks {
    #[serde(default)]
    latest_draft: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFileLinks {
    #[serde(default)]
    download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    filename: String,
    checksum: String,
    #[serde(default)]
    links: Option<RawFileLinks>,
}

#[derive(Debug, Deserialize)]
struct RawDeposition {
    id: u64,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    files: Vec<RawFile>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    doi_url: Option<String>,
    #[serde(default)]
    metadata: Option<DepositionMetadata>,
    #[serde(default)]
    links: RawLinks,
}

impl From<RawFile> for DepositionFile {
    fn from(raw: RawFile) -> Self {
        DepositionFile {
            filename: raw.filename,
            checksum: raw.checksum,
            download: raw.links.and_then(|l| l.download),
        }
    }
}

impl From<RawDeposition> for Deposition {
    fn from(raw: RawDeposition) -> Self {
        // The API reports "done" for published records and a handful of
        // draft-ish states ("unsubmitted", "inprogress") otherwise.
        let state = match raw.state.as_deref() {
            Some("done") | Some("published") => DepositionState::Published,
            _ => DepositionState::Draft,
        };
        let version = raw
            .metadata
            .as_ref()
            .and_then(|m| m.version.as_deref())
            .and_then(|v| v.parse::<u32>().ok());
        Deposition {
            id: raw.id,
            state,
            files: raw.files.into_iter().map(DepositionFile::from).collect(),
            metadata: raw.metadata,
            doi: raw.doi,
            doi_url: raw.doi_url,
            version,
        }
    }
}

/// Trailing numeric path segment of a draft URL, i.e. the new record id.
fn id_from_draft_url(url: &str) -> Result<u64, ApiError> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| ApiError::Malformed(format!("cannot extract record id from '{url}'")))
}

#[async_trait]
impl Depositor for ZenodoClient {
    async fn create(&self) -> Result<Deposition, ApiError> {
        let token = self.guard().await?;
        let url = self.url("/api/deposit/depositions", token);
        debug!(stage = %self.config.stage, "Creating new deposition");
        let response = self
            .send(|| self.http.post(&url).json(&serde_json::json!({})))
            .await?;
        let raw: RawDeposition = Self::decode(response).await?;
        info!(id = raw.id, "Created draft deposition");
        Ok(raw.into())
    }

    async fn new_version(&self, id: u64) -> Result<Deposition, ApiError> {
        let token = self.guard().await?;
        let url = self.url(
            &format!("/api/deposit/depositions/{id}/actions/newversion"),
            token,
        );
        let response = self
            .send(|| self.http.post(&url).json(&serde_json::json!({})))
            .await?;
        let raw: RawDeposition = Self::decode(response).await?;
        // The response still describes the old record; the new draft is only
        // addressable through the latest_draft link.
        let draft_url = raw.links.latest_draft.ok_or_else(|| {
            ApiError::Malformed("newversion response carries no latest_draft link".to_owned())
        })?;
        let new_id = id_from_draft_url(&draft_url)?;
        info!(old_id = id, new_id, "Opened new version draft");
        self.fetch(new_id).await
    }

    async fn upload_file(
        &self,
        id: u64,
        filename: &str,
        content: &[u8],
        version: Option<u32>,
    ) -> Result<DepositionFile, ApiError> {
        let token = self.guard().await?;
        let stored_name = match version {
            Some(v) => versioned_filename(filename, v),
            None => filename.to_owned(),
        };
        let url = self.url(&format!("/api/deposit/depositions/{id}/files"), token);
        info!(id, filename = %stored_name, bytes = content.len(), "Uploading file");
        let content = content.to_vec();
        let response = self
            .send(|| {
                let part = Part::bytes(content.clone()).file_name(stored_name.clone());
                let form = Form::new().part("file", part);
                self.http.post(&url).multipart(form)
            })
            .await?;
        let raw: RawFile = Self::decode(response).await?;
        Ok(raw.into())
    }

    async fn update_metadata(
        &self,
        id: u64,
        metadata: &DepositionMetadata,
    ) -> Result<Deposition, ApiError> {
        let token = self.guard().await?;
        let url = self.url(&format!("/api/deposit/depositions/{id}"), token);
        debug!(id, title = %metadata.title, "Updating deposition metadata");
        let body = serde_json::json!({ "metadata": metadata });
        let response = self.send(|| self.http.put(&url).json(&body)).await?;
        let raw: RawDeposition = Self::decode(response).await?;
        Ok(raw.into())
    }

    async fn publish(&self, id: u64) -> Result<Deposition, ApiError> {
        let token = self.guard().await?;
        let url = self.url(
            &format!("/api/deposit/depositions/{id}/actions/publish"),
            token,
        );
        let response = self.send(|| self.http.post(&url)).await?;
        let raw: RawDeposition = Self::decode(response).await?;
        info!(id, doi = ?raw.doi, "Published deposition");
        Ok(raw.into())
    }

    async fn edit(&self, id: u64) -> Result<EditOutcome, ApiError> {
        let token = self.guard().await?;
        let url = self.url(
            &format!("/api/deposit/depositions/{id}/actions/edit"),
            token,
        );
        let response = self.send(|| self.http.post(&url)).await?;
        let status = response.status().as_u16();
        // The API rejects the edit action on records that are locked or
        // already editable; both are recoverable via a new version.
        if matches!(status, 400 | 403 | 409) {
            let payload = response.text().await.unwrap_or_default();
            debug!(id, status, payload = %payload, "Edit rejected, signalling fallback");
            return Ok(EditOutcome::Locked);
        }
        let raw: RawDeposition = Self::decode(response).await?;
        Ok(EditOutcome::Opened(raw.into()))
    }

    async fn fetch(&self, id: u64) -> Result<Deposition, ApiError> {
        let token = self.guard().await?;
        let url = self.url(&format!("/api/deposit/depositions/{id}"), token);
        let response = self.send(|| self.http.get(&url)).await?;
        let raw: RawDeposition = Self::decode(response).await?;
        Ok(raw.into())
    }

    async fn list(&self) -> Result<Vec<Deposition>, ApiError> {
        let token = self.guard().await?;
        let url = self.url("/api/deposit/depositions", token);
        let response = self.send(|| self.http.get(&url)).await?;
        let raw: Vec<RawDeposition> = Self::decode(response).await?;
        info!(count = raw.len(), "Listed depositions");
        Ok(raw.into_iter().map(Deposition::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenodo_sync_core::config::Stage;

    fn client_without_token() -> ZenodoClient {
        let config = StageConfig {
            stage: Stage::Sandbox,
            host: Stage::Sandbox.host().to_owned(),
            token: None,
        };
        ZenodoClient::new(config).expect("client construction")
    }

    /// The token check precedes any network I/O, so an unset credential
    /// fails every call immediately with a configuration error.
    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let client = client_without_token();

        let err = client.create().await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken { .. }));
        assert!(err.to_string().contains("ZENODO_TOKEN_SANDBOX"));

        let err = client.list().await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken { .. }));

        let err = client.publish(1).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken { .. }));
    }

    #[test]
    fn draft_url_id_extraction() {
        assert_eq!(
            id_from_draft_url("https://zenodo.org/deposit/12345").unwrap(),
            12345
        );
        assert_eq!(
            id_from_draft_url("https://zenodo.org/deposit/12345/").unwrap(),
            12345
        );
        assert!(id_from_draft_url("https://zenodo.org/deposit/").is_err());
    }

    #[test]
    fn raw_deposition_maps_state_and_version() {
        let raw: RawDeposition = serde_json::from_str(
            r#"{
                "id": 9,
                "state": "done",
                "files": [{"filename": "a.pdf", "checksum": "md5:ff", "links": {"download": "https://x/a.pdf"}}],
                "doi": "10.5072/zenodo.9",
                "metadata": {"title": "t", "upload_type": "publication", "version": "3"}
            }"#,
        )
        .unwrap();
        let dep: Deposition = raw.into();
        assert_eq!(dep.state, DepositionState::Published);
        assert_eq!(dep.version, Some(3));
        assert_eq!(dep.files[0].download.as_deref(), Some("https://x/a.pdf"));
        assert_eq!(dep.files[0].checksum_hex(), "ff");
    }

    #[test]
    fn unsubmitted_state_maps_to_draft() {
        let raw: RawDeposition =
            serde_json::from_str(r#"{"id": 1, "state": "unsubmitted"}"#).unwrap();
        let dep: Deposition = raw.into();
        assert_eq!(dep.state, DepositionState::Draft);
        assert_eq!(dep.version, None);
    }
}
