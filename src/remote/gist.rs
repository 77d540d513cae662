//! GitHub gist remote store.
//!
//! Display reads go to the unauthenticated raw URL of one gist file. That URL
//! sits behind a CDN and can lag behind the gist by minutes, so everything a
//! write depends on (the content it is derived from and the guard check) is
//! read from `GET /gists/{id}` with the credential instead. Writes PATCH the
//! gist with `{ "files": { <file>: { "content": ... } } }`.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Credential, Fingerprint, RemoteSnapshot, RemoteStore};
use crate::error::{Error, Result};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Where the shared list lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GistEndpoint {
    pub gist_id: String,
    pub file_name: String,
    pub raw_url: String,
    pub api_base: String,
}

impl GistEndpoint {
    /// Endpoint reading from the gist owner's raw URL.
    #[must_use]
    pub fn new(owner: &str, gist_id: &str, file_name: &str, api_base: &str) -> Self {
        Self {
            gist_id: gist_id.to_string(),
            file_name: file_name.to_string(),
            raw_url: default_raw_url(owner, gist_id, file_name),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Override the read URL.
    #[must_use]
    pub fn with_raw_url(mut self, raw_url: impl Into<String>) -> Self {
        self.raw_url = raw_url.into();
        self
    }

    /// `PATCH` target for writes.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("{}/gists/{}", self.api_base, self.gist_id)
    }
}

/// Raw URL for the latest revision of a gist file.
#[must_use]
pub fn default_raw_url(owner: &str, gist_id: &str, file_name: &str) -> String {
    format!("https://gist.githubusercontent.com/{owner}/{gist_id}/raw/{file_name}")
}

#[derive(Debug, Serialize)]
struct FileContent<'a> {
    content: &'a str,
}

/// Gist API request body for replacing one file.
#[derive(Debug, Serialize)]
struct GistPatchRequest<'a> {
    files: HashMap<&'a str, FileContent<'a>>,
}

impl<'a> GistPatchRequest<'a> {
    fn replace(file_name: &'a str, content: &'a str) -> Self {
        Self {
            files: HashMap::from([(file_name, FileContent { content })]),
        }
    }
}

/// The parts of a `GET /gists/{id}` response this client reads.
#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
}

/// Content of `file_name` in a gist API response. A file the gist does not
/// have yet reads as empty.
fn file_content(mut gist: GistResponse, file_name: &str) -> Result<String> {
    match gist.files.remove(file_name) {
        None => Ok(String::new()),
        Some(GistFile {
            truncated: true, ..
        }) => Err(Error::Transport(format!(
            "{file_name} is too large to read through the gist API"
        ))),
        Some(file) => Ok(file.content.unwrap_or_default()),
    }
}

/// Remote store backed by a gist file.
pub struct GistStore {
    client: reqwest::Client,
    /// `None` when no gist is configured: reads are unavailable, writes fail.
    endpoint: Option<GistEndpoint>,
}

impl GistStore {
    /// Create a store for `endpoint` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be built.
    pub fn new(endpoint: GistEndpoint, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: Some(endpoint),
        })
    }

    /// Store with no gist configured. Only the local queue is usable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be built.
    pub fn detached(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: None,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<&GistEndpoint> {
        self.endpoint.as_ref()
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("rql/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))
}

/// Map a non-success write status to the error taxonomy.
fn status_error(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth {
            status: status.as_u16(),
        },
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => Error::Conflict {
            expected: "unknown".to_string(),
            actual: format!("HTTP {}", status.as_u16()),
        },
        _ => {
            let body: String = body.chars().take(200).collect();
            Error::Transport(format!("HTTP {}: {body}", status.as_u16()))
        }
    }
}

impl RemoteStore for GistStore {
    async fn fetch_content(&self) -> RemoteSnapshot {
        let Some(endpoint) = &self.endpoint else {
            return RemoteSnapshot::Unavailable {
                reason: "no gist configured".to_string(),
            };
        };

        let response = match self
            .client
            .get(&endpoint.raw_url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %endpoint.raw_url, error = %e, "Gist fetch failed");
                return RemoteSnapshot::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = %endpoint.raw_url, status = status.as_u16(), "Gist fetch rejected");
            return RemoteSnapshot::Unavailable {
                reason: format!("HTTP {}", status.as_u16()),
            };
        }

        match response.text().await {
            Ok(content) => {
                debug!(bytes = content.len(), "Fetched gist content");
                RemoteSnapshot::Available(content)
            }
            Err(e) => {
                warn!(error = %e, "Gist body read failed");
                RemoteSnapshot::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn read_for_write(&self, credential: &Credential) -> Result<(String, Fingerprint)> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::Transport("no gist configured".to_string()))?;

        let response = self
            .client
            .get(endpoint.api_url())
            .header(AUTHORIZATION, format!("token {}", credential.expose()))
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Gist API read failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let gist: GistResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Unexpected gist API response: {e}")))?;
        let content = file_content(gist, &endpoint.file_name)?;
        let fingerprint = Fingerprint::of(&content);
        debug!(revision = fingerprint.short(), "Read gist through the API");

        Ok((content, fingerprint))
    }

    async fn overwrite_content(&self, content: &str, credential: &Credential) -> Result<()> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::Config("no gist configured".to_string()))?;

        let request = GistPatchRequest::replace(&endpoint.file_name, content);

        let response = self
            .client
            .patch(endpoint.api_url())
            .header(AUTHORIZATION, format!("token {}", credential.expose()))
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Gist write failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        debug!(bytes = content.len(), file = %endpoint.file_name, "Overwrote gist file");
        Ok(())
    }
}
