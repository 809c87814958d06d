//! Raw access to the document-hosting API.
//!
//! [`DocsApi`] is the seam between the pipeline and the network: three read
//! operations that return the upstream JSON untouched. Parsing, filtering and
//! caching happen in [`DocsClient`](crate::client::DocsClient), so a retry
//! here only ever repeats the HTTP request.
//!
//! [`GoogleDocsApi`] talks to Google Drive v3 (comments, revisions) and
//! Docs v1 (document metadata) with a bearer token.
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | comments | `GET {drive}/files/{id}/comments` |
//! | revisions | `GET {drive}/files/{id}/revisions?pageSize=100` |
//! | metadata | `GET {docs}/documents/{id}` |

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::GoogleConfig;
use crate::credentials::CredentialProvider;
use crate::retry::{is_transient_status, Transient};

const COMMENT_FIELDS: &str =
    "comments(id,content,author,createdTime,modifiedTime,resolved,quotedFileContent,replies)";
const REVISION_FIELDS: &str = "revisions(id,modifiedTime,lastModifyingUser,size)";

/// Revisions are read from the first page only.
pub const REVISION_PAGE_SIZE: u32 = 100;

/// Failure of a single upstream request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(String),
    /// A success response whose body was not JSON.
    #[error("invalid response body: {0}")]
    Body(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Transient for ApiError {
    fn is_transient(&self) -> bool {
        self.status().is_some_and(is_transient_status)
    }
}

/// Read operations against the document-hosting service.
pub trait DocsApi: Send + Sync {
    /// All comments on the document, replies nested, deleted ones excluded.
    fn list_comments(&self, document_id: &str) -> Result<Value, ApiError>;

    /// The first page of revisions, at most `page_size` entries.
    fn list_revisions(&self, document_id: &str, page_size: u32) -> Result<Value, ApiError>;

    /// The document resource itself (id, title, revision id, …).
    fn get_document(&self, document_id: &str) -> Result<Value, ApiError>;
}

/// [`DocsApi`] backed by Google Drive v3 and Docs v1.
pub struct GoogleDocsApi {
    http: reqwest::blocking::Client,
    drive_base_url: Url,
    docs_base_url: Url,
    token: String,
}

impl GoogleDocsApi {
    /// Build the client, taking the bearer token from `credentials` once.
    ///
    /// Must not be called from inside an async context: the blocking HTTP
    /// client owns its own runtime.
    pub fn new(config: &GoogleConfig, credentials: &dyn CredentialProvider) -> Result<Self> {
        let token = credentials
            .bearer_token()
            .context("Failed to obtain Google credentials")?;

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            drive_base_url: parse_base_url("google.drive_base_url", &config.drive_base_url)?,
            docs_base_url: parse_base_url("google.docs_base_url", &config.docs_base_url)?,
            token,
        })
    }

    fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response.json().map_err(|e| ApiError::Body(e.to_string()));
        }

        let body_text = response.text().unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            message: google_error_message(&body_text),
        })
    }
}

impl DocsApi for GoogleDocsApi {
    fn list_comments(&self, document_id: &str) -> Result<Value, ApiError> {
        let url = endpoint(&self.drive_base_url, &["files", document_id, "comments"]);
        self.get_json(
            url,
            &[
                ("fields", COMMENT_FIELDS.to_string()),
                ("includeDeleted", "false".to_string()),
            ],
        )
    }

    fn list_revisions(&self, document_id: &str, page_size: u32) -> Result<Value, ApiError> {
        let url = endpoint(&self.drive_base_url, &["files", document_id, "revisions"]);
        self.get_json(
            url,
            &[
                ("fields", REVISION_FIELDS.to_string()),
                ("pageSize", page_size.to_string()),
            ],
        )
    }

    fn get_document(&self, document_id: &str) -> Result<Value, ApiError> {
        let url = endpoint(&self.docs_base_url, &["documents", document_id]);
        self.get_json(url, &[])
    }
}

fn parse_base_url(key: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("{} is not a valid URL: {}", key, raw))?;
    if url.cannot_be_a_base() {
        bail!("{} must be an http(s) base URL: {}", key, raw);
    }
    Ok(url)
}

/// Append `segments` to `base`, each percent-encoded as a single path
/// segment, so a `/` or `?` inside a document id stays inside that segment.
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Pull `error.message` out of a Google error body, or fall back to the raw text.
fn google_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
