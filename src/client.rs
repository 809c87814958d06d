//! Cached, retrying fetches of a document's collaboration data.
//!
//! [`DocsClient`] exposes one operation per resource type plus
//! [`fetch_all`](DocsClient::fetch_all). Every operation follows the same
//! steps:
//!
//! 1. Build a cache key from the document id, resource type and parameter.
//! 2. Unless force-refresh is on, return a cached value if present.
//! 3. Otherwise call the raw API through the [`RetryPolicy`], parse and
//!    post-process the payload, and cache it.
//! 4. Any failure comes back as [`FetchResult::Failed`], never as an `Err`,
//!    so one resource failing cannot prevent the others from loading.
//!
//! # Cache keys
//!
//! | Resource | Key |
//! |----------|-----|
//! | comments (unresolved) | `{doc}:comments` |
//! | comments (all) | `{doc}:comments:all` |
//! | revisions | `{doc}:revisions:{since_hours}` |
//! | metadata | `{doc}:metadata` |
//!
//! The revision cutoff is computed from the wall clock when the fetch runs
//! and the filtered list is cached as-is. A later read within the TTL gets
//! that same list, so it can include revisions slightly older than
//! `since_hours` relative to the reader's clock.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

use crate::cache::TtlCache;
use crate::docs_api::{DocsApi, REVISION_PAGE_SIZE};
use crate::models::{Comment, DocumentMetadata, FetchResult, Revision};
use crate::retry::RetryPolicy;

/// A value stored in the client's cache.
#[derive(Debug, Clone)]
pub enum CachedResource {
    Comments(Vec<Comment>),
    Revisions(Vec<Revision>),
    Metadata(DocumentMetadata),
}

/// Everything [`DocsClient::fetch_all`] gathered for one document.
#[derive(Debug, Clone, Default)]
pub struct FetchedData {
    pub comments: Vec<Comment>,
    pub revisions: Vec<Revision>,
    pub metadata: Option<DocumentMetadata>,
    /// One entry per failed fetch, in call order: comments, revisions, metadata.
    pub errors: Vec<String>,
}

pub struct DocsClient {
    api: Arc<dyn DocsApi>,
    cache: Mutex<TtlCache<CachedResource>>,
    retry: RetryPolicy,
    force_refresh: bool,
}

impl DocsClient {
    pub fn new(api: Arc<dyn DocsApi>, cache: TtlCache<CachedResource>, retry: RetryPolicy) -> Self {
        Self {
            api,
            cache: Mutex::new(cache),
            retry,
            force_refresh: false,
        }
    }

    /// Skip cache reads on every fetch. Results are still written to the cache.
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Unresolved comments (all comments when `include_resolved`).
    pub fn fetch_comments(
        &self,
        document_id: &str,
        include_resolved: bool,
    ) -> FetchResult<Vec<Comment>> {
        let key = if include_resolved {
            format!("{}:comments:all", document_id)
        } else {
            format!("{}:comments", document_id)
        };

        if let Some(CachedResource::Comments(comments)) = self.cached(&key) {
            return FetchResult::Fetched(comments);
        }

        info!(document_id, "fetching comments");
        let result = self
            .retry
            .call("list_comments", || self.api.list_comments(document_id))
            .map_err(anyhow::Error::from)
            .and_then(|raw| parse_comments(&raw, include_resolved));

        match result {
            Ok(comments) => {
                info!(document_id, count = comments.len(), "fetched comments");
                self.store(key, CachedResource::Comments(comments.clone()));
                FetchResult::Fetched(comments)
            }
            Err(e) => failed("comments", e),
        }
    }

    /// Revisions modified strictly after `now - since_hours`.
    pub fn fetch_revisions(&self, document_id: &str, since_hours: u32) -> FetchResult<Vec<Revision>> {
        let key = format!("{}:revisions:{}", document_id, since_hours);

        if let Some(CachedResource::Revisions(revisions)) = self.cached(&key) {
            return FetchResult::Fetched(revisions);
        }

        info!(document_id, since_hours, "fetching revisions");
        let result = self
            .retry
            .call("list_revisions", || {
                self.api.list_revisions(document_id, REVISION_PAGE_SIZE)
            })
            .map_err(anyhow::Error::from)
            .and_then(|raw| parse_revisions(&raw));

        match result {
            Ok(revisions) => {
                let cutoff = revision_cutoff(since_hours);
                let recent: Vec<Revision> = revisions
                    .into_iter()
                    .filter(|r| r.modified_at > cutoff)
                    .collect();
                info!(document_id, count = recent.len(), "fetched revisions");
                self.store(key, CachedResource::Revisions(recent.clone()));
                FetchResult::Fetched(recent)
            }
            Err(e) => failed("revisions", e),
        }
    }

    pub fn fetch_metadata(&self, document_id: &str) -> FetchResult<DocumentMetadata> {
        let key = format!("{}:metadata", document_id);

        if let Some(CachedResource::Metadata(metadata)) = self.cached(&key) {
            return FetchResult::Fetched(metadata);
        }

        info!(document_id, "fetching metadata");
        let result = self
            .retry
            .call("get_document", || self.api.get_document(document_id))
            .map_err(anyhow::Error::from)
            .and_then(|raw| DocumentMetadata::from_api(&raw));

        match result {
            Ok(metadata) => {
                info!(document_id, title = %metadata.title, "fetched metadata");
                self.store(key, CachedResource::Metadata(metadata.clone()));
                FetchResult::Fetched(metadata)
            }
            Err(e) => failed("metadata", e),
        }
    }

    /// Fetch comments, revisions and metadata in that order.
    ///
    /// Each fetch runs regardless of how the previous ones went.
    pub fn fetch_all(&self, document_id: &str, since_hours: u32) -> FetchedData {
        let mut errors = Vec::new();

        let (comments, err) = self.fetch_comments(document_id, false).into_parts();
        errors.extend(err);

        let (revisions, err) = self.fetch_revisions(document_id, since_hours).into_parts();
        errors.extend(err);

        let (metadata, err) = self.fetch_metadata(document_id).into_parts();
        errors.extend(err);

        FetchedData {
            comments: comments.unwrap_or_default(),
            revisions: revisions.unwrap_or_default(),
            metadata,
            errors,
        }
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Drop the cached entries for one document. Returns how many were removed.
    pub fn invalidate_document(&self, document_id: &str) -> usize {
        self.lock_cache()
            .invalidate_prefix(&format!("{}:", document_id))
    }

    fn cached(&self, key: &str) -> Option<CachedResource> {
        if self.force_refresh {
            return None;
        }
        self.lock_cache().get(key)
    }

    fn store(&self, key: String, value: CachedResource) {
        self.lock_cache().set(key, value);
    }

    fn lock_cache(&self) -> MutexGuard<'_, TtlCache<CachedResource>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn failed<T>(resource: &str, err: anyhow::Error) -> FetchResult<T> {
    let message = format!("Failed to fetch {}: {:#}", resource, err);
    error!("{}", message);
    FetchResult::Failed(message)
}

fn items<'a>(raw: &'a Value, field: &str) -> Result<&'a [Value]> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => bail!("invalid response: `{}` is not an array", field),
    }
}

/// Resolved comments are dropped before parsing, so a malformed resolved
/// comment cannot fail the unresolved view.
fn parse_comments(raw: &Value, include_resolved: bool) -> Result<Vec<Comment>> {
    items(raw, "comments")?
        .iter()
        .filter(|c| include_resolved || !is_resolved(c))
        .map(Comment::from_api)
        .collect()
}

fn is_resolved(raw_comment: &Value) -> bool {
    raw_comment
        .get("resolved")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// `now - since_hours`, or the earliest representable time when the window
/// reaches past it (every revision is then kept).
fn revision_cutoff(since_hours: u32) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(ChronoDuration::hours(i64::from(since_hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn parse_revisions(raw: &Value) -> Result<Vec<Revision>> {
    items(raw, "revisions")?.iter().map(Revision::from_api).collect()
}
