//! Snapshot orchestration.
//!
//! [`Coordinator::generate_snapshot`] is the programmatic entry point:
//!
//! ```text
//! resolve window → (invalidate doc cache) → fetch_all → contributors
//!                → analyze → merge errors → CoordinationSnapshot
//! ```
//!
//! Partial failures never surface as `Err`; they are listed in the
//! snapshot's [`DataCompleteness`]. Only construction can fail.

use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::analyzer::Analyzer;
use crate::cache::TtlCache;
use crate::client::DocsClient;
use crate::config::Config;
use crate::credentials::TokenCredentials;
use crate::docs_api::GoogleDocsApi;
use crate::llm::OpenAIChatModel;
use crate::models::{
    Comment, CoordinationSnapshot, DataCompleteness, Revision, UNKNOWN_DOCUMENT_TITLE,
};

pub struct Coordinator {
    client: DocsClient,
    analyzer: Analyzer,
    default_since_hours: u32,
}

impl Coordinator {
    pub fn new(client: DocsClient, analyzer: Analyzer, default_since_hours: u32) -> Self {
        Self {
            client,
            analyzer,
            default_since_hours,
        }
    }

    /// Wire up the Google and OpenAI collaborators from configuration.
    ///
    /// Fails when `OPENAI_API_KEY` or the Google credentials are missing.
    /// Builds blocking HTTP clients, so call it outside any async runtime
    /// (or inside `spawn_blocking`).
    pub fn from_config(config: &Config) -> Result<Self> {
        let model = OpenAIChatModel::new(&config.openai)?;
        let credentials = TokenCredentials::from_env_or_file(&config.google.token_path)?;
        let api = GoogleDocsApi::new(&config.google, &credentials)?;

        let client = DocsClient::new(
            Arc::new(api),
            TtlCache::new(config.cache.ttl_seconds),
            config.retry.policy(),
        );

        Ok(Self::new(
            client,
            Analyzer::new(Arc::new(model)),
            config.analysis.default_since_hours,
        ))
    }

    pub fn client(&self) -> &DocsClient {
        &self.client
    }

    /// Effective lookback: an explicit positive value wins over the default.
    pub fn resolve_since_hours(&self, since_hours: Option<u32>) -> u32 {
        since_hours
            .filter(|&h| h > 0)
            .unwrap_or(self.default_since_hours)
    }

    /// Fetch, merge and analyze one document.
    pub fn generate_snapshot(
        &self,
        document_id: &str,
        since_hours: Option<u32>,
        force_refresh: bool,
    ) -> CoordinationSnapshot {
        let since_hours = self.resolve_since_hours(since_hours);
        info!(document_id, since_hours, force_refresh, "generating snapshot");

        if force_refresh {
            let dropped = self.client.invalidate_document(document_id);
            info!(document_id, dropped, "invalidated cached entries");
        }

        let data = self.client.fetch_all(document_id, since_hours);
        let contributors = extract_contributors(&data.comments, &data.revisions);

        let outcome =
            self.analyzer
                .analyze(&data.comments, &data.revisions, data.metadata.as_ref());

        let mut errors = data.errors;
        let ai_analysis_completed = outcome.error.is_none();
        errors.extend(outcome.error);

        let data_completeness = DataCompleteness {
            comments_fetched: !data.comments.is_empty(),
            activity_fetched: !data.revisions.is_empty(),
            metadata_fetched: data.metadata.is_some(),
            ai_analysis_completed,
            errors,
        };

        let document_title = data
            .metadata
            .map(|m| m.title)
            .unwrap_or_else(|| UNKNOWN_DOCUMENT_TITLE.to_string());

        let snapshot = CoordinationSnapshot {
            document_title,
            document_id: document_id.to_string(),
            generated_at: Utc::now(),
            since_hours,
            contributors,
            questions: outcome.questions,
            decisions: outcome.decisions,
            next_steps: outcome.next_steps,
            raw_comment_count: data.comments.len(),
            raw_revision_count: data.revisions.len(),
            data_completeness,
        };

        info!(
            document_id,
            questions = snapshot.questions.len(),
            decisions = snapshot.decisions.len(),
            next_steps = snapshot.next_steps.len(),
            errors = snapshot.data_completeness.errors.len(),
            "snapshot ready"
        );
        snapshot
    }
}

/// Everyone who commented, replied, or edited, deduplicated and sorted.
pub fn extract_contributors(comments: &[Comment], revisions: &[Revision]) -> Vec<String> {
    let mut names: BTreeSet<&str> = BTreeSet::new();

    for comment in comments {
        names.insert(&comment.author.display_name);
        for reply in &comment.replies {
            names.insert(&reply.author.display_name);
        }
    }
    names.extend(revisions.iter().filter_map(Revision::editor));

    names.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs_api::{ApiError, DocsApi};
    use crate::llm::{ChatModel, ModelError, StructuredRequest};
    use crate::models::{Priority, Reply, User};
    use crate::retry::RetryPolicy;
    use chrono::{DateTime, Duration as ChronoDuration};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn user(name: &str) -> User {
        User {
            display_name: name.to_string(),
            email: None,
            photo_link: None,
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc::now()
    }

    fn comment(author: &str, reply_authors: &[&str]) -> Comment {
        Comment {
            id: format!("c-{}", author),
            content: "?".into(),
            author: user(author),
            created_at: ts(),
            modified_at: None,
            resolved: false,
            replies: reply_authors
                .iter()
                .map(|a| Reply {
                    id: format!("r-{}", a),
                    content: "ok".into(),
                    author: user(a),
                    created_at: ts(),
                    modified_at: None,
                })
                .collect(),
            quoted_content: None,
        }
    }

    fn revision(editor: Option<&str>) -> Revision {
        Revision {
            id: "1".into(),
            modified_at: ts(),
            last_modifying_user: editor.map(user),
            size: None,
        }
    }

    #[test]
    fn contributors_are_deduplicated_and_sorted() {
        let comments = vec![comment("Bob", &["Bob"]), comment("Alice", &[])];
        let revisions = vec![revision(Some("Carol")), revision(None)];
        assert_eq!(
            extract_contributors(&comments, &revisions),
            vec!["Alice", "Bob", "Carol"]
        );
    }

    #[test]
    fn contributors_empty_without_data() {
        assert!(extract_contributors(&[], &[]).is_empty());
    }

    struct StubApi {
        document: Result<Value, ApiError>,
        calls: AtomicUsize,
    }

    impl StubApi {
        fn new(document: Result<Value, ApiError>) -> Arc<Self> {
            Arc::new(Self {
                document,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl DocsApi for StubApi {
        fn list_comments(&self, _id: &str) -> Result<Value, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"comments": [{
                "id": "c1",
                "content": "Ship Friday?",
                "author": {"displayName": "Alice"},
                "createdTime": "2024-01-15T10:00:00Z",
                "resolved": false,
                "replies": [{"id": "r1", "content": "Maybe", "author": {"displayName": "Bob"}, "createdTime": "2024-01-15T11:00:00Z"}]
            }]}))
        }

        fn list_revisions(&self, _id: &str, _page_size: u32) -> Result<Value, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let at = Utc::now() - ChronoDuration::hours(8);
            Ok(json!({"revisions": [{
                "id": "7",
                "modifiedTime": at.to_rfc3339(),
                "lastModifyingUser": {"displayName": "Carol"}
            }]}))
        }

        fn get_document(&self, _id: &str) -> Result<Value, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.document.clone()
        }
    }

    struct StubModel {
        answer: Option<Value>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubModel {
        fn new(answer: Option<Value>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl ChatModel for StubModel {
        fn model_name(&self) -> &str {
            "stub"
        }

        fn complete_structured(
            &self,
            request: &StructuredRequest,
        ) -> Result<Option<Value>, ModelError> {
            self.prompts.lock().unwrap().push(request.user.clone());
            Ok(self.answer.clone())
        }
    }

    fn one_question() -> Option<Value> {
        Some(json!({
            "questions": [{"text": "Ship Friday?", "author": "Alice", "context": null, "priority": "high", "comment_id": "c1"}],
            "decisions": [],
            "next_steps": []
        }))
    }

    fn empty_analysis() -> Option<Value> {
        Some(json!({"questions": [], "decisions": [], "next_steps": []}))
    }

    fn coordinator(api: Arc<StubApi>, model: Arc<StubModel>) -> Coordinator {
        let client = DocsClient::new(api, TtlCache::new(300), RetryPolicy::immediate());
        Coordinator::new(client, Analyzer::new(model), 48)
    }

    fn plan_doc() -> Result<Value, ApiError> {
        Ok(json!({"documentId": "doc1", "title": "Launch Plan"}))
    }

    #[test]
    fn end_to_end_snapshot_is_complete() {
        let coord = coordinator(StubApi::new(plan_doc()), StubModel::new(one_question()));
        let snap = coord.generate_snapshot("doc1", None, false);

        assert_eq!(snap.document_title, "Launch Plan");
        assert_eq!(snap.document_id, "doc1");
        assert_eq!(snap.since_hours, 48);
        assert_eq!(snap.contributors, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(snap.raw_comment_count, 1);
        assert_eq!(snap.raw_revision_count, 1);
        assert_eq!(snap.questions.len(), 1);
        assert_eq!(snap.questions[0].priority, Priority::High);
        assert!(snap.decisions.is_empty());
        assert!(snap.next_steps.is_empty());

        let dc = &snap.data_completeness;
        assert!(dc.comments_fetched && dc.activity_fetched && dc.metadata_fetched);
        assert!(dc.ai_analysis_completed);
        assert!(dc.errors.is_empty());
    }

    #[test]
    fn missing_metadata_uses_unknown_title_and_placeholder_prompt() {
        let api = StubApi::new(Err(ApiError::Status {
            status: 404,
            message: "File not found".into(),
        }));
        let model = StubModel::new(one_question());
        let snap = coordinator(api, model.clone()).generate_snapshot("doc1", None, false);

        assert_eq!(snap.document_title, "Unknown Document");
        assert_eq!(snap.document_id, "doc1");
        assert!(!snap.data_completeness.metadata_fetched);
        assert_eq!(snap.data_completeness.errors.len(), 1);
        assert!(model.prompts.lock().unwrap()[0].contains("Document ID: unknown"));
    }

    #[test]
    fn empty_successful_analysis_counts_as_completed() {
        let coord = coordinator(StubApi::new(plan_doc()), StubModel::new(empty_analysis()));
        let snap = coord.generate_snapshot("doc1", None, false);
        assert!(snap.data_completeness.ai_analysis_completed);
        assert!(snap.questions.is_empty());
    }

    #[test]
    fn analyzer_error_is_appended_after_fetch_errors() {
        let api = StubApi::new(Err(ApiError::Transport("reset".into())));
        let coord = coordinator(api, StubModel::new(None));
        let snap = coord.generate_snapshot("doc1", None, false);

        let errors = &snap.data_completeness.errors;
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Failed to fetch metadata"));
        assert!(errors[1].starts_with("AI analysis failed"));
        assert!(!snap.data_completeness.ai_analysis_completed);
    }

    #[test]
    fn explicit_window_overrides_default_and_zero_is_unset() {
        let coord = coordinator(StubApi::new(plan_doc()), StubModel::new(empty_analysis()));
        assert_eq!(coord.resolve_since_hours(Some(12)), 12);
        assert_eq!(coord.resolve_since_hours(Some(0)), 48);
        assert_eq!(coord.resolve_since_hours(None), 48);
        assert_eq!(coord.generate_snapshot("doc1", Some(12), false).since_hours, 12);
    }

    #[test]
    fn maximal_window_still_produces_snapshot() {
        let coord = coordinator(StubApi::new(plan_doc()), StubModel::new(empty_analysis()));
        let snap = coord.generate_snapshot("doc1", Some(u32::MAX), false);

        assert_eq!(snap.since_hours, u32::MAX);
        assert_eq!(snap.raw_revision_count, 1);
        assert!(snap.data_completeness.errors.is_empty());
    }

    #[test]
    fn second_snapshot_is_served_from_cache_unless_forced() {
        let api = StubApi::new(plan_doc());
        let coord = coordinator(api.clone(), StubModel::new(empty_analysis()));

        coord.generate_snapshot("doc1", None, false);
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);

        coord.generate_snapshot("doc1", None, false);
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);

        coord.generate_snapshot("doc1", None, true);
        assert_eq!(api.calls.load(Ordering::SeqCst), 6);
    }
}
