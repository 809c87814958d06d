//! Core data models.
//!
//! Three groups of types flow through the pipeline:
//!
//! - **Upstream records** ([`Comment`], [`Reply`], [`Revision`],
//!   [`DocumentMetadata`]) parsed from the document API's JSON.
//! - **Analysis items** ([`Question`], [`Decision`], [`NextStep`]) produced by
//!   the language model under a strict schema.
//! - **Report** ([`CoordinationSnapshot`] with its [`DataCompleteness`]).
//!
//! [`FetchResult`] carries a single resource fetch: either the data or the
//! reason it could not be obtained, never both.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Title used when document metadata could not be fetched.
pub const UNKNOWN_DOCUMENT_TITLE: &str = "Unknown Document";

/// Outcome of fetching one resource type.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T> {
    Fetched(T),
    Failed(String),
}

impl<T> FetchResult<T> {
    pub fn error(&self) -> Option<&str> {
        match self {
            FetchResult::Fetched(_) => None,
            FetchResult::Failed(msg) => Some(msg),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FetchResult::Fetched(_))
    }

    /// Split into the value (absent on failure) and the error message.
    pub fn into_parts(self) -> (Option<T>, Option<String>) {
        match self {
            FetchResult::Fetched(value) => (Some(value), None),
            FetchResult::Failed(msg) => (None, Some(msg)),
        }
    }
}

impl<T: Default> FetchResult<T> {
    /// The fetched value, or the empty default on failure.
    pub fn into_value_or_default(self) -> T {
        match self {
            FetchResult::Fetched(value) => value,
            FetchResult::Failed(_) => T::default(),
        }
    }
}

// ============ Upstream records ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub display_name: String,
    pub email: Option<String>,
    pub photo_link: Option<String>,
}

impl User {
    /// Parse a Drive `User` object. A missing display name becomes `"Unknown"`.
    pub fn from_api(data: &Value) -> Self {
        Self {
            display_name: str_field(data, "displayName").unwrap_or("Unknown").to_string(),
            email: str_field(data, "emailAddress").map(str::to_string),
            photo_link: str_field(data, "photoLink").map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub content: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Reply {
    pub fn from_api(data: &Value) -> Result<Self> {
        Ok(Self {
            id: required_str(data, "id", "reply")?,
            content: str_field(data, "content").unwrap_or_default().to_string(),
            author: User::from_api(data.get("author").unwrap_or(&Value::Null)),
            created_at: required_time(data, "createdTime", "reply")?,
            modified_at: optional_time(data, "modifiedTime")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub resolved: bool,
    /// Replies in the order the API returned them.
    pub replies: Vec<Reply>,
    /// The document text the comment is anchored to.
    pub quoted_content: Option<String>,
}

impl Comment {
    /// Parse a Drive `Comment` object including its nested replies.
    pub fn from_api(data: &Value) -> Result<Self> {
        let replies = match data.get("replies") {
            Some(Value::Array(items)) => items
                .iter()
                .map(Reply::from_api)
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            id: required_str(data, "id", "comment")?,
            content: str_field(data, "content").unwrap_or_default().to_string(),
            author: User::from_api(data.get("author").unwrap_or(&Value::Null)),
            created_at: required_time(data, "createdTime", "comment")?,
            modified_at: optional_time(data, "modifiedTime")?,
            resolved: data
                .get("resolved")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            replies,
            quoted_content: data
                .get("quotedFileContent")
                .and_then(|q| q.get("value"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub modified_at: DateTime<Utc>,
    pub last_modifying_user: Option<User>,
    pub size: Option<u64>,
}

impl Revision {
    pub fn from_api(data: &Value) -> Result<Self> {
        // Drive encodes int64 fields as strings.
        let size = match data.get("size") {
            Some(Value::String(s)) => Some(
                s.parse::<u64>()
                    .with_context(|| format!("invalid revision size: {}", s))?,
            ),
            Some(Value::Number(n)) => n.as_u64(),
            _ => None,
        };

        Ok(Self {
            id: required_str(data, "id", "revision")?,
            modified_at: required_time(data, "modifiedTime", "revision")?,
            last_modifying_user: data
                .get("lastModifyingUser")
                .filter(|u| u.is_object())
                .map(User::from_api),
            size,
        })
    }

    /// Display name of the editor, if the API reported one.
    pub fn editor(&self) -> Option<&str> {
        self.last_modifying_user
            .as_ref()
            .map(|u| u.display_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub title: String,
    pub revision_id: Option<String>,
}

impl DocumentMetadata {
    /// Parse a Docs API `Document` object. A missing title becomes `"Untitled"`.
    pub fn from_api(data: &Value) -> Result<Self> {
        Ok(Self {
            document_id: required_str(data, "documentId", "document")?,
            title: str_field(data, "title").unwrap_or("Untitled").to_string(),
            revision_id: str_field(data, "revisionId").map(str::to_string),
        })
    }

    /// Stand-in used to build a prompt when metadata is unavailable.
    pub fn placeholder() -> Self {
        Self {
            document_id: "unknown".to_string(),
            title: UNKNOWN_DOCUMENT_TITLE.to_string(),
            revision_id: None,
        }
    }
}

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

fn required_str(data: &Value, key: &str, what: &str) -> Result<String> {
    str_field(data, key)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("invalid {} payload: missing {}", what, key))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp: {}", raw))
}

fn required_time(data: &Value, key: &str, what: &str) -> Result<DateTime<Utc>> {
    let raw = str_field(data, key)
        .ok_or_else(|| anyhow!("invalid {} payload: missing {}", what, key))?;
    parse_time(raw)
}

fn optional_time(data: &Value, key: &str) -> Result<Option<DateTime<Utc>>> {
    str_field(data, key).map(parse_time).transpose()
}

// ============ Analysis items ============

/// Urgency of a question or next step. Anything outside these three is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// An unresolved question raised in the discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub author: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub comment_id: Option<String>,
}

/// A resolution the participants reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub summary: String,
    pub decided_by: String,
    #[serde(default, deserialize_with = "deserialize_decision_date")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub context: Option<String>,
}

/// A suggested action item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextStep {
    pub description: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
fn deserialize_decision_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid decision date: {}", raw)))
}

// ============ Report ============

/// What was successfully gathered for one snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataCompleteness {
    pub comments_fetched: bool,
    pub activity_fetched: bool,
    pub metadata_fetched: bool,
    pub ai_analysis_completed: bool,
    /// Fetch errors in call order, then the analysis error.
    pub errors: Vec<String>,
}

/// The full result of one coordination analysis for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationSnapshot {
    pub document_title: String,
    pub document_id: String,
    pub generated_at: DateTime<Utc>,
    pub since_hours: u32,
    pub contributors: Vec<String>,
    pub questions: Vec<Question>,
    pub decisions: Vec<Decision>,
    pub next_steps: Vec<NextStep>,
    pub data_completeness: DataCompleteness,
    pub raw_comment_count: usize,
    pub raw_revision_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_comment_with_replies_and_quote() {
        let raw = json!({
            "id": "c1",
            "content": "Should we ship Friday?",
            "author": {"displayName": "Alice", "emailAddress": "alice@example.com"},
            "createdTime": "2024-01-15T10:30:00.000Z",
            "modifiedTime": "2024-01-15T11:00:00Z",
            "resolved": false,
            "quotedFileContent": {"mimeType": "text/html", "value": "Launch date"},
            "replies": [
                {"id": "r1", "content": "Yes", "author": {"displayName": "Bob"}, "createdTime": "2024-01-15T12:00:00Z"},
                {"id": "r2", "content": "No", "author": {"displayName": "Carol"}, "createdTime": "2024-01-15T13:00:00Z"}
            ]
        });

        let comment = Comment::from_api(&raw).unwrap();
        assert_eq!(comment.author.display_name, "Alice");
        assert_eq!(comment.author.email.as_deref(), Some("alice@example.com"));
        assert_eq!(comment.quoted_content.as_deref(), Some("Launch date"));
        assert!(comment.modified_at.is_some());
        let reply_authors: Vec<_> = comment
            .replies
            .iter()
            .map(|r| r.author.display_name.as_str())
            .collect();
        assert_eq!(reply_authors, vec!["Bob", "Carol"]);
    }

    #[test]
    fn comment_defaults_for_missing_optional_fields() {
        let raw = json!({"id": "c1", "createdTime": "2024-01-15T10:30:00Z"});
        let comment = Comment::from_api(&raw).unwrap();
        assert_eq!(comment.content, "");
        assert_eq!(comment.author.display_name, "Unknown");
        assert!(!comment.resolved);
        assert!(comment.replies.is_empty());
        assert!(comment.quoted_content.is_none());
    }

    #[test]
    fn comment_without_created_time_is_rejected() {
        let err = Comment::from_api(&json!({"id": "c1"})).unwrap_err();
        assert!(err.to_string().contains("createdTime"));
    }

    #[test]
    fn parses_revision_with_string_size() {
        let raw = json!({
            "id": "42",
            "modifiedTime": "2024-01-15T10:30:00Z",
            "lastModifyingUser": {"displayName": "Carol"},
            "size": "2048"
        });
        let rev = Revision::from_api(&raw).unwrap();
        assert_eq!(rev.editor(), Some("Carol"));
        assert_eq!(rev.size, Some(2048));
    }

    #[test]
    fn revision_without_user() {
        let raw = json!({"id": "42", "modifiedTime": "2024-01-15T10:30:00Z"});
        let rev = Revision::from_api(&raw).unwrap();
        assert_eq!(rev.editor(), None);
        assert_eq!(rev.size, None);
    }

    #[test]
    fn metadata_defaults_title() {
        let meta = DocumentMetadata::from_api(&json!({"documentId": "doc1"})).unwrap();
        assert_eq!(meta.title, "Untitled");
        assert!(DocumentMetadata::from_api(&json!({"title": "x"})).is_err());
    }

    #[test]
    fn priority_rejects_unknown_values() {
        let ok: Question =
            serde_json::from_value(json!({"text": "q?", "author": "A", "priority": "high"}))
                .unwrap();
        assert_eq!(ok.priority, Priority::High);

        let bad = serde_json::from_value::<Question>(
            json!({"text": "q?", "author": "A", "priority": "urgent"}),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn priority_defaults_to_medium() {
        let step: NextStep = serde_json::from_value(json!({"description": "do it"})).unwrap();
        assert_eq!(step.priority, Priority::Medium);
    }

    #[test]
    fn decision_date_accepts_plain_date_and_null() {
        let d: Decision = serde_json::from_value(
            json!({"summary": "Use Postgres", "decided_by": "Bob", "date": "2024-01-15"}),
        )
        .unwrap();
        assert_eq!(d.date.unwrap().to_rfc3339(), "2024-01-15T00:00:00+00:00");

        let d: Decision = serde_json::from_value(
            json!({"summary": "Use Postgres", "decided_by": "Bob", "date": null}),
        )
        .unwrap();
        assert!(d.date.is_none());
    }

    #[test]
    fn fetch_result_parts() {
        let ok: FetchResult<Vec<u8>> = FetchResult::Fetched(vec![1]);
        assert!(ok.is_ok());
        assert_eq!(ok.into_parts(), (Some(vec![1]), None));

        let failed: FetchResult<Vec<u8>> = FetchResult::Failed("boom".into());
        assert_eq!(failed.error(), Some("boom"));
        assert!(failed.into_value_or_default().is_empty());
    }
}
