//! Prompt text for coordination analysis.
//!
//! [`COORDINATION_SYSTEM_PROMPT`] defines the extraction task.
//! [`build_user_prompt`] renders the fetched data into the only context the
//! model sees; anything not rendered here is invisible to the analysis.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{Comment, DocumentMetadata, Revision};

pub const COORDINATION_SYSTEM_PROMPT: &str = r#"You are a coordination assistant analyzing Google Docs collaboration data.

Your task is to extract actionable coordination information to help teams work together effectively.

Extract THREE types of information:

1. **OPEN QUESTIONS** - Unresolved questions from comments
   - Must be explicit questions (ending with "?" or clearly interrogative)
   - NOT rhetorical or already answered
   - Include who asked and any quoted context
   - Assign priority based on impact on project progress

2. **DECISIONS** - Clear agreements or resolutions from discussions
   - Look for phrases like "agreed", "decided", "let's go with", "resolved"
   - Only include if there's clear resolution, not ongoing debate
   - Note who made or agreed to the decision, and when if stated

3. **NEXT STEPS** - Actionable tasks the team should do next
   - ALWAYS generate at least 1-2 next steps based on available data
   - Suggest steps to resolve any open questions
   - Suggest follow-ups if activity is low or one-sided
   - If comments mention tasks, deadlines, or responsibilities, extract them
   - Assign to specific people when mentioned
   - Prioritize by urgency and blocking nature
   - Provide brief rationale for each step

RULES:
- For QUESTIONS and DECISIONS: only extract items explicitly visible in the data
- For NEXT STEPS: infer reasonable action items from the context (open questions, activity patterns, stalled discussions)
- Be concise and actionable
- Priority must be one of "high", "medium", "low"; when uncertain, use "medium"
"#;

/// Marker rendered when there are no comments to show.
pub const NO_COMMENTS_MARKER: &str = "## COMMENTS: None found";
/// Marker rendered when there is no recent activity.
pub const NO_ACTIVITY_MARKER: &str = "## ACTIVITY: No recent revisions";
/// Closing instruction, always the last line.
pub const EXTRACTION_INSTRUCTION: &str =
    "---\nBased on the above, extract questions, decisions, and next steps.";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Render the document context for the model. Pure and deterministic.
pub fn build_user_prompt(
    comments: &[Comment],
    revisions: &[Revision],
    metadata: &DocumentMetadata,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("## Document: {}", metadata.title));
    parts.push(format!("Document ID: {}\n", metadata.document_id));

    if comments.is_empty() {
        parts.push(format!("{}\n", NO_COMMENTS_MARKER));
    } else {
        parts.push("## UNRESOLVED COMMENTS\n".to_string());
        for (i, comment) in comments.iter().enumerate() {
            parts.push(format!("### Comment {}", i + 1));
            parts.push(format!("**Author**: {}", comment.author.display_name));
            parts.push(format!(
                "**Posted**: {}",
                comment.created_at.format(TIMESTAMP_FORMAT)
            ));
            if let Some(quoted) = &comment.quoted_content {
                parts.push(format!("**Quoted text**: \"{}\"", quoted));
            }
            parts.push(format!("**Content**: {}", comment.content));
            if !comment.replies.is_empty() {
                parts.push(format!("**Replies** ({}):", comment.replies.len()));
                for reply in &comment.replies {
                    parts.push(format!(
                        "  - {}: {}",
                        reply.author.display_name, reply.content
                    ));
                }
            }
            parts.push(String::new());
        }
    }

    if revisions.is_empty() {
        parts.push(format!("{}\n", NO_ACTIVITY_MARKER));
    } else {
        parts.push(format!(
            "## RECENT ACTIVITY ({} revisions)\n",
            revisions.len()
        ));
        for activity in summarize_activity(revisions) {
            parts.push(format!(
                "- **{}**: {} edits, last at {}",
                activity.editor,
                activity.edits,
                activity.last_edit.format(TIMESTAMP_FORMAT)
            ));
        }
        parts.push(String::new());
    }

    parts.push(EXTRACTION_INSTRUCTION.to_string());

    parts.join("\n")
}

/// Per-editor edit summary.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorActivity {
    pub editor: String,
    pub edits: usize,
    pub last_edit: DateTime<Utc>,
}

/// Group revisions by editor, most edits first.
///
/// Editors with equal counts keep the order in which they first appear.
/// Revisions without an editor are not attributed to anyone.
pub fn summarize_activity(revisions: &[Revision]) -> Vec<EditorActivity> {
    let mut summary: Vec<EditorActivity> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for rev in revisions {
        let Some(editor) = rev.editor() else {
            continue;
        };
        match index.get(editor) {
            Some(&i) => {
                let entry = &mut summary[i];
                entry.edits += 1;
                if rev.modified_at > entry.last_edit {
                    entry.last_edit = rev.modified_at;
                }
            }
            None => {
                index.insert(editor, summary.len());
                summary.push(EditorActivity {
                    editor: editor.to_string(),
                    edits: 1,
                    last_edit: rev.modified_at,
                });
            }
        }
    }

    // sort_by is stable, so ties stay in encounter order.
    summary.sort_by(|a, b| b.edits.cmp(&a.edits));
    summary
}
