//! Markdown rendering of a [`CoordinationSnapshot`].
//!
//! [`format_snapshot`] produces the human-readable report printed by
//! `docs-coord snapshot`; [`save_snapshot`] writes it to a timestamped file.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::models::{CoordinationSnapshot, Priority};

fn badge(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "🔴",
        Priority::Medium => "🟡",
        Priority::Low => "🟢",
    }
}

fn check(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

pub fn format_snapshot(snapshot: &CoordinationSnapshot) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("# Coordination Snapshot: {}", snapshot.document_title));
    lines.push(format!("**Document ID**: `{}`", snapshot.document_id));
    lines.push(format!(
        "**Generated**: {}",
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.push(format!(
        "**Analysis Period**: Last {} hours",
        snapshot.since_hours
    ));
    lines.push(String::new());

    let dc = &snapshot.data_completeness;
    lines.push("## 📊 Data Status".to_string());
    lines.push(format!(
        "{} Comments: {} unresolved",
        check(dc.comments_fetched),
        snapshot.raw_comment_count
    ));
    lines.push(format!(
        "{} Activity: {} revisions",
        check(dc.activity_fetched),
        snapshot.raw_revision_count
    ));
    lines.push(format!(
        "{} Metadata: {}",
        check(dc.metadata_fetched),
        if dc.metadata_fetched { "Retrieved" } else { "Unavailable" }
    ));
    lines.push(format!(
        "{} AI Analysis: {}",
        check(dc.ai_analysis_completed),
        if dc.ai_analysis_completed { "Completed" } else { "Failed" }
    ));
    if !dc.errors.is_empty() {
        lines.push(String::new());
        lines.push("**⚠️ Errors encountered:**".to_string());
        for error in &dc.errors {
            lines.push(format!("- {}", error));
        }
    }
    lines.push(String::new());

    if !snapshot.contributors.is_empty() {
        lines.push("## 👥 Contributors".to_string());
        for contributor in &snapshot.contributors {
            lines.push(format!("- {}", contributor));
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "## 📌 Open Questions ({})",
        snapshot.questions.len()
    ));
    if snapshot.questions.is_empty() {
        lines.push("*No open questions found*".to_string());
    }
    for (i, q) in snapshot.questions.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("### {}. {} {}", i + 1, q.text, badge(q.priority)));
        lines.push(format!("**Asked by**: {}", q.author));
        if let Some(context) = &q.context {
            lines.push(format!("**Context**: \"{}\"", context));
        }
    }
    lines.push(String::new());

    lines.push(format!(
        "## ✅ Recent Decisions ({})",
        snapshot.decisions.len()
    ));
    if snapshot.decisions.is_empty() {
        lines.push("*No recent decisions found*".to_string());
    }
    for (i, d) in snapshot.decisions.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("### {}. {}", i + 1, d.summary));
        lines.push(format!("**Decided by**: {}", d.decided_by));
        if let Some(date) = d.date {
            lines.push(format!("**When**: {}", date.format("%Y-%m-%d")));
        }
        if let Some(context) = &d.context {
            lines.push(format!("**Context**: {}", context));
        }
    }
    lines.push(String::new());

    lines.push(format!(
        "## 🔜 Suggested Next Steps ({})",
        snapshot.next_steps.len()
    ));
    if snapshot.next_steps.is_empty() {
        lines.push("*No next steps generated*".to_string());
    }
    for (i, step) in snapshot.next_steps.iter().enumerate() {
        let assignee = match &step.assignee {
            Some(name) => format!("**{}**", name),
            None => "*Unassigned*".to_string(),
        };
        lines.push(String::new());
        lines.push(format!(
            "### {}. {} {} → {}",
            i + 1,
            step.description,
            badge(step.priority),
            assignee
        ));
        if let Some(rationale) = &step.rationale {
            lines.push(format!("**Rationale**: {}", rationale));
        }
    }

    lines.join("\n")
}

/// Write `content` to `output_dir/snapshot_YYYYMMDD_HHMMSS.md` (local time).
///
/// Creates the directory if needed and returns the written path.
pub fn save_snapshot(content: &str, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    })?;

    let filename = format!("snapshot_{}.md", Local::now().format("%Y%m%d_%H%M%S"));
    let path = output_dir.join(filename);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;

    Ok(path)
}
