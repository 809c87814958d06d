//! Single-call coordination analysis.
//!
//! [`Analyzer::analyze`] renders the fetched data with
//! [`build_user_prompt`], issues exactly one structured completion at
//! temperature 0, and validates the payload against [`CoordinationAnalysis`].
//! Every failure (transport, HTTP status, missing payload, schema violation)
//! becomes an [`AnalysisOutcome`] with empty lists and an error message.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::llm::{ChatModel, StructuredRequest};
use crate::models::{Comment, Decision, DocumentMetadata, NextStep, Question, Revision};
use crate::prompts::{build_user_prompt, COORDINATION_SYSTEM_PROMPT};

const SCHEMA_NAME: &str = "coordination_analysis";

/// The shape the model must return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationAnalysis {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub next_steps: Vec<NextStep>,
}

/// Result of one [`Analyzer::analyze`] call.
///
/// When `error` is set all three lists are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOutcome {
    pub questions: Vec<Question>,
    pub decisions: Vec<Decision>,
    pub next_steps: Vec<NextStep>,
    pub error: Option<String>,
}

impl AnalysisOutcome {
    fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }
}

impl From<CoordinationAnalysis> for AnalysisOutcome {
    fn from(analysis: CoordinationAnalysis) -> Self {
        Self {
            questions: analysis.questions,
            decisions: analysis.decisions,
            next_steps: analysis.next_steps,
            error: None,
        }
    }
}

pub struct Analyzer {
    model: Arc<dyn ChatModel>,
}

impl Analyzer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Extract questions, decisions and next steps from one document's data.
    ///
    /// Missing metadata is replaced by [`DocumentMetadata::placeholder`] for
    /// the prompt only.
    pub fn analyze(
        &self,
        comments: &[Comment],
        revisions: &[Revision],
        metadata: Option<&DocumentMetadata>,
    ) -> AnalysisOutcome {
        let placeholder;
        let metadata = match metadata {
            Some(m) => m,
            None => {
                placeholder = DocumentMetadata::placeholder();
                &placeholder
            }
        };

        info!(title = %metadata.title, model = self.model.model_name(), "analyzing document");

        let request = StructuredRequest {
            system: COORDINATION_SYSTEM_PROMPT.to_string(),
            user: build_user_prompt(comments, revisions, metadata),
            schema_name: SCHEMA_NAME.to_string(),
            schema: response_schema(),
            temperature: 0.0,
        };

        match self.run(&request) {
            Ok(analysis) => {
                info!(
                    questions = analysis.questions.len(),
                    decisions = analysis.decisions.len(),
                    next_steps = analysis.next_steps.len(),
                    "analysis complete"
                );
                analysis.into()
            }
            Err(message) => {
                let message = format!("AI analysis failed: {}", message);
                error!("{}", message);
                AnalysisOutcome::failed(message)
            }
        }
    }

    fn run(&self, request: &StructuredRequest) -> Result<CoordinationAnalysis, String> {
        let payload = self
            .model
            .complete_structured(request)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "model returned no structured response".to_string())?;

        serde_json::from_value(payload)
            .map_err(|e| format!("response does not match schema: {}", e))
    }
}

/// Strict JSON schema for [`CoordinationAnalysis`].
///
/// Strict mode needs every property listed in `required`; optional fields
/// are expressed as nullable types instead.
pub fn response_schema() -> Value {
    let priority = json!({ "type": "string", "enum": ["high", "medium", "low"] });
    let nullable_string = json!({ "type": ["string", "null"] });

    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string", "description": "The question text" },
                        "author": { "type": "string", "description": "Who asked the question" },
                        "context": nullable_string,
                        "priority": priority,
                        "comment_id": nullable_string,
                    },
                    "required": ["text", "author", "context", "priority", "comment_id"],
                    "additionalProperties": false
                }
            },
            "decisions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "summary": { "type": "string", "description": "What was decided" },
                        "decided_by": { "type": "string", "description": "Who made or agreed to the decision" },
                        "date": { "type": ["string", "null"], "description": "ISO 8601 date of the decision, if stated" },
                        "context": nullable_string,
                    },
                    "required": ["summary", "decided_by", "date", "context"],
                    "additionalProperties": false
                }
            },
            "next_steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "description": { "type": "string", "description": "What needs to be done" },
                        "assignee": nullable_string,
                        "priority": priority,
                        "rationale": nullable_string,
                        "source": nullable_string,
                    },
                    "required": ["description", "assignee", "priority", "rationale", "source"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["questions", "decisions", "next_steps"],
        "additionalProperties": false
    })
}
