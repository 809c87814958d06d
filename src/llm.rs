//! Structured-output chat completion.
//!
//! [`ChatModel`] is the seam between the analyzer and a language-model
//! service. A request carries a system instruction, the user context, and a
//! JSON schema; the response is the parsed JSON object or `None` when the
//! model produced no structured payload (refusal, empty content).
//!
//! [`OpenAIChatModel`] calls `POST {base_url}/chat/completions` with
//! `response_format = { type: "json_schema", strict: true }`.
//!
//! There is no retry here: a failed call is reported once and the caller
//! decides what that means.

use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::OpenAIConfig;

/// One structured chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub system: String,
    pub user: String,
    /// Name reported to the service for the schema.
    pub schema_name: String,
    pub schema: Value,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub trait ChatModel: Send + Sync {
    /// Model identifier, e.g. `"gpt-4o-mini"`.
    fn model_name(&self) -> &str;

    /// Run the completion. `Ok(None)` means the call succeeded but returned
    /// no structured payload.
    fn complete_structured(&self, request: &StructuredRequest) -> Result<Option<Value>, ModelError>;
}

/// [`ChatModel`] backed by the OpenAI Chat Completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIChatModel {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIChatModel {
    /// Create the client from configuration and `OPENAI_API_KEY`.
    ///
    /// Must not be called from inside an async context.
    pub fn new(config: &OpenAIConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &OpenAIConfig, api_key: impl Into<String>) -> Result<Self> {
        if config.model.trim().is_empty() {
            bail!("openai.model must not be empty");
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(&self, request: &StructuredRequest) -> Value {
        json!({
            "model": self.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "strict": true,
                    "schema": request.schema,
                }
            }
        })
    }
}

impl ChatModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete_structured(&self, request: &StructuredRequest) -> Result<Option<Value>, ModelError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                message: body_text,
            });
        }

        let json: Value = response
            .json()
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        parse_chat_response(&json)
    }
}

/// Extract the structured payload from a Chat Completions response.
///
/// Returns `Ok(None)` for a refusal or null content; an error when the
/// envelope is not what the API documents or the content is not JSON.
pub fn parse_chat_response(json: &Value) -> Result<Option<Value>, ModelError> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ModelError::Malformed("missing choices[0].message".to_string()))?;

    if message
        .get("refusal")
        .is_some_and(|r| !r.is_null())
    {
        return Ok(None);
    }

    match message.get("content") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(content)) if content.trim().is_empty() => Ok(None),
        Some(Value::String(content)) => serde_json::from_str(content)
            .map(Some)
            .map_err(|e| ModelError::Malformed(format!("content is not JSON: {}", e))),
        Some(_) => Err(ModelError::Malformed(
            "message content is not a string".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StructuredRequest {
        StructuredRequest {
            system: "sys".into(),
            user: "ctx".into(),
            schema_name: "coordination_analysis".into(),
            schema: json!({"type": "object"}),
            temperature: 0.0,
        }
    }

    #[test]
    fn request_body_pins_schema_and_temperature() {
        let model = OpenAIChatModel::with_api_key(&OpenAIConfig::default(), "sk-test").unwrap();
        let body = model.request_body(&request());

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "ctx");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(
            body["response_format"]["json_schema"]["name"],
            "coordination_analysis"
        );
    }

    #[test]
    fn parses_json_content() {
        let resp = json!({"choices": [{"message": {"role": "assistant", "content": "{\"questions\": []}", "refusal": null}}]});
        let parsed = parse_chat_response(&resp).unwrap().unwrap();
        assert_eq!(parsed, json!({"questions": []}));
    }

    #[test]
    fn refusal_and_null_content_yield_none() {
        let refusal = json!({"choices": [{"message": {"content": null, "refusal": "I can't help with that"}}]});
        assert!(parse_chat_response(&refusal).unwrap().is_none());

        let empty = json!({"choices": [{"message": {"content": null}}]});
        assert!(parse_chat_response(&empty).unwrap().is_none());
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = parse_chat_response(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[test]
    fn non_json_content_is_malformed() {
        let resp = json!({"choices": [{"message": {"content": "not json"}}]});
        assert!(matches!(
            parse_chat_response(&resp),
            Err(ModelError::Malformed(_))
        ));
    }
}
