//! Bearer credentials for the document API.
//!
//! Obtaining and refreshing OAuth tokens is outside this crate. A
//! [`CredentialProvider`] only hands over a token that is already valid.
//!
//! # Sources
//!
//! [`TokenCredentials::from_env_or_file`] checks, in order:
//! - `GOOGLE_ACCESS_TOKEN` environment variable
//! - the JSON token file from `[google].token_path`, reading its `token`
//!   field (as written by the Google auth libraries) or `access_token`

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Supplies the bearer token attached to every upstream request.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Result<String>;
}

/// A fixed bearer token.
#[derive(Clone)]
pub struct TokenCredentials {
    token: String,
}

impl std::fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TokenCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Load from `GOOGLE_ACCESS_TOKEN`, falling back to the token file.
    pub fn from_env_or_file(token_path: &Path) -> Result<Self> {
        if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                return Ok(Self::new(token.trim()));
            }
        }
        Self::from_file(token_path)
    }

    /// Read a token file containing a JSON object with `token` or `access_token`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Google credentials not found at {} (set GOOGLE_ACCESS_TOKEN or provide a token file)",
                path.display()
            )
        })?;

        let json: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse token file: {}", path.display()))?;

        let token = json
            .get("token")
            .or_else(|| json.get("access_token"))
            .and_then(|t| t.as_str())
            .map(str::trim)
            .unwrap_or_default();

        if token.is_empty() {
            bail!(
                "token file {} has no `token` or `access_token` field",
                path.display()
            );
        }

        Ok(Self::new(token))
    }
}

impl CredentialProvider for TokenCredentials {
    fn bearer_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
