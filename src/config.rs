//! Client configuration.
//!
//! All connection parameters live in an explicit [`ClientConfig`] value that
//! is built once at startup and read-only afterwards; nothing in the crate
//! consults process-global state at request time.

use crate::{Error, Result};
use std::env;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";

/// Connection and request defaults for a [`ChatClient`](crate::ChatClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Extra top-level request fields merged into every payload
    /// (temperature, max_tokens, ...).
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl ClientConfig {
    /// Configuration for `model`, with the API key taken from the
    /// `OPENAI_API_KEY` environment variable when present.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: env::var("OPENAI_API_KEY").ok(),
            model: model.into(),
            options: serde_json::Map::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Merge one extra request field into every payload.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Absolute chat-completions endpoint URL derived from `base_url`.
    ///
    /// The base may be given with or without a trailing slash; a base that
    /// already names a full endpoint path is kept as-is.
    pub fn chat_url(&self) -> Result<Url> {
        let base = Url::parse(&self.base_url).map_err(|e| {
            Error::configuration(format!("invalid base URL {:?}: {}", self.base_url, e))
        })?;
        if base.path().trim_matches('/').is_empty() {
            let mut joined = base;
            joined.set_path(CHAT_COMPLETIONS_PATH);
            Ok(joined)
        } else {
            Ok(base)
        }
    }

    /// Fail fast on parameters no request could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(Error::configuration("model must not be empty"));
        }
        if self.api_key.as_deref().is_some_and(str::is_empty) {
            return Err(Error::configuration("API key must not be empty"));
        }
        self.chat_url().map(|_| ())
    }
}
