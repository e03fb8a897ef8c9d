//! Environment adapter for language-model credentials
//!
//! The core never reads the environment. Callers that want the usual
//! `<PROVIDER>_API_KEY` variables resolve the key here and hand the result
//! to [`LlmProposer::new`](crate::llm::LlmProposer::new).

use std::env;

use crate::error::LlmError;
use crate::llm::{ApiKey, Provider};

impl Provider {
    /// The environment variable holding this provider's key
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl ApiKey {
    /// Read the key for `provider` from its environment variable
    pub fn from_env(provider: Provider) -> Result<ApiKey, LlmError> {
        lookup(provider, |name| env::var(name).ok())
    }
}

fn lookup(provider: Provider, get: impl Fn(&str) -> Option<String>) -> Result<ApiKey, LlmError> {
    let name = provider.env_var();
    match get(name) {
        Some(value) if !value.trim().is_empty() => Ok(ApiKey::new(value.trim())),
        _ => Err(LlmError::Config(format!("{} is not set", name))),
    }
}
