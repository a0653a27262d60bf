//! OpenAI-compatible chat completions backend.
//!
//! Sends one non-streaming request per step to
//! `<base>/v1/chat/completions` with the role context as the system message
//! and the step prompt as the user message. Works against local servers
//! (Ollama, llama.cpp, vLLM) as well as hosted endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Generation, SnippetRequester};
use crate::roles::RoleContext;

/// Template tokens some local models leak into their output
const SPECIAL_TOKENS: [&str; 5] = [
    "<end_of_turn>",
    "<start_of_turn>",
    "<|file_separator|>",
    "<|end_of_text|>",
    "<|im_end|>",
];

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions requester
pub struct ChatRequester {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl ChatRequester {
    /// Create a requester for `base_url` (as returned by `build_base_url`)
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn complete(&self, role: &RoleContext, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &role.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth("not-needed")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.endpoint))?
            .error_for_status()
            .context("Chat completion request rejected")?;

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat completion returned no content"))?;

        Ok(strip_special_tokens(&content))
    }
}

#[async_trait]
impl SnippetRequester for ChatRequester {
    fn name(&self) -> &str {
        "chat"
    }

    async fn generate(&self, role: &RoleContext, prompt: &str) -> Generation {
        self.complete(role, prompt).await.into()
    }
}

/// Remove leaked template tokens
pub fn strip_special_tokens(text: &str) -> String {
    SPECIAL_TOKENS
        .iter()
        .fold(text.to_string(), |acc, token| acc.replace(token, ""))
}

/// Build a base URL from a host (optionally with scheme and port) and an
/// optional port
///
/// Local hosts default to `http` on 11434, everything else to `https` on
/// 443. An explicit port in `host` wins over `port`.
pub fn build_base_url(host: &str, port: Option<u16>) -> String {
    let host = host.trim().trim_end_matches('/');

    let (scheme, host_part) = match host.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => {
            let lower = host.to_ascii_lowercase();
            let local = lower.contains("localhost") || lower.contains("127.0.0.1");
            (if local { "http" } else { "https" }.to_string(), host)
        }
    };

    if host_part.contains(':') {
        return format!("{}://{}", scheme, host_part);
    }

    let default_port = if scheme == "http" { 11434 } else { 443 };
    format!("{}://{}:{}", scheme, host_part, port.unwrap_or(default_port))
}
