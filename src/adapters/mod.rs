//! Requester interfaces for the code-generation collaborator.
//!
//! A requester turns a role context and a step prompt into raw generated
//! text. It never retries and never fails the run: errors come back as
//! `Generation::Failed` and the compiler decides how to degrade.

pub mod chat;
pub mod command;

use async_trait::async_trait;

use crate::roles::RoleContext;

pub use chat::{build_base_url, ChatRequester};
pub use command::CommandRequester;

/// Outcome of one generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Text returned by the collaborator
    Ok(String),

    /// Why no text was produced
    Failed(String),
}

impl Generation {
    /// Raw text to compile: the generated text, or a comment carrying the
    /// failure reason
    pub fn into_raw_text(self) -> String {
        match self {
            Generation::Ok(text) => text,
            Generation::Failed(reason) => {
                let reason = reason.lines().next().unwrap_or_default().trim().to_string();
                format!("# generation failed: {}", reason)
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Generation::Failed(_))
    }
}

impl<E: std::fmt::Display> From<Result<String, E>> for Generation {
    fn from(result: Result<String, E>) -> Self {
        match result {
            Ok(text) => Generation::Ok(text),
            Err(e) => Generation::Failed(format!("{:#}", e)),
        }
    }
}

/// The code-generation collaborator
#[async_trait]
pub trait SnippetRequester: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Generate raw text for one step prompt
    async fn generate(&self, role: &RoleContext, prompt: &str) -> Generation;
}
