//! Subprocess backend.
//!
//! Runs a user-configured command (`llm -m gpt-4o-mini`, `ollama run
//! gemma3`, a wrapper script) with the role context and prompt on stdin and
//! takes stdout as the generated text.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::{Generation, SnippetRequester};
use crate::roles::RoleContext;

/// Requester backed by an external command
pub struct CommandRequester {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRequester {
    /// Parse `command_line` with shell word rules
    pub fn new(command_line: &str, timeout: Duration) -> Result<Self> {
        let mut words = shell_words::split(command_line)
            .with_context(|| format!("Invalid generator command: {}", command_line))?;
        if words.is_empty() {
            anyhow::bail!("Generator command is empty");
        }
        let program = words.remove(0);

        Ok(Self {
            program,
            args: words,
            timeout,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn generator '{}'", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            // a generator may exit without reading; its exit status tells more
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e).context("Failed to write to generator stdin");
                }
            }
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!("Generator '{}' timed out after {:?}", self.program, self.timeout)
            })?
            .with_context(|| format!("Failed to wait for generator '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Generator '{}' failed with exit code {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("Generator output is not valid UTF-8")
    }
}

/// Stdin payload: system context, a blank line, then the prompt
fn render_input(role: &RoleContext, prompt: &str) -> String {
    format!("{}\n\n{}\n", role.system_prompt.trim_end(), prompt.trim_end())
}

#[async_trait]
impl SnippetRequester for CommandRequester {
    fn name(&self) -> &str {
        "command"
    }

    async fn generate(&self, role: &RoleContext, prompt: &str) -> Generation {
        self.run(&render_input(role, prompt)).await.into()
    }
}
