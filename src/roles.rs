//! Role and skill context for the requester.
//!
//! The system prompt for a role is assembled from:
//! 1. `<roles_dir>/role_<name>.md`
//! 2. `<roles_dir>/role_common_constraints.md` (optional)
//! 3. the skills document, `<config_dir>/skills.json` or
//!    `default_skills.json`, filtered to the requested skill ids
//! 4. the risk knowledge base, `<config_dir>/risks.json` (optional)

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Instruction used when no role file is installed
pub const BUILTIN_CODER_ROLE: &str = "\
You write exactly one POSIX shell command fragment for the task you are given.
The fragment reads from standard input and writes to standard output.
Do not repeat earlier steps and do not chain several commands with pipes.
Answer with a single fenced code block. Inside it, add two comment lines:
# Processing: Whole | Per-Item
# Output Type: Single | List
Use \"$1\" to refer to the current item when processing per item.";

/// Role context handed to the requester with every prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleContext {
    pub role: String,
    pub skills: Vec<String>,
    pub system_prompt: String,
}

impl RoleContext {
    /// Context built from the built-in coder instruction
    pub fn builtin(skills: Vec<String>) -> Self {
        Self {
            role: "coder".to_string(),
            skills,
            system_prompt: BUILTIN_CODER_ROLE.to_string(),
        }
    }
}

/// Role loading failures
#[derive(Debug, Error)]
pub enum RoleError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Skills document {} is not valid JSON, cannot filter by skill", path.display())]
    InvalidSkills { path: PathBuf },

    #[error("Skills document {} has an unknown structure", path.display())]
    UnknownSkillsShape { path: PathBuf },

    #[error("Requested skills not found: {}", .0.join(", "))]
    MissingSkills(Vec<String>),

    #[error("Risk knowledge base {} is not valid JSON", path.display())]
    InvalidRisks { path: PathBuf },
}

/// Loads role prompts from disk
#[derive(Debug, Clone)]
pub struct RoleLoader {
    roles_dir: PathBuf,
    config_dir: PathBuf,
}

impl RoleLoader {
    pub fn new(roles_dir: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            roles_dir: roles_dir.into(),
            config_dir: config_dir.into(),
        }
    }

    /// Build the context for `role`; falls back to the built-in coder
    /// instruction when the role file does not exist
    pub fn load(&self, role: &str, skills: &[String]) -> Result<RoleContext, RoleError> {
        let role_path = self.roles_dir.join(format!("role_{}.md", role));
        let mut parts = Vec::new();

        if role_path.exists() {
            parts.push(read_trimmed(&role_path)?);
        } else {
            debug!(path = %role_path.display(), "Role file not found, using built-in instruction");
            parts.push(BUILTIN_CODER_ROLE.to_string());
        }

        let common = self.roles_dir.join("role_common_constraints.md");
        if common.exists() {
            parts.push(format!("\n# Common Constraints\n{}", read_trimmed(&common)?));
        }

        if let Some(skills_text) = self.skills_section(skills)? {
            parts.push(format!(
                "\n# Available Skills definition\n```json\n{}\n```",
                skills_text
            ));
        }

        if let Some(risks_text) = self.risks_section()? {
            parts.push(format!("\n# Risk Knowledge Base\n```json\n{}\n```", risks_text));
        }

        Ok(RoleContext {
            role: role.to_string(),
            skills: skills.to_vec(),
            system_prompt: parts.join("\n"),
        })
    }

    fn skills_path(&self) -> Option<PathBuf> {
        ["skills.json", "default_skills.json"]
            .iter()
            .map(|name| self.config_dir.join(name))
            .find(|path| path.exists())
    }

    fn skills_section(&self, skills: &[String]) -> Result<Option<String>, RoleError> {
        let Some(path) = self.skills_path() else {
            return Ok(None);
        };
        let content = read_trimmed(&path)?;

        let data: Value = match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(_) if skills.is_empty() => return Ok(Some(content)),
            Err(_) => return Err(RoleError::InvalidSkills { path }),
        };

        let data = if skills.is_empty() {
            data
        } else {
            filter_skills(data, skills, &path)?
        };

        Ok(Some(
            serde_json::to_string_pretty(&data).unwrap_or(content),
        ))
    }

    fn risks_section(&self) -> Result<Option<String>, RoleError> {
        let path = self.config_dir.join("risks.json");
        if !path.exists() {
            return Ok(None);
        }
        let content = read_trimmed(&path)?;

        let data: Value =
            serde_json::from_str(&content).map_err(|_| RoleError::InvalidRisks { path })?;
        Ok(Some(
            serde_json::to_string_pretty(&data).unwrap_or(content),
        ))
    }
}

/// Keep only the named skills; the document is either a list of objects
/// with an `id` or a map keyed by id
fn filter_skills(data: Value, wanted: &[String], path: &Path) -> Result<Value, RoleError> {
    let available: Vec<String> = match &data {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => {
            return Err(RoleError::UnknownSkillsShape {
                path: path.to_path_buf(),
            })
        }
    };

    let missing: Vec<String> = wanted
        .iter()
        .filter(|id| !available.contains(id))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(RoleError::MissingSkills(missing));
    }

    let keep = |id: &str| wanted.iter().any(|w| w == id);
    Ok(match data {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|item| item.get("id").and_then(Value::as_str).is_some_and(keep))
                .collect(),
        ),
        Value::Object(map) => Value::Object(map.into_iter().filter(|(k, _)| keep(k.as_str())).collect()),
        other => other,
    })
}

fn read_trimmed(path: &Path) -> Result<String, RoleError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| RoleError::Read {
            path: path.to_path_buf(),
            source,
        })
}
