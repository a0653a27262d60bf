//! Multi-topic plan documents handed over by the planning phase.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A plan holding one step list per topic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub planned_topics: Vec<PlannedTopic>,
}

/// One topic of a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTopic {
    /// Request index, used in the artifact file name
    pub req_idx: u32,

    pub title: String,

    /// Skill the requester should draw on
    pub skill: String,

    /// Free-form topic text; part of the cache identity
    #[serde(default)]
    pub topic: String,

    /// Step-list text produced by the planner
    pub refined_out: String,
}

impl Plan {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse plan file: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid plan JSON")
    }

    pub fn is_empty(&self) -> bool {
        self.planned_topics.is_empty()
    }
}
