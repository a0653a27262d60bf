//! Side-channel record of what a compilation produced.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::step::{OutputType, ProcessingMode, ResultOrigin, StepResult};

/// Report for one compiled topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileReport {
    pub run_id: Uuid,
    pub req_idx: u32,
    pub title: String,
    pub topic: String,

    /// Where the generated script was written
    pub path: PathBuf,

    pub compiled_at: DateTime<Utc>,

    pub steps: Vec<StepSummary>,
}

/// Per-step metadata carried in a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSummary {
    pub index: u32,
    pub description: String,
    pub snippet: String,
    pub processing: ProcessingMode,
    pub output_type: OutputType,
    pub cached: bool,
}

impl From<&StepResult> for StepSummary {
    fn from(result: &StepResult) -> Self {
        Self {
            index: result.step.index,
            description: result.step.description.clone(),
            snippet: result.snippet.clone(),
            processing: result.processing,
            output_type: result.output_type,
            cached: result.origin == ResultOrigin::Cached,
        }
    }
}

impl CompileReport {
    /// Number of steps restored from cache
    pub fn cached_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.cached).count()
    }
}
