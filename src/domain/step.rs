//! Steps and the per-step compilation result.
//!
//! A `Step` is one line of the parsed task plan. A `StepResult` is what the
//! compiler resolved for it: the generated text, the cleaned command
//! fragment, and the fragment's data-flow contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One natural-language unit of work in an ordered task plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the plan
    pub index: u32,

    /// Step text as written by the planner
    pub description: String,
}

impl Step {
    pub fn new(index: u32, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
        }
    }
}

/// Whether a fragment runs once over its whole input or once per input line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProcessingMode {
    #[default]
    Whole,
    #[serde(rename = "Per-Item")]
    PerItem,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Whole => write!(f, "Whole"),
            ProcessingMode::PerItem => write!(f, "Per-Item"),
        }
    }
}

impl FromStr for ProcessingMode {
    type Err = String;

    /// Accepts the marker spellings generators actually emit
    /// (`Whole`, `Per-Item`, `PerItem`, `per item`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "whole" => Ok(ProcessingMode::Whole),
            "peritem" => Ok(ProcessingMode::PerItem),
            _ => Err(format!("unknown processing mode: {}", s)),
        }
    }
}

/// Declared cardinality of a fragment's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutputType {
    #[default]
    Single,
    List,
}

impl OutputType {
    /// Short description used when telling the next step what it receives
    pub fn shape_hint(&self) -> &'static str {
        match self {
            OutputType::Single => "a single value",
            OutputType::List => "a list, one item per line",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::Single => write!(f, "Single"),
            OutputType::List => write!(f, "List"),
        }
    }
}

impl FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(OutputType::Single),
            "list" => Ok(OutputType::List),
            _ => Err(format!("unknown output type: {}", s)),
        }
    }
}

/// Where a step result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    /// Produced by the requester during this run
    Generated,
    /// Restored from the step cache
    Cached,
}

/// The resolved fragment for one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step: Step,

    /// Text returned by the requester, before any cleanup
    pub raw_output: String,

    /// Cleaned and corrected command fragment
    pub snippet: String,

    pub processing: ProcessingMode,

    pub output_type: OutputType,

    /// Not persisted; a restored result is always `Cached`
    pub origin: ResultOrigin,
}

impl StepResult {
    /// True when the fragment holds no executable line
    ///
    /// Comment-only fragments count as empty: a `{ }` group with nothing
    /// but comments in it is not valid shell.
    pub fn is_effectively_empty(&self) -> bool {
        self.snippet
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'))
    }
}
