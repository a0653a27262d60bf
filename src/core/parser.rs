//! Step-list parsing.
//!
//! Planners number their steps in several notations:
//!
//! - `1. List the files`
//! - `- Step 2: Sort by size`
//! - `* 3. Keep the first five`
//! - `Task 4: Print them`
//!
//! Everything that does not look like a numbered step is ignored.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Step;

/// Upper bound on parsed steps; repetitive generations can run on forever
pub const MAX_STEPS: usize = 20;

fn step_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Labelled steps may omit the separator ("Step 1 list files"),
        // bare numbers must carry one so prose like "2024 was slow" is skipped.
        Regex::new(
            r"(?i)^[-*\s]*(?:(?:step|task|stage|phase)\s*\d+\s*[.:]?|\d+\s*[.:])\s*(.*)$",
        )
        .expect("step pattern is valid")
    })
}

/// Parses step-list text into ordered, de-duplicated steps
#[derive(Debug, Clone)]
pub struct StepParser {
    max_steps: usize,
}

impl Default for StepParser {
    fn default() -> Self {
        Self::new(MAX_STEPS)
    }
}

impl StepParser {
    /// Create a parser with a custom bound (clamped to `MAX_STEPS`)
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps: max_steps.min(MAX_STEPS),
        }
    }

    /// Parse `text` into steps numbered from 1
    ///
    /// Returns an empty list when nothing matches; that means "nothing to
    /// compile", not a failure.
    pub fn parse(&self, text: &str) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for line in text.lines() {
            if steps.len() >= self.max_steps {
                break;
            }

            let Some(caps) = step_line().captures(line.trim()) else {
                continue;
            };
            let description = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();

            if description.is_empty() || !seen.insert(description) {
                continue;
            }

            steps.push(Step::new(steps.len() as u32 + 1, description));
        }

        steps
    }
}

/// Parse with the default bound
pub fn parse_steps(text: &str) -> Vec<Step> {
    StepParser::default().parse(text)
}
