//! The assembled pipeline program.

use super::step::StepResult;

/// Ordered step results together with the script generated from them
///
/// Only the assembler constructs one, and only from a fully resolved
/// sequence.
#[derive(Debug, Clone)]
pub struct PipelineProgram {
    steps: Vec<StepResult>,
    script: String,
}

impl PipelineProgram {
    pub(crate) fn new(steps: Vec<StepResult>, script: String) -> Self {
        Self { steps, script }
    }

    /// Step results in plan order
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// Generated shell script text
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Number of steps that contributed a block to the script
    pub fn block_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| !r.is_effectively_empty())
            .count()
    }
}
