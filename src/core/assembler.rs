//! Folds resolved step results into one shell pipeline.
//!
//! Every contributing step becomes a `{ ... }` group; groups are chained
//! with pipes. Per-item steps wrap their fragment in a read loop that binds
//! each input line to `$1`:
//!
//! ```text
//! #!/bin/bash
//! set -e
//!
//! {
//!   find . -type f
//! } | \
//! {
//!   while read -r item; do
//!     set -- "$item"
//!     wc -l "$1"
//!   done
//! }
//! ```

use tracing::{debug, info};

use super::corrector::assembly_mode;
use crate::domain::{PipelineProgram, ProcessingMode, StepResult};

const PREAMBLE: [&str; 3] = ["#!/bin/bash", "set -e", ""];

/// Body emitted when no step contributes anything
const NOOP: &str = ":";

const PIPE_JOIN: &str = " | \\\n";

/// Render one block
fn render_block(snippet: &str, processing: ProcessingMode) -> String {
    let mut block = vec!["{".to_string()];
    match processing {
        ProcessingMode::PerItem => {
            block.push("  while read -r item; do".to_string());
            block.push("    set -- \"$item\"".to_string());
            block.extend(snippet.lines().map(|line| format!("    {}", line)));
            block.push("  done".to_string());
        }
        ProcessingMode::Whole => {
            block.extend(snippet.lines().map(|line| format!("  {}", line)));
        }
    }
    block.push("}".to_string());
    block.join("\n")
}

/// Render the script for `results`, in order
pub fn render_script(results: &[StepResult]) -> String {
    let mut blocks = Vec::new();

    for result in results {
        if result.is_effectively_empty() {
            debug!(step = result.step.index, "Skipping empty step");
            continue;
        }

        let snippet = result.snippet.trim();

        // nothing upstream to iterate over
        let declared = if blocks.is_empty() {
            ProcessingMode::Whole
        } else {
            result.processing
        };

        let processing = assembly_mode(snippet, declared);
        if processing != declared {
            info!(
                step = result.step.index,
                "Item reference found at assembly, emitting per-item loop"
            );
        }

        blocks.push(render_block(snippet, processing));
    }

    let body = if blocks.is_empty() {
        NOOP.to_string()
    } else {
        blocks.join(PIPE_JOIN)
    };

    let mut lines: Vec<String> = PREAMBLE.iter().map(|s| s.to_string()).collect();
    lines.push(body);
    let mut script = lines.join("\n");
    script.push('\n');
    script
}

/// Assemble a program from a fully resolved sequence
pub fn assemble(results: Vec<StepResult>) -> PipelineProgram {
    let script = render_script(&results);
    PipelineProgram::new(results, script)
}
