//! Request text for one step.

use crate::domain::{OutputType, Step};

/// Render the prompt for `step`
///
/// `previous` is the declared output type of the step before it, `None` for
/// the first step.
pub fn step_prompt(step: &Step, skill: &str, previous: Option<OutputType>) -> String {
    let input_hint = match previous {
        None => "Standard Input".to_string(),
        Some(output_type) => format!(
            "Output from Step {} ({})",
            step.index.saturating_sub(1),
            output_type.shape_hint()
        ),
    };

    let mut prompt = format!("### Task\n{}\n\n### Context\n", step.description);
    if !skill.is_empty() {
        prompt.push_str(&format!("- Skill: {}\n", skill));
    }
    prompt.push_str(&format!("- Input: {}\n", input_hint));
    prompt
}
