//! Heuristic repair of generated fragments.
//!
//! Rules run in a fixed order over a `Fragment`. Each rule is a pure
//! function and idempotent on its own; one pass over all of them reaches a
//! fixed point.

use tracing::info;

use super::shell;
use crate::domain::{OutputType, ProcessingMode};

/// Line-oriented filters that always consume their whole input
pub const STREAM_TOOLS: [&str; 8] = ["sort", "head", "tail", "grep", "cut", "awk", "sed", "uniq"];

/// A fragment with its declared data-flow contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub snippet: String,
    pub processing: ProcessingMode,
    pub output_type: OutputType,
}

impl Fragment {
    pub fn new(snippet: impl Into<String>, processing: ProcessingMode, output_type: OutputType) -> Self {
        Self {
            snippet: snippet.into(),
            processing,
            output_type,
        }
    }
}

/// A named correction rule
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(Fragment) -> Fragment,
}

/// Per-step rules, in application order
pub const RULES: [Rule; 3] = [
    Rule {
        name: "single-fragment",
        apply: keep_last_fragment,
    },
    Rule {
        name: "stream-tool",
        apply: normalize_stream_tool,
    },
    Rule {
        name: "per-item-inference",
        apply: infer_per_item,
    },
];

/// A step contributes exactly one link; when the generator echoed a whole
/// chain, only the final stage is kept.
pub fn keep_last_fragment(fragment: Fragment) -> Fragment {
    if !shell::has_pipe(&fragment.snippet) {
        return fragment;
    }
    Fragment {
        snippet: shell::last_segment(&fragment.snippet).trim().to_string(),
        ..fragment
    }
}

/// True when the fragment starts with one of `STREAM_TOOLS`
pub fn is_stream_tool(snippet: &str) -> bool {
    shell::leading_token(snippet).is_some_and(|token| STREAM_TOOLS.contains(&token))
}

/// Stream tools read the whole input; an item reference on one means the
/// generator framed it per item by mistake.
pub fn normalize_stream_tool(fragment: Fragment) -> Fragment {
    if !is_stream_tool(&fragment.snippet) {
        return fragment;
    }
    let snippet = if shell::has_placeholder(&fragment.snippet) {
        shell::strip_placeholders(&fragment.snippet)
    } else {
        fragment.snippet
    };
    Fragment {
        snippet,
        processing: ProcessingMode::Whole,
        ..fragment
    }
}

/// A fragment addressing a single item needs per-item iteration.
pub fn infer_per_item(fragment: Fragment) -> Fragment {
    if fragment.processing == ProcessingMode::Whole && shell::has_placeholder(&fragment.snippet) {
        return Fragment {
            processing: ProcessingMode::PerItem,
            ..fragment
        };
    }
    fragment
}

/// Last-resort check at assembly time: the mode a block is emitted with
pub fn assembly_mode(snippet: &str, processing: ProcessingMode) -> ProcessingMode {
    if processing != ProcessingMode::PerItem && shell::has_placeholder(snippet) {
        ProcessingMode::PerItem
    } else {
        processing
    }
}

/// Run every rule once, logging the ones that changed something
pub fn correct(fragment: Fragment, step_index: u32) -> Fragment {
    RULES.iter().fold(fragment, |current, rule| {
        let before = current.clone();
        let after = (rule.apply)(current);
        if after != before {
            info!(
                step = step_index,
                rule = rule.name,
                snippet = %after.snippet,
                processing = %after.processing,
                "Auto-fix applied"
            );
        }
        after
    })
}
