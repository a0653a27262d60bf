//! Extraction of the fragment and its inline metadata from generated text.
//!
//! Generators are asked to answer with one fenced code block carrying two
//! marker comments:
//!
//! ```text
//! # Processing: Per-Item
//! # Output Type: List
//! ```
//!
//! Neither the fence nor the markers are guaranteed to be there.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{OutputType, ProcessingMode};

/// Fragment and metadata pulled out of one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub processing: ProcessingMode,
    pub output_type: OutputType,
    pub snippet: String,
}

fn fenced_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[\w+-]*[ \t]*\n?(.*?)\n?```").expect("fence pattern is valid")
    })
}

fn processing_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)#\s*Processing\s*:\s*(Per[-_ ]?Item|Whole)\b")
            .expect("processing pattern is valid")
    })
}

fn output_type_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)#\s*Output\s*Type\s*:\s*(List|Single)\b")
            .expect("output type pattern is valid")
    })
}

fn marker_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)#\s*(Processing|Output\s*Type)\s*:").expect("marker pattern is valid")
    })
}

/// Candidate fragment text: the first fenced block's interior, or
/// everything when there is no complete fence
pub fn candidate_text(raw: &str) -> &str {
    fenced_block()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim()
}

/// Split raw generated text into fragment, processing mode and output type
pub fn extract(raw: &str) -> Extracted {
    let candidate = candidate_text(raw);

    let processing = processing_marker()
        .captures(candidate)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or_default();

    let output_type = output_type_marker()
        .captures(candidate)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or_default();

    let snippet = candidate
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("```") && !marker_line().is_match(trimmed)
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Extracted {
        processing,
        output_type,
        snippet,
    }
}
