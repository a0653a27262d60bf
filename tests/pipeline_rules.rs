//! Pipeline Rule Integration Tests
//!
//! Parsing, correction and assembly rules checked through the public API,
//! without a requester.

use pipewright::core::{
    assemble, build_result, correct, extract, parse_steps, Fragment, StepParser, MAX_STEPS,
};
use pipewright::domain::{OutputType, ProcessingMode, Step, StepResult};

fn generated(index: u32, raw: &str) -> StepResult {
    build_result(Step::new(index, format!("step {}", index)), raw.to_string())
}

#[test]
fn test_parser_dedups_and_ignores_prose() {
    let text = "\
Plan for today:
1. List the files
- Step 2: Sort by size
* 3. List the files
Task 4 Print them
2024 was a slow year
";
    let steps = parse_steps(text);
    let descriptions: Vec<&str> = steps.iter().map(|s| s.description.as_str()).collect();

    assert_eq!(descriptions, vec!["List the files", "Sort by size", "Print them"]);
    assert_eq!(
        steps.iter().map(|s| s.index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn test_parser_caps_step_count() {
    let text: String = (1..=50).map(|i| format!("{}. task number {}\n", i, i)).collect();

    assert_eq!(parse_steps(&text).len(), MAX_STEPS);
    assert_eq!(StepParser::new(3).parse(&text).len(), 3);
    assert_eq!(StepParser::new(500).parse(&text).len(), MAX_STEPS);
}

#[test]
fn test_no_corrected_fragment_keeps_a_pipe() {
    for raw in [
        "ls -la | grep txt",
        "```bash\ncat file | sort | uniq -c\n```",
        "find . | xargs wc -l | tail -n 1",
    ] {
        let result = generated(2, raw);
        assert!(
            !result.snippet.contains(" | "),
            "{:?} kept a pipe: {:?}",
            raw,
            result.snippet
        );
    }

    // quoted bars and logical or are not pipe operators
    assert_eq!(generated(2, "grep -E 'a|b'").snippet, "grep -E 'a|b'");
    assert_eq!(generated(2, "test -f x || echo missing").snippet, "test -f x || echo missing");
}

#[test]
fn test_stream_tools_are_whole_without_item_reference() {
    for raw in [
        "# Processing: Per-Item\nsort \"$1\"",
        "# Processing: Per-Item\nhead -n 5 $1",
        "grep -v '^#' \"${1}\"",
        "uniq -c",
    ] {
        let result = generated(2, raw);
        assert_eq!(result.processing, ProcessingMode::Whole, "{:?}", raw);
        assert!(!result.snippet.contains("$1") && !result.snippet.contains("${1}"));
    }

    // awk fields are not item references
    let awk = generated(2, "awk '{print $1}'");
    assert_eq!(awk.snippet, "awk '{print $1}'");
    assert_eq!(awk.processing, ProcessingMode::Whole);
}

#[test]
fn test_item_reference_implies_per_item() {
    for raw in ["wc -l \"$1\"", "# Processing: Whole\nstat -c %s \"${1}\"", "cp $1 /backup/"] {
        assert_eq!(generated(2, raw).processing, ProcessingMode::PerItem, "{:?}", raw);
    }
}

#[test]
fn test_correction_reaches_fixed_point() {
    let inputs = [
        Fragment::new("find . | sort \"$1\"", ProcessingMode::PerItem, OutputType::List),
        Fragment::new("cat \"$1\"", ProcessingMode::Whole, OutputType::Single),
        Fragment::new("echo done", ProcessingMode::PerItem, OutputType::Single),
        Fragment::new("ls | head -n 3 $1", ProcessingMode::Whole, OutputType::List),
    ];

    for input in inputs {
        let once = correct(input.clone(), 1);
        let twice = correct(once.clone(), 1);
        assert_eq!(once, twice, "not a fixed point for {:?}", input);
    }
}

#[test]
fn test_first_block_never_loops_over_empty_input() {
    let program = assemble(vec![
        generated(1, "# Processing: Per-Item\nls -1"),
        generated(2, "wc -l \"$1\""),
    ]);

    assert!(program.script().starts_with("#!/bin/bash\nset -e\n\n{\n  ls -1\n} | \\\n"));
    assert_eq!(program.script().matches("while read -r item").count(), 1);
}

#[test]
fn test_empty_steps_do_not_emit_blocks() {
    let program = assemble(vec![
        generated(1, "```bash\n```"),
        generated(2, "# just a comment"),
        generated(3, "ls"),
        generated(4, ""),
        generated(5, "sort"),
    ]);

    assert_eq!(program.block_count(), 2);
    assert_eq!(
        program.script(),
        "#!/bin/bash\nset -e\n\n{\n  ls\n} | \\\n{\n  sort\n}\n"
    );
}

#[test]
fn test_extract_defaults_without_markers() {
    let extracted = extract("Here you go:\n```\ndu -sh .\n```");
    assert_eq!(extracted.snippet, "du -sh .");
    assert_eq!(extracted.processing, ProcessingMode::Whole);
    assert_eq!(extracted.output_type, OutputType::Single);
}
