//! Minimal shell lexing for fragment inspection.
//!
//! Only two questions are asked of a fragment: where its unquoted pipe
//! operators are, and where it references the current item (`$1`). Both
//! need quote tracking, since `grep 'a|b'` has no pipe and
//! `awk '{print $1}'` has no item reference.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// A `$1` / `${1}` reference visible to the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Byte range of the reference itself
    pub span: Range<usize>,

    /// True when the reference is the entire content of a double-quoted
    /// word, as in `"$1"`
    pub whole_quoted: bool,
}

/// Walks `text`, calling `visit(index, byte, quote_state)` for every byte
/// that is not consumed by a backslash escape.
fn scan(text: &str, mut visit: impl FnMut(usize, u8, Quote)) {
    let bytes = text.as_bytes();
    let mut quote = Quote::None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match (quote, b) {
            (Quote::Single, b'\'') => quote = Quote::None,
            (Quote::Single, _) => visit(i, b, quote),
            (_, b'\\') => {
                // escaped byte is literal
                i += 2;
                continue;
            }
            (Quote::None, b'\'') => quote = Quote::Single,
            (Quote::None, b'"') => quote = Quote::Double,
            (Quote::Double, b'"') => quote = Quote::None,
            _ => visit(i, b, quote),
        }
        i += 1;
    }
}

/// Byte offsets of unquoted single `|` operators (`||` is excluded)
pub fn pipe_positions(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut candidates = Vec::new();

    scan(text, |i, b, quote| {
        if b == b'|' && quote == Quote::None {
            candidates.push(i);
        }
    });

    candidates
        .into_iter()
        .filter(|&i| {
            let prev = i.checked_sub(1).map(|p| bytes[p]);
            let next = bytes.get(i + 1).copied();
            prev != Some(b'|') && next != Some(b'|')
        })
        .collect()
}

/// True when `text` chains several commands with a pipe
pub fn has_pipe(text: &str) -> bool {
    !pipe_positions(text).is_empty()
}

/// The text after the last pipe operator, or all of it when there is none
pub fn last_segment(text: &str) -> &str {
    match pipe_positions(text).last() {
        Some(&pos) => &text[pos + 1..],
        None => text,
    }
}

/// All shell-visible references to the current item
pub fn placeholders(text: &str) -> Vec<Placeholder> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();

    scan(text, |i, b, quote| {
        if b != b'$' || quote == Quote::Single {
            return;
        }
        let rest = &bytes[i + 1..];
        let len = if rest.starts_with(b"{1}") {
            4
        } else if rest.first() == Some(&b'1') && !rest.get(1).is_some_and(u8::is_ascii_digit) {
            2
        } else {
            return;
        };
        let span = i..i + len;
        // `"$1"` standing alone as a word, not glued to a neighbour
        let whole_quoted = quote == Quote::Double
            && i > 0
            && bytes[i - 1] == b'"'
            && bytes.get(span.end) == Some(&b'"')
            && (i == 1 || bytes[i - 2].is_ascii_whitespace())
            && bytes.get(span.end + 1).map_or(true, u8::is_ascii_whitespace);
        found.push(Placeholder { span, whole_quoted });
    });

    found
}

/// True when `text` references the current item
pub fn has_placeholder(text: &str) -> bool {
    !placeholders(text).is_empty()
}

/// Remove every item reference, with its quotes when it was a whole
/// quoted word and with the whitespace in front of it
pub fn strip_placeholders(text: &str) -> String {
    let mut out = text.to_string();

    for placeholder in placeholders(text).into_iter().rev() {
        let mut start = placeholder.span.start;
        let mut end = placeholder.span.end;
        if placeholder.whole_quoted {
            start -= 1;
            end += 1;
        }
        while start > 0 && matches!(out.as_bytes()[start - 1], b' ' | b'\t') {
            start -= 1;
        }
        out.replace_range(start..end, "");
    }

    out.trim().to_string()
}

/// First whitespace-separated word
pub fn leading_token(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}
