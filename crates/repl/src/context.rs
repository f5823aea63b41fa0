//! Plain-text source listings.

use engine::Span;

/// Lines of context shown on each side of the current span.
const CONTEXT_LINES: usize = 3;

fn numbered(line: usize, text: &str) -> String {
    format!("{line:2}| {text}\n")
}

/// Split `text` before the 1-based `column`, clamped to the line.
fn split_at_column(text: &str, column: usize) -> (&str, &str) {
    let index = text
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_at(index)
}

/// The span's lines with up to three lines either side, the span itself
/// wrapped in `[` `]`.
pub(crate) fn render_context(source: &str, span: &Span) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let line = |n: usize| lines.get(n.wrapping_sub(1)).copied().unwrap_or_default();
    let begin = span.begin.line;
    let end = span.end.line.max(begin);

    let mut out = String::new();
    for n in begin.saturating_sub(CONTEXT_LINES).max(1)..begin {
        out.push_str(&numbered(n, line(n)));
    }

    if begin == end {
        let (before, rest) = split_at_column(line(begin), span.begin.column);
        let width = span.end.column.saturating_sub(span.begin.column);
        let (active, after) = split_at_column(rest, width + 1);
        out.push_str(&numbered(begin, &format!("{before}[{active}]{after}")));
    } else {
        let (before, active) = split_at_column(line(begin), span.begin.column);
        out.push_str(&numbered(begin, &format!("{before}[{active}")));
        for n in begin + 1..end {
            out.push_str(&numbered(n, line(n)));
        }
        let (active, after) = split_at_column(line(end), span.end.column);
        out.push_str(&numbered(end, &format!("{active}]{after}")));
    }

    for n in end + 1..=(end + CONTEXT_LINES).min(lines.len()) {
        out.push_str(&numbered(n, line(n)));
    }
    out
}

/// The whole source with line numbers.
pub(crate) fn render_file(name: &str, source: &str) -> String {
    let mut out = format!("File: {name}\n");
    for (index, text) in source.lines().enumerate() {
        out.push_str(&numbered(index + 1, text));
    }
    out
}
