//! Parsing a source text into evaluation nodes.

use std::path::Path;

use crate::types::{Position, Span};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    Bind { name: String, value: String },
    Raise(String),
    Emit(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub span: Span,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub(crate) struct Program {
    pub name: String,
    pub nodes: Vec<Node>,
}

impl Program {
    /// Every non-blank line that is not a comment is one node.
    pub fn parse(name: &str, source: &str) -> Self {
        let nodes = source
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let text = line.trim();
                if text.is_empty() || text.starts_with("//") || text.starts_with('#') {
                    return None;
                }
                let indent = line.len() - line.trim_start().len();
                let begin = Position::new(idx + 1, indent + 1);
                let end = Position::new(idx + 1, begin.column + text.len());
                Some(Node {
                    span: Span {
                        file: name.to_string(),
                        begin,
                        end,
                    },
                    action: Action::parse(text),
                })
            })
            .collect();

        Self {
            name: name.to_string(),
            nodes,
        }
    }

    /// The node starting on `line`, constrained to contain `column` if given.
    pub fn node_at(&self, line: usize, column: Option<usize>) -> Option<&Node> {
        self.nodes.iter().find(|node| {
            node.span.begin.line == line
                && column.is_none_or(|c| node.span.begin.column <= c && c < node.span.end.column)
        })
    }
}

impl Action {
    fn parse(text: &str) -> Self {
        if let Some(binding) = text.strip_prefix("local ")
            && let Some((name, value)) = binding.split_once('=')
        {
            return Action::Bind {
                name: name.trim().to_string(),
                value: value.trim().trim_end_matches(';').trim().to_string(),
            };
        }

        if let Some(rest) = text.strip_prefix("error")
            && (rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            let message = rest
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string();
            return Action::Raise(message);
        }

        Action::Emit(text.to_string())
    }
}

/// Identity used to compare file names from different clients.
///
/// Pseudo files such as `<stdin>` are compared verbatim, real paths by their
/// absolute form.
pub(crate) fn file_key(name: &str) -> String {
    if name.starts_with('<') {
        return name.to_string();
    }
    std::path::absolute(Path::new(name))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| name.to_string())
}
