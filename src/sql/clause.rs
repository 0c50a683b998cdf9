// Clause Extractor - carve a token stream into keyword-delimited clauses
use crate::error::{Error, Result};

/// Extracts one clause: its start keyword(s) followed by every token up to the
/// first terminator keyword. Keyword comparison is case-insensitive.
#[derive(Debug, Clone)]
pub struct ClauseExtractor {
    start: Vec<String>,
    terminators: Vec<String>,
}

impl ClauseExtractor {
    /// `start` holds one or two keywords.
    pub fn new(start: &[&str], terminators: &[&str]) -> Self {
        debug_assert!(matches!(start.len(), 1 | 2));
        ClauseExtractor {
            start: start.iter().map(|s| s.to_lowercase()).collect(),
            terminators: terminators.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    pub fn start(&self) -> &[String] {
        &self.start
    }

    pub fn terminators(&self) -> &[String] {
        &self.terminators
    }

    /// Split `tokens` into `(clause, remainder)`.
    ///
    /// The clause keeps the start tokens. The remainder begins at the first
    /// terminator and is empty when none occurs.
    pub fn extract<'a, T: AsRef<str>>(&self, tokens: &'a [T]) -> Result<(&'a [T], &'a [T])> {
        let n = self.start.len();

        let matches_start = tokens.len() >= n
            && tokens
                .iter()
                .zip(&self.start)
                .all(|(tok, kw)| tok.as_ref().eq_ignore_ascii_case(kw));

        if !matches_start {
            return Err(Error::syntax(near(tokens, n)));
        }

        let end = tokens[n..]
            .iter()
            .position(|tok| self.is_terminator(tok.as_ref()))
            .map(|pos| pos + n)
            .unwrap_or(tokens.len());

        Ok(tokens.split_at(end))
    }

    fn is_terminator(&self, token: &str) -> bool {
        self.terminators
            .iter()
            .any(|kw| token.eq_ignore_ascii_case(kw))
    }
}

fn near<T: AsRef<str>>(tokens: &[T], n: usize) -> String {
    if tokens.is_empty() {
        return "end of input".to_string();
    }
    tokens
        .iter()
        .take(n)
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}
