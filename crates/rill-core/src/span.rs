use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Location of a syntax node. `lo`/`hi` are byte offsets, `line`/`column`
/// are 1-based and refer to `lo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub lo: u32,
    pub hi: u32,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Span {
    pub fn new(lo: u32, hi: u32, line: u32, column: u32) -> Span {
        Span {
            lo,
            hi,
            line,
            column,
        }
    }

    pub fn null() -> Span {
        Span::default()
    }

    /// Extend this span so it ends where `other` ends.
    pub fn to(self, other: Span) -> Span {
        Span {
            hi: other.hi.max(self.hi),
            ..self
        }
    }
}

/// Maps byte offsets of one source text to 1-based line/column pairs.
#[derive(Clone, Debug)]
pub struct LineIndex {
    source: Arc<str>,
    line_starts: Arc<Vec<usize>>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self {
            source: Arc::from(source),
            line_starts: Arc::new(line_starts),
        }
    }

    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_starts.get(idx).copied().unwrap_or(0);
        let column = self
            .source
            .get(line_start..offset.min(self.source.len()))
            .map(|prefix| prefix.chars().count())
            .unwrap_or(0)
            + 1;
        ((idx + 1) as u32, column as u32)
    }

    pub fn span(&self, lo: usize, hi: usize) -> Span {
        let (line, column) = self.line_col(lo);
        Span::new(lo as u32, hi as u32, line, column)
    }

    /// Span pointing just past the last character of the source.
    pub fn end_span(&self) -> Span {
        let len = self.source.len();
        self.span(len, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_is_one_based() {
        let index = LineIndex::new("let a = 1;\nlet b = 2;\n");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(4), (1, 5));
        assert_eq!(index.line_col(11), (2, 1));
        assert_eq!(index.line_col(15), (2, 5));
    }

    #[test]
    fn columns_count_characters_not_bytes() {
        let index = LineIndex::new("\"é\" + x");
        assert_eq!(index.line_col(6), (1, 6));
    }
}
