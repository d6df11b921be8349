//! Document text as a sequence of codepoints
//!
//! Matching addresses the document by codepoint index, never by byte
//! offset, so a multi-byte character always counts as one position.

use std::fmt;

/// Read-only view of a document with random access by codepoint
#[derive(Clone)]
pub struct InputStream {
    chars: Vec<char>,
}

impl InputStream {
    pub fn new(input: &str) -> Self {
        InputStream {
            chars: input.chars().collect(),
        }
    }

    /// Codepoint at `pos`, `None` past the end
    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.chars.get(pos).copied()
    }

    /// Total length in codepoints
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Text between two codepoint positions, clamped to the input
    pub fn substring(&self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        self.chars[start.min(end)..end].iter().collect()
    }

    /// 1-based line and column of a position
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;

        for ch in self.chars.iter().take(pos) {
            if *ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }

        (line, col)
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InputStream(len={}, head={:?})",
            self.chars.len(),
            self.substring(0, 20)
        )
    }
}
