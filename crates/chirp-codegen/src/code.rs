//! [`CodeBlock`] – an indentation-aware buffer of generated lines.
//!
//! Blocks are built bottom-up: a nested construct compiles its body into its
//! own block and the parent splices it in one level deeper.  Indentation is
//! only materialised by [`CodeBlock::render`].

use chirp_hal::board;

/// Indent unit of generated sketches.
pub const INDENT: &str = "   ";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    depth: usize,
    text: String,
}

/// Ordered lines of generated code, each with a relative nesting depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBlock {
    lines: Vec<Line>,
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line at depth 0.
    pub fn push(&mut self, text: impl Into<String>) {
        self.lines.push(Line {
            depth: 0,
            text: text.into(),
        });
    }

    /// Append one `//` line for every non-blank line of `comment`.
    pub fn push_comment(&mut self, comment: &str) {
        for line in comment
            .split(['\n', '\r'])
            .map(str::trim)
            .filter(|l| !l.is_empty())
        {
            self.push(board::comment(line));
        }
    }

    /// Splice `other` at the same depth.
    pub fn append(&mut self, other: CodeBlock) {
        self.lines.extend(other.lines);
    }

    /// Splice `other` one level deeper.
    pub fn append_nested(&mut self, other: CodeBlock) {
        self.lines.extend(other.lines.into_iter().map(|l| Line {
            depth: l.depth + 1,
            text: l.text,
        }));
    }

    /// Append `header`, then `body` one level deeper, then a closing brace.
    pub fn push_braced(&mut self, header: impl Into<String>, body: CodeBlock) {
        self.push(header);
        self.append_nested(body);
        self.push("}");
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Line texts without indentation.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.text.as_str())
    }

    /// Render every line indented by `base_depth + depth` units, each
    /// terminated by a newline.
    pub fn render(&self, base_depth: usize) -> String {
        let mut out = String::new();
        for line in &self.lines {
            for _ in 0..base_depth + line.depth {
                out.push_str(INDENT);
            }
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }
}

impl<S: Into<String>> FromIterator<S> for CodeBlock {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut block = CodeBlock::new();
        for line in iter {
            block.push(line);
        }
        block
    }
}
