//! [`DocumentNode`] – an owned, queryable element tree.
//!
//! Sequence and expression files are XML.  The editor writes a `DOCTYPE`
//! pointing at a DTD nobody ships with the project, so the declaration is
//! removed before parsing ([`strip_doctype`]).  After parsing, only
//! elements, attributes and text survive; comments and processing
//! instructions are dropped.
//!
//! # Example
//!
//! ```
//! use chirp_codegen::document::DocumentNode;
//!
//! let doc = DocumentNode::parse(
//!     r#"<!DOCTYPE sequence SYSTEM "sequence.dtd">
//!        <sequence><expression file="wave.xml"><comment>hi</comment></expression></sequence>"#,
//!     "demo.xml",
//! )
//! .unwrap();
//!
//! assert_eq!(doc.name(), "sequence");
//! assert_eq!(doc.text_at("expression/comment"), Some("hi"));
//! assert_eq!(doc.children()[0].attribute("file"), Some("wave.xml"));
//! ```

use std::borrow::Cow;

use chirp_types::ChirpError;

/// One element: tag name, attributes in document order, trimmed direct text,
/// and element children in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// Parse `source`; `file` is only used to label errors.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::MalformedDocument`] when the text is not
    /// well-formed XML.
    pub fn parse(source: &str, file: &str) -> Result<Self, ChirpError> {
        let stripped = strip_doctype(source);
        let doc = roxmltree::Document::parse(&stripped)
            .map_err(|e| ChirpError::malformed(file, e.to_string()))?;
        Ok(Self::from_xml(doc.root_element()))
    }

    fn from_xml(node: roxmltree::Node<'_, '_>) -> Self {
        let mut text = String::new();
        let mut children = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Self::from_xml(child));
            } else if child.is_text() {
                text.push_str(child.text().unwrap_or_default());
            }
        }
        Self {
            name: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
            text: text.trim().to_string(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct text content, trimmed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Element children in document order.
    pub fn children(&self) -> &[DocumentNode] {
        &self.children
    }

    /// First child element called `name`.
    pub fn child(&self, name: &str) -> Option<&DocumentNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Every child element called `name`, in order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DocumentNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a `/`-separated path of child names, taking the first match
    /// at each step.
    pub fn find(&self, path: &str) -> Option<&DocumentNode> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, step| node.child(step))
    }

    /// Text of the element at `path`, if present.
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.find(path).map(DocumentNode::text)
    }
}

/// Remove a `<!DOCTYPE …>` declaration, including any internal subset.
///
/// Only a declaration in the prolog (before the root element, after any
/// XML declaration, comments or processing instructions) is removed.
/// Comments and processing instructions inside the internal subset are
/// skipped while scanning.  Input without a declaration is returned
/// unchanged, as is an unterminated one so the parser reports it.
pub fn strip_doctype(source: &str) -> Cow<'_, str> {
    let Some(start) = doctype_start(source) else {
        return Cow::Borrowed(source);
    };
    let bytes = source.as_bytes();
    let mut i = start + DOCTYPE.len();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'<' {
            let rest = &source[i..];
            let close = if rest.starts_with("<!--") {
                Some("-->")
            } else if rest.starts_with("<?") {
                Some("?>")
            } else {
                None
            };
            if let Some(close) = close {
                match rest.find(close) {
                    Some(end) => {
                        i += end + close.len();
                        continue;
                    }
                    None => return Cow::Borrowed(source),
                }
            }
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b'>' if depth == 0 => {
                return Cow::Owned(format!("{}{}", &source[..start], &source[i + 1..]));
            }
            _ => {}
        }
        i += 1;
    }
    Cow::Borrowed(source)
}

const DOCTYPE: &str = "<!DOCTYPE";

/// Byte offset of a `<!DOCTYPE` that opens the prolog, if any.
fn doctype_start(source: &str) -> Option<usize> {
    let mut rest = source.trim_start_matches('\u{feff}');
    loop {
        rest = rest.trim_start();
        if rest.starts_with(DOCTYPE) {
            return Some(source.len() - rest.len());
        }
        let close = if rest.starts_with("<?") {
            "?>"
        } else if rest.starts_with("<!--") {
            "-->"
        } else {
            return None;
        };
        let end = rest.find(close)? + close.len();
        rest = &rest[end..];
    }
}
