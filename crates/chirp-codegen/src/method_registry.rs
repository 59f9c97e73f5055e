//! [`MethodRegistry`] – one generated subroutine per distinct expression.
//!
//! Every expression file becomes a `void name()` function in the sketch, no
//! matter how many times sequences reference it.  Entries are keyed by the
//! normalised file name (see [`normalize_identity`]) and kept in insertion
//! order, which is the order subroutines are written out in.
//!
//! A registry belongs to exactly one compilation run.  Create a fresh one
//! (or [`clear`][MethodRegistry::clear] an old one) per run.
//!
//! # Example
//!
//! ```
//! use chirp_codegen::method_registry::MethodRegistry;
//!
//! let mut registry = MethodRegistry::new();
//! registry.register("Blink Fast.xml", vec!["hummingbird.setLED(1, 255);".into()]);
//! registry.register("blink fast.XML", vec!["ignored();".into()]);
//!
//! assert_eq!(registry.len(), 1);
//! assert_eq!(registry.get("BLINK FAST.xml").unwrap().name, "BlinkFast");
//! ```

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

/// Identifiers a generated subroutine must never take.
const RESERVED: &[&str] = &[
    "setup", "loop", "main", "delay", "hummingbird", "counter", "auto", "bool", "break", "case",
    "char", "class", "const", "continue", "default", "do", "double", "else", "enum", "extern",
    "false", "float", "for", "goto", "if", "int", "long", "new", "private", "public", "return",
    "short", "signed", "sizeof", "static", "struct", "switch", "this", "true", "typedef", "union",
    "unsigned", "void", "volatile", "while",
    // Arduino core and the board library.
    "Hummingbird", "Serial", "String", "boolean", "byte", "word", "HIGH", "LOW", "INPUT",
    "OUTPUT", "millis", "micros", "delayMicroseconds", "pinMode", "digitalRead", "digitalWrite",
    "analogRead", "analogWrite", "tone", "noTone", "random", "randomSeed", "map", "constrain",
    "min", "max", "abs",
];

/// A subroutine generated from one expression file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMethod {
    /// Normalised source file name; the dedup key.
    pub identity: String,
    /// C identifier of the subroutine.
    pub name: String,
    /// Statements of the subroutine body, in order.
    pub body: Vec<String>,
}

impl GeneratedMethod {
    /// `name();`
    pub fn call_statement(&self) -> String {
        format!("{}();", self.name)
    }
}

/// Insertion-ordered map from expression identity to generated subroutine.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: IndexMap<String, GeneratedMethod>,
    names: HashSet<String>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` for the expression in `file`.
    ///
    /// The first registration for an identity wins; later calls return the
    /// existing method untouched.
    pub fn register(&mut self, file: &str, body: Vec<String>) -> &GeneratedMethod {
        let identity = normalize_identity(file);
        if !self.methods.contains_key(&identity) {
            let name = self.unique_name(&sanitize_identifier(file));
            debug!(identity = %identity, name = %name, statements = body.len(), "registered method");
            self.names.insert(name.clone());
            self.methods.insert(
                identity.clone(),
                GeneratedMethod {
                    identity: identity.clone(),
                    name,
                    body,
                },
            );
        }
        &self.methods[&identity]
    }

    pub fn contains(&self, file: &str) -> bool {
        self.methods.contains_key(&normalize_identity(file))
    }

    pub fn get(&self, file: &str) -> Option<&GeneratedMethod> {
        self.methods.get(&normalize_identity(file))
    }

    /// Methods in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedMethod> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Forget every method so the registry can serve a new run.
    pub fn clear(&mut self) {
        self.methods.clear();
        self.names.clear();
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.names.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Dedup key of an expression file: trimmed, lower-cased, with `\`
/// separators turned into `/`.
pub fn normalize_identity(file: &str) -> String {
    file.trim().replace('\\', "/").to_lowercase()
}

/// C identifier for the expression in `file`.
///
/// Directory and extension are dropped, spaces and hyphens removed, any
/// other character outside `[A-Za-z0-9_]` becomes `_`.  Names that would
/// start with a digit get a leading `_`; names that collide with sketch or
/// language keywords get an `Expr` suffix.
pub fn sanitize_identifier(file: &str) -> String {
    let file_name = file
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };

    let mut name: String = stem
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() {
        name.push_str("expression");
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if RESERVED.contains(&name.as_str()) {
        name.push_str("Expr");
    }
    name
}
