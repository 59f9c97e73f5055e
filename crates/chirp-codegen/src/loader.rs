//! Document loading – the compiler's only window onto storage.
//!
//! The compiler never touches the filesystem directly; it asks a
//! [`DocumentLoader`] for the tree at a path.  [`FsLoader`] reads real
//! files, [`InMemoryLoader`] serves documents from a map (hosts that keep
//! projects in memory, and tests).
//!
//! A missing document is not an error at this layer: loaders return
//! `Ok(None)` and the sequence compiler asks the host what to do.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chirp_types::ChirpError;
use tracing::debug;

use crate::document::DocumentNode;

/// Source of parsed documents.
pub trait DocumentLoader {
    /// Load and parse the document at `path`.
    ///
    /// Returns `Ok(None)` when nothing exists at `path`.
    ///
    /// # Errors
    ///
    /// [`ChirpError::MalformedDocument`] when the document exists but cannot
    /// be parsed, [`ChirpError::Io`] when it cannot be read.
    fn load(&self, path: &Path) -> Result<Option<DocumentNode>, ChirpError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// FsLoader
// ─────────────────────────────────────────────────────────────────────────────

/// Loads documents from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl DocumentLoader for FsLoader {
    fn load(&self, path: &Path) -> Result<Option<DocumentNode>, ChirpError> {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ChirpError::io(path.display(), e)),
        };
        debug!(path = %path.display(), bytes = source.len(), "loaded document");
        DocumentNode::parse(&source, &display_name(path)).map(Some)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InMemoryLoader
// ─────────────────────────────────────────────────────────────────────────────

/// Serves documents from memory, keyed by normalised path.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLoader {
    documents: HashMap<PathBuf, String>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `source` under `path`, replacing any previous document.
    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.documents
            .insert(normalize_path(path.as_ref()), source.into());
    }

    /// Builder form of [`InMemoryLoader::insert`].
    pub fn with(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl DocumentLoader for InMemoryLoader {
    fn load(&self, path: &Path) -> Result<Option<DocumentNode>, ChirpError> {
        match self.documents.get(&normalize_path(path)) {
            Some(source) => DocumentNode::parse(source, &display_name(path)).map(Some),
            None => Ok(None),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Path helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Lexically normalise `path`: drop `.` components and fold `..` into the
/// preceding component where there is one.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Short name used to label a document in errors and logs.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(
            normalize_path(Path::new("proj/sequences/./../expressions/wave.xml")),
            PathBuf::from("proj/expressions/wave.xml")
        );
        assert_eq!(normalize_path(Path::new("../a.xml")), PathBuf::from("../a.xml"));
    }

    #[test]
    fn in_memory_loader_resolves_equivalent_paths() {
        let loader = InMemoryLoader::new().with("proj/seq/a.xml", "<sequence/>");
        let doc = loader.load(Path::new("proj/seq/../seq/a.xml")).unwrap();
        assert_eq!(doc.map(|d| d.name().to_string()), Some("sequence".to_string()));
        assert!(loader.load(Path::new("proj/seq/b.xml")).unwrap().is_none());
    }

    #[test]
    fn fs_loader_reports_missing_as_none() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = FsLoader.load(&dir.path().join("nope.xml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn fs_loader_parses_existing_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("wave.xml");
        std::fs::write(&path, "<expression delay-millis=\"5\"/>").unwrap();
        let doc = FsLoader.load(&path).unwrap().expect("document");
        assert_eq!(doc.attribute("delay-millis"), Some("5"));
    }

    #[test]
    fn fs_loader_labels_malformed_documents() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bad.xml");
        std::fs::write(&path, "<expression>").unwrap();
        let err = FsLoader.load(&path).unwrap_err();
        assert!(matches!(err, ChirpError::MalformedDocument { ref file, .. } if file == "bad.xml"));
    }
}
