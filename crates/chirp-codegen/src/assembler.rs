//! [`ProgramAssembler`] – whole-sketch generation and persistence.
//!
//! A compiled sequence sketch has this layout:
//!
//! ```text
//! #include <Hummingbird.h>
//!
//! Hummingbird hummingbird;
//!
//! void setup() {
//!    hummingbird.init();
//! }
//!
//! void loop() {
//!    <statements from the sequence compiler>
//! }
//!
//! void <method>() {
//!    <expression body>
//! }
//! ```
//!
//! with one subroutine per registered expression, in registration order.
//!
//! # Cancellation
//!
//! A run the host aborted yields a [`CompiledProgram`] with
//! `was_cancelled = true` and no source.  [`write_program`] refuses to
//! persist it and deletes whatever a previous run left at the target path,
//! so an aborted compilation never leaves an output file behind.

use std::fs;
use std::path::{Path, PathBuf};

use chirp_hal::board;
use chirp_types::ChirpError;
use tracing::{info, warn};

use crate::code::CodeBlock;
use crate::expression::expression_body;
use crate::loader::{DocumentLoader, display_name, normalize_path};
use crate::method_registry::MethodRegistry;
use crate::missing::MissingReferenceHandler;
use crate::schema::parse_expression;
use crate::sequence::{self, CompileSession};

/// File extension of generated sketches.
pub const SKETCH_EXTENSION: &str = "ino";

/// Result of compiling a sequence.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    /// Complete sketch text; empty when the run was cancelled.
    pub source: String,
    /// Subroutines registered during the run.
    pub methods: MethodRegistry,
    pub was_cancelled: bool,
}

/// Drives whole-program compilation against a [`DocumentLoader`].
pub struct ProgramAssembler<'a> {
    loader: &'a dyn DocumentLoader,
    expressions_dir: Option<PathBuf>,
}

impl<'a> ProgramAssembler<'a> {
    pub fn new(loader: &'a dyn DocumentLoader) -> Self {
        Self {
            loader,
            expressions_dir: None,
        }
    }

    /// Look expressions up in `dir` rather than beside each sequence.
    pub fn with_expressions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.expressions_dir = Some(dir.into());
        self
    }

    /// Compile the sequence at `base_dir/root_file` into a sketch.
    ///
    /// # Errors
    ///
    /// [`ChirpError::MissingReference`] when the root itself does not exist;
    /// otherwise any fatal error from the sequence compiler.
    pub fn compile_sequence_to_arduino(
        &self,
        root_file: &str,
        base_dir: &Path,
        on_missing: &mut dyn MissingReferenceHandler,
    ) -> Result<CompiledProgram, ChirpError> {
        let root_path = normalize_path(&base_dir.join(root_file));
        let name = display_name(&root_path);
        let root_dir = root_path.parent().map(Path::to_path_buf).unwrap_or_default();

        let document = self
            .loader
            .load(&root_path)?
            .ok_or_else(|| ChirpError::MissingReference {
                file: root_file.to_string(),
                enclosing: base_dir.display().to_string(),
            })?;

        let mut session = CompileSession::new(self.loader, on_missing);
        if let Some(dir) = &self.expressions_dir {
            session = session.with_expressions_dir(dir.clone());
        }
        let output = sequence::compile(&document, &name, &root_dir, &mut session)?;
        let methods = session.into_registry();

        if output.cancelled {
            warn!(root = %name, "compilation cancelled by host");
            return Ok(CompiledProgram {
                source: String::new(),
                methods,
                was_cancelled: true,
            });
        }

        info!(
            root = %name,
            statements = output.statements.len(),
            methods = methods.len(),
            "compiled sequence"
        );
        Ok(CompiledProgram {
            source: render_program(&output.statements, &methods),
            methods,
            was_cancelled: false,
        })
    }

    /// Compile a single expression into a sketch whose `loop()` runs its
    /// statements inline.
    ///
    /// # Errors
    ///
    /// [`ChirpError::MissingReference`] when `file` does not exist,
    /// [`ChirpError::MalformedDocument`] when it cannot be compiled.
    pub fn compile_expression_to_arduino(&self, file: &Path) -> Result<String, ChirpError> {
        let name = display_name(file);
        let document = self
            .loader
            .load(file)?
            .ok_or_else(|| ChirpError::MissingReference {
                file: name.clone(),
                enclosing: file
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            })?;
        let expr = parse_expression(&document, &name)?;
        let body: CodeBlock = expression_body(&expr, &name)?.into_iter().collect();
        info!(expression = %name, statements = body.len(), "compiled expression");
        Ok(render_program(&body, &MethodRegistry::new()))
    }

    /// Compile and persist in one step.  See [`write_program`].
    ///
    /// A failed compilation removes any sketch a previous run left at `out`,
    /// the same as a cancelled one.
    ///
    /// # Errors
    ///
    /// Compilation errors, or [`ChirpError::Io`] when writing fails.
    pub fn compile_sequence_to_file(
        &self,
        root_file: &str,
        base_dir: &Path,
        on_missing: &mut dyn MissingReferenceHandler,
        out: &Path,
    ) -> Result<CompiledProgram, ChirpError> {
        let program = match self.compile_sequence_to_arduino(root_file, base_dir, on_missing) {
            Ok(program) => program,
            Err(e) => {
                if fs::remove_file(out).is_ok() {
                    warn!(path = %out.display(), "removed stale output of failed run");
                }
                return Err(e);
            }
        };
        write_program(&program, out)?;
        Ok(program)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed sketch header: include, device handle and `setup()`.
pub fn preamble() -> String {
    format!(
        "{}\n\n{}\n\nvoid setup() {{\n{}{}\n}}\n",
        board::LIBRARY_INCLUDE,
        board::device_declaration(),
        crate::code::INDENT,
        board::init_call()
    )
}

/// Assemble the full sketch from `loop()` statements and subroutines.
pub fn render_program(loop_body: &CodeBlock, methods: &MethodRegistry) -> String {
    let mut out = preamble();
    out.push_str("\nvoid loop() {\n");
    out.push_str(&loop_body.render(1));
    out.push_str("}\n");
    for method in methods.iter() {
        let body: CodeBlock = method.body.iter().map(String::as_str).collect();
        out.push_str(&format!("\nvoid {}() {{\n", method.name));
        out.push_str(&body.render(1));
        out.push_str("}\n");
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Where the sketch for `root_file` goes inside `output_dir`.
///
/// With `sketch_folders` the sketch gets a folder of its own named after it
/// (`dance.xml` → `dance/dance.ino`), which the Arduino IDE requires.
pub fn sketch_path(output_dir: &Path, root_file: &str, sketch_folders: bool) -> PathBuf {
    let stem = Path::new(root_file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sketch".to_string());
    let file = format!("{stem}.{SKETCH_EXTENSION}");
    if sketch_folders {
        output_dir.join(&stem).join(file)
    } else {
        output_dir.join(file)
    }
}

/// Persist `program` at `path`.
///
/// The text is written to a hidden sibling file first and renamed into
/// place, so readers never observe a half-written sketch.  A cancelled
/// program is not written; any existing file at `path` is removed instead.
/// Returns whether a file was written.
///
/// # Errors
///
/// [`ChirpError::Io`] when the directory, file or rename fails.
pub fn write_program(program: &CompiledProgram, path: &Path) -> Result<bool, ChirpError> {
    if program.was_cancelled {
        match fs::remove_file(path) {
            Ok(()) => warn!(path = %path.display(), "removed stale output of cancelled run"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ChirpError::io(path.display(), e)),
        }
        return Ok(false);
    }
    write_sketch(&program.source, path)?;
    Ok(true)
}

/// Atomically write sketch text to `path`, creating parent directories.
///
/// # Errors
///
/// [`ChirpError::Io`] when the directory, file or rename fails.
pub fn write_sketch(source: &str, path: &Path) -> Result<(), ChirpError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ChirpError::io(parent.display(), e))?;
    }
    let partial = path.with_file_name(format!(".{}.partial", display_name(path)));
    let result = fs::write(&partial, source).and_then(|()| fs::rename(&partial, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(ChirpError::io(path.display(), e));
    }
    info!(path = %path.display(), bytes = source.len(), "wrote sketch");
    Ok(())
}
