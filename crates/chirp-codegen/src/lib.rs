//! `chirp-codegen` – behaviour documents to Hummingbird sketches.
//!
//! Turns a tree of sequence and expression XML documents into a single
//! Arduino sketch.  Shared expressions become subroutines generated once;
//! sequences, loops and sensor conditionals are inlined into `loop()`.
//!
//! # Modules
//!
//! - [`assembler`] – [`ProgramAssembler`][assembler::ProgramAssembler]:
//!   whole-sketch compilation, rendering and atomic persistence of the result.
//! - [`sequence`] – [`compile`][sequence::compile]: the recursive driver
//!   that walks a sequence's elements inside a
//!   [`CompileSession`][sequence::CompileSession], including cancellation.
//! - [`expression`] – one expression document to one subroutine body.
//! - [`conditional`] – the four loop shapes a sensor conditional can take.
//! - [`method_registry`] – [`MethodRegistry`][method_registry::MethodRegistry]:
//!   deduplicated, ordered subroutines with collision-free C identifiers.
//! - [`missing`] – [`MissingReferenceHandler`][missing::MissingReferenceHandler]:
//!   the host callback consulted when a referenced file does not exist.
//! - [`loader`] – [`DocumentLoader`][loader::DocumentLoader] with filesystem
//!   and in-memory implementations.
//! - [`document`] / [`schema`] – XML parsing and the typed views of the two
//!   document kinds.
//! - [`code`] – [`CodeBlock`][code::CodeBlock], the indentation-aware line
//!   buffer every stage emits into.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use chirp_codegen::{InMemoryLoader, ProgramAssembler};
//! use chirp_types::Decision;
//!
//! let loader = InMemoryLoader::new()
//!     .with("robot/wave.xml", r#"<sequence><expression file="arm.xml"/></sequence>"#)
//!     .with(
//!         "robot/arm.xml",
//!         r#"<expression><services><service type="SimpleServoService">
//!              <operation name="setPosition"><device id="0">
//!                <parameter name="position">255</parameter>
//!              </device></operation></service></services></expression>"#,
//!     );
//! let program = ProgramAssembler::new(&loader)
//!     .compile_sequence_to_arduino("wave.xml", Path::new("robot"), &mut Decision::Abort)
//!     .unwrap();
//! assert!(program.source.contains("void arm() {\n   hummingbird.setServo(1, 180);\n}"));
//! ```

pub mod assembler;
pub mod code;
pub mod conditional;
pub mod document;
pub mod expression;
pub mod loader;
pub mod method_registry;
pub mod missing;
pub mod schema;
pub mod sequence;

pub use assembler::{
    CompiledProgram, ProgramAssembler, render_program, sketch_path, write_program, write_sketch,
};
pub use code::CodeBlock;
pub use document::DocumentNode;
pub use loader::{DocumentLoader, FsLoader, InMemoryLoader};
pub use method_registry::{GeneratedMethod, MethodRegistry};
pub use missing::{MissingReferenceHandler, ScriptedResponses};
pub use sequence::CompileSession;
