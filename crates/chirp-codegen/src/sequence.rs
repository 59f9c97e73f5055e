//! The sequence compiler – the recursive driver of code generation.
//!
//! [`compile`] walks a sequence's ordered element list once and emits
//! statements for each element:
//!
//! - **expression** – a call to the expression's subroutine (compiling and
//!   registering it on first use), then `delay(ms);` when the reference
//!   carries a delay;
//! - **saved sequence** – the referenced document, loaded relative to the
//!   referencing document's directory and compiled recursively, spliced in
//!   between `// Start Seq:` / `// End Seq:` markers;
//! - **counter loop** – a `for` loop around its recursively compiled
//!   children;
//! - **loopable conditional** – one of the shapes in [`crate::conditional`].
//!
//! # Missing documents and cancellation
//!
//! A referenced file that does not exist is handed to the run's
//! [`MissingReferenceHandler`].  [`Decision::Continue`] skips the element.
//! [`Decision::Abort`] marks the run cancelled: every enclosing frame stops
//! before its next element and nothing further is emitted.  Subroutines
//! registered before the abort stay in the registry; the assembler discards
//! the whole program.

use std::path::{Path, PathBuf};

use chirp_hal::board;
use chirp_types::{
    ChirpError, ConditionalLoopRef, CounterLoopRef, Decision, ElementKind, ExpressionRef,
    ProgramElementRef, SequenceRef,
};
use tracing::{debug, warn};

use crate::code::CodeBlock;
use crate::conditional::{LoopShape, sensor_condition, shape_conditional};
use crate::document::DocumentNode;
use crate::expression::compile_expression;
use crate::loader::{DocumentLoader, normalize_path};
use crate::method_registry::MethodRegistry;
use crate::missing::MissingReferenceHandler;
use crate::schema::{parse_expression, parse_sequence};

// ─────────────────────────────────────────────────────────────────────────────
// CompileSession
// ─────────────────────────────────────────────────────────────────────────────

/// State shared by every frame of one compilation run.
pub struct CompileSession<'a> {
    loader: &'a dyn DocumentLoader,
    on_missing: &'a mut dyn MissingReferenceHandler,
    registry: MethodRegistry,
    expressions_dir: Option<PathBuf>,
    cancelled: bool,
    /// Sequence files currently being compiled, outermost first.
    active: Vec<PathBuf>,
}

impl<'a> CompileSession<'a> {
    /// Start a run with an empty [`MethodRegistry`].
    pub fn new(
        loader: &'a dyn DocumentLoader,
        on_missing: &'a mut dyn MissingReferenceHandler,
    ) -> Self {
        Self {
            loader,
            on_missing,
            registry: MethodRegistry::new(),
            expressions_dir: None,
            cancelled: false,
            active: Vec::new(),
        }
    }

    /// Resolve expression files in `dir` instead of next to the referencing
    /// sequence.
    pub fn with_expressions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.expressions_dir = Some(dir.into());
        self
    }

    /// End the run, handing back its registry.
    pub fn into_registry(self) -> MethodRegistry {
        self.registry
    }

    /// Ask the host about a missing file; an abort cancels the run.
    fn missing(&mut self, file: &str, enclosing: &str) -> Decision {
        let decision = self.on_missing.on_missing(file, enclosing);
        warn!(file, enclosing, ?decision, "referenced document is missing");
        if decision == Decision::Abort {
            self.cancelled = true;
        }
        decision
    }

    fn expression_path(&self, base_dir: &Path, file: &str) -> PathBuf {
        let dir = self.expressions_dir.as_deref().unwrap_or(base_dir);
        normalize_path(&dir.join(file))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Statements produced for one sequence document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceOutput {
    pub statements: CodeBlock,
    pub cancelled: bool,
}

/// Compile the sequence `document` named `name`, whose file lives in
/// `base_dir`.
///
/// # Errors
///
/// Any non-recoverable [`ChirpError`] met in this document or below it:
/// malformed documents, unknown sensors, unreadable files, or a sequence
/// that references itself.
pub fn compile(
    document: &DocumentNode,
    name: &str,
    base_dir: &Path,
    session: &mut CompileSession<'_>,
) -> Result<SequenceOutput, ChirpError> {
    let elements = parse_sequence(document, name)?;
    let mut statements = CodeBlock::new();
    session.active.push(normalize_path(&base_dir.join(name)));
    let result = compile_elements(&elements, base_dir, name, session, &mut statements);
    session.active.pop();
    result?;
    Ok(SequenceOutput {
        statements,
        cancelled: session.cancelled,
    })
}

/// Emit `elements` into `out`.  Returns early, without error, once the run
/// is cancelled.
fn compile_elements(
    elements: &[ProgramElementRef],
    base_dir: &Path,
    sequence: &str,
    session: &mut CompileSession<'_>,
    out: &mut CodeBlock,
) -> Result<(), ChirpError> {
    for element in elements {
        if session.cancelled {
            return Ok(());
        }
        match &element.kind {
            ElementKind::Expression(r) => {
                compile_expression_ref(element, r, base_dir, sequence, session, out)?
            }
            ElementKind::Sequence(r) => {
                compile_sequence_ref(element, r, base_dir, sequence, session, out)?
            }
            ElementKind::CounterLoop(l) => {
                compile_counter_loop(element, l, base_dir, sequence, session, out)?
            }
            ElementKind::ConditionalLoop(c) => {
                compile_conditional(element, c, base_dir, sequence, session, out)?
            }
        }
    }
    Ok(())
}

fn compile_expression_ref(
    element: &ProgramElementRef,
    r: &ExpressionRef,
    base_dir: &Path,
    sequence: &str,
    session: &mut CompileSession<'_>,
    out: &mut CodeBlock,
) -> Result<(), ChirpError> {
    let call = match session.registry.get(&r.file) {
        Some(method) => method.call_statement(),
        None => {
            let path = session.expression_path(base_dir, &r.file);
            let Some(doc) = session.loader.load(&path)? else {
                session.missing(&r.file, sequence);
                return Ok(());
            };
            let expr = parse_expression(&doc, &r.file)?;
            compile_expression(&expr, &r.file, &mut session.registry)?.call_statement
        }
    };

    if let Some(comment) = &element.comment {
        out.push_comment(comment);
    }
    out.push(call);
    if r.delay_millis > 0 {
        out.push(board::delay_call(r.delay_millis));
    }
    Ok(())
}

fn compile_sequence_ref(
    element: &ProgramElementRef,
    r: &SequenceRef,
    base_dir: &Path,
    sequence: &str,
    session: &mut CompileSession<'_>,
    out: &mut CodeBlock,
) -> Result<(), ChirpError> {
    let path = normalize_path(&base_dir.join(&r.file));
    if session.active.contains(&path) {
        return Err(ChirpError::malformed(
            sequence,
            format!("sequence '{}' references itself", r.file),
        ));
    }
    let Some(doc) = session.loader.load(&path)? else {
        session.missing(&r.file, sequence);
        return Ok(());
    };
    debug!(file = %r.file, path = %path.display(), "inlining nested sequence");

    let nested_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let elements = parse_sequence(&doc, &r.file)?;
    let mut body = CodeBlock::new();
    session.active.push(path);
    let result = compile_elements(&elements, &nested_dir, &r.file, session, &mut body);
    session.active.pop();
    result?;
    if session.cancelled {
        return Ok(());
    }

    if let Some(comment) = &element.comment {
        out.push_comment(comment);
    }
    out.push(board::comment(&format!("Start Seq: {}", r.file)));
    out.append(body);
    out.push(board::comment(&format!("End Seq: {}", r.file)));
    Ok(())
}

fn compile_counter_loop(
    element: &ProgramElementRef,
    l: &CounterLoopRef,
    base_dir: &Path,
    sequence: &str,
    session: &mut CompileSession<'_>,
    out: &mut CodeBlock,
) -> Result<(), ChirpError> {
    let mut body = CodeBlock::new();
    compile_elements(&l.children, base_dir, sequence, session, &mut body)?;
    if session.cancelled {
        return Ok(());
    }

    if let Some(comment) = &element.comment {
        out.push_comment(comment);
    }
    out.push_braced(
        format!(
            "for (int counter = 0; counter < {}; counter++) {{",
            l.iterations
        ),
        body,
    );
    Ok(())
}

fn compile_conditional(
    element: &ProgramElementRef,
    c: &ConditionalLoopRef,
    base_dir: &Path,
    sequence: &str,
    session: &mut CompileSession<'_>,
    out: &mut CodeBlock,
) -> Result<(), ChirpError> {
    let condition = sensor_condition(&c.sensor).map_err(|e| e.in_sequence(sequence))?;

    let mut if_body = CodeBlock::new();
    compile_elements(&c.if_branch, base_dir, sequence, session, &mut if_body)?;
    let mut else_body = CodeBlock::new();
    compile_elements(&c.else_branch, base_dir, sequence, session, &mut else_body)?;
    if session.cancelled {
        return Ok(());
    }

    if let Some(comment) = &element.comment {
        out.push_comment(comment);
    }
    let shape = LoopShape::for_flags(c.if_repeats, c.else_repeats);
    out.append(shape_conditional(shape, &condition, if_body, else_body));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::InMemoryLoader;
    use crate::missing::ScriptedResponses;

    const LED: &str = r#"<expression><services>
        <service type="SimpleLEDService"><operation name="setIntensity">
          <device id="0"><parameter name="intensity">255</parameter></device>
        </operation></service></services></expression>"#;

    fn run(
        loader: &InMemoryLoader,
        root: &str,
        handler: &mut dyn MissingReferenceHandler,
    ) -> Result<(SequenceOutput, MethodRegistry), ChirpError> {
        let doc = loader.load(&Path::new("proj").join(root))?.expect("root exists");
        let mut session = CompileSession::new(loader, handler);
        let output = compile(&doc, root, Path::new("proj"), &mut session)?;
        Ok((output, session.into_registry()))
    }

    fn lines(output: &SequenceOutput) -> Vec<String> {
        output.statements.texts().map(str::to_string).collect()
    }

    #[test]
    fn expression_with_comment_and_delay() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><expression file="blink.xml" delay-millis="500">
                     <comment>flash once</comment></expression></sequence>"#,
            )
            .with("proj/blink.xml", LED);
        let (output, registry) = run(&loader, "root.xml", &mut Decision::Abort).unwrap();
        assert!(!output.cancelled);
        assert_eq!(lines(&output), vec!["// flash once", "blink();", "delay(500);"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn repeated_expression_is_compiled_once() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><expression file="blink.xml"/><expression file="BLINK.xml"/></sequence>"#,
            )
            .with("proj/blink.xml", LED);
        let (output, registry) = run(&loader, "root.xml", &mut Decision::Abort).unwrap();
        assert_eq!(lines(&output), vec!["blink();", "blink();"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn nested_sequence_resolves_relative_to_its_own_directory() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><saved-sequence file="moves/dance.xml"/></sequence>"#,
            )
            .with(
                "proj/moves/dance.xml",
                r#"<sequence><saved-sequence file="step.xml"/></sequence>"#,
            )
            .with(
                "proj/moves/step.xml",
                r#"<sequence><expression file="blink.xml"/></sequence>"#,
            )
            .with("proj/moves/blink.xml", LED);
        let (output, _) = run(&loader, "root.xml", &mut Decision::Abort).unwrap();
        assert_eq!(
            lines(&output),
            vec![
                "// Start Seq: moves/dance.xml",
                "// Start Seq: step.xml",
                "blink();",
                "// End Seq: step.xml",
                "// End Seq: moves/dance.xml",
            ]
        );
    }

    #[test]
    fn expressions_dir_overrides_relative_lookup() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><expression file="blink.xml"/></sequence>"#,
            )
            .with("shared/blink.xml", LED);
        let doc = loader.load(Path::new("proj/root.xml")).unwrap().unwrap();
        let mut handler = Decision::Abort;
        let mut session =
            CompileSession::new(&loader, &mut handler).with_expressions_dir("shared");
        let output = compile(&doc, "root.xml", Path::new("proj"), &mut session).unwrap();
        assert!(!output.cancelled);
        assert_eq!(lines(&output), vec!["blink();"]);
    }

    #[test]
    fn counter_loop_wraps_children() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><counter-loop iterations="3"><expression file="blink.xml"/></counter-loop></sequence>"#,
            )
            .with("proj/blink.xml", LED);
        let (output, _) = run(&loader, "root.xml", &mut Decision::Abort).unwrap();
        assert_eq!(
            output.statements.render(0),
            "for (int counter = 0; counter < 3; counter++) {\n   blink();\n}\n"
        );
    }

    #[test]
    fn missing_expression_can_be_skipped() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><expression file="gone.xml"/><expression file="blink.xml"/></sequence>"#,
            )
            .with("proj/blink.xml", LED);
        let mut script = ScriptedResponses::new([Decision::Continue], Decision::Abort);
        let (output, _) = run(&loader, "root.xml", &mut script).unwrap();
        assert!(!output.cancelled);
        assert_eq!(lines(&output), vec!["blink();"]);
        assert_eq!(
            script.asked(),
            &[("gone.xml".to_string(), "root.xml".to_string())]
        );
    }

    #[test]
    fn abort_three_levels_deep_cancels_every_frame() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence>
                     <expression file="blink.xml"/>
                     <saved-sequence file="a.xml"/>
                     <expression file="blink.xml"/>
                   </sequence>"#,
            )
            .with(
                "proj/a.xml",
                r#"<sequence><saved-sequence file="b.xml"/><expression file="blink.xml"/></sequence>"#,
            )
            .with(
                "proj/b.xml",
                r#"<sequence><saved-sequence file="missing.xml"/><expression file="blink.xml"/></sequence>"#,
            )
            .with("proj/blink.xml", LED);
        let mut script = ScriptedResponses::new([], Decision::Abort);
        let (output, registry) = run(&loader, "root.xml", &mut script).unwrap();
        assert!(output.cancelled);
        assert_eq!(lines(&output), vec!["blink();"]);
        assert_eq!(script.asked().len(), 1);
        assert_eq!(script.asked()[0], ("missing.xml".to_string(), "b.xml".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn conditional_branches_compile_through_the_driver() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><loopable-conditional>
                     <sensor type="light" device-id="0" threshold-percentage="50"/>
                     <if-branch should-repeat="true"><expression file="blink.xml"/></if-branch>
                     <else-branch><counter-loop iterations="2"><expression file="blink.xml"/></counter-loop></else-branch>
                   </loopable-conditional></sequence>"#,
            )
            .with("proj/blink.xml", LED);
        let (output, _) = run(&loader, "root.xml", &mut Decision::Abort).unwrap();
        assert_eq!(
            lines(&output),
            vec![
                "while (hummingbird.readSensorValue(1) < 511) {",
                "blink();",
                "}",
                "for (int counter = 0; counter < 2; counter++) {",
                "blink();",
                "}",
            ]
        );
    }

    #[test]
    fn unknown_sensor_names_the_sequence() {
        let loader = InMemoryLoader::new().with(
            "proj/root.xml",
            r#"<sequence><loopable-conditional>
                 <sensor type="sonar" threshold-percentage="50"/>
               </loopable-conditional></sequence>"#,
        );
        let err = run(&loader, "root.xml", &mut Decision::Abort).unwrap_err();
        assert_eq!(
            err,
            ChirpError::UnknownSensor {
                sensor: "sonar".to_string(),
                sequence: "root.xml".to_string()
            }
        );
    }

    #[test]
    fn document_text_stays_inside_comments() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence>
                     <saved-sequence file="sub.xml&#10;hummingbird.setMotor(1, 255);">
                       <comment>spin&#13;hummingbird.setMotor(2, 255);</comment>
                     </saved-sequence>
                   </sequence>"#,
            )
            .with("proj/sub.xml\nhummingbird.setMotor(1, 255);", "<sequence/>");
        let (output, _) = run(&loader, "root.xml", &mut Decision::Abort).unwrap();
        assert_eq!(
            lines(&output),
            vec![
                "// spin",
                "// hummingbird.setMotor(2, 255);",
                "// Start Seq: sub.xml hummingbird.setMotor(1, 255);",
                "// End Seq: sub.xml hummingbird.setMotor(1, 255);",
            ]
        );
        assert!(output.statements.render(0).lines().all(|l| l.starts_with("//")));
    }

    #[test]
    fn self_reference_is_rejected() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><saved-sequence file="loop.xml"/></sequence>"#,
            )
            .with(
                "proj/loop.xml",
                r#"<sequence><saved-sequence file="./loop.xml"/></sequence>"#,
            );
        let err = run(&loader, "root.xml", &mut Decision::Abort).unwrap_err();
        assert!(err.to_string().contains("references itself"));
    }

    #[test]
    fn malformed_nested_expression_is_fatal() {
        let loader = InMemoryLoader::new()
            .with(
                "proj/root.xml",
                r#"<sequence><expression file="bad.xml"/></sequence>"#,
            )
            .with("proj/bad.xml", "<expression><services>");
        let err = run(&loader, "root.xml", &mut Decision::Continue).unwrap_err();
        assert!(matches!(err, ChirpError::MalformedDocument { ref file, .. } if file == "bad.xml"));
    }
}
