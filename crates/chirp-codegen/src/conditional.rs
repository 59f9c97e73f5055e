//! Control-flow synthesis for loopable conditionals.
//!
//! The two repeat flags select one of four shapes, each the cheapest native
//! construct with the right re-evaluation behaviour:
//!
//! | if repeats | else repeats | shape |
//! |---|---|---|
//! | no  | no  | `if (E_if) { if } else { else }` |
//! | no  | yes | `while (E_else) { else }` then `if` once |
//! | yes | no  | `while (E_if) { if }` then `else` once |
//! | yes | yes | `while (true) { if (E_if) { if } else { else } }` |
//!
//! `E_if` is the if-branch reading of the sensor threshold and `E_else` its
//! complement (see [`chirp_hal::sensor`]).

use chirp_hal::{board, sensor};
use chirp_types::{ChirpError, SensorSpec};

use crate::code::CodeBlock;

/// Which control structure a conditional compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopShape {
    /// Neither branch repeats.
    IfElse,
    /// Only the else-branch repeats; the if-branch runs once on exit.
    WhileElseThenIf,
    /// Only the if-branch repeats; the else-branch runs once on exit.
    WhileIfThenElse,
    /// Both branches repeat, forever.
    ForeverIfElse,
}

impl LoopShape {
    pub fn for_flags(if_repeats: bool, else_repeats: bool) -> Self {
        match (if_repeats, else_repeats) {
            (false, false) => LoopShape::IfElse,
            (false, true) => LoopShape::WhileElseThenIf,
            (true, false) => LoopShape::WhileIfThenElse,
            (true, true) => LoopShape::ForeverIfElse,
        }
    }
}

/// Both readings of a conditional's sensor threshold, as C expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorCondition {
    pub if_expr: String,
    pub else_expr: String,
}

/// Build the sensor expressions for `spec`.
///
/// # Errors
///
/// [`ChirpError::UnknownSensor`] (with an empty sequence name) when the
/// sensor type is not in the catalog.
pub fn sensor_condition(spec: &SensorSpec) -> Result<SensorCondition, ChirpError> {
    let pct = i64::from(spec.threshold_percentage());
    let read = board::sensor_read(spec.port());
    let if_t = sensor::threshold_value(spec.sensor_type(), pct, true)?;
    let else_t = sensor::threshold_value(spec.sensor_type(), pct, false)?;
    Ok(SensorCondition {
        if_expr: format!("{read} {} {}", if_t.comparison, if_t.value),
        else_expr: format!("{read} {} {}", else_t.comparison, else_t.value),
    })
}

/// Wrap the compiled branch bodies in the control structure for `shape`.
pub fn shape_conditional(
    shape: LoopShape,
    condition: &SensorCondition,
    if_body: CodeBlock,
    else_body: CodeBlock,
) -> CodeBlock {
    let mut out = CodeBlock::new();
    match shape {
        LoopShape::IfElse => {
            out.push_braced(format!("if ({}) {{", condition.if_expr), if_body);
            out.push_braced("else {", else_body);
        }
        LoopShape::WhileElseThenIf => {
            out.push_braced(format!("while ({}) {{", condition.else_expr), else_body);
            out.append(if_body);
        }
        LoopShape::WhileIfThenElse => {
            out.push_braced(format!("while ({}) {{", condition.if_expr), if_body);
            out.append(else_body);
        }
        LoopShape::ForeverIfElse => {
            let mut inner = CodeBlock::new();
            inner.push_braced(format!("if ({}) {{", condition.if_expr), if_body);
            inner.push_braced("else {", else_body);
            out.push_braced("while (true) {", inner);
        }
    }
    out
}
