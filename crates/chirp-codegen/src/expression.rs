//! Expression compilation – one expression document to one subroutine.
//!
//! Each device command is rendered through the device-call catalog in
//! `chirp-hal`; a declared delay closes the body.  The resulting body is
//! registered under the expression's file name so repeated references share
//! one subroutine.

use chirp_hal::board;
use chirp_hal::service::render_call;
use chirp_types::{ChirpError, ExpressionDocument};

use crate::method_registry::MethodRegistry;

/// Output of [`compile_expression`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    /// Name of the registered subroutine.
    pub method_name: String,
    /// `name();`, ready to place in a caller.
    pub call_statement: String,
    /// Statements of the subroutine body.
    pub body: Vec<String>,
}

/// Statements an expression expands to, in document order.
///
/// # Errors
///
/// [`ChirpError::MalformedDocument`] when a device command cannot be
/// rendered.
pub fn expression_body(expr: &ExpressionDocument, file: &str) -> Result<Vec<String>, ChirpError> {
    let mut body = expr
        .commands
        .iter()
        .map(|cmd| render_call(cmd, file).map(|call| call.line().to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    if expr.delay_millis > 0 {
        body.push(board::delay_call(expr.delay_millis));
    }
    Ok(body)
}

/// Compile `expr` (read from `file`) and register it in `registry`.
///
/// When `file` is already registered the existing subroutine is kept and
/// its call statement returned.
///
/// # Errors
///
/// See [`expression_body`].
pub fn compile_expression(
    expr: &ExpressionDocument,
    file: &str,
    registry: &mut MethodRegistry,
) -> Result<CompiledExpression, ChirpError> {
    let body = expression_body(expr, file)?;
    let method = registry.register(file, body);
    Ok(CompiledExpression {
        method_name: method.name.clone(),
        call_statement: method.call_statement(),
        body: method.body.clone(),
    })
}
