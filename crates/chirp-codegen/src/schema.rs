//! Mapping from document trees to the typed model in `chirp-types`.
//!
//! Only what code generation needs is read.  Unknown elements inside a
//! sequence are skipped with a warning rather than rejected, so documents
//! written by newer editors still compile.
//!
//! Sequence documents:
//!
//! ```xml
//! <sequence>
//!   <expression file="blink.xml" delay-millis="500"><comment>…</comment></expression>
//!   <saved-sequence file="dance.xml"/>
//!   <counter-loop iterations="3">…</counter-loop>
//!   <loopable-conditional>
//!     <sensor type="light" device-id="0" threshold-percentage="50"/>
//!     <if-branch should-repeat="false">…</if-branch>
//!     <else-branch should-repeat="true">…</else-branch>
//!   </loopable-conditional>
//! </sequence>
//! ```
//!
//! Expression documents:
//!
//! ```xml
//! <expression delay-millis="0">
//!   <services>
//!     <service type="::TeRK::motor::VelocityControllableMotorService">
//!       <operation name="setVelocity">
//!         <device id="0"><parameter name="velocity">255</parameter></device>
//!       </operation>
//!     </service>
//!   </services>
//! </expression>
//! ```

use std::str::FromStr;

use chirp_types::{
    ChirpError, ConditionalLoopRef, CounterLoopRef, DeviceCommand, ElementKind,
    ExpressionDocument, ExpressionRef, Parameter, ProgramElementRef, SensorSpec, SequenceRef,
};
use tracing::warn;

use crate::document::DocumentNode;

pub const SEQUENCE_ROOT: &str = "sequence";
pub const EXPRESSION_ROOT: &str = "expression";

// ─────────────────────────────────────────────────────────────────────────────
// Sequences
// ─────────────────────────────────────────────────────────────────────────────

/// Read the ordered element list of a sequence document.
///
/// # Errors
///
/// [`ChirpError::MalformedDocument`] when the root is not `<sequence>`, a
/// required attribute is missing, or a number does not parse.
pub fn parse_sequence(root: &DocumentNode, file: &str) -> Result<Vec<ProgramElementRef>, ChirpError> {
    if root.name() != SEQUENCE_ROOT {
        return Err(ChirpError::malformed(
            file,
            format!("expected <{SEQUENCE_ROOT}> root, found <{}>", root.name()),
        ));
    }
    parse_elements(root, file)
}

fn parse_elements(parent: &DocumentNode, file: &str) -> Result<Vec<ProgramElementRef>, ChirpError> {
    let mut elements = Vec::new();
    for node in parent.children() {
        let kind = match node.name() {
            "expression" => ElementKind::Expression(ExpressionRef {
                file: required(node, "file", file)?.to_string(),
                delay_millis: optional_number(node, "delay-millis", file)?.unwrap_or(0),
            }),
            "saved-sequence" => ElementKind::Sequence(SequenceRef {
                file: required(node, "file", file)?.to_string(),
            }),
            "counter-loop" => {
                let iterations: u32 = number(node, "iterations", file)?;
                if iterations == 0 {
                    return Err(ChirpError::malformed(
                        file,
                        "counter-loop iterations must be at least 1",
                    ));
                }
                ElementKind::CounterLoop(CounterLoopRef {
                    iterations,
                    children: parse_elements(node, file)?,
                })
            }
            "loopable-conditional" => ElementKind::ConditionalLoop(parse_conditional(node, file)?),
            "comment" => continue,
            other => {
                warn!(element = other, file, "skipping unrecognised sequence element");
                continue;
            }
        };
        elements.push(ProgramElementRef {
            position: elements.len(),
            comment: node
                .text_at("comment")
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            kind,
        });
    }
    Ok(elements)
}

fn parse_conditional(node: &DocumentNode, file: &str) -> Result<ConditionalLoopRef, ChirpError> {
    let sensor_node = node
        .child("sensor")
        .ok_or_else(|| ChirpError::malformed(file, "loopable-conditional has no <sensor>"))?;
    let device_id: u8 = optional_number(sensor_node, "device-id", file)?.unwrap_or(0);
    let port = device_id
        .checked_add(1)
        .ok_or_else(|| ChirpError::malformed(file, "sensor device-id out of range"))?;
    let sensor = SensorSpec::new(
        required(sensor_node, "type", file)?,
        port,
        number::<i64>(sensor_node, "threshold-percentage", file)?,
    );

    let branch = |name: &str| -> Result<(bool, Vec<ProgramElementRef>), ChirpError> {
        match node.child(name) {
            Some(b) => Ok((
                optional_flag(b, "should-repeat", file)?.unwrap_or(false),
                parse_elements(b, file)?,
            )),
            None => Ok((false, Vec::new())),
        }
    };
    let (if_repeats, if_branch) = branch("if-branch")?;
    let (else_repeats, else_branch) = branch("else-branch")?;

    Ok(ConditionalLoopRef {
        sensor,
        if_repeats,
        else_repeats,
        if_branch,
        else_branch,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────────────

/// Read an expression document into its device commands.
///
/// # Errors
///
/// [`ChirpError::MalformedDocument`] when the root is not `<expression>`,
/// a device has no numeric `id`, or a parameter has no `name`.
pub fn parse_expression(root: &DocumentNode, file: &str) -> Result<ExpressionDocument, ChirpError> {
    if root.name() != EXPRESSION_ROOT {
        return Err(ChirpError::malformed(
            file,
            format!("expected <{EXPRESSION_ROOT}> root, found <{}>", root.name()),
        ));
    }

    let mut commands = Vec::new();
    for service in root
        .child("services")
        .into_iter()
        .flat_map(|s| s.children_named("service"))
    {
        let service_type = required(service, "type", file)?;
        for operation in service.children_named("operation") {
            let operation_name = required(operation, "name", file)?;
            for device in operation.children_named("device") {
                let parameters = device
                    .children_named("parameter")
                    .map(|p| -> Result<Parameter, ChirpError> {
                        Ok(Parameter {
                            name: required(p, "name", file)?.to_string(),
                            value: parameter_value(p).to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                commands.push(DeviceCommand {
                    service_type: service_type.to_string(),
                    operation: operation_name.to_string(),
                    device_id: number(device, "id", file)?,
                    parameters,
                });
            }
        }
    }

    Ok(ExpressionDocument {
        commands,
        delay_millis: optional_number(root, "delay-millis", file)?.unwrap_or(0),
    })
}

/// Parameter values are either the element text or a nested `<value>`.
fn parameter_value(node: &DocumentNode) -> &str {
    match node.text() {
        "" => node.text_at("value").unwrap_or_default(),
        text => text,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Attribute helpers
// ─────────────────────────────────────────────────────────────────────────────

fn required<'a>(node: &'a DocumentNode, attr: &str, file: &str) -> Result<&'a str, ChirpError> {
    node.attribute(attr).ok_or_else(|| {
        ChirpError::malformed(file, format!("<{}> is missing attribute '{attr}'", node.name()))
    })
}

fn number<T: FromStr>(node: &DocumentNode, attr: &str, file: &str) -> Result<T, ChirpError> {
    optional_number(node, attr, file)?.ok_or_else(|| {
        ChirpError::malformed(file, format!("<{}> is missing attribute '{attr}'", node.name()))
    })
}

fn optional_number<T: FromStr>(
    node: &DocumentNode,
    attr: &str,
    file: &str,
) -> Result<Option<T>, ChirpError> {
    node.attribute(attr)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                ChirpError::malformed(
                    file,
                    format!("<{}> attribute '{attr}' has invalid value '{raw}'", node.name()),
                )
            })
        })
        .transpose()
}

fn optional_flag(node: &DocumentNode, attr: &str, file: &str) -> Result<Option<bool>, ChirpError> {
    node.attribute(attr)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(ChirpError::malformed(
                file,
                format!("<{}> attribute '{attr}' is not a boolean: '{raw}'", node.name()),
            )),
        })
        .transpose()
}
