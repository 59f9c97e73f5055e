//! `chirp-types` – shared data model for the Chirp behaviour compiler.
//!
//! Every other crate in the workspace speaks in these types: the parsed
//! shape of sequence and expression documents, the host's answer when a
//! referenced document is missing, and the single [`ChirpError`] type that
//! compilation failures are reported through.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Sequence elements
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of a sequence's ordered element list.
///
/// `position` is the element's ordinal inside its parent list; compilers emit
/// elements strictly in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramElementRef {
    pub position: usize,
    /// Free-form note the author attached to the element, emitted as a
    /// `//` comment ahead of the generated statement.
    pub comment: Option<String>,
    pub kind: ElementKind,
}

/// The four kinds of element a sequence may contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum ElementKind {
    /// Reference to an atomic expression document.
    Expression(ExpressionRef),
    /// Reference to another saved sequence document.
    Sequence(SequenceRef),
    /// Fixed-count repeat block.
    CounterLoop(CounterLoopRef),
    /// Sensor-gated if/else block whose branches may repeat.
    ConditionalLoop(ConditionalLoopRef),
}

/// An expression reference: the file holding the expression plus the pause
/// to insert after it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionRef {
    pub file: String,
    pub delay_millis: u32,
}

/// A nested sequence reference, resolved relative to the directory of the
/// document that contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRef {
    pub file: String,
}

/// A block repeated a fixed number of times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterLoopRef {
    /// Always at least 1; parsers reject zero.
    pub iterations: u32,
    pub children: Vec<ProgramElementRef>,
}

/// A loopable conditional.
///
/// The sensor decides which branch runs; a branch whose repeat flag is set
/// keeps running for as long as the sensor stays on its side of the
/// threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalLoopRef {
    pub sensor: SensorSpec,
    pub if_repeats: bool,
    pub else_repeats: bool,
    pub if_branch: Vec<ProgramElementRef>,
    pub else_branch: Vec<ProgramElementRef>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SensorSpec
// ─────────────────────────────────────────────────────────────────────────────

/// Which sensor a conditional reads and where its decision boundary lies.
///
/// The threshold percentage is clamped to `[0, 100]` on construction, both
/// through [`SensorSpec::new`] and through deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SensorSpecRepr")]
pub struct SensorSpec {
    sensor_type: String,
    port: u8,
    threshold_percentage: u8,
}

#[derive(Deserialize)]
struct SensorSpecRepr {
    sensor_type: String,
    port: u8,
    threshold_percentage: i64,
}

impl From<SensorSpecRepr> for SensorSpec {
    fn from(repr: SensorSpecRepr) -> Self {
        SensorSpec::new(repr.sensor_type, repr.port, repr.threshold_percentage)
    }
}

impl SensorSpec {
    /// Build a spec for the sensor on `port` (1-based), clamping
    /// `threshold_percentage` into `[0, 100]`.
    pub fn new(sensor_type: impl Into<String>, port: u8, threshold_percentage: i64) -> Self {
        Self {
            sensor_type: sensor_type.into(),
            port,
            threshold_percentage: threshold_percentage.clamp(0, 100) as u8,
        }
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    /// 1-based sensor port on the controller.
    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn threshold_percentage(&self) -> u8 {
        self.threshold_percentage
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Expression documents
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed content of one expression document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionDocument {
    /// Device commands in document order.
    pub commands: Vec<DeviceCommand>,
    /// Pause appended after the commands, in milliseconds. `0` means none.
    pub delay_millis: u32,
}

/// A single (service, operation, device, parameters) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    /// Service type as written in the document, e.g.
    /// `"::TeRK::motor::VelocityControllableMotorService"`.
    pub service_type: String,
    pub operation: String,
    /// 0-based device index.
    pub device_id: u32,
    /// Parameters in document order.
    pub parameters: Vec<Parameter>,
}

/// A named operation parameter. Values stay textual until the device-call
/// catalog interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl DeviceCommand {
    /// Return the value of the first parameter whose name starts with
    /// `prefix` (case-insensitive).
    pub fn parameter_with_prefix(&self, prefix: &str) -> Option<&str> {
        let prefix = prefix.to_ascii_lowercase();
        self.parameters
            .iter()
            .find(|p| p.name.to_ascii_lowercase().starts_with(&prefix))
            .map(|p| p.value.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host decisions
// ─────────────────────────────────────────────────────────────────────────────

/// The host's answer when a referenced document cannot be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Skip the missing element and keep compiling.
    Continue,
    /// Cancel the whole compilation; no output may be kept.
    Abort,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Every way a compilation run can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChirpError {
    #[error("Missing reference: '{file}' referenced from '{enclosing}' does not exist")]
    MissingReference { file: String, enclosing: String },

    #[error("Unknown sensor type '{sensor}' in sequence '{sequence}'")]
    UnknownSensor { sensor: String, sequence: String },

    #[error("Malformed document '{file}': {details}")]
    MalformedDocument { file: String, details: String },

    #[error("I/O error on {path}: {details}")]
    Io { path: String, details: String },
}

impl ChirpError {
    /// Shorthand for [`ChirpError::MalformedDocument`].
    pub fn malformed(file: impl Into<String>, details: impl Into<String>) -> Self {
        ChirpError::MalformedDocument {
            file: file.into(),
            details: details.into(),
        }
    }

    /// Shorthand for [`ChirpError::Io`].
    pub fn io(path: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        ChirpError::Io {
            path: path.to_string(),
            details: err.to_string(),
        }
    }

    /// Fill in the enclosing sequence of an [`ChirpError::UnknownSensor`]
    /// raised below the sequence compiler. Other variants pass through.
    pub fn in_sequence(self, name: &str) -> Self {
        match self {
            ChirpError::UnknownSensor { sensor, .. } => ChirpError::UnknownSensor {
                sensor,
                sequence: name.to_string(),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_spec_clamps_threshold() {
        assert_eq!(SensorSpec::new("light", 1, 150).threshold_percentage(), 100);
        assert_eq!(SensorSpec::new("light", 1, -20).threshold_percentage(), 0);
        assert_eq!(SensorSpec::new("light", 1, 42).threshold_percentage(), 42);
    }

    #[test]
    fn sensor_spec_deserialization_clamps_threshold() {
        let json = r#"{"sensor_type":"distance","port":2,"threshold_percentage":250}"#;
        let spec: SensorSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.threshold_percentage(), 100);
        assert_eq!(spec.sensor_type(), "distance");
        assert_eq!(spec.port(), 2);
    }

    #[test]
    fn element_tree_serialization_roundtrip() {
        let element = ProgramElementRef {
            position: 0,
            comment: Some("spin twice".to_string()),
            kind: ElementKind::CounterLoop(CounterLoopRef {
                iterations: 2,
                children: vec![ProgramElementRef {
                    position: 0,
                    comment: None,
                    kind: ElementKind::Expression(ExpressionRef {
                        file: "spin.xml".to_string(),
                        delay_millis: 250,
                    }),
                }],
            }),
        };
        let json = serde_json::to_string(&element).unwrap();
        let back: ProgramElementRef = serde_json::from_str(&json).unwrap();
        assert_eq!(element, back);
    }

    #[test]
    fn parameter_lookup_by_prefix_is_case_insensitive() {
        let cmd = DeviceCommand {
            service_type: "FullColorLEDService".to_string(),
            operation: "setColor".to_string(),
            device_id: 0,
            parameters: vec![
                Parameter { name: "Red".to_string(), value: "10".to_string() },
                Parameter { name: "green".to_string(), value: "20".to_string() },
            ],
        };
        assert_eq!(cmd.parameter_with_prefix("r"), Some("10"));
        assert_eq!(cmd.parameter_with_prefix("G"), Some("20"));
        assert_eq!(cmd.parameter_with_prefix("b"), None);
    }

    #[test]
    fn decision_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Decision::Abort).unwrap(), "\"abort\"");
    }

    #[test]
    fn chirp_error_display() {
        let err = ChirpError::MissingReference {
            file: "wave.xml".to_string(),
            enclosing: "dance.xml".to_string(),
        };
        assert!(err.to_string().contains("wave.xml"));
        assert!(err.to_string().contains("dance.xml"));

        let err = ChirpError::UnknownSensor {
            sensor: "sonar".to_string(),
            sequence: "patrol.xml".to_string(),
        };
        assert!(err.to_string().contains("sonar"));

        let err = err.in_sequence("guard.xml");
        assert!(err.to_string().contains("guard.xml"));
    }
}
