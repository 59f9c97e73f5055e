//! Device-call catalog – maps expression device commands onto Hummingbird
//! library calls.
//!
//! Expression documents name their hardware by service type, e.g.
//! `::TeRK::motor::VelocityControllableMotorService`.  Only the last `::`
//! segment matters here and it is matched case-insensitively.
//!
//! | service | call | value range |
//! |---|---|---|
//! | `FullColorLEDService` | `setTriColorLED(port, r, g, b)` | 0 – 255 each |
//! | `SimpleLEDService` / `LEDService` | `setLED(port, v)` | 0 – 255 |
//! | `VelocityControllableMotorService` / `MotorService` | `setMotor(port, v)` | −255 – 255 |
//! | `SimpleServoService` / `ServoService` | `setServo(port, deg)` | 0 – 255 → 0 – 180° |
//! | `VibrationMotorService` / `VibrationService` | `setVibration(port, v)` | 0 – 255 |
//!
//! Anything else (audio, speech, …) only exists on the desktop and is
//! reported as [`DeviceCall::Unsupported`].

use chirp_types::{ChirpError, DeviceCommand};
use tracing::warn;

use crate::board::{self, DEVICE_HANDLE};

/// The hardware families the firmware library can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    TriColorLed,
    Led,
    Motor,
    Servo,
    Vibration,
}

impl ServiceKind {
    /// Classify a document service type.  Returns `None` for services with
    /// no firmware counterpart.
    pub fn from_service_type(service_type: &str) -> Option<Self> {
        let short = service_type
            .rsplit("::")
            .next()
            .unwrap_or(service_type)
            .trim()
            .to_ascii_lowercase();
        match short.as_str() {
            "fullcolorledservice" => Some(ServiceKind::TriColorLed),
            "simpleledservice" | "ledservice" => Some(ServiceKind::Led),
            "velocitycontrollablemotorservice" | "motorservice" => Some(ServiceKind::Motor),
            "simpleservoservice" | "servoservice" => Some(ServiceKind::Servo),
            "vibrationmotorservice" | "vibrationservice" => Some(ServiceKind::Vibration),
            _ => None,
        }
    }
}

/// Result of translating one [`DeviceCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// A complete library call statement.
    Supported(String),
    /// A comment explaining why nothing was emitted.
    Unsupported(String),
}

impl DeviceCall {
    /// The line to place in the generated code.
    pub fn line(&self) -> &str {
        match self {
            DeviceCall::Supported(s) | DeviceCall::Unsupported(s) => s,
        }
    }
}

/// Translate `cmd` into a library call.
///
/// `file` names the expression document and is only used in error reports.
///
/// # Errors
///
/// Returns [`ChirpError::MalformedDocument`] when a supported service is
/// missing a parameter or a parameter is not an integer.
pub fn render_call(cmd: &DeviceCommand, file: &str) -> Result<DeviceCall, ChirpError> {
    let Some(kind) = ServiceKind::from_service_type(&cmd.service_type) else {
        warn!(
            service = %cmd.service_type,
            operation = %cmd.operation,
            file,
            "service has no firmware counterpart; skipping"
        );
        return Ok(DeviceCall::Unsupported(board::comment(&format!(
            "{}.{} is not available on the Hummingbird",
            short_name(&cmd.service_type),
            cmd.operation
        ))));
    };

    let port = cmd.device_id.checked_add(1).ok_or_else(|| {
        ChirpError::malformed(
            file,
            format!("device id {} is out of range", cmd.device_id),
        )
    })?;
    let call = match kind {
        ServiceKind::TriColorLed => {
            let r = param(cmd, "r", file)?.clamp(0, 255);
            let g = param(cmd, "g", file)?.clamp(0, 255);
            let b = param(cmd, "b", file)?.clamp(0, 255);
            format!("{DEVICE_HANDLE}.setTriColorLED({port}, {r}, {g}, {b});")
        }
        ServiceKind::Led => {
            let v = first_param(cmd, file)?.clamp(0, 255);
            format!("{DEVICE_HANDLE}.setLED({port}, {v});")
        }
        ServiceKind::Motor => {
            let v = first_param(cmd, file)?.clamp(-255, 255);
            format!("{DEVICE_HANDLE}.setMotor({port}, {v});")
        }
        ServiceKind::Servo => {
            let raw = first_param(cmd, file)?.clamp(0, 255);
            let degrees = raw * 180 / 255;
            format!("{DEVICE_HANDLE}.setServo({port}, {degrees});")
        }
        ServiceKind::Vibration => {
            let v = first_param(cmd, file)?.clamp(0, 255);
            format!("{DEVICE_HANDLE}.setVibration({port}, {v});")
        }
    };
    Ok(DeviceCall::Supported(call))
}

// Internal helpers.

fn short_name(service_type: &str) -> &str {
    service_type.rsplit("::").next().unwrap_or(service_type)
}

fn param(cmd: &DeviceCommand, prefix: &str, file: &str) -> Result<i64, ChirpError> {
    let raw = cmd.parameter_with_prefix(prefix).ok_or_else(|| {
        ChirpError::malformed(
            file,
            format!(
                "{}.{} on device {} has no '{prefix}…' parameter",
                short_name(&cmd.service_type),
                cmd.operation,
                cmd.device_id
            ),
        )
    })?;
    parse_int(raw, file)
}

fn first_param(cmd: &DeviceCommand, file: &str) -> Result<i64, ChirpError> {
    let raw = cmd.parameters.first().map(|p| p.value.as_str()).ok_or_else(|| {
        ChirpError::malformed(
            file,
            format!(
                "{}.{} on device {} has no parameters",
                short_name(&cmd.service_type),
                cmd.operation,
                cmd.device_id
            ),
        )
    })?;
    parse_int(raw, file)
}

fn parse_int(raw: &str, file: &str) -> Result<i64, ChirpError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ChirpError::malformed(file, format!("parameter value '{raw}' is not an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_types::Parameter;

    fn command(service: &str, device_id: u32, params: &[(&str, &str)]) -> DeviceCommand {
        DeviceCommand {
            service_type: service.to_string(),
            operation: "op".to_string(),
            device_id,
            parameters: params
                .iter()
                .map(|(n, v)| Parameter {
                    name: n.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn classifies_by_last_segment() {
        assert_eq!(
            ServiceKind::from_service_type("::TeRK::led::FullColorLEDService"),
            Some(ServiceKind::TriColorLed)
        );
        assert_eq!(
            ServiceKind::from_service_type("motorservice"),
            Some(ServiceKind::Motor)
        );
        assert_eq!(ServiceKind::from_service_type("::TeRK::audio::AudioService"), None);
    }

    #[test]
    fn tri_color_led_combines_three_parameters() {
        let cmd = command(
            "::TeRK::led::FullColorLEDService",
            1,
            &[("blue", "30"), ("red", "255"), ("green", "0")],
        );
        assert_eq!(
            render_call(&cmd, "rgb.xml").unwrap(),
            DeviceCall::Supported("hummingbird.setTriColorLED(2, 255, 0, 30);".to_string())
        );
    }

    #[test]
    fn tri_color_led_missing_channel_is_malformed() {
        let cmd = command("FullColorLEDService", 0, &[("red", "1"), ("green", "2")]);
        assert!(matches!(
            render_call(&cmd, "rgb.xml"),
            Err(ChirpError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn motor_is_clamped() {
        let cmd = command("VelocityControllableMotorService", 0, &[("velocity", "-900")]);
        assert_eq!(
            render_call(&cmd, "m.xml").unwrap().line(),
            "hummingbird.setMotor(1, -255);"
        );
    }

    #[test]
    fn servo_is_scaled_to_degrees() {
        let cmd = command("SimpleServoService", 3, &[("position", "255")]);
        assert_eq!(
            render_call(&cmd, "s.xml").unwrap().line(),
            "hummingbird.setServo(4, 180);"
        );
        let cmd = command("SimpleServoService", 0, &[("position", "128")]);
        assert_eq!(
            render_call(&cmd, "s.xml").unwrap().line(),
            "hummingbird.setServo(1, 90);"
        );
    }

    #[test]
    fn led_and_vibration() {
        let led = command("SimpleLEDService", 0, &[("intensity", "200")]);
        assert_eq!(render_call(&led, "l.xml").unwrap().line(), "hummingbird.setLED(1, 200);");
        let vib = command("VibrationMotorService", 1, &[("speed", "80")]);
        assert_eq!(
            render_call(&vib, "v.xml").unwrap().line(),
            "hummingbird.setVibration(2, 80);"
        );
    }

    #[test]
    fn non_numeric_value_is_malformed() {
        let cmd = command("MotorService", 0, &[("velocity", "fast")]);
        assert!(matches!(
            render_call(&cmd, "m.xml"),
            Err(ChirpError::MalformedDocument { ref file, .. }) if file == "m.xml"
        ));
    }

    #[test]
    fn desktop_only_service_becomes_comment() {
        let cmd = command("::TeRK::speech::TextToSpeechService", 0, &[("text", "hi")]);
        let call = render_call(&cmd, "talk.xml").unwrap();
        assert!(matches!(call, DeviceCall::Unsupported(_)));
        assert!(call.line().starts_with("// TextToSpeechService.op"));
    }

    #[test]
    fn operation_name_cannot_break_out_of_comment() {
        let mut cmd = command("::TeRK::audio::AudioService", 0, &[]);
        cmd.operation = "play\nhummingbird.setMotor(1, 255);".to_string();
        let call = render_call(&cmd, "sneaky.xml").unwrap();
        assert!(!call.line().contains('\n'));
        assert_eq!(
            call.line(),
            "// AudioService.play hummingbird.setMotor(1, 255); is not available on the Hummingbird"
        );
    }

    #[test]
    fn largest_device_id_is_malformed() {
        let cmd = command("SimpleLEDService", u32::MAX, &[("intensity", "1")]);
        assert!(matches!(
            render_call(&cmd, "far.xml"),
            Err(ChirpError::MalformedDocument { ref file, ref details })
                if file == "far.xml" && details.contains("out of range")
        ));
    }
}
