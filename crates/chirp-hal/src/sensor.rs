//! Sensor catalog and threshold scaling.
//!
//! Conditionals store their decision boundary as a percentage of the
//! sensor's useful range.  Firmware compares raw readings, so the percentage
//! is mapped onto the sensor's native range before code is emitted.
//!
//! Ranges are recorded in the 8-bit units the desktop tools report and
//! converted to the controller's 10-bit analog domain with
//! `native = raw / 255 * 1023`, rounded toward zero.
//!
//! | sensor | raw range | inverted |
//! |---|---|---|
//! | `light` | 0 – 255 | no |
//! | `temperature` | 0 – 255 | no |
//! | `sound` | 0 – 255 | no |
//! | `potentiometer` | 0 – 255 | no |
//! | `distance` | 20 – 235 | yes |
//!
//! Distance readings grow as an obstacle gets *closer*, the opposite of what
//! the author means by "more distance", so both the operator and the value
//! are mirrored for that sensor.
//!
//! # Example
//!
//! ```
//! use chirp_hal::sensor::{threshold_value, Comparison};
//!
//! let t = threshold_value("light", 50, true).unwrap();
//! assert_eq!(t.comparison, Comparison::Less);
//! assert_eq!(t.value, 511);
//! ```

use std::fmt;

use chirp_types::ChirpError;

/// Upper bound of the 8-bit domain sensor ranges are written in.
pub const RAW_MAX: f64 = 255.0;
/// Upper bound of the controller's 10-bit analog domain.
pub const NATIVE_MAX: f64 = 1023.0;

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Native range and comparison direction of one sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorProfile {
    /// Canonical name used in documents.
    pub name: &'static str,
    /// Other spellings accepted for the same sensor.
    pub aliases: &'static [&'static str],
    pub raw_min: u8,
    pub raw_max: u8,
    /// Mirror operator and value (distance-type sensors).
    pub invert_comparison: bool,
}

/// Every sensor the Hummingbird can be asked to compare against.
pub const SENSOR_CATALOG: &[SensorProfile] = &[
    SensorProfile {
        name: "light",
        aliases: &[],
        raw_min: 0,
        raw_max: 255,
        invert_comparison: false,
    },
    SensorProfile {
        name: "temperature",
        aliases: &[],
        raw_min: 0,
        raw_max: 255,
        invert_comparison: false,
    },
    SensorProfile {
        name: "sound",
        aliases: &[],
        raw_min: 0,
        raw_max: 255,
        invert_comparison: false,
    },
    SensorProfile {
        name: "potentiometer",
        aliases: &["knob", "rotary"],
        raw_min: 0,
        raw_max: 255,
        invert_comparison: false,
    },
    SensorProfile {
        name: "distance",
        aliases: &["infrared"],
        raw_min: 20,
        raw_max: 235,
        invert_comparison: true,
    },
];

/// Look a sensor up by name or alias, ignoring case and surrounding space.
pub fn lookup(sensor_type: &str) -> Option<&'static SensorProfile> {
    let wanted = sensor_type.trim().to_ascii_lowercase();
    SENSOR_CATALOG
        .iter()
        .find(|p| p.name == wanted || p.aliases.contains(&wanted.as_str()))
}

/// Convert an 8-bit reading into the 10-bit domain, rounding toward zero.
pub fn to_native(raw: u8) -> i32 {
    (f64::from(raw) / RAW_MAX * NATIVE_MAX) as i32
}

impl SensorProfile {
    pub fn native_min(&self) -> i32 {
        to_native(self.raw_min)
    }

    pub fn native_max(&self) -> i32 {
        to_native(self.raw_max)
    }

    /// Threshold for this sensor at `percentage`.
    ///
    /// `branch_is_if` selects the if-branch reading; `false` yields the
    /// complementary reading used by else-branch loops.
    pub fn threshold(&self, percentage: i64, branch_is_if: bool) -> Threshold {
        let (min, max) = (self.native_min(), self.native_max());
        let mut value = value_from_percentage(percentage, min, max);
        let mut comparison = if branch_is_if {
            Comparison::Less
        } else {
            Comparison::Greater
        };
        if self.invert_comparison {
            comparison = comparison.flipped();
            value = max - value + min;
        }
        Threshold { value, comparison }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Thresholds
// ─────────────────────────────────────────────────────────────────────────────

/// Comparison operator used in the generated sensor expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Greater,
}

impl Comparison {
    pub fn flipped(self) -> Self {
        match self {
            Comparison::Less => Comparison::Greater,
            Comparison::Greater => Comparison::Less,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Less => write!(f, "<"),
            Comparison::Greater => write!(f, ">"),
        }
    }
}

/// A scaled comparison: `reading <comparison> value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    pub value: i32,
    pub comparison: Comparison,
}

/// Map `percentage` linearly into `[min, max]`.
///
/// The percentage is clamped to `[0, 100]` first; the result is rounded
/// toward zero and clamped back into range.
pub fn value_from_percentage(percentage: i64, min: i32, max: i32) -> i32 {
    let pct = percentage.clamp(0, 100) as f64;
    let span = f64::from(max) - f64::from(min);
    let value = (f64::from(min) + span * pct / 100.0) as i32;
    value.clamp(min.min(max), max.max(min))
}

/// Scale `percentage` for `sensor_type` and pick the comparison direction.
///
/// # Errors
///
/// Returns [`ChirpError::UnknownSensor`] when `sensor_type` is not in
/// [`SENSOR_CATALOG`].  The `sequence` field is left empty for the caller to
/// fill in with [`ChirpError::in_sequence`].
pub fn threshold_value(
    sensor_type: &str,
    percentage: i64,
    branch_is_if: bool,
) -> Result<Threshold, ChirpError> {
    lookup(sensor_type)
        .map(|profile| profile.threshold(percentage, branch_is_if))
        .ok_or_else(|| ChirpError::UnknownSensor {
            sensor: sensor_type.to_string(),
            sequence: String::new(),
        })
}
