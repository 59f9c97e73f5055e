//! `chirp-hal` – Hummingbird hardware knowledge.
//!
//! Everything the compiler needs to know about the target board lives here,
//! so code generation never hard-codes library names or sensor ranges.
//!
//! # Modules
//!
//! - [`board`] – library include, global device handle, `init`, sensor read
//!   and delay snippets.
//! - [`sensor`] – the sensor catalog and
//!   [`threshold_value`][sensor::threshold_value], which turns a threshold
//!   percentage into a native comparison value and operator.
//! - [`service`] – the device-call catalog: [`render_call`][service::render_call]
//!   turns one expression device command into a library call.

pub mod board;
pub mod sensor;
pub mod service;

pub use sensor::{Comparison, SensorProfile, Threshold, SENSOR_CATALOG, threshold_value};
pub use service::{DeviceCall, ServiceKind, render_call};
