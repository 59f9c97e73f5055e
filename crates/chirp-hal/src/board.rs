//! Fixed facts about the Hummingbird Arduino library the generated sketch
//! links against.

/// `#include` line opening every sketch.
pub const LIBRARY_INCLUDE: &str = "#include <Hummingbird.h>";

/// Library class of the global device handle.
pub const DEVICE_CLASS: &str = "Hummingbird";

/// Name of the global device handle.
pub const DEVICE_HANDLE: &str = "hummingbird";

/// Global handle declaration, e.g. `Hummingbird hummingbird;`.
pub fn device_declaration() -> String {
    format!("{DEVICE_CLASS} {DEVICE_HANDLE};")
}

/// Statement run once from `setup()`.
pub fn init_call() -> String {
    format!("{DEVICE_HANDLE}.init();")
}

/// Expression reading the analog sensor on `port` (1-based).
pub fn sensor_read(port: u8) -> String {
    format!("{DEVICE_HANDLE}.readSensorValue({port})")
}

/// Blocking pause of `millis` milliseconds.
pub fn delay_call(millis: u32) -> String {
    format!("delay({millis});")
}

/// One `//` comment line carrying `text`.
///
/// Control characters (line breaks included) become spaces and trailing
/// backslashes are dropped, so the comment never continues onto the next
/// line of the sketch.
pub fn comment(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let flat = flat
        .trim_start()
        .trim_end_matches(|c: char| c == '\\' || c.is_whitespace());
    if flat.is_empty() {
        "//".to_string()
    } else {
        format!("// {flat}")
    }
}
