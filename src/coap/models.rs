use std::fmt;

use serde::Deserialize;

/// Resource polled by the collector.
pub const STATUS_PATH: &str = "status";
/// Resource the console writes brightness commands to.
pub const BRIGHTNESS_PATH: &str = "actuators/brightness";

// ---------------------------------------------------------------------------
// Status: GET /status
//
// The dongle firmware answers with a flat JSON object:
//   {"lux_perceived": 372, "lux_desired": 572, "brightness_percent": 20}
// All three fields are required integers; anything else is a decode error.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StatusPayload {
    /// Ambient light measured at the desk, in lux.
    pub lux_perceived: i32,
    /// Target illuminance derived from the brightness setpoint, in lux.
    pub lux_desired: i32,
    pub brightness_percent: i32,
}

impl StatusPayload {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ---------------------------------------------------------------------------
// Brightness: PUT /actuators/brightness
// ---------------------------------------------------------------------------

/// Brightness percentage accepted by the actuator resource (0..=100).
///
/// Only the levels the console sends can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brightness(u8);

impl Brightness {
    pub const OFF: Brightness = Brightness(0);
    /// Level used by the console's `allon` command.
    pub const ON: Brightness = Brightness(20);

    pub fn percent(self) -> u8 {
        self.0
    }

    /// The request body: the percentage as a decimal string.
    pub fn to_payload(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }
}

// ---------------------------------------------------------------------------
// ResponseCode
// ---------------------------------------------------------------------------

/// Raw CoAP code byte, printed in the usual `c.dd` form (e.g. `2.04`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCode(pub u8);

impl ResponseCode {
    pub fn class(self) -> u8 {
        self.0 >> 5
    }

    pub fn detail(self) -> u8 {
        self.0 & 0x1f
    }

    pub fn is_success(self) -> bool {
        self.class() == 2
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_payload_parses_firmware_output() {
        let p = StatusPayload::from_slice(
            br#"{"lux_perceived": 372, "lux_desired": 572, "brightness_percent": 20}"#,
        )
        .unwrap();
        assert_eq!(p.lux_perceived, 372);
        assert_eq!(p.lux_desired, 572);
        assert_eq!(p.brightness_percent, 20);
    }

    #[test]
    fn status_payload_missing_brightness_errors() {
        let err = StatusPayload::from_slice(br#"{"lux_perceived": 372, "lux_desired": 572}"#)
            .unwrap_err();
        assert!(err.to_string().contains("brightness_percent"));
    }

    #[test]
    fn status_payload_mistyped_field_errors() {
        assert!(StatusPayload::from_slice(
            br#"{"lux_perceived": "bright", "lux_desired": 572, "brightness_percent": 20}"#
        )
        .is_err());
    }

    #[test]
    fn status_payload_not_json_errors() {
        assert!(StatusPayload::from_slice(b"lux=372&des_lux=572").is_err());
    }

    #[test]
    fn brightness_levels() {
        assert_eq!(Brightness::OFF.percent(), 0);
        assert_eq!(Brightness::ON.percent(), 20);
    }

    #[test]
    fn brightness_payload_is_decimal_string() {
        assert_eq!(Brightness::ON.to_payload(), b"20".to_vec());
        assert_eq!(Brightness::OFF.to_payload(), b"0".to_vec());
    }

    #[test]
    fn response_code_display() {
        // 2.04 Changed = 0b010_00100
        assert_eq!(ResponseCode(0x44).to_string(), "2.04");
        assert!(ResponseCode(0x44).is_success());
        // 4.04 Not Found
        assert_eq!(ResponseCode(0x84).to_string(), "4.04");
        assert!(!ResponseCode(0x84).is_success());
    }
}
