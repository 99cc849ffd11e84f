use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identifier of a live device (caller-chosen or derived from the hardware address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device ID.
    ///
    /// # Errors
    /// Returns a config error if the ID is empty after trimming.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(Error::config("Device id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceId::new(s)
    }
}

/// Peripheral class of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// GPIO input pin.
    Button,
    /// GPIO output pin.
    Led,
    /// Driver-backed peripheral (LED strip, LED ring).
    Item,
}

impl DeviceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Led => "led",
            Self::Item => "item",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `data.type` of a GPIO request: one device class or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestTarget {
    Button,
    Led,
    Item,
    All,
}

impl RequestTarget {
    #[must_use]
    pub fn kind(&self) -> Option<DeviceKind> {
        match self {
            Self::Button => Some(DeviceKind::Button),
            Self::Led => Some(DeviceKind::Led),
            Self::Item => Some(DeviceKind::Item),
            Self::All => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Led => "led",
            Self::Item => "item",
            Self::All => "all",
        }
    }
}

/// The `data.action` of a GPIO request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Register,
    Release,
    Set,
    Get,
    Describe,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Release => "release",
            Self::Set => "set",
            Self::Get => "get",
            Self::Describe => "describe",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPIO pin direction. `High` and `Low` are outputs with an initial level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    #[default]
    In,
    Out,
    High,
    Low,
}

impl PinDirection {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::High => "high",
            Self::Low => "low",
        }
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        !matches!(self, Self::In)
    }
}

impl FromStr for PinDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            other => Err(Error::wrong_data(format!(
                "direction must be one of in, out, high, low; got '{other}'"
            ))),
        }
    }
}

/// GPIO interrupt edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinEdge {
    None,
    Rising,
    Falling,
    #[default]
    Both,
}

impl PinEdge {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Both => "both",
        }
    }

    /// Whether a transition to `value` should be reported for this edge setting.
    #[must_use]
    pub fn accepts(&self, value: u8) -> bool {
        match self {
            Self::None => false,
            Self::Rising => value != 0,
            Self::Falling => value == 0,
            Self::Both => true,
        }
    }
}

impl FromStr for PinEdge {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "rising" => Ok(Self::Rising),
            "falling" => Ok(Self::Falling),
            "both" => Ok(Self::Both),
            other => Err(Error::wrong_data(format!(
                "edge must be one of none, rising, falling, both; got '{other}'"
            ))),
        }
    }
}

/// A JSON value that callers may send either as a number or as a numeric string.
///
/// ```
/// use hwbus_core::NumberLike;
///
/// let n: NumberLike = serde_json::from_str("\"17\"").unwrap();
/// assert_eq!(n.as_i64(), Some(17));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberLike {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl NumberLike {
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Self::Float(_) => None,
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Reduce a driver file name to `[A-Za-z0-9_-]`, cut at the first dot.
///
/// # Errors
/// Returns a config error when nothing usable remains.
///
/// ```
/// use hwbus_core::sanitize_driver_name;
///
/// assert_eq!(sanitize_driver_name("spi-rgb-leds.js").unwrap(), "spi-rgb-leds");
/// assert!(sanitize_driver_name("../..").is_err());
/// ```
pub fn sanitize_driver_name(file: &str) -> Result<String> {
    let stem = file.split('.').next().unwrap_or_default();
    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return Err(Error::config(
            "Invalid item configuration, invalid file name.",
        ));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_device_id_trims_and_rejects_empty() {
        assert_eq!(DeviceId::new(" strip ").unwrap().as_str(), "strip");
        assert!(DeviceId::new("   ").is_err());
    }

    #[rstest]
    #[case("in", PinDirection::In)]
    #[case("out", PinDirection::Out)]
    #[case("high", PinDirection::High)]
    #[case("low", PinDirection::Low)]
    fn test_direction_parse(#[case] input: &str, #[case] expected: PinDirection) {
        assert_eq!(input.parse::<PinDirection>().unwrap(), expected);
    }

    #[test]
    fn test_direction_rejects_unknown() {
        let err = "sideways".parse::<PinDirection>().unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[rstest]
    #[case(PinEdge::None, 1, false)]
    #[case(PinEdge::Rising, 1, true)]
    #[case(PinEdge::Rising, 0, false)]
    #[case(PinEdge::Falling, 0, true)]
    #[case(PinEdge::Both, 0, true)]
    fn test_edge_accepts(#[case] edge: PinEdge, #[case] value: u8, #[case] expected: bool) {
        assert_eq!(edge.accepts(value), expected);
    }

    #[rstest]
    #[case("12", Some(12))]
    #[case("12.0", Some(12))]
    #[case("3.5", None)]
    #[case("\"7\"", Some(7))]
    #[case("\"x\"", None)]
    #[case("true", Some(1))]
    fn test_number_like(#[case] json: &str, #[case] expected: Option<i64>) {
        let value: NumberLike = serde_json::from_str(json).unwrap();
        assert_eq!(value.as_i64(), expected);
    }

    #[rstest]
    #[case("usb-pixel-ring", "usb-pixel-ring")]
    #[case("mic_hat.rs", "mic_hat")]
    #[case("sp i/rgb", "spirgb")]
    fn test_sanitize_driver_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_driver_name(input).unwrap(), expected);
    }

    #[test]
    fn test_sanitize_driver_name_rejects_empty() {
        assert!(sanitize_driver_name(".hidden").is_err());
        assert!(sanitize_driver_name("").is_err());
    }
}
