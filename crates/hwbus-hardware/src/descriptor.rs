//! Static driver descriptors returned by `describe` and `itemRegister`.

use std::fmt;
use std::str::FromStr;

use hwbus_core::{Error, Result, sanitize_driver_name};
use hwbus_protocol::{MAX_LEDS, RingState};
use serde::Serialize;
use serde_json::{Value, json};

/// Driver-backed item types, selected by the sanitized `file` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    /// WS281X or APA102 strip on any SPI bus.
    SpiRgbLeds,
    /// APA102 LEDs on a microphone HAT.
    MicHatLeds,
    /// USB microphone array LED ring.
    UsbPixelRing,
}

impl Driver {
    pub const ALL: [Driver; 3] = [Self::SpiRgbLeds, Self::MicHatLeds, Self::UsbPixelRing];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SpiRgbLeds => "spi-rgb-leds",
            Self::MicHatLeds => "mic-hat-leds",
            Self::UsbPixelRing => "usb-pixel-ring",
        }
    }

    /// Resolve a raw `file` value: sanitize, then match a known driver.
    ///
    /// # Errors
    /// `ConfigError` when nothing usable remains, `UnsupportedError` for an
    /// unknown driver.
    pub fn from_file(file: &str) -> Result<Self> {
        sanitize_driver_name(file)?.parse()
    }

    #[must_use]
    pub fn descriptor(self) -> DriverDescriptor {
        match self {
            Self::SpiRgbLeds => DriverDescriptor {
                kind: "ledArray",
                options: vec![
                    FieldSchema::number("numOfLeds").min(1).max(MAX_LEDS as i64),
                    FieldSchema::string("ledType").values([json!("ws281x"), json!("apa102")]),
                    FieldSchema::number("spiBus").values([json!(0), json!(1)]),
                    FieldSchema::number("spiDevice").values([json!(0), json!(1)]),
                ],
                write_interface: strip_write_interface(),
                info: "Interface to control RGB LEDs via SPI. Supported types WS281X and APA102.",
            },
            Self::MicHatLeds => DriverDescriptor {
                kind: "ledArray",
                options: vec![
                    FieldSchema::string("model").values(
                        ["2mic", "4mic", "6mic", "4micL"].map(Value::from),
                    ),
                    FieldSchema::number("numOfLeds").min(0).max(MAX_LEDS as i64),
                ],
                write_interface: strip_write_interface(),
                info: "APA102 LEDs of ReSpeaker-style microphone HATs.",
            },
            Self::UsbPixelRing => DriverDescriptor {
                kind: "ledArrayUsb",
                options: vec![
                    FieldSchema::string("mode").values([json!("sepia"), json!("seeed")]),
                    FieldSchema::number("brightness").min(1).max(31),
                ],
                write_interface: vec![
                    FieldSchema::string("state")
                        .values(RingState::ALL.map(|s| Value::from(s.as_str()))),
                    FieldSchema::array("rgb0Array"),
                ],
                info: "ReSpeaker Mic Array v2.0 USB LED interface.",
            },
        }
    }
}

fn strip_write_interface() -> Vec<FieldSchema> {
    vec![
        FieldSchema::number("ledIndex").min(1),
        FieldSchema::number("red").min(0).max(255),
        FieldSchema::number("green").min(0).max(255),
        FieldSchema::number("blue").min(0).max(255),
        FieldSchema::string("hex"),
    ]
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|driver| driver.as_str() == s)
            .ok_or_else(|| Error::unsupported(format!("driver '{s}'")))
    }
}

/// Options, write fields and a human-readable summary of a driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDescriptor {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub options: Vec<FieldSchema>,
    pub write_interface: Vec<FieldSchema>,
    pub info: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number,
    String,
    Array,
}

/// One accepted field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

impl FieldSchema {
    fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            min: None,
            max: None,
            values: None,
        }
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn array(name: &'static str) -> Self {
        Self::new(name, FieldType::Array)
    }

    #[must_use]
    pub fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn values(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.values = Some(values.into_iter().collect());
        self
    }
}
