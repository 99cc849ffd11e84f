//! Parsing of the `config` object of register/release/set/get requests.
//!
//! ```text
//! button: { id?, pin, direction: in|out|high|low, edge: none|rising|falling|both }
//! led:    { id?, pin, value? }
//! item:   { id?, file, options?, data? }
//! ```
//!
//! Pins and numbers are accepted as JSON numbers or numeric strings. The
//! default id is the pin number for buttons and LEDs and the sanitized file
//! name for items.

use hwbus_core::{DeviceId, DeviceKind, Error, NumberLike, PinDirection, PinEdge, Result, sanitize_driver_name};
use serde_json::Value;

use crate::descriptor::Driver;

/// A validated registration request.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceConfig {
    Button(PinConfig),
    Led(PinConfig),
    Item(ItemConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfig {
    pub id: DeviceId,
    pub pin: u32,
    pub direction: PinDirection,
    pub edge: PinEdge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemConfig {
    pub id: DeviceId,
    pub driver: Driver,
    /// Driver-specific options, `{}` when absent.
    pub options: Value,
}

impl DeviceConfig {
    /// Validate a registration `config` for `kind`.
    ///
    /// # Errors
    /// `ConfigError` for missing or malformed fields, `UnsupportedError` for
    /// an unknown driver.
    pub fn parse(kind: DeviceKind, config: &Value) -> Result<Self> {
        match kind {
            DeviceKind::Button => {
                let pin = required_pin(config, "Invalid button configuration")?;
                let direction = match string_field(config, "direction")? {
                    Some(direction) => direction.parse()?,
                    None => PinDirection::In,
                };
                let edge = match string_field(config, "edge")? {
                    Some(edge) => edge.parse()?,
                    None => PinEdge::Both,
                };
                Ok(Self::Button(PinConfig {
                    id: id_or(config, || pin.to_string())?,
                    pin,
                    direction,
                    edge,
                }))
            }
            DeviceKind::Led => {
                let pin = required_pin(config, "Invalid LED configuration")?;
                Ok(Self::Led(PinConfig {
                    id: id_or(config, || pin.to_string())?,
                    pin,
                    direction: PinDirection::Out,
                    edge: PinEdge::None,
                }))
            }
            DeviceKind::Item => {
                let file = required_file(config)?;
                let driver = file.parse::<Driver>()?;
                let options = match config.get("options") {
                    None | Some(Value::Null) => Value::Object(Default::default()),
                    Some(options @ Value::Object(_)) => options.clone(),
                    Some(_) => return Err(Error::wrong_data("'options' must be an object")),
                };
                Ok(Self::Item(ItemConfig {
                    id: id_or(config, || file.clone())?,
                    driver,
                    options,
                }))
            }
        }
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        match self {
            Self::Button(pin) | Self::Led(pin) => &pin.id,
            Self::Item(item) => &item.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Button(_) => DeviceKind::Button,
            Self::Led(_) => DeviceKind::Led,
            Self::Item(_) => DeviceKind::Item,
        }
    }
}

/// Identifier addressed by a release/set/get request.
///
/// An explicit `id` wins; otherwise the pin (buttons, LEDs) or the sanitized
/// file name (items) is used.
pub fn resolve_id(kind: DeviceKind, config: &Value) -> Result<DeviceId> {
    if let Some(id) = explicit_id(config)? {
        return Ok(id);
    }
    match kind {
        DeviceKind::Button | DeviceKind::Led => {
            let pin = optional_pin(config)?
                .ok_or_else(|| Error::missing_data("Required: 'id' or 'pin'"))?;
            DeviceId::new(pin.to_string())
        }
        DeviceKind::Item => DeviceId::new(required_file(config)?),
    }
}

/// Optional integer field; present-but-not-numeric is `WrongData`.
pub fn number_field(value: &Value, name: &str) -> Result<Option<i64>> {
    match value.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => serde_json::from_value::<NumberLike>(raw.clone())
            .ok()
            .and_then(|n| n.as_i64())
            .map(Some)
            .ok_or_else(|| Error::wrong_data(format!("'{name}' must be a number"))),
    }
}

/// Optional string field; present-but-not-a-string is `WrongData`.
pub fn string_field<'a>(value: &'a Value, name: &str) -> Result<Option<&'a str>> {
    match value.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(Error::wrong_data(format!("'{name}' must be a string"))),
    }
}

fn explicit_id(config: &Value) -> Result<Option<DeviceId>> {
    match config.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => DeviceId::new(s.as_str()).map(Some),
        Some(Value::Number(n)) => DeviceId::new(n.to_string()).map(Some),
        Some(_) => Err(Error::wrong_data("'id' must be a string")),
    }
}

fn id_or(config: &Value, default: impl FnOnce() -> String) -> Result<DeviceId> {
    match explicit_id(config)? {
        Some(id) => Ok(id),
        None => DeviceId::new(default()),
    }
}

fn optional_pin(config: &Value) -> Result<Option<u32>> {
    number_field(config, "pin")?
        .map(|pin| u32::try_from(pin).map_err(|_| Error::wrong_data(format!("Invalid pin {pin}"))))
        .transpose()
}

fn required_pin(config: &Value, context: &str) -> Result<u32> {
    optional_pin(config)?.ok_or_else(|| Error::missing_data(format!("{context}: 'pin' is required")))
}

fn required_file(config: &Value) -> Result<String> {
    let file = string_field(config, "file")?.ok_or_else(|| {
        Error::missing_data("Invalid item configuration, missing interface file name.")
    })?;
    sanitize_driver_name(file)
}
