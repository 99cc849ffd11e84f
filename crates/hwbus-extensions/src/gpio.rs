//! GPIO interface extension.
//!
//! Accepts `{action, type, config}` requests and drives buttons, LEDs and
//! driver-backed items through a [`DeviceRegistry`]. Every request that
//! parses is answered with `"sent"`; the outcome follows as an event inside
//! `data.gpio`:
//!
//! | request              | success event                       | unknown id      |
//! |----------------------|-------------------------------------|-----------------|
//! | button register      | `buttonRegister {id, pin}`          |                 |
//! | button release       | `buttonRelease {id, pin}`           | `buttonNotFound`|
//! | button get           | `buttonGet {id, value}`             | 404 error       |
//! | led register         | `ledRegister {id, pin}`             |                 |
//! | led release          | `ledRelease {id, pin}`              | `ledNotFound`   |
//! | led set / get        | `ledSet {id, set}` / `ledGet {id, value}` | 404 error |
//! | item register        | `itemRegister {id, file, description}` |              |
//! | item release         | `itemRelease {id}`                  | `itemNotFound`  |
//! | item set / get       | `itemSet {id, result}` / `itemGet {id, data}` | 404 error |
//! | item describe        | `itemDescription {file, description}` |               |
//! | all get / release    | `allGet {devices}` / `allRelease {released}` |          |
//!
//! Button edges are emitted as `button {id, pin, value}`. Events carry the
//! request's `msgId` when it had one.
//!
//! Requests are submitted to the registry before `input` returns, so
//! operations on one device apply in the order they arrived.

use futures::future::join_all;
use hwbus_core::constants::{RESPONSE_INVALID, RESPONSE_SENT};
use hwbus_core::{Action, DeviceId, DeviceKind, Error, ErrorPayload, Message, MsgId, RequestTarget};
use hwbus_hardware::config::{DeviceConfig, number_field, resolve_id, string_field};
use hwbus_hardware::platform::Platform;
use hwbus_hardware::{DeviceEvent, DeviceRegistry, Driver, Pending};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::extension::{Extension, ExtensionCallbacks, GPIO_INTERFACE, ReleaseTask};

/// A parsed GPIO request.
#[derive(Debug, Clone)]
struct Request {
    action: Action,
    target: RequestTarget,
    config: Value,
    msg_id: Option<MsgId>,
}

impl Request {
    fn parse(message: &Message) -> Option<Self> {
        let data = message.data.as_object()?;
        let action: Action = serde_json::from_value(data.get("action")?.clone()).ok()?;
        let target: RequestTarget = serde_json::from_value(data.get("type")?.clone()).ok()?;
        let accepted = match (target, action) {
            (RequestTarget::All, action) => matches!(action, Action::Get | Action::Release),
            (RequestTarget::Item, Action::Describe) => true,
            (_, Action::Describe) => false,
            _ => true,
        };
        if !accepted {
            return None;
        }
        let config = match data.get("config") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(config) => config.clone(),
        };
        Some(Self {
            action,
            target,
            config,
            msg_id: message.id.clone(),
        })
    }
}

/// GPIO interface over a device registry.
#[derive(Debug, Clone)]
pub struct GpioInterface {
    registry: DeviceRegistry,
    callbacks: ExtensionCallbacks,
}

impl GpioInterface {
    /// Create the interface and start forwarding button edges.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(callbacks: ExtensionCallbacks, platform: Platform) -> Self {
        let (registry, events) = DeviceRegistry::new(platform);
        tokio::spawn(forward_device_events(events, callbacks.clone()));
        callbacks.on_start(json!({ "msg": "GPIO interface initialized." }));
        Self {
            registry,
            callbacks,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    fn dispatch(&self, request: Request) {
        debug!(
            action = %request.action,
            target = request.target.as_str(),
            msg_id = ?request.msg_id,
            "GPIO request"
        );
        match (request.target.kind(), request.action) {
            (None, Action::Get) => self.list_all(&request),
            (None, _) => self.release_all(request),
            (Some(kind), Action::Register) => self.register(request, kind),
            (Some(kind), Action::Release) => self.release_one(request, kind),
            (Some(kind), Action::Set) => self.set(request, kind),
            (Some(kind), Action::Get) => self.get(request, kind),
            (Some(_), Action::Describe) => self.describe(&request),
        }
    }

    fn register(&self, request: Request, kind: DeviceKind) {
        let config = match DeviceConfig::parse(kind, &request.config) {
            Ok(config) => config,
            Err(e) => return self.fail(&request, None, &e),
        };
        let id = config.id().clone();
        info!(id = %id, kind = %kind, "Registering device");
        let pending = match self.registry.register(config) {
            Ok(pending) => pending,
            Err(e) => return self.fail(&request, Some(&id), &e),
        };

        self.complete(request, id, pending, move |info| {
            let mut fields = json!({ "id": info.id });
            if let Some(pin) = info.pin {
                fields["pin"] = json!(pin);
            }
            if let Some(file) = info.driver {
                fields["file"] = json!(file);
                if let Ok(driver) = file.parse::<Driver>() {
                    fields["description"] = json!(driver.descriptor());
                }
            }
            (format!("{kind}Register"), fields)
        });
    }

    fn release_one(&self, request: Request, kind: DeviceKind) {
        let id = match resolve_id(kind, &request.config) {
            Ok(id) => id,
            Err(e) => return self.fail(&request, None, &e),
        };
        let pin = self
            .registry
            .get(&id)
            .and_then(|info| info.pin)
            .or_else(|| requested_pin(&request.config));
        let fields = with_pin(json!({ "id": id }), pin);

        match self.registry.release(kind, &id) {
            None => {
                debug!(id = %id, kind = %kind, "Release of unknown device");
                self.emit(&format!("{kind}NotFound"), request.msg_id.as_ref(), fields);
            }
            Some(pending) => {
                info!(id = %id, kind = %kind, "Releasing device");
                self.complete(request, id, pending, move |()| (format!("{kind}Release"), fields));
            }
        }
    }

    fn set(&self, request: Request, kind: DeviceKind) {
        let data = match kind {
            DeviceKind::Item => match request.config.get("data") {
                Some(data) if !data.is_null() => data.clone(),
                _ => {
                    let e = Error::missing_data("Invalid or missing item data for 'set' action.");
                    return self.fail(&request, None, &e);
                }
            },
            // Pin devices take their value straight from the config.
            DeviceKind::Button | DeviceKind::Led => request.config.clone(),
        };
        let id = match resolve_id(kind, &request.config) {
            Ok(id) => id,
            Err(e) => return self.fail(&request, None, &e),
        };
        let pending = match self.registry.submit_write(kind, &id, data) {
            Ok(pending) => pending,
            Err(e) => return self.fail(&request, Some(&id), &e),
        };

        self.complete(request, id.clone(), pending, move |result| match kind {
            DeviceKind::Item => ("itemSet".to_string(), json!({ "id": id, "result": result })),
            _ => (
                format!("{kind}Set"),
                json!({ "id": id, "set": result.get("value").cloned().unwrap_or(Value::Null) }),
            ),
        });
    }

    fn get(&self, request: Request, kind: DeviceKind) {
        let id = match resolve_id(kind, &request.config) {
            Ok(id) => id,
            Err(e) => return self.fail(&request, None, &e),
        };
        let options = match request.config.get("options") {
            Some(options @ Value::Object(_)) => options.clone(),
            _ => Value::Object(Map::new()),
        };
        let pending = match self.registry.submit_read(kind, &id, options) {
            Ok(pending) => pending,
            Err(e) => return self.fail(&request, Some(&id), &e),
        };

        self.complete(request, id.clone(), pending, move |data| match kind {
            DeviceKind::Item => ("itemGet".to_string(), json!({ "id": id, "data": data })),
            _ => (
                format!("{kind}Get"),
                json!({ "id": id, "value": data.get("value").cloned().unwrap_or(Value::Null) }),
            ),
        });
    }

    fn describe(&self, request: &Request) {
        let driver = string_field(&request.config, "file").and_then(|file| {
            file.ok_or_else(|| Error::missing_data("Invalid item configuration, missing interface file name."))
                .and_then(Driver::from_file)
        });
        match driver {
            Ok(driver) => self.emit(
                "itemDescription",
                request.msg_id.as_ref(),
                json!({ "file": driver.as_str(), "description": driver.descriptor() }),
            ),
            Err(e) => self.fail(request, None, &e),
        }
    }

    fn list_all(&self, request: &Request) {
        let devices = self.registry.list();
        self.emit("allGet", request.msg_id.as_ref(), json!({ "devices": devices }));
    }

    fn release_all(&self, request: Request) {
        let pending = self.registry.release_all();
        info!(count = pending.len(), "Releasing all devices");
        let this = self.clone();
        tokio::spawn(async move {
            let results = join_all(
                pending
                    .into_iter()
                    .map(|(id, fut)| async move { (id, fut.await) }),
            )
            .await;
            let mut released = 0usize;
            for (id, result) in results {
                match result {
                    Ok(()) => released += 1,
                    Err(e) => this.fail(&request, Some(&id), &e),
                }
            }
            this.emit("allRelease", request.msg_id.as_ref(), json!({ "released": released }));
        });
    }

    /// Await `pending` in the background and emit its outcome.
    fn complete<T, F>(&self, request: Request, id: DeviceId, pending: Pending<T>, on_ok: F)
    where
        T: Send + 'static,
        F: FnOnce(T) -> (String, Value) + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            match pending.await {
                Ok(value) => {
                    let (event, fields) = on_ok(value);
                    this.emit(&event, request.msg_id.as_ref(), fields);
                }
                Err(e) => this.fail(&request, Some(&id), &e),
            }
        });
    }

    fn emit(&self, event: &str, msg_id: Option<&MsgId>, fields: Value) {
        self.callbacks
            .on_event(json!({ "gpio": gpio_event(event, msg_id, fields) }));
    }

    fn fail(&self, request: &Request, id: Option<&DeviceId>, error: &Error) {
        warn!(
            action = %request.action,
            id = id.map(DeviceId::as_str),
            error = %error,
            "GPIO request failed"
        );
        let mut payload = ErrorPayload::from(error)
            .with_msg_id(request.msg_id.clone())
            .with_action(request.action.as_str());
        if let Some(id) = id {
            payload = payload.with_item_id(id.as_str());
        }
        self.callbacks.on_error(payload);
    }
}

impl Extension for GpioInterface {
    fn name(&self) -> &str {
        GPIO_INTERFACE
    }

    fn input(&self, message: &Message) -> Value {
        match Request::parse(message) {
            Some(request) => {
                self.dispatch(request);
                json!(RESPONSE_SENT)
            }
            None => json!(RESPONSE_INVALID),
        }
    }

    fn release(&self) -> Vec<ReleaseTask> {
        self.registry
            .release_all()
            .into_iter()
            .map(|(id, future)| ReleaseTask {
                label: id.to_string(),
                future,
            })
            .collect()
    }
}

/// Build the `data.gpio` object of an event.
fn gpio_event(event: &str, msg_id: Option<&MsgId>, fields: Value) -> Value {
    let mut object = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    object.insert("type".to_string(), Value::from(event));
    if let Some(msg_id) = msg_id {
        object.insert("msgId".to_string(), msg_id.clone());
    }
    Value::Object(object)
}

fn with_pin(mut fields: Value, pin: Option<u32>) -> Value {
    if let Some(pin) = pin {
        fields["pin"] = json!(pin);
    }
    fields
}

fn requested_pin(config: &Value) -> Option<u32> {
    number_field(config, "pin")
        .ok()
        .flatten()
        .and_then(|pin| u32::try_from(pin).ok())
}

async fn forward_device_events(mut events: mpsc::UnboundedReceiver<DeviceEvent>, callbacks: ExtensionCallbacks) {
    while let Some(event) = events.recv().await {
        match event {
            DeviceEvent::Edge { id, pin, value } => {
                callbacks.on_event(json!({
                    "gpio": { "type": "button", "id": id, "pin": pin, "value": value }
                }));
            }
            DeviceEvent::WatchFailed { id, error } => {
                let payload = ErrorPayload::from(&Error::transfer(error)).with_item_id(id.as_str());
                callbacks.on_error(payload);
            }
            _ => {}
        }
    }
    debug!("Device event stream closed");
}
