//! Live device registry.
//!
//! Every registered device is owned by its own worker task. Requests reach
//! the worker through an unbounded FIFO queue, so operations on one device
//! run one at a time in submission order while different devices proceed
//! independently.
//!
//! ```text
//!  register/write/read/release          per-device worker
//! ┌──────────────────┐   Op queue   ┌──────────────────────┐
//! │  DeviceRegistry  │─────────────►│ init → ops → release │
//! │  (id → slot map) │              │ select! { op, edge } │
//! └──────────────────┘              └──────────┬───────────┘
//!                                              │ DeviceEvent
//!                                              ▼
//!                                       event receiver
//! ```
//!
//! Identifier uniqueness is checked synchronously under the slot lock, so of
//! two concurrent registrations of the same id exactly one proceeds and the
//! other gets `ConflictError` without touching hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use hwbus_core::{DeviceId, DeviceKind, Error, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::devices::AnyDevice;
use crate::platform::Platform;
use crate::traits::Device;

/// Completion of a queued operation.
pub type Pending<T> = BoxFuture<'static, Result<T>>;

/// Summary of a live device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub kind: DeviceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<u32>,
    /// Driver name for items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<&'static str>,
    pub registered_at: DateTime<Utc>,
}

/// Unsolicited device activity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceEvent {
    /// A button changed level.
    Edge { id: DeviceId, pin: u32, value: u8 },
    /// Edge watching stopped after a pin error.
    WatchFailed { id: DeviceId, error: String },
}

enum Op {
    Write {
        data: Value,
        reply: oneshot::Sender<Result<Value>>,
    },
    Read {
        options: Value,
        reply: oneshot::Sender<Result<Value>>,
    },
    Release {
        reply: oneshot::Sender<Result<()>>,
    },
}

struct Slot {
    info: DeviceInfo,
    generation: u64,
    ops: mpsc::UnboundedSender<Op>,
    releasing: bool,
}

struct Inner {
    platform: Platform,
    slots: Mutex<HashMap<DeviceId, Slot>>,
    generations: AtomicU64,
    events: mpsc::UnboundedSender<DeviceEvent>,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<DeviceId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the slot of `id` if it still belongs to `generation`.
    fn remove(&self, id: &DeviceId, generation: u64) {
        let mut slots = self.slots();
        if slots.get(id).is_some_and(|slot| slot.generation == generation) {
            slots.remove(id);
        }
    }
}

/// Owns every live device. Cheap to clone.
#[derive(Clone)]
pub struct DeviceRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("platform", &self.inner.platform.kind())
            .field("devices", &self.len())
            .finish()
    }
}

impl DeviceRegistry {
    /// Create a registry and the receiver of its device events.
    pub fn new(platform: Platform) -> (Self, mpsc::UnboundedReceiver<DeviceEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let registry = Self {
            inner: Arc::new(Inner {
                platform,
                slots: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
                events,
            }),
        };
        (registry, events_rx)
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.inner.platform
    }

    /// Claim the id of `config` and start initializing the device.
    ///
    /// The claim is immediate: a later `register` of the same id fails with
    /// `ConflictError` even while this one is still initializing. If `init`
    /// fails the claim is dropped again.
    ///
    /// # Errors
    /// `ConflictError` for a live id, driver option errors from the config.
    pub fn register(&self, config: DeviceConfig) -> Result<Pending<DeviceInfo>> {
        let id = config.id().clone();
        let kind = config.kind();
        let driver = match &config {
            DeviceConfig::Item(item) => Some(item.driver.as_str()),
            _ => None,
        };

        let mut slots = self.inner.slots();
        if slots.contains_key(&id) {
            return Err(Error::conflict(id.as_str()));
        }
        let device = AnyDevice::build(config, self.inner.platform.clone())?;

        let info = DeviceInfo {
            id: id.clone(),
            kind,
            pin: device.pin_number(),
            driver,
            registered_at: Utc::now(),
        };
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        let (ops, ops_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        slots.insert(
            id.clone(),
            Slot {
                info: info.clone(),
                generation,
                ops,
                releasing: false,
            },
        );
        drop(slots);

        debug!(id = %id, kind = %kind, "Device registration started");
        tokio::spawn(run_worker(
            Arc::clone(&self.inner),
            Worker {
                id: id.clone(),
                generation,
                device,
                ops: ops_rx,
            },
            info,
            ready_tx,
        ));

        Ok(reply(id, ready_rx))
    }

    /// Queue a `writeData` on the device `id` of `kind`.
    ///
    /// # Errors
    /// `NotFoundError` when no such device is live, `NotReadyError` while it
    /// is being released.
    pub fn submit_write(&self, kind: DeviceKind, id: &DeviceId, data: Value) -> Result<Pending<Value>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(kind, id, Op::Write { data, reply: reply_tx })?;
        Ok(reply(id.clone(), reply_rx))
    }

    /// Queue a `readData` on the device `id` of `kind`.
    ///
    /// # Errors
    /// Same as [`DeviceRegistry::submit_write`].
    pub fn submit_read(&self, kind: DeviceKind, id: &DeviceId, options: Value) -> Result<Pending<Value>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(kind, id, Op::Read { options, reply: reply_tx })?;
        Ok(reply(id.clone(), reply_rx))
    }

    /// Queue a release. `None` when nothing of `kind` is registered as `id`.
    ///
    /// Operations queued before the release still run first; anything
    /// submitted afterwards is rejected.
    pub fn release(&self, kind: DeviceKind, id: &DeviceId) -> Option<Pending<()>> {
        let mut slots = self.inner.slots();
        let slot = slots.get_mut(id).filter(|slot| slot.info.kind == kind)?;
        slot.releasing = true;

        let (reply_tx, reply_rx) = oneshot::channel();
        if slot.ops.send(Op::Release { reply: reply_tx }).is_err() {
            // Worker already gone.
            return Some(futures::future::ready(Ok(())).boxed());
        }
        Some(reply(id.clone(), reply_rx))
    }

    /// Queue a release of every live device.
    pub fn release_all(&self) -> Vec<(DeviceId, Pending<()>)> {
        let live: Vec<(DeviceId, DeviceKind)> = self
            .inner
            .slots()
            .values()
            .map(|slot| (slot.info.id.clone(), slot.info.kind))
            .collect();
        live.into_iter()
            .filter_map(|(id, kind)| self.release(kind, &id).map(|pending| (id, pending)))
            .collect()
    }

    /// Live devices sorted by id.
    #[must_use]
    pub fn list(&self) -> Vec<DeviceInfo> {
        let mut infos: Vec<DeviceInfo> =
            self.inner.slots().values().map(|slot| slot.info.clone()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    #[must_use]
    pub fn get(&self, id: &DeviceId) -> Option<DeviceInfo> {
        self.inner.slots().get(id).map(|slot| slot.info.clone())
    }

    #[must_use]
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.inner.slots().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn enqueue(&self, kind: DeviceKind, id: &DeviceId, op: Op) -> Result<()> {
        let slots = self.inner.slots();
        let slot = slots
            .get(id)
            .filter(|slot| slot.info.kind == kind)
            .ok_or_else(|| Error::not_found(id.as_str()))?;
        if slot.releasing {
            return Err(Error::not_ready(id.as_str()));
        }
        slot.ops
            .send(op)
            .map_err(|_| Error::not_ready(id.as_str()))
    }
}

/// Await a worker reply. A dropped sender means the device went away.
fn reply<T: Send + 'static>(id: DeviceId, rx: oneshot::Receiver<Result<T>>) -> Pending<T> {
    async move { rx.await.unwrap_or_else(|_| Err(Error::not_ready(id.as_str()))) }.boxed()
}

/// Frees the slot of a worker however the worker ends, unwinding included.
struct SlotGuard {
    inner: Arc<Inner>,
    id: DeviceId,
    generation: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.remove(&self.id, self.generation);
    }
}

struct Worker {
    id: DeviceId,
    generation: u64,
    device: AnyDevice,
    ops: mpsc::UnboundedReceiver<Op>,
}

enum Wake {
    Op(Option<Op>),
    Edge(crate::error::Result<u8>),
}

async fn run_worker(
    inner: Arc<Inner>,
    mut worker: Worker,
    info: DeviceInfo,
    ready: oneshot::Sender<Result<DeviceInfo>>,
) {
    let id = worker.id.clone();
    let _slot = SlotGuard {
        inner: Arc::clone(&inner),
        id: id.clone(),
        generation: worker.generation,
    };

    if let Err(e) = worker.device.init().await {
        warn!(id = %id, error = %e, "Device init failed");
        inner.remove(&id, worker.generation);
        let _ = ready.send(Err(e));
        drain(&id, &mut worker.ops);
        return;
    }
    info!(id = %id, kind = %info.kind, "Device registered");
    let pin = info.pin.unwrap_or_default();
    let _ = ready.send(Ok(info));

    let mut watch_edges = worker.device.kind() == DeviceKind::Button;
    loop {
        let wake = tokio::select! {
            op = worker.ops.recv() => Wake::Op(op),
            edge = worker.device.next_edge(), if watch_edges => Wake::Edge(edge),
        };

        match wake {
            Wake::Edge(Ok(value)) => {
                let _ = inner.events.send(DeviceEvent::Edge {
                    id: id.clone(),
                    pin,
                    value,
                });
            }
            Wake::Edge(Err(e)) => {
                warn!(id = %id, error = %e, "Edge watching stopped");
                watch_edges = false;
                let _ = inner.events.send(DeviceEvent::WatchFailed {
                    id: id.clone(),
                    error: e.to_string(),
                });
            }
            Wake::Op(Some(Op::Write { data, reply })) => {
                let _ = reply.send(worker.device.write_data(&data).await);
            }
            Wake::Op(Some(Op::Read { options, reply })) => {
                let _ = reply.send(worker.device.read_data(&options).await);
            }
            Wake::Op(Some(Op::Release { reply })) => {
                let result = worker.device.release().await;
                match &result {
                    Ok(()) => info!(id = %id, "Device released"),
                    Err(e) => warn!(id = %id, error = %e, "Device release failed"),
                }
                inner.remove(&id, worker.generation);
                let _ = reply.send(result);
                drain(&id, &mut worker.ops);
                return;
            }
            Wake::Op(None) => {
                // Queue closed without a release.
                if let Err(e) = worker.device.release().await {
                    warn!(id = %id, error = %e, "Device release failed");
                }
                return;
            }
        }
    }
}

/// Answer everything still queued for a device that is gone.
fn drain(id: &DeviceId, ops: &mut mpsc::UnboundedReceiver<Op>) {
    ops.close();
    while let Ok(op) = ops.try_recv() {
        match op {
            Op::Write { reply, .. } | Op::Read { reply, .. } => {
                let _ = reply.send(Err(Error::not_found(id.as_str())));
            }
            Op::Release { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlatform;

    fn registry_with_slot(id: &DeviceId, generation: u64) -> DeviceRegistry {
        let (mock, _handle) = MockPlatform::new();
        let (registry, _events) = DeviceRegistry::new(Platform::Mock(mock));
        let (ops, _ops_rx) = mpsc::unbounded_channel();
        registry.inner.slots().insert(
            id.clone(),
            Slot {
                info: DeviceInfo {
                    id: id.clone(),
                    kind: DeviceKind::Item,
                    pin: None,
                    driver: Some("spi-rgb-leds"),
                    registered_at: Utc::now(),
                },
                generation,
                ops,
                releasing: false,
            },
        );
        registry
    }

    #[tokio::test]
    async fn test_panicking_worker_frees_its_id() {
        let id = DeviceId::new("strip").unwrap();
        let registry = registry_with_slot(&id, 7);
        let guard = SlotGuard {
            inner: Arc::clone(&registry.inner),
            id: id.clone(),
            generation: 7,
        };

        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("worker crashed");
        });

        assert!(task.await.unwrap_err().is_panic());
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_stale_guard_keeps_newer_slot() {
        let id = DeviceId::new("strip").unwrap();
        let registry = registry_with_slot(&id, 8);

        drop(SlotGuard {
            inner: Arc::clone(&registry.inner),
            id: id.clone(),
            generation: 7,
        });

        assert!(registry.contains(&id));
    }
}
