//! Connection lifecycle for a single active reader.
//!
//! [`ConnectionManager`] drives the `Disconnected → Connecting → Connected →
//! Monitoring` state machine and owns at most one active device at a time.
//! Connecting to a second device tears the first one down before anything
//! else happens, so there is never a moment with two open handles.
//!
//! # Architecture
//!
//! ```text
//!   ConnectionManager ──spawns──▶ poll task (owns the device handle)
//!        │  control mutex              │
//!        │  (state + active)           │ cancel / dead flags
//!        ▼                             ▼
//!   DeviceRegistry ◀── transport ──▶ EventBus ──▶ subscribers
//! ```
//!
//! The poll task never acquires the control mutex. That one rule makes
//! teardown safe: control operations may join the task while holding the
//! lock without risking a deadlock. When the task dies on its own (fatal
//! read error) it raises its `dead` flag, and every control operation
//! reconciles that flag back into `Disconnected` before acting.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use magswipe_core::{ConnectionState, DeviceDescriptor, Error, ReaderConfig, Result};

use crate::events::{EventBus, ReaderEvent};
use crate::poller::{self, Poller};
use crate::registry::DeviceRegistry;
use crate::transport::{AnyTransport, UsbTransport};

struct ActiveConnection {
    descriptor: DeviceDescriptor,
    poller: Poller,
}

struct Inner {
    state: ConnectionState,
    active: Option<ActiveConnection>,
}

/// Owns the connection state machine and the active poll task.
pub struct ConnectionManager {
    transport: Arc<AnyTransport>,
    registry: DeviceRegistry,
    bus: EventBus,
    config: ReaderConfig,
    inner: Mutex<Inner>,
}

impl ConnectionManager {
    /// Create a manager over `transport`. Fails if the configuration does
    /// not validate.
    pub fn new(transport: impl Into<AnyTransport>, config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(transport.into());
        Ok(Self {
            registry: DeviceRegistry::new(Arc::clone(&transport)),
            bus: EventBus::new(config.event_capacity),
            transport,
            config,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                active: None,
            }),
        })
    }

    /// The event bus this manager publishes to.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe to reader events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.bus.subscribe()
    }

    pub async fn state(&self) -> ConnectionState {
        let mut inner = self.inner.lock().await;
        self.reconcile(&mut inner).await;
        inner.state
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await.is_connected()
    }

    /// Descriptor of the currently monitored device, if any.
    pub async fn active_device(&self) -> Option<DeviceDescriptor> {
        let mut inner = self.inner.lock().await;
        self.reconcile(&mut inner).await;
        inner
            .active
            .as_ref()
            .map(|active| active.descriptor.clone().with_connected(true))
    }

    /// All supported readers currently attached, with the active one
    /// flagged connected.
    pub async fn connected_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let active_id = {
            let mut inner = self.inner.lock().await;
            self.reconcile(&mut inner).await;
            inner
                .active
                .as_ref()
                .map(|active| active.descriptor.id.clone())
        };
        self.registry.devices(active_id.as_deref()).await
    }

    /// Connect to the device with the given id and start monitoring it.
    ///
    /// Any existing connection is torn down first, even if the new attempt
    /// then fails. Returns whether monitoring started; failures are also
    /// published on the event bus.
    pub async fn connect(&self, device_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        self.reconcile(&mut inner).await;
        self.teardown_locked(&mut inner).await;

        inner.state = ConnectionState::Connecting;
        match self.open_device(device_id).await {
            Ok((descriptor, handle)) => {
                inner.state = ConnectionState::Connected;
                let poller = poller::spawn(
                    Arc::clone(&self.transport),
                    handle,
                    descriptor.clone(),
                    self.bus.clone(),
                    self.config.clone(),
                );
                let descriptor = descriptor.with_connected(true);
                inner.state = ConnectionState::Monitoring;
                inner.active = Some(ActiveConnection {
                    descriptor: descriptor.clone(),
                    poller,
                });
                info!(device = %descriptor.id, name = %descriptor.name, "device connected");
                self.bus.publish(ReaderEvent::DeviceConnected(descriptor));
                true
            }
            Err(error) => {
                warn!(device = %device_id, %error, "connect failed");
                inner.state = ConnectionState::Disconnected;
                self.bus.publish_error(&error);
                false
            }
        }
    }

    /// Tear down the active connection, if any. Idempotent.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        self.reconcile(&mut inner).await;
        self.teardown_locked(&mut inner).await;
    }

    /// Handle an out-of-band notification that a device was unplugged.
    ///
    /// Tears down the active connection when the id matches it; otherwise a
    /// no-op. No event is published; the detachment was observed by the
    /// caller, not by us.
    pub async fn notify_detached(&self, device_id: &str) {
        let mut inner = self.inner.lock().await;
        self.reconcile(&mut inner).await;
        let matches = inner
            .active
            .as_ref()
            .is_some_and(|active| active.descriptor.id == device_id);
        if matches {
            info!(device = %device_id, "active device detached");
            self.teardown_locked(&mut inner).await;
        } else {
            debug!(device = %device_id, "detach notification for inactive device");
        }
    }

    /// Resolve the device id and open a handle to it. Runs while the caller
    /// holds the control lock, in the `Connecting` state.
    async fn open_device(
        &self,
        device_id: &str,
    ) -> Result<(DeviceDescriptor, crate::transport::AnyDeviceHandle)> {
        let descriptor = self
            .registry
            .find(device_id)
            .await?
            .ok_or_else(|| Error::device_not_found(device_id))?;

        let handle = self.transport.open(&descriptor.path).await?;
        Ok((descriptor, handle))
    }

    /// Fold a self-terminated poll task back into `Disconnected`.
    async fn reconcile(&self, inner: &mut Inner) {
        let died = inner
            .active
            .as_ref()
            .is_some_and(|active| active.poller.dead.load(Ordering::Acquire));
        if died {
            if let Some(active) = inner.active.take() {
                if let Err(error) = active.poller.task.await {
                    warn!(device = %active.descriptor.id, %error, "poll task panicked");
                }
                inner.state = ConnectionState::Disconnected;
                debug!(device = %active.descriptor.id, "reaped dead poll task");
            }
        }
    }

    /// Cancel the active poll task and wait for it to close its handle.
    async fn teardown_locked(&self, inner: &mut Inner) {
        if let Some(active) = inner.active.take() {
            active.poller.cancel.store(true, Ordering::Release);
            if let Err(error) = active.poller.task.await {
                warn!(device = %active.descriptor.id, %error, "poll task panicked");
            }
            info!(device = %active.descriptor.id, "device disconnected");
        }
        inner.state = ConnectionState::Disconnected;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // Best effort: signal the poll task so it closes its handle. The
        // task also exits on its own if the runtime is shutting down.
        if let Ok(inner) = self.inner.try_lock() {
            if let Some(active) = inner.active.as_ref() {
                active.poller.cancel.store(true, Ordering::Release);
            }
        }
    }
}
