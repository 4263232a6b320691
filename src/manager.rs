//! Connection manager: device registry and event fan-out.
//!
//! Owns every [`Transport`] keyed by device ID, designates at most one as
//! "active," and multiplexes all transports' events into a single set of
//! manager-wide handlers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              ConnectionManager              │
//! │  ┌─────────────────────────────────────┐    │
//! │  │ "192.168.1.100:7497" → Transport 1  │    │
//! │  │ "10.0.0.8:7497"      → Transport 2  │    │
//! │  └─────────────────────────────────────┘    │
//! │         │ tagged event channel              │
//! │         ▼                                   │
//! │   dispatch task ──▶ EventHandlers (one set) │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The manager is a dumb multiplexer: it forwards every transport's events
//! tagged with that transport's device ID. Deciding what counts as "current"
//! is the handler's job: the active device can change between event
//! emission and handler execution, so handlers re-check
//! [`ConnectionManager::active_device_id`] on every event.
//!
//! Constructed once at application start and passed by reference to whatever
//! owns the UI root; there is no global registry.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::identifiers::DeviceId;
use crate::transport::{ConnectionChange, Transport, TransportEvent};

// ============================================================================
// DeviceConfig
// ============================================================================

/// Registration parameters for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Stable identifier; by convention the device address string.
    pub device_id: DeviceId,

    /// Transport kind.
    pub kind: DeviceKind,

    /// Connection target (`host:port` or a `ws://`/`wss://` URL).
    pub address: String,
}

impl DeviceConfig {
    /// Creates a WebSocket device config whose ID is its address.
    #[inline]
    #[must_use]
    pub fn websocket(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            device_id: DeviceId::new(address.clone()),
            kind: DeviceKind::WebSocket,
            address,
        }
    }
}

/// Supported transport kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// JSON-RPC over a WebSocket.
    WebSocket,
}

// ============================================================================
// EventHandlers
// ============================================================================

/// The single manager-wide set of event callbacks.
///
/// Registered via [`ConnectionManager::set_event_handlers`]; a later
/// registration replaces the earlier one (last-writer-wins; the UI layer
/// registers once per mount).
pub struct EventHandlers {
    /// Invoked on every transport state change, tagged with its device.
    pub on_connection_change: Box<dyn Fn(&DeviceId, &ConnectionChange) + Send + Sync>,

    /// Invoked for every raw inbound frame, tagged with its device.
    pub on_message: Box<dyn Fn(&DeviceId, &str) + Send + Sync>,

    /// Invoked for transport-level errors (already recovered internally).
    pub on_error: Box<dyn Fn(&DeviceId, &Error) + Send + Sync>,
}

/// Shared slot holding the current handler set.
type HandlerSlot = Arc<Mutex<Option<Arc<EventHandlers>>>>;

// ============================================================================
// ConnectionManager
// ============================================================================

/// Registry of transports plus the single event fan-out point.
pub struct ConnectionManager {
    /// Tuning applied to every transport this manager creates.
    config: ConnectionConfig,

    /// Registered transports by device ID.
    devices: RwLock<FxHashMap<DeviceId, Transport>>,

    /// The single designated active device, if any.
    active: Mutex<Option<DeviceId>>,

    /// Current handler set, replaced wholesale on registration.
    handlers: HandlerSlot,

    /// Fan-in channel cloned into every transport.
    events_tx: mpsc::UnboundedSender<(DeviceId, TransportEvent)>,
}

// ============================================================================
// ConnectionManager - Constructor
// ============================================================================

impl ConnectionManager {
    /// Creates a manager and spawns its dispatch task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handlers: HandlerSlot = Arc::new(Mutex::new(None));

        tokio::spawn(dispatch_loop(events_rx, Arc::clone(&handlers)));

        Arc::new(Self {
            config,
            devices: RwLock::new(FxHashMap::default()),
            active: Mutex::new(None),
            handlers,
            events_tx,
        })
    }
}

// ============================================================================
// ConnectionManager - Event Handlers
// ============================================================================

impl ConnectionManager {
    /// Registers the manager-wide handler set, replacing any prior one.
    pub fn set_event_handlers(&self, handlers: EventHandlers) {
        *self.handlers.lock() = Some(Arc::new(handlers));
        debug!("event handlers registered");
    }

    /// Removes the handler set; events are dropped until the next
    /// registration.
    pub fn clear_event_handlers(&self) {
        *self.handlers.lock() = None;
    }
}

// ============================================================================
// ConnectionManager - Registry
// ============================================================================

impl ConnectionManager {
    /// Registers a device and creates its transport.
    ///
    /// Re-registering the same ID with the same address returns the existing
    /// transport (tolerates UI remount races); the transport keeps its
    /// current connection and state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDevice`] if the ID exists under a
    /// different address.
    pub fn add_device(&self, device: DeviceConfig) -> Result<Transport> {
        let mut devices = self.devices.write();

        if let Some(existing) = devices.get(&device.device_id) {
            if existing.address() == device.address {
                trace!(device_id = %device.device_id, "device already registered");
                return Ok(existing.clone());
            }
            return Err(Error::duplicate_device(device.device_id));
        }

        let transport = match device.kind {
            DeviceKind::WebSocket => Transport::spawn(
                device.device_id.clone(),
                device.address,
                self.config.clone(),
                self.events_tx.clone(),
            ),
        };
        devices.insert(device.device_id.clone(), transport.clone());

        info!(device_id = %device.device_id, count = devices.len(), "device added");
        Ok(transport)
    }

    /// Destroys and discards a device's transport.
    ///
    /// Clears the active designation if this device held it. No-op for
    /// unregistered IDs.
    pub fn remove_device(&self, device_id: &DeviceId) {
        let removed = self.devices.write().remove(device_id);

        if let Some(transport) = removed {
            transport.destroy();

            let mut active = self.active.lock();
            if active.as_ref() == Some(device_id) {
                *active = None;
            }
            debug!(device_id = %device_id, "device removed");
        }
    }

    /// Marks a registered device as the active one.
    ///
    /// Does not itself trigger a connect; callers invoke
    /// [`Transport::connect`] separately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] if the ID is not registered.
    pub fn set_active_device(&self, device_id: &DeviceId) -> Result<()> {
        if !self.devices.read().contains_key(device_id) {
            return Err(Error::unknown_device(device_id.clone()));
        }
        *self.active.lock() = Some(device_id.clone());
        debug!(device_id = %device_id, "active device set");
        Ok(())
    }

    /// Clears the active designation without removing any device.
    pub fn clear_active_device(&self) {
        *self.active.lock() = None;
    }

    /// Returns the active device's ID, if one is designated.
    #[inline]
    #[must_use]
    pub fn active_device_id(&self) -> Option<DeviceId> {
        self.active.lock().clone()
    }

    /// Returns the active device's transport, if one is designated and
    /// still registered.
    #[must_use]
    pub fn active_connection(&self) -> Option<Transport> {
        let active = self.active.lock().clone()?;
        self.devices.read().get(&active).cloned()
    }

    /// Returns a device's transport by ID.
    #[must_use]
    pub fn device(&self, device_id: &DeviceId) -> Option<Transport> {
        self.devices.read().get(device_id).cloned()
    }

    /// Returns the number of registered devices.
    #[inline]
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }
}

// ============================================================================
// ConnectionManager - Lifecycle Forwarding
// ============================================================================

impl ConnectionManager {
    /// Suspends every transport's heartbeat.
    ///
    /// Called on app backgrounding. Idempotent; sockets stay open.
    pub fn pause_all(&self) {
        let devices = self.devices.read();
        for transport in devices.values() {
            transport.pause_heartbeat();
        }
        debug!(count = devices.len(), "heartbeats paused");
    }

    /// Resumes every transport's heartbeat.
    ///
    /// Called on app foregrounding. Idempotent.
    pub fn resume_all(&self) {
        let devices = self.devices.read();
        for transport in devices.values() {
            transport.resume_heartbeat();
        }
        debug!(count = devices.len(), "heartbeats resumed");
    }

    /// Retries the active device's connection immediately, skipping any
    /// outstanding backoff window.
    ///
    /// Called when the OS reports network connectivity restored. No-op when
    /// no device is active or the active device is already connected.
    pub fn immediate_reconnect_active(&self) {
        if let Some(transport) = self.active_connection() {
            transport.immediate_reconnect();
        }
    }

    /// Destroys every transport and empties the registry.
    ///
    /// Called on provider unmount. Handlers stay registered.
    pub fn shutdown(&self) {
        let drained: Vec<_> = {
            let mut devices = self.devices.write();
            devices.drain().collect()
        };

        info!(count = drained.len(), "shutting down all transports");
        for (_, transport) in drained {
            transport.destroy();
        }
        *self.active.lock() = None;
    }
}

// ============================================================================
// Dispatch Task
// ============================================================================

/// Consumes the tagged event channel and invokes the current handler set.
///
/// The handler Arc is cloned out of the slot before invocation so handlers
/// may re-register without deadlocking.
async fn dispatch_loop(
    mut events_rx: mpsc::UnboundedReceiver<(DeviceId, TransportEvent)>,
    handlers: HandlerSlot,
) {
    while let Some((device_id, event)) = events_rx.recv().await {
        let Some(current) = handlers.lock().clone() else {
            trace!(device_id = %device_id, "event dropped, no handlers registered");
            continue;
        };

        match event {
            TransportEvent::ConnectionChange(change) => {
                (current.on_connection_change)(&device_id, &change);
            }
            TransportEvent::Message(text) => {
                (current.on_message)(&device_id, &text);
            }
            TransportEvent::Error(error) => {
                (current.on_error)(&device_id, &error);
            }
        }
    }

    debug!("dispatch task terminated");
}

// ============================================================================
// Tests
// ============================================================================
