//! WebSocket transport layer.
//!
//! This module owns the per-device connection lifecycle: dialing, heartbeat,
//! reconnect backoff, and raw frame I/O. One [`Transport`] manages exactly
//! one device; the connection manager above fans their events together.
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │ ConnectionManager│                              │  Core device    │
//! │                  │          WebSocket           │                 │
//! │  Transport ──────┼─────────────────────────────►│  JSON-RPC       │
//! │  (task + state   │       ws://host:port         │  service        │
//! │   machine)       │                              │                 │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Transport::spawn` - Start the connection task (no dialing yet)
//! 2. `connect()` - Dial; `Connecting` then `Connected` on success
//! 3. Unexpected loss - `Reconnecting` with exponential backoff + jitter
//! 4. `disconnect()` - Intentional close, no reconnect
//! 5. `destroy()` - Permanent teardown, all timers cleared
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnect backoff state machine |
//! | `connection` | Transport handle and connection task |
//! | `heartbeat` | Keep-alive scheduling |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect backoff state machine.
pub mod backoff;

/// Transport handle and connection task.
pub mod connection;

/// Keep-alive scheduling.
pub mod heartbeat;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::Backoff;
pub use connection::{
    ConnectionChange, ConnectionState, EventSender, Transport, TransportEvent,
};
pub use heartbeat::Heartbeat;
