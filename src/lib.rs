//! Client library for VDR's D-Bus service (`de.tvdr.vdr`).
//!
//! [`ServiceWatchdog`] tracks whether VDR is running and binds the typed
//! interface proxies in [`proxy`] once it is. [`SignalHub`] subscribes to
//! VDR's signals, and [`value::infer`] picks the wire type for loosely typed
//! arguments.

pub mod config;
pub mod error;
pub mod identity;
pub mod proxy;
pub mod signals;
pub mod transport;
pub mod value;
pub mod watchdog;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::VdrError;
pub use identity::{ServiceIdentity, BASE_BUS_NAME};
pub use signals::{Signal, SignalHub, Subscription};
pub use transport::{BusKind, DbusTransport, MemoryTransport, Transport, TransportError};
pub use value::{infer, Value, WireValue};
pub use watchdog::{
    AvailabilityState, InterfaceRegistry, ServiceWatchdog, WatchdogBuilder, WatchdogEvent,
    WatchdogPhase,
};
