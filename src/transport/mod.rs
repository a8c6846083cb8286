//! IPC transport seam.
//!
//! Everything above this module talks to VDR through the [`Transport`] trait:
//! resolve an object, call a method, subscribe to signals, and watch the bus
//! daemon's name table. [`DbusTransport`] is the zbus implementation;
//! [`MemoryTransport`] is an in-process bus for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   resolve/call    ┌──────────────┐    D-Bus    ┌─────┐
//! │ proxy, signals,│──────────────────>│  Transport   │────────────>│ VDR │
//! │ watchdog       │<──────────────────│ (zbus/memory)│<────────────│     │
//! └────────────────┘  Signal callbacks └──────────────┘   signals   └─────┘
//! ```

mod dbus;
mod memory;

pub use dbus::{BusKind, DbusTransport};
pub use memory::{MemoryTransport, RecordedCall};

use crate::value::Value;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Transport-level failures. These propagate to callers unchanged.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    #[error("D-Bus call failed: {0}")]
    Fdo(#[from] zbus::fdo::Error),

    #[error("Value conversion failed: {0}")]
    Variant(#[from] zbus::zvariant::Error),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("{0}")]
    Failed(String),
}

/// A resolved remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyHandle {
    destination: String,
    path: String,
}

impl ProxyHandle {
    pub fn new(destination: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            path: path.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Match criteria for a signal subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRule {
    /// Bus name the signal must come from. A well-known name matches
    /// whichever connection currently owns it.
    pub sender: Option<String>,
    pub object_path: String,
    pub interface: String,
    /// `None` matches every signal on the interface.
    pub member: Option<String>,
}

impl SignalRule {
    /// Whether `signal` matches; `sender_owner` is the unique name currently
    /// owning [`SignalRule::sender`], if known.
    pub fn matches(&self, signal: &Signal, sender_owner: Option<&str>) -> bool {
        self.sender.as_deref().is_none_or(|sender| {
            sender == signal.sender || sender_owner == Some(signal.sender.as_str())
        }) && self.object_path == signal.object_path
            && self.interface == signal.interface
            && self
                .member
                .as_deref()
                .is_none_or(|member| member == signal.member)
    }
}

impl fmt::Display for SignalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sender) = &self.sender {
            write!(f, "{} ", sender)?;
        }
        write!(
            f,
            "{} {}.{}",
            self.object_path,
            self.interface,
            self.member.as_deref().unwrap_or("*")
        )
    }
}

/// A fired signal, as delivered to subscription callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub sender: String,
    pub object_path: String,
    pub interface: String,
    pub member: String,
    pub parameters: Vec<Value>,
}

/// Ownership change of a bus name, as reported by the bus daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOwnerChange {
    pub name: String,
    pub old_owner: Option<String>,
    pub new_owner: Option<String>,
}

impl NameOwnerChange {
    /// Whether the name has no owner after the change.
    pub fn is_released(&self) -> bool {
        self.new_owner.as_deref().is_none_or(str::is_empty)
    }
}

pub type SignalCallback = Arc<dyn Fn(&Signal) + Send + Sync>;
pub type NameOwnerCallback = Arc<dyn Fn(&NameOwnerChange) + Send + Sync>;

/// Transport-level subscription resource.
pub trait TransportSubscription: Send + Sync {
    /// Stop delivering. Must tolerate being called more than once.
    fn cancel(&mut self);
}

/// The IPC operations the client relies on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve an object path on a bus name; fails if the object is unreachable.
    async fn resolve(&self, bus_name: &str, object_path: &str)
        -> Result<ProxyHandle, TransportError>;

    /// Call a method and return the reply's values in order.
    async fn call(
        &self,
        proxy: &ProxyHandle,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, TransportError>;

    async fn subscribe(
        &self,
        rule: SignalRule,
        callback: SignalCallback,
    ) -> Result<Box<dyn TransportSubscription>, TransportError>;

    /// Names currently present on the bus.
    async fn list_names(&self) -> Result<Vec<String>, TransportError>;

    /// Watch ownership changes of every bus name.
    async fn watch_name_owner(
        &self,
        callback: NameOwnerCallback,
    ) -> Result<Box<dyn TransportSubscription>, TransportError>;
}
