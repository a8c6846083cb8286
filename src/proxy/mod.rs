//! Typed proxies for VDR's remote objects.
//!
//! Every remote interface is a thin wrapper around a [`RemoteObject`], which
//! binds one object path on the VDR service and forwards calls through the
//! [`Transport`]. Methods named after the remote method return the raw
//! [`Reply`]; convenience methods reshape a reply into a typed record.

mod channels;
mod devices;
mod epg;
mod plugins;
mod recordings;
mod remote;
mod setup;
mod shutdown;
mod skin;
mod status;
mod timers;
mod vdr;

pub use channels::Channels;
pub use devices::{Device, Devices};
pub use epg::{Epg, EpgEntry};
pub use plugins::{Plugin, Plugins};
pub use recordings::{Recording, Recordings};
pub use remote::{Remote, Volume};
pub use setup::{Setup, SetupEntry, SETUP_OK};
pub use shutdown::{Shutdown, ShutdownCode, ShutdownReply};
pub use skin::Skin;
pub use status::Status;
pub use timers::Timers;
pub use vdr::Vdr;

use crate::error::VdrError;
use crate::identity::ServiceIdentity;
use crate::transport::{ProxyHandle, Transport};
use crate::value::{FromValue, Value};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// One bound object path on the VDR service.
#[derive(Clone)]
pub struct RemoteObject {
    transport: Arc<dyn Transport>,
    identity: ServiceIdentity,
    handle: ProxyHandle,
    interface: String,
}

impl RemoteObject {
    /// Resolve `object_path` on the service and bind it to `<namespace><suffix>`.
    pub async fn bind(
        transport: Arc<dyn Transport>,
        identity: &ServiceIdentity,
        object_path: &str,
        interface_suffix: &str,
    ) -> Result<Self, VdrError> {
        let handle = transport
            .resolve(identity.bus_name(), object_path)
            .await
            .map_err(|source| VdrError::Binding {
                bus_name: identity.bus_name().to_string(),
                path: object_path.to_string(),
                source,
            })?;

        Ok(Self {
            interface: identity.interface_name(interface_suffix),
            identity: identity.clone(),
            handle,
            transport,
        })
    }

    /// Forward a method call. Transport errors propagate unchanged.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Reply, VdrError> {
        debug!("{} {}.{}", self.handle.path(), self.interface, method);
        let values = self
            .transport
            .call(&self.handle, &self.interface, method, args)
            .await?;
        Ok(Reply::new(method, values))
    }

    pub fn object_path(&self) -> &str {
        self.handle.path()
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

/// Ordered values of a method reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    method: String,
    values: Vec<Value>,
}

impl Reply {
    pub fn new(method: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            values,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`.
    pub fn value(&self, index: usize) -> Result<&Value, VdrError> {
        self.values.get(index).ok_or_else(|| {
            VdrError::decode(
                &self.method,
                format!("missing reply value {} of {}", index, self.values.len()),
            )
        })
    }

    /// Value at `index` converted to `T`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, VdrError> {
        let value = self.value(index)?;
        T::from_value(value).ok_or_else(|| {
            VdrError::decode(
                &self.method,
                format!(
                    "reply value {} is {}, expected {}",
                    index,
                    value,
                    std::any::type_name::<T>()
                ),
            )
        })
    }
}

/// A remote interface bound at a fixed object path.
#[async_trait]
pub trait Interface: Sized + Send + Sync {
    /// Registry key, e.g. `"Channels"`.
    const KEY: &'static str;
    const OBJECT_PATH: &'static str;
    /// Appended to the `de.tvdr.vdr` namespace.
    const INTERFACE_SUFFIX: &'static str;

    fn from_object(object: RemoteObject) -> Self;

    fn object(&self) -> &RemoteObject;

    async fn bind(
        transport: Arc<dyn Transport>,
        identity: &ServiceIdentity,
    ) -> Result<Self, VdrError> {
        let object =
            RemoteObject::bind(transport, identity, Self::OBJECT_PATH, Self::INTERFACE_SUFFIX)
                .await?;
        Ok(Self::from_object(object))
    }
}

/// Implements [`Interface`] for a newtype around [`RemoteObject`].
macro_rules! remote_interface {
    ($name:ident, $key:literal, $path:literal, $suffix:literal) => {
        impl $crate::proxy::Interface for $name {
            const KEY: &'static str = $key;
            const OBJECT_PATH: &'static str = $path;
            const INTERFACE_SUFFIX: &'static str = $suffix;

            fn from_object(object: $crate::proxy::RemoteObject) -> Self {
                Self { object }
            }

            fn object(&self) -> &$crate::proxy::RemoteObject {
                &self.object
            }
        }
    };
}
pub(crate) use remote_interface;

/// Decode a struct value with a fixed number of fields.
pub(crate) fn struct_fields<'a>(
    value: &'a Value,
    context: &str,
    arity: usize,
) -> Result<&'a [Value], VdrError> {
    match value.as_slice() {
        Some(fields) if fields.len() == arity => Ok(fields),
        _ => Err(VdrError::decode(
            context,
            format!("expected a struct of {} fields, got {}", arity, value),
        )),
    }
}

pub(crate) fn field<T: FromValue>(fields: &[Value], index: usize, context: &str) -> Result<T, VdrError> {
    fields
        .get(index)
        .and_then(T::from_value)
        .ok_or_else(|| VdrError::decode(context, format!("bad field {}", index)))
}
