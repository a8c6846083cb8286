//! zbus-backed transport.

use super::{
    NameOwnerCallback, NameOwnerChange, ProxyHandle, Signal, SignalCallback, SignalRule,
    Transport, TransportError, TransportSubscription,
};
use crate::value::Value;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zbus::fdo::{DBusProxy, IntrospectableProxy};
use zbus::message::Type as MessageType;
use zbus::names::BusName;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{self, ObjectPath, Structure, StructureBuilder};
use zbus::{Connection, MatchRule, Message, MessageStream};

/// Which message bus VDR is reachable on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// dbus2vdr registers on the system bus by default
    #[default]
    System,
    Session,
}

/// Transport over a zbus connection.
#[derive(Clone)]
pub struct DbusTransport {
    connection: Connection,
}

impl DbusTransport {
    pub async fn connect(bus: BusKind) -> Result<Self, TransportError> {
        let connection = match bus {
            BusKind::System => Connection::system().await?,
            BusKind::Session => Connection::session().await?,
        };
        debug!("Connected to {:?} bus", bus);
        Ok(Self { connection })
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    /// Get a reference to the connection for advanced usage.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[async_trait]
impl Transport for DbusTransport {
    async fn resolve(
        &self,
        bus_name: &str,
        object_path: &str,
    ) -> Result<ProxyHandle, TransportError> {
        let destination = BusName::try_from(bus_name)
            .map_err(|e| TransportError::InvalidName(format!("{}: {}", bus_name, e)))?;
        let path = ObjectPath::try_from(object_path)
            .map_err(|e| TransportError::InvalidName(format!("{}: {}", object_path, e)))?;

        // Introspecting fails when the service or the object is missing.
        let introspectable = IntrospectableProxy::builder(&self.connection)
            .destination(destination)?
            .path(path)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;
        introspectable.introspect().await?;

        debug!("Resolved {} on {}", object_path, bus_name);
        Ok(ProxyHandle::new(bus_name, object_path))
    }

    async fn call(
        &self,
        proxy: &ProxyHandle,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, TransportError> {
        debug!("Calling {}.{} on {}", interface, method, proxy.path());
        let fields = args
            .into_iter()
            .map(to_zvariant)
            .collect::<Result<Vec<_>, _>>()?;

        let reply = if fields.is_empty() {
            self.connection
                .call_method(
                    Some(proxy.destination()),
                    proxy.path(),
                    Some(interface),
                    method,
                    &(),
                )
                .await?
        } else {
            let body = build_structure(fields)?;
            self.connection
                .call_method(
                    Some(proxy.destination()),
                    proxy.path(),
                    Some(interface),
                    method,
                    &body,
                )
                .await?
        };

        decode_body(&reply)
    }

    async fn subscribe(
        &self,
        rule: SignalRule,
        callback: SignalCallback,
    ) -> Result<Box<dyn TransportSubscription>, TransportError> {
        let mut builder = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .path(rule.object_path.as_str())?
            .interface(rule.interface.as_str())?;
        // The bus daemon resolves a well-known sender to its current owner.
        if let Some(sender) = rule.sender.as_deref() {
            builder = builder.sender(sender)?;
        }
        if let Some(member) = rule.member.as_deref() {
            builder = builder.member(member)?;
        }
        let match_rule = builder.build();

        let mut stream = MessageStream::for_match_rule(match_rule, &self.connection, None).await?;
        debug!("Subscribed to {}", rule);

        let task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(message) => match decode_signal(&message) {
                        Ok(signal) => callback(&signal),
                        Err(e) => warn!("Dropping undecodable signal for {}: {}", rule, e),
                    },
                    Err(e) => warn!("Signal stream error for {}: {}", rule, e),
                }
            }
            debug!("Signal stream for {} ended", rule);
        });

        Ok(Box::new(TaskSubscription { task: Some(task) }))
    }

    async fn list_names(&self) -> Result<Vec<String>, TransportError> {
        let proxy = DBusProxy::new(&self.connection).await?;
        let names = proxy.list_names().await?;
        Ok(names.iter().map(|name| name.to_string()).collect())
    }

    async fn watch_name_owner(
        &self,
        callback: NameOwnerCallback,
    ) -> Result<Box<dyn TransportSubscription>, TransportError> {
        let proxy = DBusProxy::new(&self.connection).await?;
        let mut changes = proxy.receive_name_owner_changed().await?;

        let task = tokio::spawn(async move {
            while let Some(signal) = changes.next().await {
                let args = match signal.args() {
                    Ok(args) => args,
                    Err(e) => {
                        warn!("Malformed NameOwnerChanged signal: {}", e);
                        continue;
                    }
                };
                let change = NameOwnerChange {
                    name: args.name().to_string(),
                    old_owner: (**args.old_owner()).as_ref().map(|owner| owner.to_string()),
                    new_owner: (**args.new_owner()).as_ref().map(|owner| owner.to_string()),
                };
                callback(&change);
            }
        });

        Ok(Box::new(TaskSubscription { task: Some(task) }))
    }
}

/// Subscription backed by a spawned stream-draining task.
struct TaskSubscription {
    task: Option<JoinHandle<()>>,
}

impl TransportSubscription for TaskSubscription {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TaskSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn build_structure(
    fields: Vec<zvariant::Value<'static>>,
) -> Result<Structure<'static>, TransportError> {
    let structure = fields
        .into_iter()
        .fold(StructureBuilder::new(), |builder, field| {
            builder.append_field(field)
        })
        .build()?;
    Ok(structure)
}

fn decode_body(message: &Message) -> Result<Vec<Value>, TransportError> {
    let body = message.body();
    if body.signature().to_string().is_empty() {
        return Ok(Vec::new());
    }
    let structure: Structure<'_> = body.deserialize()?;
    Ok(structure.fields().iter().map(from_zvariant).collect())
}

fn decode_signal(message: &Message) -> Result<Signal, TransportError> {
    let header = message.header();
    let field = |name: &str, value: Option<String>| {
        value.ok_or_else(|| TransportError::Failed(format!("signal without {}", name)))
    };
    Ok(Signal {
        sender: header.sender().map(|s| s.to_string()).unwrap_or_default(),
        object_path: field("path", header.path().map(|p| p.to_string()))?,
        interface: field("interface", header.interface().map(|i| i.to_string()))?,
        member: field("member", header.member().map(|m| m.to_string()))?,
        parameters: decode_body(message)?,
    })
}

/// Convert an outgoing argument. Arrays are limited to the string and
/// integer lists VDR's methods accept.
fn to_zvariant(value: Value) -> Result<zvariant::Value<'static>, TransportError> {
    let converted = match value {
        Value::Bool(v) => zvariant::Value::from(v),
        Value::Byte(v) => zvariant::Value::from(v),
        Value::Int16(v) => zvariant::Value::from(v),
        Value::UInt16(v) => zvariant::Value::from(v),
        Value::Int32(v) => zvariant::Value::from(v),
        Value::UInt32(v) => zvariant::Value::from(v),
        Value::Int64(v) => zvariant::Value::from(v),
        Value::UInt64(v) => zvariant::Value::from(v),
        Value::Double(v) => zvariant::Value::from(v),
        Value::Str(s) => zvariant::Value::from(s),
        Value::ObjectPath(p) => {
            let path = ObjectPath::try_from(p.clone())
                .map_err(|e| TransportError::InvalidName(format!("{}: {}", p, e)))?;
            zvariant::Value::from(path)
        }
        Value::Variant(inner) => zvariant::Value::Value(Box::new(to_zvariant(*inner)?)),
        Value::Array(items) => {
            if items.iter().all(|item| matches!(item, Value::Str(_))) {
                let strings: Vec<String> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Str(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                zvariant::Value::from(strings)
            } else if items.iter().all(|item| matches!(item, Value::Int32(_))) {
                let ints: Vec<i32> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Int32(i) => Some(i),
                        _ => None,
                    })
                    .collect();
                zvariant::Value::from(ints)
            } else {
                return Err(TransportError::UnsupportedValue(format!(
                    "array {}",
                    Value::Array(items)
                )));
            }
        }
        Value::Struct(fields) => {
            let fields = fields
                .into_iter()
                .map(to_zvariant)
                .collect::<Result<Vec<_>, _>>()?;
            zvariant::Value::from(build_structure(fields)?)
        }
        Value::Dict(entries) => {
            return Err(TransportError::UnsupportedValue(format!(
                "dictionary {}",
                Value::Dict(entries)
            )));
        }
        Value::Unsupported(signature) => {
            return Err(TransportError::UnsupportedValue(signature));
        }
    };
    Ok(converted)
}

fn from_zvariant(value: &zvariant::Value<'_>) -> Value {
    match value {
        zvariant::Value::Bool(v) => Value::Bool(*v),
        zvariant::Value::U8(v) => Value::Byte(*v),
        zvariant::Value::I16(v) => Value::Int16(*v),
        zvariant::Value::U16(v) => Value::UInt16(*v),
        zvariant::Value::I32(v) => Value::Int32(*v),
        zvariant::Value::U32(v) => Value::UInt32(*v),
        zvariant::Value::I64(v) => Value::Int64(*v),
        zvariant::Value::U64(v) => Value::UInt64(*v),
        zvariant::Value::F64(v) => Value::Double(*v),
        zvariant::Value::Str(s) => Value::Str(s.as_str().to_string()),
        zvariant::Value::Signature(s) => Value::Str(s.to_string()),
        zvariant::Value::ObjectPath(p) => Value::ObjectPath(p.as_str().to_string()),
        zvariant::Value::Value(inner) => Value::Variant(Box::new(from_zvariant(inner))),
        zvariant::Value::Array(array) => Value::Array(array.iter().map(from_zvariant).collect()),
        zvariant::Value::Structure(structure) => {
            Value::Struct(structure.fields().iter().map(from_zvariant).collect())
        }
        zvariant::Value::Dict(dict) => Value::Dict(
            dict.iter()
                .map(|(key, value)| (from_zvariant(key), from_zvariant(value)))
                .collect(),
        ),
        other => Value::Unsupported(other.value_signature().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversion_both_ways() {
        for value in [
            Value::Bool(true),
            Value::Int32(-4),
            Value::UInt64(1_700_000_000),
            Value::Str("S19.2E-1-1079-28006".to_string()),
        ] {
            let converted = to_zvariant(value.clone()).unwrap();
            assert_eq!(from_zvariant(&converted), value);
        }
    }

    #[test]
    fn test_variant_wrapping_is_kept() {
        let value = Value::Variant(Box::new(Value::Int32(50)));
        let converted = to_zvariant(value.clone()).unwrap();
        assert!(matches!(converted, zvariant::Value::Value(_)));
        assert_eq!(from_zvariant(&converted), value);
    }

    #[test]
    fn test_string_list_conversion() {
        let value = Value::from(vec!["kMenu", "kOk"]);
        let converted = to_zvariant(value.clone()).unwrap();
        assert_eq!(from_zvariant(&converted), value);
    }

    #[test]
    fn test_mixed_array_rejected() {
        let value = Value::Array(vec![Value::from("a"), Value::Bool(false)]);
        assert!(matches!(
            to_zvariant(value),
            Err(TransportError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn test_unsupported_value_rejected() {
        assert!(to_zvariant(Value::Unsupported("h".to_string())).is_err());
    }

    #[test]
    fn test_dictionary_decoded() {
        let mut map = std::collections::HashMap::new();
        map.insert("title".to_string(), 7i32);
        let decoded = from_zvariant(&zvariant::Value::from(map));
        assert_eq!(
            decoded,
            Value::Dict(vec![(Value::from("title"), Value::Int32(7))])
        );
        assert!(to_zvariant(decoded).is_err());
    }

    #[test]
    fn test_bus_kind_default_is_system() {
        assert_eq!(BusKind::default(), BusKind::System);
    }
}
