//! In-process transport.
//!
//! Simulates a bus carrying a VDR service: bus names can appear and vanish,
//! each owned by a unique connection name, method replies are scripted per
//! object and method, and signals are emitted synchronously to matching
//! subscribers. Used by the test suites; also handy
//! for exercising client code without a running VDR.

use super::{
    NameOwnerCallback, NameOwnerChange, ProxyHandle, Signal, SignalCallback, SignalRule,
    Transport, TransportError, TransportSubscription,
};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A method call seen by the memory transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub path: String,
    pub interface: String,
    pub method: String,
    pub args: Vec<Value>,
}

type ReplyKey = (String, String);

#[derive(Default)]
struct Bus {
    /// Well-known name to unique owner name.
    names: BTreeMap<String, String>,
    failing_paths: HashSet<String>,
    fail_list_names: bool,
    replies: HashMap<ReplyKey, Result<Vec<Value>, String>>,
    calls: Vec<RecordedCall>,
    subscribers: Vec<(u64, SignalRule, SignalCallback)>,
    watchers: Vec<(u64, NameOwnerCallback)>,
}

/// Scripted in-memory bus. Cloning shares the same bus.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    bus: Arc<Mutex<Bus>>,
    next_id: Arc<AtomicU64>,
    resolves: Arc<AtomicUsize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn bus(&self) -> MutexGuard<'_, Bus> {
        // A panicking test callback must not wedge the other tests' bus.
        self.bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put a name on the bus under a fresh owner and announce it.
    pub fn add_name(&self, name: &str) {
        let owner = format!(":1.{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let old_owner = self
            .bus()
            .names
            .insert(name.to_string(), owner.clone());
        self.announce(NameOwnerChange {
            name: name.to_string(),
            old_owner,
            new_owner: Some(owner),
        });
    }

    /// Remove a name from the bus and announce that it has no owner.
    pub fn remove_name(&self, name: &str) {
        let old_owner = self.bus().names.remove(name);
        self.announce(NameOwnerChange {
            name: name.to_string(),
            old_owner,
            new_owner: None,
        });
    }

    /// Unique name currently owning `name`.
    pub fn owner_of(&self, name: &str) -> Option<String> {
        self.bus().names.get(name).cloned()
    }

    /// Deliver an ownership change to every watcher.
    pub fn announce(&self, change: NameOwnerChange) {
        let watchers: Vec<NameOwnerCallback> = self
            .bus()
            .watchers
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for watcher in watchers {
            watcher(&change);
        }
    }

    /// Make `list_names` fail until reset.
    pub fn fail_list_names(&self, fail: bool) {
        self.bus().fail_list_names = fail;
    }

    /// Make resolving an object path fail until reset.
    pub fn fail_resolve(&self, object_path: &str, fail: bool) {
        let mut bus = self.bus();
        if fail {
            bus.failing_paths.insert(object_path.to_string());
        } else {
            bus.failing_paths.remove(object_path);
        }
    }

    /// Script the reply of `method` on `object_path`.
    pub fn set_reply(&self, object_path: &str, method: &str, values: Vec<Value>) {
        self.bus()
            .replies
            .insert((object_path.to_string(), method.to_string()), Ok(values));
    }

    /// Script a failing call of `method` on `object_path`.
    pub fn set_error(&self, object_path: &str, method: &str, message: &str) {
        self.bus().replies.insert(
            (object_path.to_string(), method.to_string()),
            Err(message.to_string()),
        );
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.bus().calls.clone()
    }

    /// Successful and failed `resolve` calls so far.
    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    /// Live signal subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.bus().subscribers.len()
    }

    /// Deliver a signal to every matching subscriber, in subscription order.
    pub fn emit(&self, signal: Signal) {
        let callbacks: Vec<SignalCallback> = {
            let bus = self.bus();
            bus.subscribers
                .iter()
                .filter(|(_, rule, _)| {
                    let owner = rule
                        .sender
                        .as_deref()
                        .and_then(|sender| bus.names.get(sender))
                        .map(String::as_str);
                    rule.matches(&signal, owner)
                })
                .map(|(_, _, callback)| callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback(&signal);
        }
    }

    /// Emit a signal from the connection owning `sender`. A name that is not
    /// on the bus is used as the sender verbatim.
    pub fn emit_signal(
        &self,
        sender: &str,
        object_path: &str,
        interface: &str,
        member: &str,
        parameters: Vec<Value>,
    ) {
        let sender = self.owner_of(sender).unwrap_or_else(|| sender.to_string());
        self.emit(Signal {
            sender,
            object_path: object_path.to_string(),
            interface: interface.to_string(),
            member: member.to_string(),
            parameters,
        });
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn resolve(
        &self,
        bus_name: &str,
        object_path: &str,
    ) -> Result<ProxyHandle, TransportError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let bus = self.bus();
        if !bus.names.contains_key(bus_name) {
            return Err(TransportError::Failed(format!(
                "The name {} was not provided by any .service files",
                bus_name
            )));
        }
        if bus.failing_paths.contains(object_path) {
            return Err(TransportError::Failed(format!(
                "No such object path '{}'",
                object_path
            )));
        }
        Ok(ProxyHandle::new(bus_name, object_path))
    }

    async fn call(
        &self,
        proxy: &ProxyHandle,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, TransportError> {
        let mut bus = self.bus();
        bus.calls.push(RecordedCall {
            path: proxy.path().to_string(),
            interface: interface.to_string(),
            method: method.to_string(),
            args,
        });
        if !bus.names.contains_key(proxy.destination()) {
            return Err(TransportError::Failed(format!(
                "The name {} has no owner",
                proxy.destination()
            )));
        }
        match bus
            .replies
            .get(&(proxy.path().to_string(), method.to_string()))
        {
            Some(Ok(values)) => Ok(values.clone()),
            Some(Err(message)) => Err(TransportError::Failed(message.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn subscribe(
        &self,
        rule: SignalRule,
        callback: SignalCallback,
    ) -> Result<Box<dyn TransportSubscription>, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.bus().subscribers.push((id, rule, callback));
        Ok(Box::new(MemorySubscription {
            bus: Arc::clone(&self.bus),
            id,
        }))
    }

    async fn list_names(&self) -> Result<Vec<String>, TransportError> {
        let bus = self.bus();
        if bus.fail_list_names {
            return Err(TransportError::Failed(
                "org.freedesktop.DBus is not reachable".to_string(),
            ));
        }
        Ok(bus.names.keys().cloned().collect())
    }

    async fn watch_name_owner(
        &self,
        callback: NameOwnerCallback,
    ) -> Result<Box<dyn TransportSubscription>, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.bus().watchers.push((id, callback));
        Ok(Box::new(MemorySubscription {
            bus: Arc::clone(&self.bus),
            id,
        }))
    }
}

struct MemorySubscription {
    bus: Arc<Mutex<Bus>>,
    id: u64,
}

impl TransportSubscription for MemorySubscription {
    fn cancel(&mut self) {
        let mut bus = self.bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = self.id;
        bus.subscribers.retain(|(sub_id, _, _)| *sub_id != id);
        bus.watchers.retain(|(sub_id, _)| *sub_id != id);
    }
}
