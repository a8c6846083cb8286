//! Availability tracking for the VDR service.
//!
//! The watchdog follows VDR's lifecycle and binds the interface proxies the
//! first time the service is seen running.
//!
//! ```text
//!              first Ready              Stop / owner gone
//!   Unbound ───────────────> BoundRunning ──────────────> BoundStopped
//!                                 ^                            │
//!                                 └──────────── Ready ─────────┘
//! ```
//!
//! In watchdog mode the `/vdr` `Ready` and `Stop` signals and the bus
//! daemon's `NameOwnerChanged` feed an event channel. A single dispatcher task
//! drains it, so transitions never overlap. A released name only counts as a
//! stop if the name is still unowned when the event is handled. Without
//! watchdog mode only the one-shot presence check at construction runs.
//!
//! # Usage
//!
//! ```ignore
//! let watchdog = WatchdogBuilder::new(transport)
//!     .watchdog(true)
//!     .on_status_change(|running| info!("VDR running: {}", running))
//!     .connect()
//!     .await?;
//!
//! if let Ok(channels) = watchdog.channels() {
//!     println!("{} channels", channels.count().await?);
//! }
//! ```

use crate::error::VdrError;
use crate::identity::ServiceIdentity;
use crate::proxy::{
    Channels, Devices, Epg, Interface, Plugins, Recordings, Remote, Setup, Shutdown, Skin, Status,
    Timers, Vdr,
};
use crate::signals::{SignalHub, Subscription};
use crate::transport::{NameOwnerChange, Transport};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, RwLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Observer of availability transitions; receives the new `running` flag.
pub type StatusCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Snapshot of the watchdog's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AvailabilityState {
    pub running: bool,
    /// Set once the interfaces are bound; never cleared.
    pub initialized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogPhase {
    Unbound,
    BoundStopped,
    BoundRunning,
}

impl AvailabilityState {
    pub fn phase(&self) -> WatchdogPhase {
        match (self.initialized, self.running) {
            (false, _) => WatchdogPhase::Unbound,
            (true, false) => WatchdogPhase::BoundStopped,
            (true, true) => WatchdogPhase::BoundRunning,
        }
    }
}

/// Events driving the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogEvent {
    Ready,
    Stop,
    NameOwnerChanged(NameOwnerChange),
}

/// Registry keys, in binding order.
pub const INTERFACE_NAMES: [&str; 12] = [
    Plugins::KEY,
    Remote::KEY,
    Recordings::KEY,
    Vdr::KEY,
    Timers::KEY,
    Status::KEY,
    Skin::KEY,
    Shutdown::KEY,
    Devices::KEY,
    Epg::KEY,
    Setup::KEY,
    Channels::KEY,
];

/// All interface proxies of one VDR instance, bound together.
pub struct InterfaceRegistry {
    pub plugins: Plugins,
    pub remote: Remote,
    pub recordings: Recordings,
    pub vdr: Vdr,
    pub timers: Timers,
    pub status: Status,
    pub skin: Skin,
    pub shutdown: Shutdown,
    pub devices: Devices,
    pub epg: Epg,
    pub setup: Setup,
    pub channels: Channels,
}

impl InterfaceRegistry {
    /// Bind every interface; fails on the first object that cannot be resolved.
    pub async fn bind(
        transport: &Arc<dyn Transport>,
        identity: &ServiceIdentity,
    ) -> Result<Self, VdrError> {
        Ok(Self {
            plugins: Plugins::bind(transport.clone(), identity).await?,
            remote: Remote::bind(transport.clone(), identity).await?,
            recordings: Recordings::bind(transport.clone(), identity).await?,
            vdr: Vdr::bind(transport.clone(), identity).await?,
            timers: Timers::bind(transport.clone(), identity).await?,
            status: Status::bind(transport.clone(), identity).await?,
            skin: Skin::bind(transport.clone(), identity).await?,
            shutdown: Shutdown::bind(transport.clone(), identity).await?,
            devices: Devices::bind(transport.clone(), identity).await?,
            epg: Epg::bind(transport.clone(), identity).await?,
            setup: Setup::bind(transport.clone(), identity).await?,
            channels: Channels::bind(transport.clone(), identity).await?,
        })
    }

    pub fn names(&self) -> &'static [&'static str] {
        &INTERFACE_NAMES
    }

    pub fn contains(&self, key: &str) -> bool {
        INTERFACE_NAMES.contains(&key)
    }
}

/// State shared between the watchdog handle and its dispatcher.
struct Shared {
    identity: ServiceIdentity,
    transport: Arc<dyn Transport>,
    running: RwLock<bool>,
    registry: OnceLock<InterfaceRegistry>,
    observers: RwLock<Vec<StatusCallback>>,
    /// Serializes transitions.
    transition: Mutex<()>,
}

impl Shared {
    fn is_running(&self) -> bool {
        *self.running.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_running(&self, running: bool) {
        *self.running.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = running;
    }

    async fn handle(&self, event: WatchdogEvent) {
        let _guard = self.transition.lock().await;
        debug!("Watchdog event for {}: {:?}", self.identity, event);
        match event {
            WatchdogEvent::Ready => self.startup().await,
            WatchdogEvent::Stop => self.stop(),
            WatchdogEvent::NameOwnerChanged(change) => {
                if change.name == self.identity.bus_name()
                    && change.is_released()
                    && self.is_running()
                    && !self.has_owner().await
                {
                    self.stop();
                }
            }
        }
    }

    /// Whether the service name is owned right now. A release can be
    /// delivered after a restarted VDR already took the name back.
    async fn has_owner(&self) -> bool {
        match self.transport.list_names().await {
            Ok(names) => {
                let owned = names.iter().any(|name| name == self.identity.bus_name());
                if owned {
                    debug!("{} already has a new owner", self.identity);
                }
                owned
            }
            Err(e) => {
                warn!("Could not check whether {} is running: {}", self.identity, e);
                false
            }
        }
    }

    async fn startup(&self) {
        self.set_running(true);
        if self.registry.get().is_none() {
            match InterfaceRegistry::bind(&self.transport, &self.identity).await {
                Ok(registry) => {
                    if self.registry.set(registry).is_ok() {
                        info!("Bound VDR interfaces on {}", self.identity);
                    }
                }
                Err(e) => error!("Failed to bind VDR interfaces on {}: {}", self.identity, e),
            }
        }
        self.notify(true);
    }

    fn stop(&self) {
        self.set_running(false);
        self.notify(false);
    }

    /// Call every observer in registration order; a panicking observer is
    /// logged and skipped.
    fn notify(&self, running: bool) {
        info!(
            "VDR status: {}",
            if running { "running" } else { "stopped" }
        );
        let observers: Vec<StatusCallback> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for (index, observer) in observers.iter().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(running))).is_err() {
                error!("Status observer {} panicked", index);
            }
        }
    }
}

/// Builder for [`ServiceWatchdog`].
pub struct WatchdogBuilder {
    transport: Arc<dyn Transport>,
    instance: u32,
    watchdog: bool,
    observers: Vec<StatusCallback>,
}

impl WatchdogBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            instance: 0,
            watchdog: false,
            observers: Vec::new(),
        }
    }

    /// VDR instance number; 0 is the default instance.
    pub fn instance(mut self, instance: u32) -> Self {
        self.instance = instance;
        self
    }

    /// Track VDR coming and going instead of probing once.
    pub fn watchdog(mut self, watchdog: bool) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Register an observer before construction, so it also sees the
    /// initial transition.
    pub fn on_status_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(callback));
        self
    }

    /// Subscribe (in watchdog mode), look for VDR on the bus, and bind the interfaces
    /// if VDR is already running.
    ///
    /// Only subscription failures are returned; a failing `list_names` is logged and
    /// leaves the watchdog unbound.
    pub async fn connect(self) -> Result<ServiceWatchdog, VdrError> {
        let identity = ServiceIdentity::new(self.instance);
        let shared = Arc::new(Shared {
            identity: identity.clone(),
            transport: self.transport.clone(),
            running: RwLock::new(false),
            registry: OnceLock::new(),
            observers: RwLock::new(self.observers),
            transition: Mutex::new(()),
        });
        let signals = SignalHub::new(self.transport.clone(), identity.clone());

        let mut subscriptions = Vec::new();
        let mut dispatcher = None;
        if self.watchdog {
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            dispatcher = Some(tokio::spawn(dispatch(shared.clone(), event_rx)));

            // One subscription for Ready and Stop keeps them in bus order.
            let tx = event_tx.clone();
            subscriptions.push(
                signals
                    .service_signals(move |signal| {
                        let event = match signal.member.as_str() {
                            "Ready" => WatchdogEvent::Ready,
                            "Stop" => WatchdogEvent::Stop,
                            _ => return,
                        };
                        let _ = tx.send(event);
                    })
                    .await?,
            );
            let tx = event_tx;
            let owner_watch = self
                .transport
                .watch_name_owner(Arc::new(move |change: &NameOwnerChange| {
                    let _ = tx.send(WatchdogEvent::NameOwnerChanged(change.clone()));
                }))
                .await?;
            subscriptions.push(Subscription::new("NameOwnerChanged", owner_watch));
            debug!("Watching {}", identity);
        }

        match self.transport.list_names().await {
            Ok(names) if names.iter().any(|name| name == identity.bus_name()) => {
                shared.handle(WatchdogEvent::Ready).await;
            }
            Ok(_) => debug!("{} is not on the bus", identity),
            Err(e) => warn!("Could not check whether {} is running: {}", identity, e),
        }

        Ok(ServiceWatchdog {
            shared,
            signals,
            subscriptions,
            dispatcher,
        })
    }
}

async fn dispatch(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<WatchdogEvent>) {
    while let Some(event) = events.recv().await {
        shared.handle(event).await;
    }
    debug!("Watchdog dispatcher for {} stopped", shared.identity);
}

/// Tracks one VDR instance and owns its interface proxies.
pub struct ServiceWatchdog {
    shared: Arc<Shared>,
    signals: SignalHub,
    subscriptions: Vec<Subscription>,
    dispatcher: Option<JoinHandle<()>>,
}

impl ServiceWatchdog {
    /// Construct with default options; see [`WatchdogBuilder`].
    pub async fn connect(
        transport: Arc<dyn Transport>,
        instance: u32,
        watchdog: bool,
    ) -> Result<Self, VdrError> {
        WatchdogBuilder::new(transport)
            .instance(instance)
            .watchdog(watchdog)
            .connect()
            .await
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.shared.identity
    }

    pub fn state(&self) -> AvailabilityState {
        AvailabilityState {
            running: self.shared.is_running(),
            initialized: self.shared.registry.get().is_some(),
        }
    }

    pub fn phase(&self) -> WatchdogPhase {
        self.state().phase()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.registry.get().is_some()
    }

    /// Whether watchdog subscriptions are active.
    pub fn is_watching(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Append an observer; it sees transitions from now on.
    pub fn add_status_callback<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.shared
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(callback));
    }

    /// Feed an event directly, as if it had arrived from the bus.
    pub async fn handle_event(&self, event: WatchdogEvent) {
        self.shared.handle(event).await;
    }

    pub fn signals(&self) -> &SignalHub {
        &self.signals
    }

    /// The bound interfaces, once VDR has been seen running.
    pub fn interfaces(&self) -> Option<&InterfaceRegistry> {
        self.shared.registry.get()
    }

    fn registry(&self, key: &'static str) -> Result<&InterfaceRegistry, VdrError> {
        self.interfaces().ok_or(VdrError::NotInitialized(key))
    }

    pub fn channels(&self) -> Result<&Channels, VdrError> {
        Ok(&self.registry(Channels::KEY)?.channels)
    }

    pub fn devices(&self) -> Result<&Devices, VdrError> {
        Ok(&self.registry(Devices::KEY)?.devices)
    }

    pub fn epg(&self) -> Result<&Epg, VdrError> {
        Ok(&self.registry(Epg::KEY)?.epg)
    }

    pub fn plugins(&self) -> Result<&Plugins, VdrError> {
        Ok(&self.registry(Plugins::KEY)?.plugins)
    }

    pub fn recordings(&self) -> Result<&Recordings, VdrError> {
        Ok(&self.registry(Recordings::KEY)?.recordings)
    }

    pub fn remote(&self) -> Result<&Remote, VdrError> {
        Ok(&self.registry(Remote::KEY)?.remote)
    }

    pub fn setup(&self) -> Result<&Setup, VdrError> {
        Ok(&self.registry(Setup::KEY)?.setup)
    }

    pub fn shutdown(&self) -> Result<&Shutdown, VdrError> {
        Ok(&self.registry(Shutdown::KEY)?.shutdown)
    }

    pub fn skin(&self) -> Result<&Skin, VdrError> {
        Ok(&self.registry(Skin::KEY)?.skin)
    }

    pub fn status(&self) -> Result<&Status, VdrError> {
        Ok(&self.registry(Status::KEY)?.status)
    }

    pub fn timers(&self) -> Result<&Timers, VdrError> {
        Ok(&self.registry(Timers::KEY)?.timers)
    }

    pub fn vdr(&self) -> Result<&Vdr, VdrError> {
        Ok(&self.registry(Vdr::KEY)?.vdr)
    }

    /// Release the watchdog subscriptions and stop the dispatcher.
    pub fn close(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
    }
}

impl Drop for ServiceWatchdog {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<bool>>>, impl Fn(bool) + Send + Sync + 'static) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |running| sink.lock().unwrap().push(running))
    }

    #[test]
    fn test_phase_from_state() {
        let mut state = AvailabilityState::default();
        assert_eq!(state.phase(), WatchdogPhase::Unbound);
        state.running = true;
        assert_eq!(state.phase(), WatchdogPhase::Unbound);
        state.initialized = true;
        assert_eq!(state.phase(), WatchdogPhase::BoundRunning);
        state.running = false;
        assert_eq!(state.phase(), WatchdogPhase::BoundStopped);
    }

    #[tokio::test]
    async fn test_connect_binds_running_service() {
        let transport = MemoryTransport::new();
        transport.add_name("de.tvdr.vdr");
        let (seen, observer) = recorder();

        let watchdog = WatchdogBuilder::new(Arc::new(transport.clone()))
            .on_status_change(observer)
            .connect()
            .await
            .unwrap();

        assert_eq!(watchdog.phase(), WatchdogPhase::BoundRunning);
        assert_eq!(*seen.lock().unwrap(), vec![true]);
        assert_eq!(transport.resolve_count(), INTERFACE_NAMES.len());
        assert!(!watchdog.is_watching());
        assert!(watchdog.channels().is_ok());
    }

    #[tokio::test]
    async fn test_accessors_fail_before_binding() {
        let transport = MemoryTransport::new();
        let watchdog = ServiceWatchdog::connect(Arc::new(transport), 0, false)
            .await
            .unwrap();
        assert!(matches!(
            watchdog.channels(),
            Err(VdrError::NotInitialized("Channels"))
        ));
        assert!(watchdog.interfaces().is_none());
    }

    #[tokio::test]
    async fn test_handle_event_sequence() {
        let transport = MemoryTransport::new();
        transport.add_name("de.tvdr.vdr2");
        let (seen, observer) = recorder();
        let watchdog = WatchdogBuilder::new(Arc::new(transport.clone()))
            .instance(5)
            .on_status_change(observer)
            .connect()
            .await
            .unwrap();
        assert_eq!(watchdog.identity().bus_name(), "de.tvdr.vdr5");
        assert!(seen.lock().unwrap().is_empty());

        transport.add_name("de.tvdr.vdr5");
        watchdog.handle_event(WatchdogEvent::Ready).await;
        watchdog.handle_event(WatchdogEvent::Stop).await;
        watchdog.handle_event(WatchdogEvent::Stop).await;

        assert_eq!(*seen.lock().unwrap(), vec![true, false, false]);
        assert_eq!(watchdog.phase(), WatchdogPhase::BoundStopped);
    }

    #[tokio::test]
    async fn test_owner_change_only_stops_running_service() {
        let transport = MemoryTransport::new();
        transport.add_name("de.tvdr.vdr");
        let (seen, observer) = recorder();
        let watchdog = WatchdogBuilder::new(Arc::new(transport.clone()))
            .on_status_change(observer)
            .connect()
            .await
            .unwrap();

        transport.remove_name("de.tvdr.vdr");
        let gone = NameOwnerChange {
            name: "de.tvdr.vdr".to_string(),
            old_owner: Some(":1.4".to_string()),
            new_owner: None,
        };
        watchdog
            .handle_event(WatchdogEvent::NameOwnerChanged(gone.clone()))
            .await;
        watchdog
            .handle_event(WatchdogEvent::NameOwnerChanged(gone))
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
        assert!(!watchdog.is_running());
        assert!(watchdog.is_initialized());
    }

    #[tokio::test]
    async fn test_stale_release_after_restart_is_ignored() {
        let transport = MemoryTransport::new();
        transport.add_name("de.tvdr.vdr");
        let (seen, observer) = recorder();
        let watchdog = WatchdogBuilder::new(Arc::new(transport.clone()))
            .on_status_change(observer)
            .connect()
            .await
            .unwrap();

        // The restarted VDR owns the name again when the old release arrives
        transport.add_name("de.tvdr.vdr");
        let old_release = NameOwnerChange {
            name: "de.tvdr.vdr".to_string(),
            old_owner: Some(":1.0".to_string()),
            new_owner: None,
        };
        watchdog
            .handle_event(WatchdogEvent::NameOwnerChanged(old_release))
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![true]);
        assert!(watchdog.is_running());
    }

    #[tokio::test]
    async fn test_observers_called_in_registration_order() {
        let transport = MemoryTransport::new();
        transport.add_name("de.tvdr.vdr");
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let tagged = |tag: &'static str| {
            let sink = calls.clone();
            move |running: bool| sink.lock().unwrap().push(format!("{}:{}", tag, running))
        };
        let watchdog = WatchdogBuilder::new(Arc::new(transport))
            .on_status_change(tagged("A"))
            .on_status_change(tagged("B"))
            .connect()
            .await
            .unwrap();
        watchdog.add_status_callback(tagged("C"));

        watchdog.handle_event(WatchdogEvent::Ready).await;
        watchdog.handle_event(WatchdogEvent::Stop).await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["A:true", "B:true", "A:true", "B:true", "C:true", "A:false", "B:false", "C:false"]
        );
    }

    #[tokio::test]
    async fn test_observer_added_later_sees_following_transitions() {
        let transport = MemoryTransport::new();
        transport.add_name("de.tvdr.vdr");
        let watchdog = ServiceWatchdog::connect(Arc::new(transport), 0, false)
            .await
            .unwrap();
        let (seen, observer) = recorder();
        watchdog.add_status_callback(observer);

        watchdog.handle_event(WatchdogEvent::Stop).await;
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_registry_keys() {
        assert_eq!(INTERFACE_NAMES.len(), 12);
        assert!(INTERFACE_NAMES.contains(&"Channels"));
        assert!(INTERFACE_NAMES.contains(&"EPG"));
        assert!(INTERFACE_NAMES.contains(&"Vdr"));
    }
}
