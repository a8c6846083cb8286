//! Subscriptions to VDR's D-Bus signals.
//!
//! [`SignalHub`] turns requests like "tell me when the channel switches" into
//! transport subscriptions on `(object path, interface, signal)`. Every
//! callback receives the same [`Signal`] record, so one handler can serve
//! several subscriptions and tell them apart by `member`.
//!
//! # Usage
//!
//! ```ignore
//! let hub = SignalHub::new(transport, ServiceIdentity::default());
//! let sub = hub
//!     .channel_switch(|signal| println!("{:?}", signal.parameters))
//!     .await?;
//! // ...
//! sub.unsubscribe();
//! ```

use crate::error::VdrError;
use crate::identity::ServiceIdentity;
use crate::transport::{SignalRule, Transport, TransportSubscription};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub use crate::transport::Signal;

/// A live signal subscription. Dropping it unsubscribes.
pub struct Subscription {
    label: String,
    inner: Mutex<Option<Box<dyn TransportSubscription>>>,
}

impl Subscription {
    pub(crate) fn new(label: impl Into<String>, inner: Box<dyn TransportSubscription>) -> Self {
        Self {
            label: label.into(),
            inner: Mutex::new(Some(inner)),
        }
    }

    /// Stop receiving signals. Safe to call repeatedly and from within the
    /// subscription's own callback.
    pub fn unsubscribe(&self) {
        let taken = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(mut inner) = taken {
            inner.cancel();
            debug!("Unsubscribed from {}", self.label);
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Signal subscriptions for one VDR instance.
#[derive(Clone)]
pub struct SignalHub {
    transport: Arc<dyn Transport>,
    identity: ServiceIdentity,
}

impl SignalHub {
    pub fn new(transport: Arc<dyn Transport>, identity: ServiceIdentity) -> Self {
        Self {
            transport,
            identity,
        }
    }

    /// Subscribe to `signal` on `<namespace><interface_suffix>` at
    /// `object_path`, or to every signal on that interface when `signal` is
    /// `None`. Only signals sent by this instance's bus name are delivered.
    pub async fn subscribe<F>(
        &self,
        object_path: &str,
        interface_suffix: &str,
        signal: Option<&str>,
        callback: F,
    ) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let rule = SignalRule {
            sender: Some(self.identity.bus_name().to_string()),
            object_path: object_path.to_string(),
            interface: self.identity.interface_name(interface_suffix),
            member: signal.map(str::to_string),
        };
        let label = rule.to_string();
        let inner = self.transport.subscribe(rule, Arc::new(callback)).await?;
        debug!("Subscribed to {}", label);
        Ok(Subscription::new(label, inner))
    }

    /// Every signal of `/Status`.
    pub async fn status_signals<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", None, callback).await
    }

    /// Answer to a `Remote.AskUser` menu.
    pub async fn ask_user_select<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Remote", ".remote", Some("AskUserSelect"), callback)
            .await
    }

    pub async fn channel_switch<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", Some("ChannelSwitch"), callback)
            .await
    }

    pub async fn recording<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", Some("Recording"), callback)
            .await
    }

    pub async fn replaying<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", Some("Replaying"), callback)
            .await
    }

    pub async fn set_audio_channel<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", Some("SetAudioChannel"), callback)
            .await
    }

    pub async fn set_audio_track<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", Some("SetAudioTrack"), callback)
            .await
    }

    pub async fn set_subtitle_track<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", Some("SetSubtitleTrack"), callback)
            .await
    }

    pub async fn set_volume<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", Some("SetVolume"), callback)
            .await
    }

    pub async fn timer_change<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/Status", ".status", Some("TimerChange"), callback)
            .await
    }

    /// Every signal of the base `/vdr` object.
    pub async fn service_signals<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/vdr", ".vdr", None, callback).await
    }

    pub async fn service_ready<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/vdr", ".vdr", Some("Ready"), callback).await
    }

    pub async fn service_start<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/vdr", ".vdr", Some("Start"), callback).await
    }

    pub async fn service_stop<F>(&self, callback: F) -> Result<Subscription, VdrError>
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe("/vdr", ".vdr", Some("Stop"), callback).await
    }
}
