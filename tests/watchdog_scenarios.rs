//! Watchdog behavior against an in-memory bus.

use dbus2vdr::proxy::Interface;
use dbus2vdr::transport::NameOwnerChange;
use dbus2vdr::{MemoryTransport, ServiceWatchdog, WatchdogBuilder, WatchdogPhase};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const VDR: &str = "de.tvdr.vdr";

async fn watching(
    transport: &MemoryTransport,
) -> (ServiceWatchdog, mpsc::UnboundedReceiver<bool>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let watchdog = WatchdogBuilder::new(Arc::new(transport.clone()))
        .watchdog(true)
        .on_status_change(move |running| {
            let _ = tx.send(running);
        })
        .connect()
        .await
        .unwrap();
    (watchdog, rx)
}

async fn next_status(rx: &mut mpsc::UnboundedReceiver<bool>) -> bool {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no status change within 2s")
        .expect("observer channel closed")
}

/// Give the dispatcher a chance to run and make sure nothing fired.
async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<bool>) {
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}

fn ready(transport: &MemoryTransport) {
    transport.emit_signal(VDR, "/vdr", "de.tvdr.vdr.vdr", "Ready", vec![]);
}

fn stop(transport: &MemoryTransport) {
    transport.emit_signal(VDR, "/vdr", "de.tvdr.vdr.vdr", "Stop", vec![]);
}

#[tokio::test]
async fn test_absent_service_fire_and_forget() {
    let transport = MemoryTransport::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watchdog = WatchdogBuilder::new(Arc::new(transport.clone()))
        .on_status_change(move |running| {
            let _ = tx.send(running);
        })
        .connect()
        .await
        .unwrap();

    assert_eq!(watchdog.phase(), WatchdogPhase::Unbound);
    assert!(!watchdog.is_running());
    assert!(!watchdog.is_watching());
    assert_eq!(transport.subscriber_count(), 0);
    assert_eq!(transport.resolve_count(), 0);

    // Nobody listens for Ready without watchdog mode
    transport.add_name(VDR);
    ready(&transport);
    assert_quiet(&mut rx).await;
    assert_eq!(watchdog.phase(), WatchdogPhase::Unbound);
}

#[tokio::test]
async fn test_list_names_failure_leaves_watchdog_unbound() {
    let transport = MemoryTransport::new();
    transport.add_name(VDR);
    transport.fail_list_names(true);

    let (watchdog, mut rx) = watching(&transport).await;
    assert_eq!(watchdog.phase(), WatchdogPhase::Unbound);
    assert!(!watchdog.is_running());
    assert_quiet(&mut rx).await;

    ready(&transport);
    assert!(next_status(&mut rx).await);
    assert_eq!(watchdog.phase(), WatchdogPhase::BoundRunning);
}

#[tokio::test]
async fn test_ready_stop_ready_binds_once() {
    let transport = MemoryTransport::new();
    let (watchdog, mut rx) = watching(&transport).await;
    assert_eq!(watchdog.phase(), WatchdogPhase::Unbound);
    assert_eq!(transport.subscriber_count(), 1);

    transport.add_name(VDR);
    ready(&transport);
    assert!(next_status(&mut rx).await);
    assert_eq!(transport.resolve_count(), 12);
    let registry = watchdog.interfaces().unwrap();
    assert_eq!(registry.channels.object().object_path(), "/Channels");

    stop(&transport);
    assert!(!next_status(&mut rx).await);
    assert_eq!(watchdog.phase(), WatchdogPhase::BoundStopped);
    assert!(watchdog.channels().is_ok());

    ready(&transport);
    assert!(next_status(&mut rx).await);
    assert_eq!(watchdog.phase(), WatchdogPhase::BoundRunning);
    assert_eq!(transport.resolve_count(), 12);
}

#[tokio::test]
async fn test_connect_binds_running_service() {
    let transport = MemoryTransport::new();
    transport.add_name(VDR);

    let (watchdog, mut rx) = watching(&transport).await;
    assert!(next_status(&mut rx).await);
    assert_eq!(watchdog.phase(), WatchdogPhase::BoundRunning);
    assert!(watchdog.is_watching());
}

#[tokio::test]
async fn test_unrelated_owner_change_is_ignored() {
    let transport = MemoryTransport::new();
    transport.add_name(VDR);
    let (watchdog, mut rx) = watching(&transport).await;
    assert!(next_status(&mut rx).await);

    transport.add_name("org.freedesktop.Notifications");
    transport.remove_name("org.freedesktop.Notifications");
    transport.remove_name("de.tvdr.vdr1");
    assert_quiet(&mut rx).await;
    assert!(watchdog.is_running());
}

#[tokio::test]
async fn test_lost_owner_stops_running_service() {
    let transport = MemoryTransport::new();
    transport.add_name(VDR);
    let (watchdog, mut rx) = watching(&transport).await;
    assert!(next_status(&mut rx).await);

    transport.remove_name(VDR);
    assert!(!next_status(&mut rx).await);
    assert!(!watchdog.is_running());
    assert!(watchdog.is_initialized());

    // Already stopped: the second release fires nothing
    transport.announce(NameOwnerChange {
        name: VDR.to_string(),
        old_owner: Some(":1.9".to_string()),
        new_owner: Some(String::new()),
    });
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_stop_fires_even_when_stopped() {
    let transport = MemoryTransport::new();
    let (watchdog, mut rx) = watching(&transport).await;

    stop(&transport);
    assert!(!next_status(&mut rx).await);
    stop(&transport);
    assert!(!next_status(&mut rx).await);
    assert_eq!(watchdog.phase(), WatchdogPhase::Unbound);
}

#[tokio::test]
async fn test_bind_failure_retries_on_next_ready() {
    let transport = MemoryTransport::new();
    transport.add_name(VDR);
    transport.fail_resolve("/EPG", true);

    let (watchdog, mut rx) = watching(&transport).await;
    assert!(next_status(&mut rx).await);
    assert!(watchdog.is_running());
    assert!(!watchdog.is_initialized());
    assert!(watchdog.interfaces().is_none());

    transport.fail_resolve("/EPG", false);
    ready(&transport);
    assert!(next_status(&mut rx).await);
    assert!(watchdog.is_initialized());
    assert!(watchdog.epg().is_ok());
}

#[tokio::test]
async fn test_panicking_observer_is_isolated() {
    let transport = MemoryTransport::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watchdog = WatchdogBuilder::new(Arc::new(transport.clone()))
        .watchdog(true)
        .on_status_change(|_| panic!("observer bug"))
        .on_status_change(move |running| {
            let _ = tx.send(running);
        })
        .connect()
        .await
        .unwrap();

    transport.add_name(VDR);
    ready(&transport);
    assert!(next_status(&mut rx).await);
    stop(&transport);
    assert!(!next_status(&mut rx).await);
    assert_eq!(watchdog.phase(), WatchdogPhase::BoundStopped);
}

#[tokio::test]
async fn test_drop_releases_subscriptions() {
    let transport = MemoryTransport::new();
    let (watchdog, _rx) = watching(&transport).await;
    assert_eq!(transport.subscriber_count(), 1);

    drop(watchdog);
    assert_eq!(transport.subscriber_count(), 0);
}

#[tokio::test]
async fn test_instances_are_watched_independently() {
    let transport = MemoryTransport::new();
    transport.add_name(VDR);
    transport.add_name("de.tvdr.vdr2");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let second = WatchdogBuilder::new(Arc::new(transport.clone()))
        .instance(2)
        .watchdog(true)
        .on_status_change(move |running| {
            let _ = tx.send(running);
        })
        .connect()
        .await
        .unwrap();
    assert!(next_status(&mut rx).await);

    // Instance 0 stopping and restarting is not instance 2's business
    stop(&transport);
    transport.remove_name(VDR);
    transport.add_name(VDR);
    ready(&transport);
    assert_quiet(&mut rx).await;
    assert!(second.is_running());

    transport.emit_signal("de.tvdr.vdr2", "/vdr", "de.tvdr.vdr.vdr", "Stop", vec![]);
    assert!(!next_status(&mut rx).await);
    assert!(!second.is_running());
}

#[tokio::test]
async fn test_restart_keeps_service_running() {
    let transport = MemoryTransport::new();
    transport.add_name(VDR);
    let (watchdog, mut rx) = watching(&transport).await;
    assert!(next_status(&mut rx).await);

    // The new process owns the name before the old release is handled
    transport.add_name(VDR);
    transport.announce(NameOwnerChange {
        name: VDR.to_string(),
        old_owner: Some(":1.0".to_string()),
        new_owner: None,
    });
    ready(&transport);
    assert!(next_status(&mut rx).await);
    assert_quiet(&mut rx).await;
    assert!(watchdog.is_running());
}

#[tokio::test]
async fn test_observers_see_transitions_in_registration_order() {
    let transport = MemoryTransport::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let tagged = |tag: &'static str| {
        let sink = calls.clone();
        move |running: bool| sink.lock().unwrap().push(format!("{}:{}", tag, running))
    };
    let watchdog = WatchdogBuilder::new(Arc::new(transport.clone()))
        .watchdog(true)
        .on_status_change(tagged("A"))
        .on_status_change(tagged("B"))
        .on_status_change(tagged("C"))
        .on_status_change(move |running| {
            let _ = done_tx.send(running);
        })
        .connect()
        .await
        .unwrap();

    transport.add_name(VDR);
    ready(&transport);
    assert!(next_status(&mut done_rx).await);
    stop(&transport);
    assert!(!next_status(&mut done_rx).await);

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["A:true", "B:true", "C:true", "A:false", "B:false", "C:false"]
    );
    assert_eq!(watchdog.phase(), WatchdogPhase::BoundStopped);
}
