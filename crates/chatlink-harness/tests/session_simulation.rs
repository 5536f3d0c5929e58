//! Full-session scenarios against the scripted server.
//!
//! Each test runs the production runtime over the simulation driver with
//! tokio's clock paused, so reconnect backoff and acknowledgment timeouts
//! elapse instantly and deterministically.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::time::Duration;

use chatlink_app::{RuntimeConfig, RuntimeError};
use chatlink_client::{ChannelId, ConnectionState, ErrorCode, MessageType, Notification};
use chatlink_harness::{ServerBehavior, Simulation};
use serde_json::json;

fn channel(id: &str) -> ChannelId {
    ChannelId::from(id)
}

fn transitions(sim: &Simulation) -> Vec<String> {
    sim.snapshot().transitions.iter().map(|(from, to)| format!("{from} -> {to}")).collect()
}

#[tokio::test(start_paused = true)]
async fn connect_join_send_switch() {
    let mut sim = Simulation::start(1);
    let handle = sim.handle().clone();

    handle.connect("42").await.unwrap();
    handle.join("general").await.unwrap();
    sim.settle().await;

    handle.send_message("general", "hello").await.unwrap();
    sim.settle().await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.active, Some(channel("general")));
    assert_eq!(snapshot.messages.len(), 1, "echo must not duplicate the optimistic entry");
    assert_eq!(snapshot.messages[0].text, "hello");
    sim.assert_invariants("after send");

    handle.switch_channel(Some(channel("random"))).await.unwrap();
    sim.settle().await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.active, Some(channel("random")));
    assert!(!snapshot.switching);
    assert_eq!(sim.server().channels(), Some([channel("random")].into()));
    sim.assert_invariants("after switch");

    let kinds: Vec<_> = sim.server().received_kinds().iter().map(|k| k.as_str()).collect();
    insta::assert_json_snapshot!(kinds, @r#"
    [
      "channel.join",
      "channel.message",
      "channel.leave",
      "channel.join"
    ]
    "#);

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn server_drop_reconnects_and_rejoins() {
    let mut sim = Simulation::start(2);
    let handle = sim.handle().clone();

    handle.connect("42").await.unwrap();
    handle.join("general").await.unwrap();
    sim.settle().await;

    sim.server().drop_connection("server restart");
    sim.settle().await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Reconnecting);
    assert!(snapshot.joined.is_empty());
    sim.assert_invariants("while reconnecting");

    sim.advance(Duration::from_millis(1_100)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.active, Some(channel("general")));
    assert_eq!(sim.server().opens(), 2);
    assert_eq!(sim.server().channels(), Some([channel("general")].into()));
    sim.assert_invariants("after reconnect");

    insta::assert_json_snapshot!(transitions(&sim), @r#"
    [
      "disconnected -> connecting",
      "connecting -> connected",
      "connected -> disconnected",
      "disconnected -> reconnecting",
      "reconnecting -> connecting",
      "connecting -> connected"
    ]
    "#);

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn refused_initial_connect_is_terminal() {
    let mut sim = Simulation::start(3);
    let handle = sim.handle().clone();
    sim.server().refuse_next(1);

    let result = handle.connect("42").await;
    let Err(RuntimeError::ConnectFailed(info)) = result else {
        panic!("expected connect failure, got {result:?}");
    };
    assert_eq!(info.code, ErrorCode::ConnectionFailed);

    // No automatic retry after an initial failure.
    sim.advance(Duration::from_secs(5)).await;
    assert_eq!(handle.snapshot().state, ConnectionState::Error);
    assert_eq!(sim.server().opens(), 0);
    assert!(sim.notifications().iter().any(|n| matches!(n, Notification::ConnectFailed(_))));

    handle.connect("42").await.unwrap();
    sim.settle().await;
    assert_eq!(handle.snapshot().state, ConnectionState::Connected);
    sim.assert_invariants("after retry");

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnect_budget_ends_in_error() {
    let mut sim = Simulation::start(4);
    let handle = sim.handle().clone();

    handle.connect("42").await.unwrap();
    sim.server().refuse_next(u32::MAX);
    sim.server().drop_connection("gone");

    // 1 + 2 + 4 + 8 + 16 seconds of backoff.
    sim.advance(Duration::from_secs(40)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Error);
    assert_eq!(
        snapshot.last_error.map(|e| e.code),
        Some(ErrorCode::MaxReconnectAttemptsExceeded)
    );

    let scheduled = sim
        .notifications()
        .iter()
        .filter(|n| matches!(n, Notification::ReconnectScheduled { .. }))
        .count();
    assert_eq!(scheduled, 5);
    sim.assert_invariants("after giving up");

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_leave_times_out() {
    let behavior = ServerBehavior { ack_leaves: false, ..ServerBehavior::default() };
    let mut sim = Simulation::with_config(5, RuntimeConfig::default(), behavior);
    let handle = sim.handle().clone();

    handle.connect("42").await.unwrap();
    handle.join("general").await.unwrap();
    sim.settle().await;

    handle.switch_channel(Some(channel("random"))).await.unwrap();
    sim.settle().await;

    let snapshot = handle.snapshot();
    assert!(snapshot.switching);
    assert_eq!(snapshot.active, None);
    sim.assert_invariants("while switching");

    sim.advance(Duration::from_secs(5)).await;

    let snapshot = handle.snapshot();
    assert!(!snapshot.switching);
    assert_eq!(snapshot.active, Some(channel("random")));
    assert_eq!(sim.server().channels(), Some([channel("random")].into()));
    sim.assert_invariants("after timeout");

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_leaves_everything() {
    let mut sim = Simulation::start(6);
    let handle = sim.handle().clone();

    handle.connect("42").await.unwrap();
    handle.join("general").await.unwrap();
    handle.join("random").await.unwrap();
    sim.settle().await;

    handle.disconnect().await.unwrap();
    sim.settle().await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert!(snapshot.joined.is_empty());
    assert_eq!(snapshot.user_id, None);
    assert!(!sim.server().is_connected());

    let leaves = sim
        .server()
        .received_kinds()
        .into_iter()
        .filter(|k| *k == MessageType::ChannelLeave)
        .count();
    assert_eq!(leaves, 2);

    let result = handle.send_message("general", "too late").await;
    assert!(matches!(result, Err(RuntimeError::Client(_))));
    sim.assert_invariants("after disconnect");

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn server_errors_surface_as_last_error() {
    let mut sim = Simulation::start(7);
    let handle = sim.handle().clone();

    handle.connect("42").await.unwrap();
    sim.server().push(MessageType::Error, json!({ "code": 429, "message": "slow down" }));
    sim.settle().await;

    let error = handle.snapshot().last_error.unwrap();
    assert_eq!(error.code, ErrorCode::Server(Some("429".into())));
    assert_eq!(error.message, "slow down");
    assert_eq!(handle.snapshot().state, ConnectionState::Connected);

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped() {
    let mut sim = Simulation::start(8);
    let handle = sim.handle().clone();

    handle.connect("42").await.unwrap();
    handle.join("general").await.unwrap();
    sim.settle().await;
    let before = handle.snapshot();

    sim.server().push_raw("not json");
    sim.server().push_raw(r#"{"id":"x","data":{"channel_id":"general","text":"hi"}}"#);
    sim.server().push_raw(r#"{"id":"x","type":"bogus.kind","data":{}}"#);
    sim.settle().await;

    assert_eq!(handle.snapshot(), before);
    sim.assert_invariants("after malformed frames");

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn same_seed_same_envelope_ids() {
    async fn run(seed: u64) -> Vec<String> {
        let mut sim = Simulation::start(seed);
        let handle = sim.handle().clone();
        handle.connect("42").await.unwrap();
        handle.join("general").await.unwrap();
        handle.send_message("general", "hello").await.unwrap();
        sim.settle().await;
        let ids = sim.server().received().into_iter().map(|e| e.id).collect();
        sim.shutdown().await;
        ids
    }

    assert_eq!(run(9).await, run(9).await);
    assert_ne!(run(9).await, run(10).await);
}
