//! Property-based tests for the full session.
//!
//! Arbitrary sequences of user operations, server drops and elapsed time are
//! applied to a simulated session. The standard invariants must hold after
//! every step once in-flight frames have been delivered.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::time::Duration;

use chatlink_client::{ChannelId, ConnectionState};
use chatlink_harness::Simulation;
use proptest::prelude::*;

const CHANNELS: [&str; 3] = ["general", "random", "ops"];

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Disconnect,
    Join(usize),
    Leave(usize),
    Switch(Option<usize>),
    Navigate(usize),
    Send(usize),
    Typing(usize, bool),
    DropConnection,
    Advance(u64),
}

fn channel(index: usize) -> ChannelId {
    ChannelId::from(CHANNELS[index % CHANNELS.len()])
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let index = 0..CHANNELS.len();
    prop_oneof![
        2 => Just(Op::Connect),
        1 => Just(Op::Disconnect),
        3 => index.clone().prop_map(Op::Join),
        2 => index.clone().prop_map(Op::Leave),
        3 => prop::option::of(index.clone()).prop_map(Op::Switch),
        1 => index.clone().prop_map(Op::Navigate),
        2 => index.clone().prop_map(Op::Send),
        1 => (index, any::<bool>()).prop_map(|(i, t)| Op::Typing(i, t)),
        1 => Just(Op::DropConnection),
        2 => (10u64..6_000).prop_map(Op::Advance),
    ]
}

async fn apply(sim: &mut Simulation, op: &Op) {
    let handle = sim.handle().clone();

    // Guard rejections (sending while disconnected) are expected outcomes.
    let _ = match op {
        Op::Connect => handle.connect("42").await,
        Op::Disconnect => handle.disconnect().await,
        Op::Join(i) => handle.join(channel(*i)).await,
        Op::Leave(i) => handle.leave(channel(*i)).await,
        Op::Switch(target) => handle.switch_channel(target.map(channel)).await,
        Op::Navigate(i) => handle.navigate(format!("/channels/{}", CHANNELS[*i])).await,
        Op::Send(i) => handle.send_message(channel(*i), "hello").await,
        Op::Typing(i, typing) => handle.send_typing(channel(*i), *typing).await,
        Op::DropConnection => {
            sim.server().drop_connection("dropped");
            Ok(())
        },
        Op::Advance(ms) => {
            sim.advance(Duration::from_millis(*ms)).await;
            Ok(())
        },
    };

    sim.settle().await;
}

fn run(seed: u64, ops: &[Op]) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let mut sim = Simulation::start(seed);

        for (step, op) in ops.iter().enumerate() {
            apply(&mut sim, op).await;
            sim.assert_invariants(&format!("at step {step} after {op:?}"));
        }

        sim.shutdown().await;
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Invariants hold under arbitrary operation sequences.
    #[test]
    fn prop_invariants_hold(seed in any::<u64>(), ops in prop::collection::vec(op_strategy(), 1..40)) {
        run(seed, &ops);
    }

    /// A connected, settled session with no switch in flight agrees with
    /// the server, and the active channel is always the last switch target
    /// once acknowledgments arrive.
    #[test]
    fn prop_switch_settles_on_last_target(targets in prop::collection::vec(0..CHANNELS.len(), 1..8)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let mut sim = Simulation::start(0);
            let handle = sim.handle().clone();
            handle.connect("42").await.unwrap();
            handle.join("general").await.unwrap();
            sim.settle().await;

            for target in &targets {
                handle.switch_channel(Some(channel(*target))).await.unwrap();
            }

            // Debounce retries and acknowledgments.
            sim.advance(Duration::from_secs(1)).await;

            let snapshot = handle.snapshot();
            prop_assert_eq!(snapshot.state, ConnectionState::Connected);
            prop_assert!(!snapshot.switching);
            prop_assert_eq!(snapshot.active, targets.last().map(|t| channel(*t)));
            sim.assert_invariants("after switches");

            sim.shutdown().await;
            Ok(())
        })?;
    }
}
