//! Delta-cycle convergence, wired-OR merging and iteration bounds of the
//! net-level engine.

#![allow(clippy::pedantic, clippy::nursery)]

use std::any::Any;

use logic_core::{
    Engine, ErrorClass, Gate, GateKind, Not, Part, PinOutputs, PinSpec, PinView, Settle, Signal,
    SimConfig, SimError, TraceEvent, TriggerKind,
};
use log as _;
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

/// Counts its runs and mirrors `a` onto `y`.
#[derive(Default)]
struct Tap {
    runs: u32,
}

impl Part for Tap {
    fn pins(&self) -> Vec<PinSpec> {
        vec![PinSpec::input("a", 4), PinSpec::output("y", 4)]
    }

    fn run(&mut self, view: &PinView<'_>, outputs: &mut PinOutputs<'_>) -> Result<(), SimError> {
        self.runs += 1;
        outputs.set(1, view.read(0))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Falling-edge toggle on `clk`, driving `q`.
#[derive(Default)]
struct FallingToggle {
    state: bool,
}

impl Part for FallingToggle {
    fn pins(&self) -> Vec<PinSpec> {
        vec![
            PinSpec::new("clk", 1, &[TriggerKind::Falling]),
            PinSpec::output("q", 1),
        ]
    }

    fn run(&mut self, view: &PinView<'_>, outputs: &mut PinOutputs<'_>) -> Result<(), SimError> {
        if view.fell(0) {
            self.state = !self.state;
        }
        outputs.set(1, u64::from(self.state))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn feed_forward_pair_reaches_fixpoint_and_or_merges_shared_net() {
    let mut builder = Engine::builder(SimConfig::default());
    let a = builder.add("a", Tap::default()).expect("fresh");
    let b = builder.add("b", Not::new(4)).expect("fresh");
    let invert = builder.add("invert", Not::new(4)).expect("fresh");
    let pass = builder.add("pass", Gate::new(GateKind::Or, 4)).expect("fresh");

    let x = builder.net("x", 4).expect("fresh");
    let y = builder.net("y", 4).expect("fresh");
    let z = builder.net("z", 4).expect("fresh");
    let shared = builder.net("shared", 4).expect("fresh");
    builder.connect(x, a, "a").expect("width matches");
    builder.connect(y, a, "y").expect("width matches");
    builder.connect(y, b, "a").expect("width matches");
    builder.connect(z, b, "y").expect("width matches");
    builder.connect(x, invert, "a").expect("width matches");
    builder.connect(shared, invert, "y").expect("width matches");
    builder.connect(x, pass, "a").expect("width matches");
    builder.connect(shared, pass, "y").expect("width matches");
    let mut engine = builder.build().expect("valid wiring");

    let settle = engine.set(x, 0b0101).expect("converges");

    assert_eq!(engine.read(y).map(u64::from), Ok(0b0101));
    assert_eq!(engine.read(z).map(u64::from), Ok(0b1010));
    assert_eq!(engine.read(shared).map(u64::from), Ok(0b1111));
    assert!(settle.delta_cycles <= 3);
    assert_eq!(engine.part::<Tap>(a).map(|tap| tap.runs), Some(1));
}

#[test]
fn feedback_loop_with_two_drivers_latches_the_merged_value() {
    let mut builder = Engine::builder(SimConfig::default());
    let join = builder.add("join", Gate::new(GateKind::Or, 4)).expect("fresh");
    let low = builder.add("low", Gate::new(GateKind::And, 4)).expect("fresh");
    let high = builder.add("high", Gate::new(GateKind::And, 4)).expect("fresh");

    let x = builder.net("x", 4).expect("fresh");
    let y = builder.net("y", 4).expect("fresh");
    let fb = builder.net("fb", 4).expect("fresh");
    let low_mask = builder.net("low_mask", 4).expect("fresh");
    let high_mask = builder.net("high_mask", 4).expect("fresh");
    builder.connect(x, join, "a").expect("width matches");
    builder.connect(fb, join, "b").expect("width matches");
    builder.connect(y, join, "y").expect("width matches");
    builder.connect(y, low, "a").expect("width matches");
    builder.connect(low_mask, low, "b").expect("width matches");
    builder.connect(fb, low, "y").expect("width matches");
    builder.connect(y, high, "a").expect("width matches");
    builder.connect(high_mask, high, "b").expect("width matches");
    builder.connect(fb, high, "y").expect("width matches");
    let config_limit = SimConfig::default().max_delta_cycles;
    let mut engine = builder.build().expect("valid wiring");

    engine.set(low_mask, 0b0001).expect("converges");
    engine.set(high_mask, 0b0100).expect("converges");
    let settle = engine.set(x, 0b0101).expect("converges");

    assert_eq!(
        settle,
        Settle {
            delta_cycles: 3,
            part_runs: 4
        }
    );
    assert!(settle.delta_cycles < config_limit);
    assert_eq!(engine.read(fb).map(u64::from), Ok(0b0101));
    assert_eq!(engine.read(y).map(u64::from), Ok(0b0101));

    let settle = engine.set(x, 0).expect("converges");
    assert_eq!(settle.delta_cycles, 1);
    assert_eq!(engine.read(y).map(u64::from), Ok(0b0101));
    assert_eq!(engine.read(fb).map(u64::from), Ok(0b0101));
}

#[test]
fn unchanged_external_write_schedules_nothing() {
    let config = SimConfig {
        tracing_enabled: true,
        ..SimConfig::default()
    };
    let mut builder = Engine::builder(config);
    let tap = builder.add("tap", Tap::default()).expect("fresh");
    let engine_net = builder.net("in", 4).expect("fresh");
    builder.connect(engine_net, tap, "a").expect("width matches");
    let mut engine = builder.build().expect("valid wiring");

    engine.set(engine_net, 3).expect("converges");
    let settle = engine.set(engine_net, 0x13).expect("converges");

    assert_eq!(settle.delta_cycles, 0);
    assert_eq!(engine.part::<Tap>(tap).map(|tap| tap.runs), Some(1));

    let mut events: Vec<TraceEvent> = Vec::new();
    engine.drain_trace(&mut events);
    let cycles = events
        .iter()
        .filter(|event| matches!(event, TraceEvent::DeltaCycle { .. }))
        .count();
    assert_eq!(cycles, 2);
}

#[test]
fn falling_edge_pins_only_fire_on_one_to_zero() {
    let mut builder = Engine::builder(SimConfig::default());
    let toggle = builder.add("t", FallingToggle::default()).expect("fresh");
    let clk = builder.net("clk", 1).expect("fresh");
    builder.connect(clk, toggle, "clk").expect("width matches");
    let mut engine = builder.build().expect("valid wiring");
    let q = engine.net_id("t.q").expect("auto net");

    engine.set(clk, 1).expect("converges");
    assert_eq!(engine.read(q).map(u64::from), Ok(0));
    engine.set(clk, 0).expect("converges");
    assert_eq!(engine.read(q).map(u64::from), Ok(1));
    engine.tick(clk).expect("converges");
    assert_eq!(engine.read(q).map(u64::from), Ok(0));
}

#[test]
fn queued_change_sets_settle_in_order() {
    let mut builder = Engine::builder(SimConfig::default());
    let tap = builder.add("tap", Tap::default()).expect("fresh");
    let mut engine = builder.build().expect("valid wiring");
    let input = engine.net_id("tap.a").expect("auto net");
    let output = engine.net_id("tap.y").expect("auto net");

    let first = engine.change(input, 1).expect("known net");
    let second = engine.change(input, 2).expect("known net");
    engine.enqueue(first).expect("width matches");
    engine.enqueue(second).expect("width matches");
    let settle = engine.run().expect("converges");

    assert_eq!(engine.read(output).map(u64::from), Ok(2));
    assert_eq!(settle.part_runs, 2);
    assert_eq!(engine.part::<Tap>(tap).map(|tap| tap.runs), Some(2));
}

#[rstest]
#[case(1)]
#[case(8)]
#[case(100)]
fn ring_oscillator_hits_the_delta_cycle_bound(#[case] limit: u32) {
    let mut builder = Engine::builder(SimConfig {
        max_delta_cycles: limit,
        ..SimConfig::default()
    });
    let first = builder.add("first", Not::new(1)).expect("fresh");
    let second = builder.add("second", Not::new(1)).expect("fresh");
    let third = builder.add("third", Not::new(1)).expect("fresh");
    let n0 = builder.net("n0", 1).expect("fresh");
    let n1 = builder.net("n1", 1).expect("fresh");
    let n2 = builder.net("n2", 1).expect("fresh");
    builder.connect(n0, first, "a").expect("width matches");
    builder.connect(n1, first, "y").expect("width matches");
    builder.connect(n1, second, "a").expect("width matches");
    builder.connect(n2, second, "y").expect("width matches");
    builder.connect(n2, third, "a").expect("width matches");
    builder.connect(n0, third, "y").expect("width matches");
    let mut engine = builder.build().expect("valid wiring");

    let error = engine.evaluate_all().expect_err("odd ring never settles");

    assert!(matches!(error, SimError::NotConverged { limit: hit, .. } if hit == limit));
    assert_eq!(error.class(), ErrorClass::Convergence);
}

#[test]
fn foreign_or_mismatched_changes_are_rejected() {
    let mut builder = Engine::builder(SimConfig::default());
    builder.add("tap", Tap::default()).expect("fresh");
    let mut engine = builder.build().expect("valid wiring");
    let input = engine.net_id("tap.a").expect("auto net");

    let mut wrong_width = engine.change(input, 1).expect("known net");
    wrong_width.insert(input, Signal::new(8, 1));
    assert_eq!(
        engine.enqueue(wrong_width),
        Err(SimError::SignalWidthMismatch { left: 4, right: 8 })
    );

    let mut other = Engine::builder(SimConfig::default());
    other.add("g", Gate::new(GateKind::Xor, 1)).expect("fresh");
    let other = other.build().expect("valid wiring");
    let foreign = other.net_id("g.y").expect("auto net");
    assert_eq!(
        engine.change(foreign, 1),
        Err(SimError::UnknownNet { net: 2 })
    );
}

proptest! {
    #[test]
    fn property_simultaneous_drivers_merge_with_or(
        x in any::<u8>(),
        left in any::<u8>(),
        right in any::<u8>()
    ) {
        let mut builder = Engine::builder(SimConfig::default());
        let lo = builder.add("lo", Gate::new(GateKind::And, 8)).expect("fresh");
        let hi = builder.add("hi", Gate::new(GateKind::And, 8)).expect("fresh");
        let input = builder.net("x", 8).expect("fresh");
        let left_mask = builder.net("left", 8).expect("fresh");
        let right_mask = builder.net("right", 8).expect("fresh");
        let merged = builder.net("merged", 8).expect("fresh");
        builder.connect(input, lo, "a").expect("width matches");
        builder.connect(left_mask, lo, "b").expect("width matches");
        builder.connect(merged, lo, "y").expect("width matches");
        builder.connect(input, hi, "a").expect("width matches");
        builder.connect(right_mask, hi, "b").expect("width matches");
        builder.connect(merged, hi, "y").expect("width matches");
        let mut engine = builder.build().expect("valid wiring");

        engine.set(left_mask, u64::from(left)).expect("converges");
        engine.set(right_mask, u64::from(right)).expect("converges");
        engine.set(input, u64::from(x)).expect("converges");

        let expected = u64::from((x & left) | (x & right));
        prop_assert_eq!(engine.read(merged).map(u64::from), Ok(expected));
    }
}
