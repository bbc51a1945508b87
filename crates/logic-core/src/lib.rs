//! Signal propagation and discrete-event simulation core for synchronous
//! digital logic.
//!
//! Two layers share the same value type ([`Signal`]) and error taxonomy
//! ([`SimError`]):
//!
//! - [`Circuit`]: an arena of width-typed buses, bit-remapping branches and
//!   edge-classifying trigger lines, with components ([`Register`], [`Ram`],
//!   [`Rom`]) reacting to subscribed changes through a bounded FIFO dispatch
//!   loop.
//! - [`Engine`]: a net-level mediator that indexes parts by the pins that
//!   trigger them and settles change-sets in delta cycles, merging
//!   simultaneous drivers with bit-OR.

/// Width-constrained bit vectors.
pub mod signal;
pub use signal::{width_mask, Signal, MAX_WIDTH};

/// Error taxonomy for construction, runtime and convergence failures.
pub mod fault;
pub use fault::{ErrorClass, SimError};

/// Host-facing configuration and trace hook contracts.
pub mod api;
pub use api::{
    SimConfig, TraceEvent, TraceSink, Tracer, DEFAULT_MAX_DELTA_CYCLES, DEFAULT_MAX_DISPATCHES,
};

/// Bus handles, bit-remapping branches and trigger lines.
pub mod wiring;
pub use wiring::{
    Branch, Bus, BusId, BusView, Edge, ReadOnlyWire, TriggerLine, Wire, WritableView,
};

/// Arena-backed circuit with bounded change dispatch.
pub mod circuit;
pub use circuit::{Change, Circuit, Component, ComponentId, Port, Signals};

/// Clock driver for a trigger line.
pub mod clock;
pub use clock::Clock;

/// Reference stateful components.
pub mod components;
pub use components::{Ram, RamPins, Register, RegisterPins, Rom, RomPins, MAX_ADDRESS_WIDTH};

/// Net-level delta-cycle engine.
pub mod engine;
pub use engine::{
    ChangeSet, Counter, EdgeRegister, Engine, EngineBuilder, Gate, GateKind, NetId, Not, Part,
    PartId, PinId, PinOutputs, PinSpec, PinView, Settle, TriggerKind,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
