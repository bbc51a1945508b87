//! Host-facing configuration and deterministic trace hooks.

use crate::{BusId, ComponentId, Edge};

/// Default bound on component dispatches per circuit settle.
pub const DEFAULT_MAX_DISPATCHES: u32 = 100_000;

/// Default bound on engine delta cycles per change-set.
pub const DEFAULT_MAX_DELTA_CYCLES: u32 = 1_000;

/// Simulation limits and tracing switch shared by [`crate::Circuit`] and
/// [`crate::Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SimConfig {
    /// Maximum component/observer dispatches before a circuit settle fails.
    pub max_dispatches: u32,
    /// Maximum delta cycles before an engine step fails.
    pub max_delta_cycles: u32,
    /// Buffers [`TraceEvent`]s for later draining when set.
    pub tracing_enabled: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_dispatches: DEFAULT_MAX_DISPATCHES,
            max_delta_cycles: DEFAULT_MAX_DELTA_CYCLES,
            tracing_enabled: false,
        }
    }
}

/// Deterministic trace events in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// A bus changed value.
    BusWritten {
        /// Bus that changed.
        bus: BusId,
        /// Value before the write.
        old: u64,
        /// Value after the write.
        new: u64,
    },
    /// A trigger line saw its bit flip.
    EdgeDetected {
        /// Bus holding the bit.
        bus: BusId,
        /// Bit index in the bus.
        bit: u8,
        /// Direction of the flip.
        edge: Edge,
    },
    /// A circuit component or engine part was run.
    ComponentRan {
        /// Raw component/part index.
        component: usize,
    },
    /// The engine started a delta cycle.
    DeltaCycle {
        /// 1-based cycle index within the current step.
        cycle: u32,
        /// Number of nets changed entering the cycle.
        changed_nets: usize,
    },
    /// An iteration bound was hit.
    Unstable {
        /// The exceeded bound.
        limit: u32,
    },
}

impl TraceEvent {
    /// Shorthand for a [`TraceEvent::ComponentRan`] on a circuit component.
    #[must_use]
    pub const fn component_ran(id: ComponentId) -> Self {
        Self::ComponentRan {
            component: id.index(),
        }
    }
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Buffer that records trace events only while enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tracer {
    enabled: bool,
    events: Vec<TraceEvent>,
}

impl Tracer {
    /// Creates a tracer honouring `config.tracing_enabled`.
    #[must_use]
    pub const fn new(config: &SimConfig) -> Self {
        Self {
            enabled: config.tracing_enabled,
            events: Vec::new(),
        }
    }

    /// Returns `true` when events are being recorded.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records `event` if enabled.
    pub fn record(&mut self, event: TraceEvent) {
        if self.enabled {
            self.events.push(event);
        }
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Moves every buffered event into `sink`, oldest first.
    pub fn drain_into(&mut self, sink: &mut dyn TraceSink) {
        for event in self.events.drain(..) {
            sink.on_event(event);
        }
    }
}
