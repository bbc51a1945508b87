//! Net-level delta-cycle engine.
//!
//! Parts declare pins; the [`EngineBuilder`] binds pins into nets and indexes
//! every part under the `(trigger, pin)` pairs it listens on. A step then
//! repeats until nothing changes:
//!
//! 1. drop pending values equal to the current net state;
//! 2. collect the parts triggered by the remaining nets' pins;
//! 3. apply the pending values;
//! 4. run the triggered parts in part order against the new state;
//! 5. OR-merge their outputs per net into the next change-set.
//!
//! Each pass is one delta cycle. More than [`SimConfig::max_delta_cycles`]
//! passes for one change-set fail with [`SimError::NotConverged`].

/// Part and pin registration.
pub mod builder;
/// Net handles and OR-merging change-sets.
pub mod change;
/// Part contract and reference parts.
pub mod parts;

pub use builder::{EngineBuilder, PartId, PinId};
pub use change::{ChangeSet, NetId};
pub use parts::{
    Counter, EdgeRegister, Gate, GateKind, Not, Part, PinOutputs, PinSpec, PinView, TriggerKind,
};

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Range;

use crate::{Signal, SimConfig, SimError, TraceEvent, TraceSink, Tracer};

#[derive(Debug, Clone, PartialEq, Eq)]
struct NetInfo {
    name: String,
    width: u8,
}

struct Wiring {
    config: SimConfig,
    parts: Vec<Box<dyn Part>>,
    part_names: Vec<String>,
    part_pins: Vec<Range<usize>>,
    pins: Vec<PinSpec>,
    pin_net: Vec<NetId>,
    nets: Vec<NetInfo>,
    net_pins: Vec<Vec<PinId>>,
    triggered: HashMap<(TriggerKind, PinId), Vec<PartId>>,
    state: Vec<Signal>,
}

/// Work done by one or more settled change-sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settle {
    /// Delta cycles run.
    pub delta_cycles: u32,
    /// Part runs performed.
    pub part_runs: u32,
}

impl Settle {
    const fn absorb(self, other: Self) -> Self {
        Self {
            delta_cycles: self.delta_cycles.saturating_add(other.delta_cycles),
            part_runs: self.part_runs.saturating_add(other.part_runs),
        }
    }
}

/// Wired circuit of parts and nets.
pub struct Engine {
    wiring: Wiring,
    queue: VecDeque<ChangeSet>,
    tracer: Tracer,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.wiring.config)
            .field("parts", &self.wiring.part_names)
            .field("nets", &self.wiring.nets.len())
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    fn from_parts(wiring: Wiring) -> Self {
        let tracer = Tracer::new(&wiring.config);
        Self {
            wiring,
            queue: VecDeque::new(),
            tracer,
        }
    }

    /// Starts wiring a new engine.
    #[must_use]
    pub const fn builder(config: SimConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Looks up a net by name.
    #[must_use]
    pub fn net_id(&self, name: &str) -> Option<NetId> {
        self.wiring
            .nets
            .iter()
            .position(|net| net.name == name)
            .map(NetId::from_index)
    }

    /// Name of `net`.
    #[must_use]
    pub fn net_name(&self, net: NetId) -> Option<&str> {
        self.wiring.nets.get(net.index()).map(|net| net.name.as_str())
    }

    /// Current value of `net`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNet`] for a net this engine does not own.
    pub fn read(&self, net: NetId) -> Result<Signal, SimError> {
        self.wiring
            .state
            .get(net.index())
            .copied()
            .ok_or(SimError::UnknownNet { net: net.index() })
    }

    /// Typed access to a part.
    #[must_use]
    pub fn part<P: Part>(&self, id: PartId) -> Option<&P> {
        self.wiring.parts.get(id.index())?.as_any().downcast_ref()
    }

    /// Builds a one-entry change-set, masking `value` to the net width.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNet`] for a foreign net.
    pub fn change(&self, net: NetId, value: u64) -> Result<ChangeSet, SimError> {
        let signal = self.read(net)?.with_value(value);
        Ok([(net, signal)].into_iter().collect())
    }

    /// Queues an external change-set without running it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNet`] for a foreign net or
    /// [`SimError::SignalWidthMismatch`] when a value's width differs from
    /// its net.
    pub fn enqueue(&mut self, changes: ChangeSet) -> Result<(), SimError> {
        for (net, signal) in changes.iter() {
            let current = self.read(net)?;
            if current.width() != signal.width() {
                return Err(SimError::SignalWidthMismatch {
                    left: current.width(),
                    right: signal.width(),
                });
            }
        }
        self.queue.push_back(changes);
        Ok(())
    }

    /// Settles every queued change-set in order.
    ///
    /// # Errors
    ///
    /// Returns the first step error; the rest of the queue is discarded.
    pub fn run(&mut self) -> Result<Settle, SimError> {
        let mut total = Settle::default();
        while let Some(changes) = self.queue.pop_front() {
            match self.step(changes) {
                Ok(settle) => total = total.absorb(settle),
                Err(error) => {
                    self.queue.clear();
                    return Err(error);
                }
            }
        }
        Ok(total)
    }

    /// Drives `net` to `value` and settles.
    ///
    /// # Errors
    ///
    /// See [`Engine::enqueue`] and [`Engine::run`].
    pub fn set(&mut self, net: NetId, value: u64) -> Result<Settle, SimError> {
        let changes = self.change(net, value)?;
        self.enqueue(changes)?;
        self.run()
    }

    /// Pulses 1-bit `net` high then low, settling after each half.
    ///
    /// # Errors
    ///
    /// See [`Engine::set`].
    pub fn tick(&mut self, net: NetId) -> Result<Settle, SimError> {
        let rising = self.set(net, 1)?;
        let falling = self.set(net, 0)?;
        Ok(rising.absorb(falling))
    }

    /// Runs every part once against the current state and settles the
    /// result. No pin counts as changed during that first run.
    ///
    /// # Errors
    ///
    /// See [`Engine::run`].
    pub fn evaluate_all(&mut self) -> Result<Settle, SimError> {
        let ids: Vec<PartId> = (0..self.wiring.parts.len())
            .map(PartId::from_index)
            .collect();
        let mut outputs = ChangeSet::new();
        let runs = self.run_parts(&ids, &BTreeMap::new(), &mut outputs)?;
        let settle = self.step(outputs)?;
        Ok(Settle {
            part_runs: settle.part_runs.saturating_add(runs),
            ..settle
        })
    }

    /// Moves buffered trace events into `sink`.
    pub fn drain_trace(&mut self, sink: &mut dyn TraceSink) {
        self.tracer.drain_into(sink);
    }

    fn step(&mut self, mut changes: ChangeSet) -> Result<Settle, SimError> {
        let limit = self.wiring.config.max_delta_cycles;
        let mut settle = Settle::default();

        loop {
            let state = &self.wiring.state;
            changes.retain(|net, signal| state[net.index()] != *signal);
            if changes.is_empty() {
                log::debug!(
                    "engine settled in {} delta cycles, {} part runs",
                    settle.delta_cycles,
                    settle.part_runs
                );
                return Ok(settle);
            }
            if settle.delta_cycles >= limit {
                let nets = changes
                    .iter()
                    .map(|(net, _)| self.wiring.nets[net.index()].name.clone())
                    .collect::<Vec<_>>();
                self.tracer.record(TraceEvent::Unstable { limit });
                log::warn!("engine did not converge within {limit} delta cycles: {nets:?}");
                return Err(SimError::NotConverged { limit, nets });
            }
            settle.delta_cycles += 1;
            self.tracer.record(TraceEvent::DeltaCycle {
                cycle: settle.delta_cycles,
                changed_nets: changes.len(),
            });

            let scheduled = self.triggered_by(&changes);
            let mut previous = BTreeMap::new();
            for (net, signal) in changes.iter() {
                previous.insert(net, self.wiring.state[net.index()]);
                self.wiring.state[net.index()] = signal;
            }

            let mut next = ChangeSet::new();
            let runs = self.run_parts(&scheduled, &previous, &mut next)?;
            settle.part_runs = settle.part_runs.saturating_add(runs);
            changes = next;
        }
    }

    fn triggered_by(&self, changes: &ChangeSet) -> Vec<PartId> {
        let mut scheduled = BTreeSet::new();
        for (net, new) in changes.iter() {
            let old = self.wiring.state[net.index()];
            let edge = match (new.width(), old.value(), new.value()) {
                (1, 0, 1) => Some(TriggerKind::Rising),
                (1, 1, 0) => Some(TriggerKind::Falling),
                _ => None,
            };
            let kinds = [Some(TriggerKind::Change), edge];

            for &pin in &self.wiring.net_pins[net.index()] {
                for kind in kinds.into_iter().flatten() {
                    if let Some(parts) = self.wiring.triggered.get(&(kind, pin)) {
                        scheduled.extend(parts.iter().copied());
                    }
                }
            }
        }
        scheduled.into_iter().collect()
    }

    fn run_parts(
        &mut self,
        ids: &[PartId],
        previous: &BTreeMap<NetId, Signal>,
        next: &mut ChangeSet,
    ) -> Result<u32, SimError> {
        let wiring = &mut self.wiring;
        let mut runs = 0_u32;

        for &id in ids {
            let range = wiring.part_pins[id.index()].clone();
            let specs = &wiring.pins[range.clone()];
            let nets = &wiring.pin_net[range];
            let current: Vec<Signal> = nets
                .iter()
                .map(|net| wiring.state[net.index()])
                .collect();
            let before: Vec<Signal> = nets
                .iter()
                .zip(&current)
                .map(|(net, &now)| previous.get(net).copied().unwrap_or(now))
                .collect();

            let view = PinView::new(specs, current, before);
            let mut outputs = PinOutputs::new(&wiring.part_names[id.index()], specs);
            wiring.parts[id.index()].run(&view, &mut outputs)?;
            self.tracer.record(TraceEvent::ComponentRan {
                component: id.index(),
            });
            log::trace!("part `{}` ran", wiring.part_names[id.index()]);
            runs += 1;

            for (local, signal) in outputs.into_driven() {
                next.merge(nets[local], signal)?;
            }
        }
        Ok(runs)
    }
}
