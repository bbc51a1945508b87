//! Arena-backed circuit: bus storage, subscriptions and bounded dispatch.
//!
//! Writes store immediately and queue a [`Change`]. [`Circuit::settle`]
//! drains the queue in FIFO order, running every matching subscription in
//! registration order. Components never re-enter the circuit; their own
//! writes are queued behind the change being dispatched, so propagation
//! depth never grows the call stack. A settle that needs more than
//! [`SimConfig::max_dispatches`] dispatches fails with
//! [`SimError::UnstableCircuit`].
//!
//! Every reaction to one change reads bus values as they stood when that
//! change left the queue. A reaction's writes land on the bus at once but stay
//! hidden from the other reactions to the same change, and become visible
//! when their own change is dispatched. Registers sharing a clock edge
//! therefore all sample pre-edge values, whatever order they were added in.
//!
//! Handles are plain indices. A handle from another circuit is rejected with
//! [`SimError::UnknownBus`] when its index or bits fall outside this arena.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;

use crate::{
    Bus, BusId, BusView, Edge, ReadOnlyWire, Signal, SimConfig, SimError, TraceEvent, TraceSink,
    Tracer, TriggerLine, WritableView, MAX_WIDTH,
};

/// Arena index of a component inside its [`Circuit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

impl ComponentId {
    fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the arena slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Tag chosen by a component when subscribing, handed back on dispatch so the
/// component can tell its inputs apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(pub u8);

/// A value change on a root bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    /// Bus that changed.
    pub bus: BusId,
    /// Full bus value before the write.
    pub old: u64,
    /// Full bus value after the write.
    pub new: u64,
}

/// Stateful element reacting to subscribed bus changes and edges.
pub trait Component: Any {
    /// Diagnostic name.
    fn name(&self) -> &str;

    /// Handles one dispatched subscription.
    ///
    /// # Errors
    ///
    /// Returns an error when a write breaks a circuit invariant, such as
    /// driving a constant bus.
    fn react(&mut self, port: Port, signals: &mut Signals<'_>) -> Result<(), SimError>;

    /// Upcast for typed inspection through [`Circuit::component`].
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for [`Circuit::component_mut`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct BusSlot {
    value: u64,
    width: u8,
    constant: bool,
    subscriptions: Vec<Subscription>,
}

enum Filter {
    Change(ReadOnlyWire),
    Edge(TriggerLine, Edge),
}

#[derive(Clone, Copy)]
enum Reactor {
    Component(ComponentId, Port),
    Observer(usize),
}

struct Subscription {
    filter: Filter,
    reactor: Reactor,
}

type Observer = Box<dyn FnMut(u64, u64)>;

fn slot_index<V: BusView + ?Sized>(buses: &[BusSlot], view: &V) -> Result<usize, SimError> {
    let index = view.root().index();
    match buses.get(index) {
        Some(slot) if view.root_mask() & !crate::width_mask(slot.width) == 0 => Ok(index),
        _ => Err(SimError::UnknownBus { bus: index }),
    }
}

fn store<V: WritableView + ?Sized>(
    buses: &mut [BusSlot],
    pending: &mut VecDeque<Change>,
    tracer: &mut Tracer,
    view: &V,
    value: u64,
) -> Result<(), SimError> {
    let index = slot_index(buses, view)?;
    let slot = &mut buses[index];
    let old = slot.value;
    let new = view.inject(old, value) & crate::width_mask(slot.width);
    if new == old {
        return Ok(());
    }
    if slot.constant {
        return Err(SimError::ConstantWrite { bus: index });
    }

    slot.value = new;
    let bus = view.root();
    tracer.record(TraceEvent::BusWritten { bus, old, new });
    log::trace!("bus {index} {old:#x} -> {new:#x}");
    pending.push_back(Change { bus, old, new });
    Ok(())
}

/// Read/write access handed to a reacting component.
///
/// Reads see the bus values from before any write made while dispatching the
/// current change.
pub struct Signals<'a> {
    buses: &'a mut [BusSlot],
    pending: &'a mut VecDeque<Change>,
    tracer: &'a mut Tracer,
    shadow: &'a mut Vec<(BusId, u64)>,
}

impl Signals<'_> {
    /// Reads the current value through `view`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a handle from another circuit.
    pub fn read<V: BusView + ?Sized>(&self, view: &V) -> Result<u64, SimError> {
        let index = slot_index(self.buses, view)?;
        let root = view.root();
        let value = self
            .shadow
            .iter()
            .find(|(bus, _)| *bus == root)
            .map_or(self.buses[index].value, |&(_, before)| before);
        Ok(view.extract(value))
    }

    /// Reads a trigger line level.
    ///
    /// # Errors
    ///
    /// See [`Signals::read`].
    pub fn is_high(&self, line: TriggerLine) -> Result<bool, SimError> {
        Ok(self.read(&line)? == 1)
    }

    /// Writes `value` through `view`; subscribers run after the current
    /// reaction returns.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a foreign handle, or
    /// [`SimError::ConstantWrite`] when `view` sits on a constant bus and the
    /// write would change it.
    pub fn write<V: WritableView + ?Sized>(&mut self, view: &V, value: u64) -> Result<(), SimError> {
        let index = slot_index(self.buses, view)?;
        let root = view.root();
        if !self.shadow.iter().any(|(bus, _)| *bus == root) {
            self.shadow.push((root, self.buses[index].value));
        }
        store(self.buses, self.pending, self.tracer, view, value)
    }
}

/// Owner of every bus, component and subscription of one circuit.
pub struct Circuit {
    config: SimConfig,
    buses: Vec<BusSlot>,
    components: Vec<Option<Box<dyn Component>>>,
    observers: Vec<Observer>,
    pending: VecDeque<Change>,
    shadow: Vec<(BusId, u64)>,
    tracer: Tracer,
    rails: Option<(TriggerLine, TriggerLine)>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::with_config(SimConfig::default())
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("config", &self.config)
            .field("buses", &self.buses.len())
            .field("components", &self.components.len())
            .field("observers", &self.observers.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Circuit {
    /// Creates an empty circuit with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty circuit with explicit limits.
    #[must_use]
    pub fn with_config(config: SimConfig) -> Self {
        let tracer = Tracer::new(&config);
        Self {
            config,
            buses: Vec::new(),
            components: Vec::new(),
            observers: Vec::new(),
            pending: VecDeque::new(),
            shadow: Vec::new(),
            tracer,
            rails: None,
        }
    }

    /// Active limits.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    fn alloc(&mut self, width: u8, value: u64, constant: bool) -> Result<Bus, SimError> {
        if width == 0 || width > MAX_WIDTH {
            return Err(SimError::InvalidWidth { width });
        }
        let id = BusId::from_index(self.buses.len());
        self.buses.push(BusSlot {
            value: value & crate::width_mask(width),
            width,
            constant,
            subscriptions: Vec::new(),
        });
        Ok(Bus::new(id, width))
    }

    /// Allocates a zeroed bus of `width` bits.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidWidth`] unless `1 <= width <= 64`.
    pub fn bus(&mut self, width: u8) -> Result<Bus, SimError> {
        self.alloc(width, 0, false)
    }

    /// Allocates a read-only bus fixed at `value` (masked).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidWidth`] unless `1 <= width <= 64`.
    pub fn constant(&mut self, width: u8, value: u64) -> Result<Bus, SimError> {
        self.alloc(width, value, true)
    }

    /// Allocates a trigger line on its own 1-bit bus.
    pub fn trigger_line(&mut self) -> TriggerLine {
        let bus = self.buses.len();
        self.buses.push(BusSlot {
            value: 0,
            width: 1,
            constant: false,
            subscriptions: Vec::new(),
        });
        TriggerLine::new(BusId::from_index(bus), 0)
    }

    fn rails(&mut self) -> (TriggerLine, TriggerLine) {
        if let Some(rails) = self.rails {
            return rails;
        }
        let mut rail = |value: u64| {
            let bus = self.buses.len();
            self.buses.push(BusSlot {
                value,
                width: 1,
                constant: true,
                subscriptions: Vec::new(),
            });
            TriggerLine::new(BusId::from_index(bus), 0)
        };
        let rails = (rail(1), rail(0));
        self.rails = Some(rails);
        rails
    }

    /// Constant-high line shared by every caller.
    pub fn high(&mut self) -> TriggerLine {
        self.rails().0
    }

    /// Constant-low line shared by every caller.
    pub fn low(&mut self) -> TriggerLine {
        self.rails().1
    }

    /// Registers a component and returns its handle.
    pub fn add<C: Component>(&mut self, component: C) -> ComponentId {
        let id = ComponentId::from_index(self.components.len());
        self.components.push(Some(Box::new(component)));
        id
    }

    /// Checks that `view` belongs to this circuit.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] when the view's root bus is not in
    /// this arena or is narrower than the bits the view covers.
    pub fn check<V: BusView + ?Sized>(&self, view: &V) -> Result<(), SimError> {
        slot_index(&self.buses, view).map(|_| ())
    }

    fn subscribe(&mut self, filter: Filter, reactor: Reactor) -> Result<(), SimError> {
        let index = match &filter {
            Filter::Change(view) => slot_index(&self.buses, view)?,
            Filter::Edge(line, _) => slot_index(&self.buses, line)?,
        };
        self.buses[index]
            .subscriptions
            .push(Subscription { filter, reactor });
        Ok(())
    }

    /// Subscribes component `id` to changes of the bits covered by `view`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a handle from another circuit.
    pub fn subscribe_change(
        &mut self,
        view: impl Into<ReadOnlyWire>,
        id: ComponentId,
        port: Port,
    ) -> Result<(), SimError> {
        self.subscribe(Filter::Change(view.into()), Reactor::Component(id, port))
    }

    /// Subscribes component `id` to `edge` transitions of `line`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a handle from another circuit.
    pub fn subscribe_edge(
        &mut self,
        line: TriggerLine,
        edge: Edge,
        id: ComponentId,
        port: Port,
    ) -> Result<(), SimError> {
        self.subscribe(Filter::Edge(line, edge), Reactor::Component(id, port))
    }

    fn observe(&mut self, filter: Filter, observer: Observer) -> Result<(), SimError> {
        let index = self.observers.len();
        self.subscribe(filter, Reactor::Observer(index))?;
        self.observers.push(observer);
        Ok(())
    }

    /// Registers a host observer called with the view's old and new value
    /// whenever a bit covered by `view` changes.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a handle from another circuit.
    pub fn on_change<F>(&mut self, view: impl Into<ReadOnlyWire>, observer: F) -> Result<(), SimError>
    where
        F: FnMut(u64, u64) + 'static,
    {
        self.observe(Filter::Change(view.into()), Box::new(observer))
    }

    /// Registers a host observer for rising edges of `line`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a handle from another circuit.
    pub fn on_rising_edge<F>(&mut self, line: TriggerLine, mut observer: F) -> Result<(), SimError>
    where
        F: FnMut() + 'static,
    {
        self.observe(
            Filter::Edge(line, Edge::Rising),
            Box::new(move |_, _| observer()),
        )
    }

    /// Registers a host observer for falling edges of `line`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a handle from another circuit.
    pub fn on_falling_edge<F>(&mut self, line: TriggerLine, mut observer: F) -> Result<(), SimError>
    where
        F: FnMut() + 'static,
    {
        self.observe(
            Filter::Edge(line, Edge::Falling),
            Box::new(move |_, _| observer()),
        )
    }

    /// Reads the current value through `view`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a handle from another circuit.
    pub fn read<V: BusView + ?Sized>(&self, view: &V) -> Result<u64, SimError> {
        let index = slot_index(&self.buses, view)?;
        Ok(view.extract(self.buses[index].value))
    }

    /// Reads the current value through `view` as a width-tagged signal.
    ///
    /// # Errors
    ///
    /// See [`Circuit::read`].
    pub fn signal<V: BusView + ?Sized>(&self, view: &V) -> Result<Signal, SimError> {
        Ok(Signal::new(view.width(), self.read(view)?))
    }

    /// Reads a trigger line level.
    ///
    /// # Errors
    ///
    /// See [`Circuit::read`].
    pub fn is_high(&self, line: TriggerLine) -> Result<bool, SimError> {
        Ok(self.read(&line)? == 1)
    }

    /// Writes `value` through `view` and settles the circuit.
    ///
    /// Writing the current value is a no-op and notifies nobody.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] for a foreign handle,
    /// [`SimError::ConstantWrite`] for a changing write to a constant bus, or
    /// any error raised while settling.
    pub fn write<V: WritableView + ?Sized>(&mut self, view: &V, value: u64) -> Result<(), SimError> {
        store(
            &mut self.buses,
            &mut self.pending,
            &mut self.tracer,
            view,
            value,
        )?;
        self.settle().map(|_| ())
    }

    /// Drives `line` to `level` and settles the circuit.
    ///
    /// # Errors
    ///
    /// See [`Circuit::write`].
    pub fn set_line(&mut self, line: TriggerLine, level: bool) -> Result<(), SimError> {
        self.write(&line, u64::from(level))
    }

    /// Dispatches queued changes until none remain.
    ///
    /// Returns the number of dispatches performed.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnstableCircuit`] once the dispatch budget is
    /// exhausted, or the first error raised by a component. The pending queue
    /// is discarded on error.
    pub fn settle(&mut self) -> Result<u32, SimError> {
        let result = self.dispatch_pending();
        self.shadow.clear();
        if result.is_err() {
            self.pending.clear();
        }
        result
    }

    fn dispatch_pending(&mut self) -> Result<u32, SimError> {
        let limit = self.config.max_dispatches;
        let mut dispatches = 0_u32;

        while let Some(change) = self.pending.pop_front() {
            self.shadow.clear();
            for (reactor, old, new) in self.matching(change) {
                if dispatches >= limit {
                    self.tracer.record(TraceEvent::Unstable { limit });
                    log::warn!("circuit did not settle within {limit} dispatches");
                    return Err(SimError::UnstableCircuit { limit });
                }
                dispatches += 1;

                match reactor {
                    Reactor::Component(id, port) => self.run_component(id, port)?,
                    Reactor::Observer(index) => {
                        if let Some(observer) = self.observers.get_mut(index) {
                            observer(old, new);
                        }
                    }
                }
            }
        }

        if dispatches > 0 {
            log::debug!("circuit settled after {dispatches} dispatches");
        }
        Ok(dispatches)
    }

    fn matching(&mut self, change: Change) -> Vec<(Reactor, u64, u64)> {
        let Change { bus, old, new } = change;
        let mut matched = Vec::new();
        for subscription in &self.buses[bus.index()].subscriptions {
            match &subscription.filter {
                Filter::Change(view) => {
                    if view.root_mask() & (old ^ new) != 0 {
                        matched.push((
                            subscription.reactor,
                            view.extract(old),
                            view.extract(new),
                        ));
                    }
                }
                Filter::Edge(line, edge) => {
                    if line.classify(old, new) == Some(*edge) {
                        self.tracer.record(TraceEvent::EdgeDetected {
                            bus,
                            bit: line.bit(),
                            edge: *edge,
                        });
                        matched.push((subscription.reactor, line.extract(old), line.extract(new)));
                    }
                }
            }
        }
        matched
    }

    fn run_component(&mut self, id: ComponentId, port: Port) -> Result<(), SimError> {
        let Some(mut component) = self.components.get_mut(id.index()).and_then(Option::take)
        else {
            return Ok(());
        };

        let mut signals = Signals {
            buses: &mut self.buses,
            pending: &mut self.pending,
            tracer: &mut self.tracer,
            shadow: &mut self.shadow,
        };
        let result = component.react(port, &mut signals);
        log::trace!("component `{}` reacted on port {}", component.name(), port.0);
        self.tracer.record(TraceEvent::component_ran(id));
        self.components[id.index()] = Some(component);
        result
    }

    /// Typed shared access to a registered component.
    #[must_use]
    pub fn component<C: Component>(&self, id: ComponentId) -> Option<&C> {
        self.components
            .get(id.index())?
            .as_deref()?
            .as_any()
            .downcast_ref()
    }

    /// Typed mutable access to a registered component.
    pub fn component_mut<C: Component>(&mut self, id: ComponentId) -> Option<&mut C> {
        self.components
            .get_mut(id.index())?
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut()
    }

    /// Number of allocated buses, trigger lines and constants included.
    #[must_use]
    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    /// Moves buffered trace events into `sink`.
    pub fn drain_trace(&mut self, sink: &mut dyn TraceSink) {
        self.tracer.drain_into(sink);
    }
}
