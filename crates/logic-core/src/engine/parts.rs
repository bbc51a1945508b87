//! Part contract for the [`crate::Engine`] and a few reference parts.

use std::any::Any;

use crate::{width_mask, Signal, SimError};

/// Kind of pin activity that schedules a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TriggerKind {
    /// Any value change on the pin's net.
    Change,
    /// `0 -> 1` on a 1-bit net.
    Rising,
    /// `1 -> 0` on a 1-bit net.
    Falling,
}

/// Declared pin of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinSpec {
    /// Pin name, unique within the part.
    pub name: &'static str,
    /// Bit width; the connected net must match.
    pub width: u8,
    /// Activity on this pin that schedules the part.
    pub triggers: &'static [TriggerKind],
}

impl PinSpec {
    /// Pin with an explicit trigger list.
    #[must_use]
    pub const fn new(name: &'static str, width: u8, triggers: &'static [TriggerKind]) -> Self {
        Self {
            name,
            width,
            triggers,
        }
    }

    /// Level-sensitive input scheduling the part on every change.
    #[must_use]
    pub const fn input(name: &'static str, width: u8) -> Self {
        Self::new(name, width, &[TriggerKind::Change])
    }

    /// Pin that never schedules the part.
    #[must_use]
    pub const fn output(name: &'static str, width: u8) -> Self {
        Self::new(name, width, &[])
    }

    /// 1-bit input scheduling the part on rising edges.
    #[must_use]
    pub const fn clock(name: &'static str) -> Self {
        Self::new(name, 1, &[TriggerKind::Rising])
    }
}

/// Snapshot of a part's pins for one run.
///
/// `previous` holds the values from before the current delta cycle was
/// applied, so a part can tell which of its pins moved and in what direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinView<'a> {
    specs: &'a [PinSpec],
    current: Vec<Signal>,
    previous: Vec<Signal>,
}

impl<'a> PinView<'a> {
    pub(crate) const fn new(
        specs: &'a [PinSpec],
        current: Vec<Signal>,
        previous: Vec<Signal>,
    ) -> Self {
        Self {
            specs,
            current,
            previous,
        }
    }

    /// Number of pins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns `true` for a part without pins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Current signal on local pin `local`, zero-width when out of range.
    #[must_use]
    pub fn signal(&self, local: usize) -> Signal {
        self.current.get(local).copied().unwrap_or_default()
    }

    /// Current value on local pin `local`.
    #[must_use]
    pub fn read(&self, local: usize) -> u64 {
        self.signal(local).value()
    }

    /// Current value of the pin called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64> {
        self.specs
            .iter()
            .position(|spec| spec.name == name)
            .map(|local| self.read(local))
    }

    /// Whether local pin `local` changed in this delta cycle.
    #[must_use]
    pub fn changed(&self, local: usize) -> bool {
        self.current.get(local) != self.previous.get(local)
    }

    /// Whether bit 0 of local pin `local` went `0 -> 1` in this delta cycle.
    #[must_use]
    pub fn rose(&self, local: usize) -> bool {
        self.changed(local) && self.signal(local).bit(0)
    }

    /// Whether bit 0 of local pin `local` went `1 -> 0` in this delta cycle.
    #[must_use]
    pub fn fell(&self, local: usize) -> bool {
        self.changed(local) && !self.signal(local).bit(0)
    }
}

/// Values a part drives in one run, by local pin.
///
/// Setting a pin twice keeps the last value. Values from different parts
/// aimed at one net are OR-merged by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinOutputs<'a> {
    part: &'a str,
    specs: &'a [PinSpec],
    values: Vec<Option<Signal>>,
}

impl<'a> PinOutputs<'a> {
    pub(crate) fn new(part: &'a str, specs: &'a [PinSpec]) -> Self {
        Self {
            part,
            specs,
            values: vec![None; specs.len()],
        }
    }

    /// Drives local pin `local` with `value`, masked to the pin width.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidOutputPin`] when the part has no such pin.
    pub fn set(&mut self, local: usize, value: u64) -> Result<(), SimError> {
        let (Some(spec), Some(slot)) = (self.specs.get(local), self.values.get_mut(local)) else {
            return Err(SimError::InvalidOutputPin {
                component: self.part.to_owned(),
                pin: local,
            });
        };
        *slot = Some(Signal::new(spec.width, value));
        Ok(())
    }

    pub(crate) fn into_driven(self) -> impl Iterator<Item = (usize, Signal)> {
        self.values
            .into_iter()
            .enumerate()
            .filter_map(|(local, value)| value.map(|signal| (local, signal)))
    }
}

/// Unit of behaviour scheduled by the engine.
pub trait Part: Any {
    /// Declared pins; queried once when the part is added.
    fn pins(&self) -> Vec<PinSpec>;

    /// Computes outputs from the current pin values.
    ///
    /// # Errors
    ///
    /// Returns an error when an output cannot be driven, typically
    /// [`SimError::InvalidOutputPin`].
    fn run(&mut self, view: &PinView<'_>, outputs: &mut PinOutputs<'_>) -> Result<(), SimError>;

    /// Upcast for typed inspection through [`crate::Engine::part`].
    fn as_any(&self) -> &dyn Any;
}

/// Two-input bitwise function of a [`Gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum GateKind {
    /// `a & b`.
    And,
    /// `a | b`.
    Or,
    /// `a ^ b`.
    Xor,
    /// `!(a & b)`.
    Nand,
    /// `!(a | b)`.
    Nor,
}

impl GateKind {
    const fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            Self::And => a & b,
            Self::Or => a | b,
            Self::Xor => a ^ b,
            Self::Nand => !(a & b),
            Self::Nor => !(a | b),
        }
    }
}

/// Combinational two-input gate with pins `a`, `b` and `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    kind: GateKind,
    width: u8,
}

impl Gate {
    /// Creates a gate of `width` bits.
    #[must_use]
    pub const fn new(kind: GateKind, width: u8) -> Self {
        Self { kind, width }
    }
}

impl Part for Gate {
    fn pins(&self) -> Vec<PinSpec> {
        vec![
            PinSpec::input("a", self.width),
            PinSpec::input("b", self.width),
            PinSpec::output("y", self.width),
        ]
    }

    fn run(&mut self, view: &PinView<'_>, outputs: &mut PinOutputs<'_>) -> Result<(), SimError> {
        outputs.set(2, self.kind.apply(view.read(0), view.read(1)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Bitwise inverter with pins `a` and `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Not {
    width: u8,
}

impl Not {
    /// Creates an inverter of `width` bits.
    #[must_use]
    pub const fn new(width: u8) -> Self {
        Self { width }
    }
}

impl Part for Not {
    fn pins(&self) -> Vec<PinSpec> {
        vec![
            PinSpec::input("a", self.width),
            PinSpec::output("y", self.width),
        ]
    }

    fn run(&mut self, view: &PinView<'_>, outputs: &mut PinOutputs<'_>) -> Result<(), SimError> {
        outputs.set(1, !view.read(0))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Bank of D flip-flops: samples `d` on rising `clk`, drives `q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRegister {
    width: u8,
    value: u64,
}

impl EdgeRegister {
    /// Creates a zeroed register of `width` bits.
    #[must_use]
    pub const fn new(width: u8) -> Self {
        Self { width, value: 0 }
    }

    /// Last sampled value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }
}

impl Part for EdgeRegister {
    fn pins(&self) -> Vec<PinSpec> {
        vec![
            PinSpec::new("d", self.width, &[]),
            PinSpec::clock("clk"),
            PinSpec::output("q", self.width),
        ]
    }

    fn run(&mut self, view: &PinView<'_>, outputs: &mut PinOutputs<'_>) -> Result<(), SimError> {
        if view.rose(1) {
            self.value = view.read(0);
        }
        outputs.set(2, self.value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Free-running counter: advances on rising `clk` and drives `q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    width: u8,
    value: u64,
}

impl Counter {
    /// Creates a zeroed counter of `width` bits.
    #[must_use]
    pub const fn new(width: u8) -> Self {
        Self { width, value: 0 }
    }

    /// Current count.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }
}

impl Part for Counter {
    fn pins(&self) -> Vec<PinSpec> {
        vec![PinSpec::clock("clk"), PinSpec::output("q", self.width)]
    }

    fn run(&mut self, view: &PinView<'_>, outputs: &mut PinOutputs<'_>) -> Result<(), SimError> {
        if view.rose(0) {
            self.value = self.value.wrapping_add(1) & width_mask(self.width);
        }
        outputs.set(1, self.value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
