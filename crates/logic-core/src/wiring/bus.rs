use crate::{width_mask, Branch, SimError, TriggerLine};

/// Arena index of a bus inside its [`crate::Circuit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusId(u32);

impl BusId {
    /// Wraps an arena slot index.
    ///
    /// Arenas never grow past `u32::MAX` buses; larger indices saturate.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the arena slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a whole bus of fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bus {
    id: BusId,
    width: u8,
}

impl Bus {
    pub(crate) const fn new(id: BusId, width: u8) -> Self {
        Self { id, width }
    }

    /// Arena id of this bus.
    #[must_use]
    pub const fn id(self) -> BusId {
        self.id
    }
}

/// Read/write view onto (part of) a root bus.
///
/// A view maps its own contiguous index space `0..width()` onto bit
/// positions of a root bus. Whole buses map identically; branches and
/// trigger lines map through an explicit pin list.
pub trait BusView {
    /// Root bus the view reads from and writes to.
    fn root(&self) -> BusId;

    /// Number of bits visible through the view.
    fn width(&self) -> u8;

    /// Root-bus bits touched by the view.
    fn root_mask(&self) -> u64;

    /// Translates view pin `pin` to its root-bus bit position.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PinOutOfRange`] when `pin >= self.width()`.
    fn root_pin(&self, pin: u8) -> Result<u8, SimError>;

    /// Assembles the view's value from a full root-bus value.
    fn extract(&self, root_value: u64) -> u64;

    /// Builds a branch over this view; `pins` are in this view's index space.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PinOutOfRange`] for an index outside this view,
    /// [`SimError::DuplicatePin`] for a repeated index, or
    /// [`SimError::InvalidWidth`] for an empty pin list.
    fn branch(&self, pins: &[u8]) -> Result<Branch, SimError> {
        let mapped = pins
            .iter()
            .map(|&pin| self.root_pin(pin))
            .collect::<Result<Vec<_>, _>>()?;
        Branch::over_root(self.root(), mapped)
    }

    /// Derives a trigger line from view pin `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PinOutOfRange`] when `pin >= self.width()`.
    fn trigger(&self, pin: u8) -> Result<TriggerLine, SimError> {
        Ok(TriggerLine::new(self.root(), self.root_pin(pin)?))
    }
}

/// View that can also drive its bits.
pub trait WritableView: BusView {
    /// Replaces the view's bits inside `root_value` with `value`, leaving
    /// every other root bit untouched.
    fn inject(&self, root_value: u64, value: u64) -> u64;
}

impl BusView for Bus {
    fn root(&self) -> BusId {
        self.id
    }

    fn width(&self) -> u8 {
        self.width
    }

    fn root_mask(&self) -> u64 {
        width_mask(self.width)
    }

    fn root_pin(&self, pin: u8) -> Result<u8, SimError> {
        if pin < self.width {
            Ok(pin)
        } else {
            Err(SimError::PinOutOfRange {
                pin,
                width: self.width,
            })
        }
    }

    fn extract(&self, root_value: u64) -> u64 {
        root_value & width_mask(self.width)
    }
}

impl WritableView for Bus {
    fn inject(&self, _root_value: u64, value: u64) -> u64 {
        value & width_mask(self.width)
    }
}

/// Owned bus-or-branch view stored by components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wire {
    /// A whole bus.
    Bus(Bus),
    /// A remapped subset of a bus.
    Branch(Branch),
}

impl From<Bus> for Wire {
    fn from(bus: Bus) -> Self {
        Self::Bus(bus)
    }
}

impl From<Branch> for Wire {
    fn from(branch: Branch) -> Self {
        Self::Branch(branch)
    }
}

impl From<&Branch> for Wire {
    fn from(branch: &Branch) -> Self {
        Self::Branch(branch.clone())
    }
}

impl From<TriggerLine> for Wire {
    fn from(line: TriggerLine) -> Self {
        Self::Branch(Branch::single(line.root(), line.bit()))
    }
}

impl BusView for Wire {
    fn root(&self) -> BusId {
        match self {
            Self::Bus(bus) => bus.root(),
            Self::Branch(branch) => branch.root(),
        }
    }

    fn width(&self) -> u8 {
        match self {
            Self::Bus(bus) => bus.width(),
            Self::Branch(branch) => branch.width(),
        }
    }

    fn root_mask(&self) -> u64 {
        match self {
            Self::Bus(bus) => bus.root_mask(),
            Self::Branch(branch) => branch.root_mask(),
        }
    }

    fn root_pin(&self, pin: u8) -> Result<u8, SimError> {
        match self {
            Self::Bus(bus) => bus.root_pin(pin),
            Self::Branch(branch) => branch.root_pin(pin),
        }
    }

    fn extract(&self, root_value: u64) -> u64 {
        match self {
            Self::Bus(bus) => bus.extract(root_value),
            Self::Branch(branch) => branch.extract(root_value),
        }
    }
}

impl WritableView for Wire {
    fn inject(&self, root_value: u64, value: u64) -> u64 {
        match self {
            Self::Bus(bus) => bus.inject(root_value, value),
            Self::Branch(branch) => branch.inject(root_value, value),
        }
    }
}

/// Bus-or-branch view a component may read but never drive.
///
/// Circuit writes require [`WritableView`], which this type does not
/// implement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyWire(Wire);

impl ReadOnlyWire {
    /// Underlying wire.
    #[must_use]
    pub const fn wire(&self) -> &Wire {
        &self.0
    }
}

impl From<Wire> for ReadOnlyWire {
    fn from(wire: Wire) -> Self {
        Self(wire)
    }
}

impl From<Bus> for ReadOnlyWire {
    fn from(bus: Bus) -> Self {
        Self(bus.into())
    }
}

impl From<Branch> for ReadOnlyWire {
    fn from(branch: Branch) -> Self {
        Self(branch.into())
    }
}

impl From<&Branch> for ReadOnlyWire {
    fn from(branch: &Branch) -> Self {
        Self(branch.into())
    }
}

impl From<TriggerLine> for ReadOnlyWire {
    fn from(line: TriggerLine) -> Self {
        Self(line.into())
    }
}

impl BusView for ReadOnlyWire {
    fn root(&self) -> BusId {
        self.0.root()
    }

    fn width(&self) -> u8 {
        self.0.width()
    }

    fn root_mask(&self) -> u64 {
        self.0.root_mask()
    }

    fn root_pin(&self, pin: u8) -> Result<u8, SimError> {
        self.0.root_pin(pin)
    }

    fn extract(&self, root_value: u64) -> u64 {
        self.0.extract(root_value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Bus, BusId, BusView, ReadOnlyWire, Wire, WritableView};
    use crate::SimError;

    #[test]
    fn whole_bus_view_is_identity_under_mask() {
        let bus = Bus::new(BusId::from_index(0), 4);
        assert_eq!(bus.extract(0xFF), 0x0F);
        assert_eq!(bus.inject(0x0A, 0x1F), 0x0F);
        assert_eq!(bus.root_mask(), 0x0F);
    }

    #[test]
    fn root_pin_rejects_indices_past_width() {
        let bus = Bus::new(BusId::from_index(3), 8);
        assert_eq!(bus.root_pin(7), Ok(7));
        assert_eq!(
            bus.root_pin(8),
            Err(SimError::PinOutOfRange { pin: 8, width: 8 })
        );
    }

    #[test]
    fn wire_delegates_to_wrapped_view() {
        let bus = Bus::new(BusId::from_index(1), 8);
        let branch = bus.branch(&[4, 5, 6, 7]).expect("pins in range");
        let wire = Wire::from(&branch);
        assert_eq!(wire.width(), 4);
        assert_eq!(wire.root(), BusId::from_index(1));
        assert_eq!(wire.extract(0xA5), 0xA);
    }

    #[test]
    fn read_only_wire_reads_like_its_source() {
        let bus = Bus::new(BusId::from_index(2), 8);
        let branch = bus.branch(&[7, 6]).expect("pins in range");
        let sensed = ReadOnlyWire::from(&branch);
        assert_eq!(sensed.root(), BusId::from_index(2));
        assert_eq!(sensed.width(), 2);
        assert_eq!(sensed.root_mask(), 0xC0);
        assert_eq!(sensed.extract(0x80), 0b01);
        assert_eq!(sensed.wire(), &Wire::from(branch));
    }

    #[test]
    fn trigger_derivation_maps_to_root_bit() {
        let bus = Bus::new(BusId::from_index(0), 8);
        let branch = bus.branch(&[6, 7]).expect("pins in range");
        let line = branch.trigger(1).expect("pin in range");
        assert_eq!(line.bit(), 7);
        assert!(branch.trigger(2).is_err());
    }
}
