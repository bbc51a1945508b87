use crate::{BusId, BusView, SimError, WritableView};

/// Direction of a single-bit transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Edge {
    /// `0 -> 1`.
    Rising,
    /// `1 -> 0`.
    Falling,
}

/// One bit of a root bus, classified into rising and falling edges.
///
/// A line created by [`crate::Circuit::trigger_line`] owns a private 1-bit
/// bus; one derived with [`BusView::trigger`] shares a bit of a wider bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerLine {
    bus: BusId,
    bit: u8,
}

impl TriggerLine {
    pub(crate) const fn new(bus: BusId, bit: u8) -> Self {
        Self { bus, bit }
    }

    /// Bit position inside the root bus.
    #[must_use]
    pub const fn bit(self) -> u8 {
        self.bit
    }

    /// Mask selecting this line's bit in the root bus.
    #[must_use]
    pub const fn mask(self) -> u64 {
        1 << self.bit
    }

    /// Classifies a root-bus transition from `old` to `new`.
    ///
    /// Returns `None` when this line's bit did not flip, even if other bits
    /// of the bus changed.
    #[must_use]
    pub const fn classify(self, old: u64, new: u64) -> Option<Edge> {
        let mask = self.mask();
        if old & mask == new & mask {
            None
        } else if new & mask != 0 {
            Some(Edge::Rising)
        } else {
            Some(Edge::Falling)
        }
    }
}

impl BusView for TriggerLine {
    fn root(&self) -> BusId {
        self.bus
    }

    fn width(&self) -> u8 {
        1
    }

    fn root_mask(&self) -> u64 {
        self.mask()
    }

    fn root_pin(&self, pin: u8) -> Result<u8, SimError> {
        if pin == 0 {
            Ok(self.bit)
        } else {
            Err(SimError::PinOutOfRange { pin, width: 1 })
        }
    }

    fn extract(&self, root_value: u64) -> u64 {
        (root_value >> self.bit) & 1
    }
}

impl WritableView for TriggerLine {
    fn inject(&self, root_value: u64, value: u64) -> u64 {
        (root_value & !self.mask()) | ((value & 1) << self.bit)
    }
}

#[cfg(test)]
mod tests {
    use super::{Edge, TriggerLine};
    use crate::{BusId, BusView, WritableView};

    #[test]
    fn classification_tracks_only_the_owned_bit() {
        let line = TriggerLine::new(BusId::from_index(0), 2);
        assert_eq!(line.classify(0b000, 0b100), Some(Edge::Rising));
        assert_eq!(line.classify(0b111, 0b011), Some(Edge::Falling));
        assert_eq!(line.classify(0b100, 0b111), None);
        assert_eq!(line.classify(0b000, 0b011), None);
    }

    #[test]
    fn line_view_reads_and_writes_single_bit() {
        let line = TriggerLine::new(BusId::from_index(0), 3);
        assert_eq!(line.extract(0b1000), 1);
        assert_eq!(line.inject(0b0111, 1), 0b1111);
        assert_eq!(line.inject(0b1111, 0), 0b0111);
        assert!(line.root_pin(1).is_err());
    }
}
