use crate::{BusId, BusView, SimError, WritableView, MAX_WIDTH};

/// Bit-remapped view over a bus or another branch.
///
/// Branch bit `n` reads and writes root bit `pins()[n]`. Chained branches are
/// flattened at construction: a branch of a branch stores positions in the
/// root bus's index space, so reads and writes cost one mapping pass
/// regardless of depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Branch {
    root: BusId,
    pins: Vec<u8>,
    mask: u64,
}

impl Branch {
    /// Builds a branch from pins already resolved to the root bus.
    pub(crate) fn over_root(root: BusId, pins: Vec<u8>) -> Result<Self, SimError> {
        if pins.is_empty() || pins.len() > usize::from(MAX_WIDTH) {
            return Err(SimError::InvalidWidth {
                width: u8::try_from(pins.len()).unwrap_or(u8::MAX),
            });
        }

        let mut mask = 0_u64;
        for &pin in &pins {
            let bit = 1_u64 << pin;
            if mask & bit != 0 {
                return Err(SimError::DuplicatePin { pin });
            }
            mask |= bit;
        }

        Ok(Self { root, pins, mask })
    }

    pub(crate) fn single(root: BusId, pin: u8) -> Self {
        Self {
            root,
            pins: vec![pin],
            mask: 1 << pin,
        }
    }

    /// Root-bus bit positions in branch significance order.
    #[must_use]
    pub fn pins(&self) -> &[u8] {
        &self.pins
    }
}

impl BusView for Branch {
    fn root(&self) -> BusId {
        self.root
    }

    fn width(&self) -> u8 {
        // Bounded by MAX_WIDTH at construction.
        u8::try_from(self.pins.len()).unwrap_or(MAX_WIDTH)
    }

    fn root_mask(&self) -> u64 {
        self.mask
    }

    fn root_pin(&self, pin: u8) -> Result<u8, SimError> {
        self.pins
            .get(usize::from(pin))
            .copied()
            .ok_or(SimError::PinOutOfRange {
                pin,
                width: self.width(),
            })
    }

    fn extract(&self, root_value: u64) -> u64 {
        self.pins
            .iter()
            .enumerate()
            .fold(0, |acc, (n, &pin)| acc | (((root_value >> pin) & 1) << n))
    }
}

impl WritableView for Branch {
    fn inject(&self, root_value: u64, value: u64) -> u64 {
        let scattered = self
            .pins
            .iter()
            .enumerate()
            .fold(0, |acc, (n, &pin)| acc | (((value >> n) & 1) << pin));
        (root_value & !self.mask) | scattered
    }
}
