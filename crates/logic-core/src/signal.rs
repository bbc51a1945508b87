use std::fmt;

use crate::SimError;

/// Widest signal a single bus or net can carry.
pub const MAX_WIDTH: u8 = 64;

/// Returns the low-bit mask covering `width` bits (saturating at 64).
#[must_use]
pub const fn width_mask(width: u8) -> u64 {
    if width >= MAX_WIDTH {
        u64::MAX
    } else {
        (1_u64 << width) - 1
    }
}

/// Fixed-width bit vector.
///
/// The stored value is always masked to `width` bits. Two signals are equal
/// only when both width and value match.
///
/// Width 0 is the empty signal: it carries no bits, its value is always 0,
/// and it is what [`Signal::default`] returns. Buses and nets never hold one;
/// it only stands in for an absent value, such as a pin index a part does not
/// declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Signal {
    value: u64,
    width: u8,
}

impl Signal {
    /// Creates a signal, masking `value` to `width` bits.
    ///
    /// Widths above [`MAX_WIDTH`] are clamped and width 0 yields the empty
    /// signal. Use [`Signal::try_new`] to reject both.
    #[must_use]
    pub const fn new(width: u8, value: u64) -> Self {
        let width = if width > MAX_WIDTH { MAX_WIDTH } else { width };
        Self {
            value: value & width_mask(width),
            width,
        }
    }

    /// Creates a signal of `1..=64` bits, masking `value` to `width` bits.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidWidth`] for width 0 or above [`MAX_WIDTH`].
    pub const fn try_new(width: u8, value: u64) -> Result<Self, SimError> {
        if width == 0 || width > MAX_WIDTH {
            return Err(SimError::InvalidWidth { width });
        }
        Ok(Self::new(width, value))
    }

    /// Creates an all-zero signal of `width` bits.
    #[must_use]
    pub const fn zero(width: u8) -> Self {
        Self::new(width, 0)
    }

    /// Raw value, always below `2^width`.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.value
    }

    /// Declared bit count.
    #[must_use]
    pub const fn width(self) -> u8 {
        self.width
    }

    /// Mask covering this signal's width.
    #[must_use]
    pub const fn mask(self) -> u64 {
        width_mask(self.width)
    }

    /// Returns a signal of the same width carrying `value` (masked).
    #[must_use]
    pub const fn with_value(self, value: u64) -> Self {
        Self::new(self.width, value)
    }

    /// Returns `true` when no bit is set.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.value == 0
    }

    /// Reads bit `index`; bits at or beyond the width read as `false`.
    #[must_use]
    pub const fn bit(self, index: u8) -> bool {
        index < self.width && (self.value >> index) & 1 == 1
    }

    /// Returns a copy with bit `index` set.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PinOutOfRange`] when `index >= width`.
    pub const fn set_bit(self, index: u8) -> Result<Self, SimError> {
        if index >= self.width {
            return Err(SimError::PinOutOfRange {
                pin: index,
                width: self.width,
            });
        }
        Ok(Self {
            value: self.value | (1 << index),
            width: self.width,
        })
    }

    /// Returns a copy with bit `index` cleared.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PinOutOfRange`] when `index >= width`.
    pub const fn clear_bit(self, index: u8) -> Result<Self, SimError> {
        if index >= self.width {
            return Err(SimError::PinOutOfRange {
                pin: index,
                width: self.width,
            });
        }
        Ok(Self {
            value: self.value & !(1 << index),
            width: self.width,
        })
    }

    /// Bitwise OR of two same-width signals.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SignalWidthMismatch`] when the widths differ.
    pub const fn or(self, other: Self) -> Result<Self, SimError> {
        if self.width != other.width {
            return Err(SimError::SignalWidthMismatch {
                left: self.width,
                right: other.width,
            });
        }
        Ok(Self {
            value: self.value | other.value,
            width: self.width,
        })
    }

    /// Parses a hexadecimal literal (optional `0x` prefix, `_` separators)
    /// into a signal of this width.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidHex`] when `text` is not valid hex or does
    /// not fit in 64 bits.
    pub fn parse_hex(self, text: &str) -> Result<Self, SimError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed)
            .replace('_', "");
        u64::from_str_radix(&digits, 16)
            .map(|value| self.with_value(value))
            .map_err(|_| SimError::InvalidHex {
                text: text.to_string(),
            })
    }
}

impl From<Signal> for u64 {
    fn from(signal: Signal) -> Self {
        signal.value
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width > 1 {
            write!(f, "[0x{:02X}]", self.value)
        } else {
            write!(f, "[{}]", self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{width_mask, Signal, MAX_WIDTH};
    use crate::SimError;

    #[test]
    fn construction_masks_to_width() {
        assert_eq!(Signal::new(4, 0xFF).value(), 0x0F);
        assert_eq!(Signal::new(1, 2).value(), 0);
        assert_eq!(Signal::new(64, u64::MAX).value(), u64::MAX);
        assert_eq!(Signal::new(200, 1).width(), MAX_WIDTH);
    }

    #[test]
    fn checked_construction_rejects_widths_outside_one_to_sixty_four() {
        assert_eq!(Signal::try_new(8, 0x1FF), Ok(Signal::new(8, 0xFF)));
        assert_eq!(Signal::try_new(64, 1).map(Signal::width), Ok(64));
        assert_eq!(
            Signal::try_new(0, 1),
            Err(SimError::InvalidWidth { width: 0 })
        );
        assert_eq!(
            Signal::try_new(65, 1),
            Err(SimError::InvalidWidth { width: 65 })
        );

        let empty = Signal::default();
        assert_eq!((empty.width(), empty.value()), (0, 0));
        assert_eq!(Signal::new(0, u64::MAX), empty);
    }

    #[test]
    fn mask_saturates_at_full_width() {
        assert_eq!(width_mask(0), 0);
        assert_eq!(width_mask(1), 1);
        assert_eq!(width_mask(8), 0xFF);
        assert_eq!(width_mask(63), u64::MAX >> 1);
        assert_eq!(width_mask(64), u64::MAX);
    }

    #[test]
    fn equality_requires_matching_width() {
        assert_eq!(Signal::new(8, 3), Signal::new(8, 3));
        assert_ne!(Signal::new(8, 3), Signal::new(4, 3));
    }

    #[test]
    fn bit_helpers_reject_out_of_range_indices() {
        let signal = Signal::zero(4);
        let set = signal.set_bit(3).expect("bit 3 exists");
        assert_eq!(set.value(), 0b1000);
        assert!(set.bit(3));
        assert!(!set.bit(9));
        assert_eq!(set.clear_bit(3).expect("bit 3 exists").value(), 0);
        assert_eq!(
            signal.set_bit(4),
            Err(SimError::PinOutOfRange { pin: 4, width: 4 })
        );
    }

    #[test]
    fn or_combines_same_width_and_rejects_mixed_width() {
        let merged = Signal::new(8, 0x0F).or(Signal::new(8, 0xF0));
        assert_eq!(merged, Ok(Signal::new(8, 0xFF)));
        assert_eq!(
            Signal::new(8, 1).or(Signal::new(4, 1)),
            Err(SimError::SignalWidthMismatch { left: 8, right: 4 })
        );
    }

    #[test]
    fn hex_parsing_masks_and_reports_garbage() {
        let signal = Signal::zero(8);
        assert_eq!(signal.parse_hex("0x1A2"), Ok(Signal::new(8, 0xA2)));
        assert_eq!(signal.parse_hex("ff"), Ok(Signal::new(8, 0xFF)));
        assert!(matches!(
            signal.parse_hex("zz"),
            Err(SimError::InvalidHex { .. })
        ));
    }

    #[test]
    fn display_distinguishes_single_bit_signals() {
        assert_eq!(Signal::new(8, 0x4A).to_string(), "[0x4A]");
        assert_eq!(Signal::new(1, 1).to_string(), "[1]");
    }
}
