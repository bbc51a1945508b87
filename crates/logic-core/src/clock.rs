use crate::{Circuit, SimError, TriggerLine};

/// Drives one trigger line through full rising-then-falling pulses.
///
/// Every rising-edge reaction settles before the falling half of the pulse is
/// issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    line: TriggerLine,
}

impl Clock {
    /// Binds a clock to `line`.
    #[must_use]
    pub const fn new(line: TriggerLine) -> Self {
        Self { line }
    }

    /// The driven line.
    #[must_use]
    pub const fn line(self) -> TriggerLine {
        self.line
    }

    /// Issues one pulse.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while either half of the pulse settles.
    pub fn tick(self, circuit: &mut Circuit) -> Result<(), SimError> {
        circuit.set_line(self.line, true)?;
        circuit.set_line(self.line, false)
    }

    /// Issues `count` pulses back to back.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first pulse error.
    pub fn ticks(self, circuit: &mut Circuit, count: u64) -> Result<(), SimError> {
        for _ in 0..count {
            self.tick(circuit)?;
        }
        Ok(())
    }
}
