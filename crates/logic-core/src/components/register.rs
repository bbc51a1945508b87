use std::any::Any;

use super::{CLOCK, OUTPUT_ENABLE, RESET};
use crate::{
    width_mask, BusView, Circuit, Component, ComponentId, Edge, Port, ReadOnlyWire, Signals,
    SimError, TriggerLine, Wire,
};

/// Wiring for a [`Register`].
///
/// Tie unused controls to [`Circuit::low`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPins {
    /// Data loaded on a write-enabled clock edge; `None` for a pure counter.
    pub input: Option<ReadOnlyWire>,
    /// Bus driven with the stored value while output is enabled.
    pub output: Wire,
    /// Loads `input` on the clock's rising edge.
    pub write_enable: TriggerLine,
    /// Drives `output` on the clock's rising edge and on its own rising edge.
    pub output_enable: TriggerLine,
    /// Advances the value after output on the clock's rising edge.
    pub increment_enable: TriggerLine,
    /// Clears the value; overrides `write_enable`.
    pub reset: TriggerLine,
    /// Rising edges step the register.
    pub clock: TriggerLine,
}

/// Single-value register clocked on rising edges.
///
/// One clock edge applies, in order: reset (else write), output, increment.
/// Increment wraps modulo `2^width` of the output wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    name: String,
    pins: RegisterPins,
    value: u64,
    mask: u64,
}

impl Register {
    /// Creates the register, registers it with `circuit` and subscribes it to
    /// its clock, reset and output-enable edges.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] when a pin belongs to another circuit,
    /// or [`SimError::SignalWidthMismatch`] when `input` and `output` differ
    /// in width.
    pub fn attach(
        circuit: &mut Circuit,
        name: impl Into<String>,
        pins: RegisterPins,
    ) -> Result<ComponentId, SimError> {
        circuit.check(&pins.output)?;
        for line in [
            pins.write_enable,
            pins.output_enable,
            pins.increment_enable,
            pins.reset,
            pins.clock,
        ] {
            circuit.check(&line)?;
        }
        let width = pins.output.width();
        if let Some(input) = &pins.input {
            circuit.check(input)?;
            if input.width() != width {
                return Err(SimError::SignalWidthMismatch {
                    left: input.width(),
                    right: width,
                });
            }
        }

        let (clock, reset, output_enable) = (pins.clock, pins.reset, pins.output_enable);
        let id = circuit.add(Self {
            name: name.into(),
            pins,
            value: 0,
            mask: width_mask(width),
        });
        circuit.subscribe_edge(clock, Edge::Rising, id, CLOCK)?;
        circuit.subscribe_edge(reset, Edge::Rising, id, RESET)?;
        circuit.subscribe_edge(output_enable, Edge::Rising, id, OUTPUT_ENABLE)?;
        Ok(id)
    }

    /// Stored value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Wiring the register was attached with.
    #[must_use]
    pub const fn pins(&self) -> &RegisterPins {
        &self.pins
    }

    fn clock_edge(&mut self, signals: &mut Signals<'_>) -> Result<(), SimError> {
        if signals.is_high(self.pins.reset)? {
            self.value = 0;
        } else if signals.is_high(self.pins.write_enable)? {
            if let Some(input) = &self.pins.input {
                self.value = signals.read(input)? & self.mask;
            }
        }

        if signals.is_high(self.pins.output_enable)? {
            signals.write(&self.pins.output, self.value)?;
        }

        if signals.is_high(self.pins.increment_enable)? {
            self.value = self.value.wrapping_add(1) & self.mask;
        }
        Ok(())
    }
}

impl Component for Register {
    fn name(&self) -> &str {
        &self.name
    }

    fn react(&mut self, port: Port, signals: &mut Signals<'_>) -> Result<(), SimError> {
        match port {
            CLOCK => self.clock_edge(signals),
            RESET => {
                self.value = 0;
                if signals.is_high(self.pins.output_enable)? {
                    signals.write(&self.pins.output, 0)?;
                }
                Ok(())
            }
            OUTPUT_ENABLE => signals.write(&self.pins.output, self.value),
            _ => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
