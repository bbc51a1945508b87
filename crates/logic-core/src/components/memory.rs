use std::any::Any;
use std::fmt;

use super::{ADDRESS, CLOCK, OUTPUT_ENABLE};
use crate::{
    width_mask, BusView, Circuit, Component, ComponentId, Edge, Port, ReadOnlyWire, Signals,
    SimError, TriggerLine, Wire,
};

/// Widest address wire a memory accepts; caps the cell array at 16 Mi cells.
pub const MAX_ADDRESS_WIDTH: u8 = 24;

/// Cells per line of the hex dump.
const DUMP_LINE_CELLS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cells {
    values: Vec<u64>,
    mask: u64,
    digits: usize,
}

impl Cells {
    fn sized_for(address: &ReadOnlyWire, data: &Wire) -> Result<Self, SimError> {
        let address_width = address.width();
        if address_width > MAX_ADDRESS_WIDTH {
            return Err(SimError::AddressTooWide {
                width: address_width,
                max: MAX_ADDRESS_WIDTH,
            });
        }
        Ok(Self {
            values: vec![0; 1_usize << address_width],
            mask: width_mask(data.width()),
            digits: usize::from(data.width()).div_ceil(4),
        })
    }

    fn load(&mut self, offset: usize, data: &[u64]) -> Result<(), SimError> {
        let size = self.values.len();
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= size)
            .ok_or(SimError::LoadOutOfRange {
                offset,
                len: data.len(),
                size,
            })?;
        for (cell, &value) in self.values[offset..end].iter_mut().zip(data) {
            *cell = value & self.mask;
        }
        Ok(())
    }

    // The address wire's width sizes the array, so a miss means the wiring
    // changed underneath the memory.
    fn get(&self, address: u64) -> u64 {
        let cell = usize::try_from(address)
            .ok()
            .and_then(|index| self.values.get(index));
        if cell.is_none() {
            log::warn!(
                "read of address {address:#x} outside {}-cell memory",
                self.values.len()
            );
        }
        cell.copied().unwrap_or(0)
    }

    fn set(&mut self, address: u64, value: u64) {
        let mask = self.mask;
        let size = self.values.len();
        match usize::try_from(address)
            .ok()
            .and_then(|index| self.values.get_mut(index))
        {
            Some(cell) => *cell = value & mask,
            None => log::warn!("write to address {address:#x} outside {size}-cell memory dropped"),
        }
    }
}

impl fmt::Display for Cells {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (line, chunk) in self.values.chunks(DUMP_LINE_CELLS).enumerate() {
            if line > 0 {
                writeln!(f)?;
            }
            write!(f, "{:08x}:", line * DUMP_LINE_CELLS)?;
            for value in chunk {
                write!(f, " {value:0width$x}", width = self.digits)?;
            }
        }
        Ok(())
    }
}

fn drive(
    signals: &mut Signals<'_>,
    address: &ReadOnlyWire,
    data: &Wire,
    cells: &Cells,
) -> Result<(), SimError> {
    let value = cells.get(signals.read(address)?);
    signals.write(data, value)
}

fn check_pins(
    circuit: &Circuit,
    address: &ReadOnlyWire,
    data: &Wire,
    lines: &[TriggerLine],
) -> Result<(), SimError> {
    circuit.check(address)?;
    circuit.check(data)?;
    lines.iter().try_for_each(|line| circuit.check(line))
}

fn subscribe(
    circuit: &mut Circuit,
    id: ComponentId,
    address: ReadOnlyWire,
    output_enable: TriggerLine,
    clock: TriggerLine,
) -> Result<(), SimError> {
    circuit.subscribe_edge(clock, Edge::Rising, id, CLOCK)?;
    circuit.subscribe_change(address, id, ADDRESS)?;
    circuit.subscribe_edge(output_enable, Edge::Rising, id, OUTPUT_ENABLE)
}

/// Wiring for a [`Ram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamPins {
    /// Selects the cell; its width fixes the memory size at `2^width`.
    pub address: ReadOnlyWire,
    /// Stored from on write, driven on output; its width masks every cell.
    pub data: Wire,
    /// Stores `data` into the addressed cell on the clock's rising edge.
    pub write_enable: TriggerLine,
    /// Drives the addressed cell onto `data`.
    pub output_enable: TriggerLine,
    /// Rising edges perform the write/output cycle.
    pub clock: TriggerLine,
}

/// Read/write memory addressed by a wire.
///
/// On a clock rising edge a write-enabled store happens first, then an
/// output-enabled drive of the addressed cell. With both enabled the data bus
/// is therefore re-driven with the value just stored. While output is enabled
/// the data bus also follows address changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ram {
    name: String,
    pins: RamPins,
    cells: Cells,
}

impl Ram {
    /// Creates a zeroed RAM and wires it into `circuit`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] when a pin belongs to another circuit,
    /// or [`SimError::AddressTooWide`] when the address wire exceeds
    /// [`MAX_ADDRESS_WIDTH`] bits.
    pub fn attach(
        circuit: &mut Circuit,
        name: impl Into<String>,
        pins: RamPins,
    ) -> Result<ComponentId, SimError> {
        check_pins(
            circuit,
            &pins.address,
            &pins.data,
            &[pins.write_enable, pins.output_enable, pins.clock],
        )?;
        let cells = Cells::sized_for(&pins.address, &pins.data)?;
        let (address, output_enable, clock) =
            (pins.address.clone(), pins.output_enable, pins.clock);
        let id = circuit.add(Self {
            name: name.into(),
            pins,
            cells,
        });
        subscribe(circuit, id, address, output_enable, clock)?;
        Ok(id)
    }

    /// Bulk-initialises cells starting at `offset`; values are masked to the
    /// data width.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::LoadOutOfRange`] when `data` would run past the
    /// last cell. Nothing is written in that case.
    pub fn load(&mut self, offset: usize, data: &[u64]) -> Result<(), SimError> {
        self.cells.load(offset, data)
    }

    /// Cell values indexed by address.
    #[must_use]
    pub fn contents(&self) -> &[u64] {
        &self.cells.values
    }

    /// Wiring the RAM was attached with.
    #[must_use]
    pub const fn pins(&self) -> &RamPins {
        &self.pins
    }
}

impl Component for Ram {
    fn name(&self) -> &str {
        &self.name
    }

    fn react(&mut self, port: Port, signals: &mut Signals<'_>) -> Result<(), SimError> {
        let pins = &self.pins;
        match port {
            CLOCK => {
                if signals.is_high(pins.write_enable)? {
                    let address = signals.read(&pins.address)?;
                    let value = signals.read(&pins.data)?;
                    self.cells.set(address, value);
                }
                if signals.is_high(pins.output_enable)? {
                    drive(signals, &pins.address, &pins.data, &self.cells)?;
                }
                Ok(())
            }
            ADDRESS => {
                if signals.is_high(pins.output_enable)? {
                    drive(signals, &pins.address, &pins.data, &self.cells)?;
                }
                Ok(())
            }
            OUTPUT_ENABLE => drive(signals, &pins.address, &pins.data, &self.cells),
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

impl fmt::Display for Ram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cells, f)
    }
}

/// Wiring for a [`Rom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomPins {
    /// Selects the cell; its width fixes the memory size at `2^width`.
    pub address: ReadOnlyWire,
    /// Driven with the addressed cell while output is enabled.
    pub data: Wire,
    /// Drives the addressed cell onto `data`.
    pub output_enable: TriggerLine,
    /// Rising edges re-drive the addressed cell while output is enabled.
    pub clock: TriggerLine,
}

/// Read-only memory burned in at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    name: String,
    pins: RomPins,
    cells: Cells,
}

impl Rom {
    /// Burns `contents` into a new ROM and wires it into `circuit`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBus`] when a pin belongs to another circuit,
    /// [`SimError::AddressTooWide`] for an oversized address wire and
    /// [`SimError::ContentLength`] unless `contents` holds exactly
    /// `2^address_width` cells.
    pub fn attach(
        circuit: &mut Circuit,
        name: impl Into<String>,
        pins: RomPins,
        contents: &[u64],
    ) -> Result<ComponentId, SimError> {
        check_pins(
            circuit,
            &pins.address,
            &pins.data,
            &[pins.output_enable, pins.clock],
        )?;
        let mut cells = Cells::sized_for(&pins.address, &pins.data)?;
        if contents.len() != cells.values.len() {
            return Err(SimError::ContentLength {
                expected: cells.values.len(),
                actual: contents.len(),
            });
        }
        cells.load(0, contents)?;

        let (address, output_enable, clock) =
            (pins.address.clone(), pins.output_enable, pins.clock);
        let id = circuit.add(Self {
            name: name.into(),
            pins,
            cells,
        });
        subscribe(circuit, id, address, output_enable, clock)?;
        Ok(id)
    }

    /// Cell values indexed by address.
    #[must_use]
    pub fn contents(&self) -> &[u64] {
        &self.cells.values
    }

    /// Wiring the ROM was attached with.
    #[must_use]
    pub const fn pins(&self) -> &RomPins {
        &self.pins
    }
}

impl Component for Rom {
    fn name(&self) -> &str {
        &self.name
    }

    fn react(&mut self, port: Port, signals: &mut Signals<'_>) -> Result<(), SimError> {
        let pins = &self.pins;
        match port {
            CLOCK | ADDRESS => {
                if signals.is_high(pins.output_enable)? {
                    drive(signals, &pins.address, &pins.data, &self.cells)?;
                }
                Ok(())
            }
            OUTPUT_ENABLE => drive(signals, &pins.address, &pins.data, &self.cells),
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

impl fmt::Display for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cells, f)
    }
}

#[cfg(test)]
mod tests {
    use super::{Cells, Ram, RamPins, Rom, RomPins, MAX_ADDRESS_WIDTH};
    use crate::{Circuit, Clock, SimError};

    #[test]
    fn cells_outside_the_array_read_zero_and_drop_writes() {
        let mut cells = Cells {
            values: vec![7; 4],
            mask: 0xFF,
            digits: 2,
        };
        assert_eq!(cells.get(3), 7);
        assert_eq!(cells.get(4), 0);
        assert_eq!(cells.get(u64::MAX), 0);

        cells.set(9, 0x55);
        cells.set(1, 0x1FF);
        assert_eq!(cells.values, vec![7, 0xFF, 7, 7]);
    }

    #[test]
    fn ram_rejects_pins_from_another_circuit() {
        let mut other = Circuit::new();
        for _ in 0..5 {
            other.bus(8).expect("valid width");
        }
        let foreign_data = other.bus(8).expect("valid width");

        let mut circuit = Circuit::new();
        let address = circuit.bus(2).expect("valid width");
        let low = circuit.low();
        let result = Ram::attach(
            &mut circuit,
            "ram",
            RamPins {
                address: address.into(),
                data: foreign_data.into(),
                write_enable: low,
                output_enable: low,
                clock: low,
            },
        );
        assert_eq!(result, Err(SimError::UnknownBus { bus: 5 }));
    }

    #[test]
    fn store_then_drive_on_same_edge_writes_through() {
        let mut circuit = Circuit::new();
        let address = circuit.bus(2).expect("valid width");
        let data = circuit.bus(8).expect("valid width");
        let we = circuit.trigger_line();
        let oe = circuit.trigger_line();
        let clock = circuit.trigger_line();
        let id = Ram::attach(
            &mut circuit,
            "ram",
            RamPins {
                address: address.into(),
                data: data.into(),
                write_enable: we,
                output_enable: oe,
                clock,
            },
        )
        .expect("small address");

        circuit.write(&address, 2).expect("settles");
        circuit.write(&data, 0x99).expect("settles");
        circuit.set_line(we, true).expect("settles");
        circuit.set_line(oe, true).expect("settles");
        assert_eq!(circuit.read(&data), Ok(0));

        circuit.write(&data, 0x5C).expect("settles");
        Clock::new(clock).tick(&mut circuit).expect("settles");

        let ram = circuit.component::<Ram>(id).expect("registered ram");
        assert_eq!(ram.contents(), &[0, 0, 0x5C, 0]);
        assert_eq!(circuit.read(&data), Ok(0x5C));
    }

    #[test]
    fn data_follows_address_while_output_enabled() {
        let mut circuit = Circuit::new();
        let address = circuit.bus(2).expect("valid width");
        let data = circuit.bus(4).expect("valid width");
        let oe = circuit.trigger_line();
        let clock = circuit.trigger_line();
        Rom::attach(
            &mut circuit,
            "rom",
            RomPins {
                address: address.into(),
                data: data.into(),
                output_enable: oe,
                clock,
            },
            &[0x1, 0x2, 0x13, 0x4],
        )
        .expect("matching image");

        circuit.write(&address, 1).expect("settles");
        assert_eq!(circuit.read(&data), Ok(0));

        circuit.set_line(oe, true).expect("settles");
        assert_eq!(circuit.read(&data), Ok(0x2));
        circuit.write(&address, 2).expect("settles");
        assert_eq!(circuit.read(&data), Ok(0x3));
    }

    #[test]
    fn rom_rejects_wrong_image_size() {
        let mut circuit = Circuit::new();
        let address = circuit.bus(3).expect("valid width");
        let data = circuit.bus(8).expect("valid width");
        let low = circuit.low();
        let result = Rom::attach(
            &mut circuit,
            "rom",
            RomPins {
                address: address.into(),
                data: data.into(),
                output_enable: low,
                clock: low,
            },
            &[0; 7],
        );
        assert_eq!(
            result,
            Err(SimError::ContentLength {
                expected: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn oversized_address_is_rejected() {
        let mut circuit = Circuit::new();
        let address = circuit.bus(MAX_ADDRESS_WIDTH + 1).expect("valid width");
        let data = circuit.bus(8).expect("valid width");
        let low = circuit.low();
        let result = Ram::attach(
            &mut circuit,
            "ram",
            RamPins {
                address: address.into(),
                data: data.into(),
                write_enable: low,
                output_enable: low,
                clock: low,
            },
        );
        assert_eq!(
            result,
            Err(SimError::AddressTooWide {
                width: MAX_ADDRESS_WIDTH + 1,
                max: MAX_ADDRESS_WIDTH
            })
        );
    }

    #[test]
    fn load_checks_bounds_and_dump_is_hex_lines() {
        let mut circuit = Circuit::new();
        let address = circuit.bus(5).expect("valid width");
        let data = circuit.bus(8).expect("valid width");
        let low = circuit.low();
        let id = Ram::attach(
            &mut circuit,
            "ram",
            RamPins {
                address: address.into(),
                data: data.into(),
                write_enable: low,
                output_enable: low,
                clock: low,
            },
        )
        .expect("small address");
        let ram = circuit.component_mut::<Ram>(id).expect("registered ram");

        assert_eq!(
            ram.load(30, &[1, 2, 3]),
            Err(SimError::LoadOutOfRange {
                offset: 30,
                len: 3,
                size: 32
            })
        );
        ram.load(15, &[0x1AB, 0xCD]).expect("in range");

        let dump = ram.to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000: 00 00"));
        assert!(lines[0].ends_with(" ab"));
        assert!(lines[1].starts_with("00000010: cd 00"));
    }
}
