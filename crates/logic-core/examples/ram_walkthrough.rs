//! Writes a byte into a 16-cell RAM, reads it back, and dumps the cells.

use log as _;
use logic_core::{BusView, Circuit, Clock, Ram, RamPins, SimError};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const WRITE: u64 = 0b01;
const OUTPUT: u64 = 0b10;

fn main() -> Result<(), SimError> {
    let mut circuit = Circuit::new();
    let address = circuit.bus(4)?;
    let data = circuit.bus(8)?;
    let control = circuit.bus(2)?;
    let clock = Clock::new(circuit.trigger_line());

    let ram = Ram::attach(
        &mut circuit,
        "ram",
        RamPins {
            address: address.into(),
            data: data.into(),
            write_enable: control.trigger(0)?,
            output_enable: control.trigger(1)?,
            clock: clock.line(),
        },
    )?;
    circuit.on_change(data, |old, new| println!("data bus {old:#04x} -> {new:#04x}"))?;

    circuit.write(&address, 0)?;
    circuit.write(&data, 74)?;
    circuit.write(&control, WRITE)?;
    clock.tick(&mut circuit)?;

    circuit.write(&data, 0)?;
    circuit.write(&control, OUTPUT)?;
    clock.tick(&mut circuit)?;
    println!("read back {}", circuit.signal(&data)?);

    if let Some(ram) = circuit.component::<Ram>(ram) {
        println!("{ram}");
    }
    Ok(())
}
