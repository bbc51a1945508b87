//! Reference stateful components built on the [`crate::Component`] contract.

/// Clocked register with write, output, increment and reset controls.
pub mod register;
/// Addressed RAM and ROM cell arrays.
pub mod memory;

pub use memory::{Ram, RamPins, Rom, RomPins, MAX_ADDRESS_WIDTH};
pub use register::{Register, RegisterPins};

use crate::Port;

pub(crate) const CLOCK: Port = Port(0);
pub(crate) const RESET: Port = Port(1);
pub(crate) const OUTPUT_ENABLE: Port = Port(2);
pub(crate) const ADDRESS: Port = Port(3);
