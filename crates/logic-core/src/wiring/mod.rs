//! Width-typed bus handles, bit-remapping branches and single-bit trigger
//! lines.
//!
//! Handles hold no values. Every read and write goes through the owning
//! [`crate::Circuit`], which resolves a view to its root bus and applies the
//! view's bit mapping.

/// Bus handles and the shared read/write view contract.
pub mod bus;
/// Bit-remapped views over a bus or another branch.
pub mod branch;
/// Single-bit edge-classifying lines.
pub mod trigger;

pub use branch::Branch;
pub use bus::{Bus, BusId, BusView, ReadOnlyWire, Wire, WritableView};
pub use trigger::{Edge, TriggerLine};
