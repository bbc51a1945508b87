use thiserror::Error;

/// Failure classes used to decide whether a circuit may keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Malformed circuit detected while building it; must not run.
    Construction,
    /// A component broke its own output contract while reacting.
    Runtime,
    /// Propagation did not reach a fixpoint within the iteration bound.
    Convergence,
}

/// Error taxonomy shared by the circuit and engine layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Bus or net declared with zero or more than 64 bits.
    #[error("width {width} is outside 1..=64")]
    InvalidWidth {
        /// Requested width.
        width: u8,
    },
    /// Branch, trigger or bit index outside its parent's width.
    #[error("pin {pin} is out of range for a {width}-bit parent")]
    PinOutOfRange {
        /// Requested pin index.
        pin: u8,
        /// Width of the parent index space.
        width: u8,
    },
    /// Branch pin map names the same parent bit twice.
    #[error("pin {pin} appears more than once in a branch pin map")]
    DuplicatePin {
        /// Repeated pin index.
        pin: u8,
    },
    /// Bitwise combination of signals with different widths.
    #[error("signal widths differ: {left} vs {right}")]
    SignalWidthMismatch {
        /// Width of the left operand.
        left: u8,
        /// Width of the right operand.
        right: u8,
    },
    /// Hex literal could not be parsed.
    #[error("invalid hex literal `{text}`")]
    InvalidHex {
        /// Offending input.
        text: String,
    },
    /// Host or component tried to drive a constant bus.
    #[error("constant bus {bus} cannot be written")]
    ConstantWrite {
        /// Index of the constant bus.
        bus: usize,
    },
    /// Memory address bus too wide to allocate.
    #[error("{width}-bit address exceeds the {max}-bit memory limit")]
    AddressTooWide {
        /// Address bus width.
        width: u8,
        /// Largest supported address width.
        max: u8,
    },
    /// Pre-loaded memory image does not match `2^address_width` cells.
    #[error("memory image has {actual} cells, expected {expected}")]
    ContentLength {
        /// Cell count implied by the address width.
        expected: usize,
        /// Cell count supplied.
        actual: usize,
    },
    /// Bulk load would run past the end of memory.
    #[error("load of {len} cells at offset {offset} overruns {size}-cell memory")]
    LoadOutOfRange {
        /// First cell written.
        offset: usize,
        /// Number of cells supplied.
        len: usize,
        /// Memory size in cells.
        size: usize,
    },
    /// Two parts registered under the same name.
    #[error("duplicate component name `{name}`")]
    DuplicateComponent {
        /// Conflicting name.
        name: String,
    },
    /// Two nets declared under the same name.
    #[error("duplicate net name `{name}`")]
    DuplicateNet {
        /// Conflicting name.
        name: String,
    },
    /// Pin name not declared by the component.
    #[error("component `{component}` has no pin `{pin}`")]
    UnknownPin {
        /// Component name.
        component: String,
        /// Requested pin name.
        pin: String,
    },
    /// Bus, branch or trigger-line handle not created by this circuit.
    #[error("unknown bus {bus}")]
    UnknownBus {
        /// Raw bus index.
        bus: usize,
    },
    /// Net handle not created by this builder.
    #[error("unknown net {net}")]
    UnknownNet {
        /// Raw net index.
        net: usize,
    },
    /// Part handle not created by this builder.
    #[error("unknown component {component}")]
    UnknownComponent {
        /// Raw part index.
        component: usize,
    },
    /// Pin wired into a second net.
    #[error("pin `{pin}` is already wired to net `{net}`")]
    PinAlreadyConnected {
        /// Qualified pin name.
        pin: String,
        /// Net it already belongs to.
        net: String,
    },
    /// Pin width differs from the net it is wired into.
    #[error("pin `{pin}` is {pin_width} bits wide but net `{net}` is {net_width}")]
    NetWidthMismatch {
        /// Net name.
        net: String,
        /// Qualified pin name.
        pin: String,
        /// Width of the net.
        net_width: u8,
        /// Width declared by the pin.
        pin_width: u8,
    },
    /// Rising/falling trigger declared on a pin wider than one bit.
    #[error("edge trigger on `{pin}` requires a 1-bit pin, found {width} bits")]
    EdgeTriggerWidth {
        /// Qualified pin name.
        pin: String,
        /// Declared pin width.
        width: u8,
    },
    /// Part returned an output for a pin index it never declared.
    #[error("component `{component}` drove undeclared pin index {pin}")]
    InvalidOutputPin {
        /// Component name.
        component: String,
        /// Local pin index.
        pin: usize,
    },
    /// Circuit dispatch exceeded its per-settle budget.
    #[error("circuit did not settle within {limit} dispatches")]
    UnstableCircuit {
        /// Configured dispatch budget.
        limit: u32,
    },
    /// Engine exceeded its delta-cycle budget.
    #[error("engine did not converge within {limit} delta cycles; still changing: {nets:?}")]
    NotConverged {
        /// Configured delta-cycle budget.
        limit: u32,
        /// Nets changed by the last attempted cycle.
        nets: Vec<String>,
    },
}

impl SimError {
    /// Returns the failure class for this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidOutputPin { .. } => ErrorClass::Runtime,
            Self::UnstableCircuit { .. } | Self::NotConverged { .. } => ErrorClass::Convergence,
            Self::InvalidWidth { .. }
            | Self::PinOutOfRange { .. }
            | Self::DuplicatePin { .. }
            | Self::SignalWidthMismatch { .. }
            | Self::InvalidHex { .. }
            | Self::ConstantWrite { .. }
            | Self::AddressTooWide { .. }
            | Self::ContentLength { .. }
            | Self::LoadOutOfRange { .. }
            | Self::DuplicateComponent { .. }
            | Self::DuplicateNet { .. }
            | Self::UnknownPin { .. }
            | Self::UnknownBus { .. }
            | Self::UnknownNet { .. }
            | Self::UnknownComponent { .. }
            | Self::PinAlreadyConnected { .. }
            | Self::NetWidthMismatch { .. }
            | Self::EdgeTriggerWidth { .. } => ErrorClass::Construction,
        }
    }

    /// Errors that mean the circuit is malformed and must not be simulated.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.class(), ErrorClass::Construction)
    }
}
