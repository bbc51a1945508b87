use std::collections::HashMap;
use std::ops::Range;

use super::{Engine, NetInfo, NetId, Part, PinSpec, TriggerKind};
use crate::{Signal, SimConfig, SimError, MAX_WIDTH};

/// Index of a part inside an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(u32);

impl PartId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the part table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Engine-wide index of one part pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(u32);

impl PinId {
    fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the pin table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Wiring phase of an [`Engine`]: declares parts and nets and binds pins.
///
/// Every check happens here; a built engine cannot hold a width mismatch or
/// an unbound pin.
pub struct EngineBuilder {
    config: SimConfig,
    parts: Vec<Box<dyn Part>>,
    part_names: Vec<String>,
    part_pins: Vec<Range<usize>>,
    pins: Vec<PinSpec>,
    pin_owner: Vec<PartId>,
    pin_net: Vec<Option<NetId>>,
    nets: Vec<NetInfo>,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("parts", &self.part_names)
            .field("pins", &self.pins.len())
            .field("nets", &self.nets)
            .finish_non_exhaustive()
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl EngineBuilder {
    /// Starts an empty wiring with the given limits.
    #[must_use]
    pub const fn new(config: SimConfig) -> Self {
        Self {
            config,
            parts: Vec::new(),
            part_names: Vec::new(),
            part_pins: Vec::new(),
            pins: Vec::new(),
            pin_owner: Vec::new(),
            pin_net: Vec::new(),
            nets: Vec::new(),
        }
    }

    /// Adds a part under a unique `name` and records its declared pins.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateComponent`] for a reused name,
    /// [`SimError::InvalidWidth`] for a pin outside 1..=64 bits, or
    /// [`SimError::EdgeTriggerWidth`] for an edge trigger on a multi-bit pin.
    pub fn add(&mut self, name: impl Into<String>, part: impl Part) -> Result<PartId, SimError> {
        let name = name.into();
        if self.part_names.contains(&name) {
            return Err(SimError::DuplicateComponent { name });
        }

        let specs = part.pins();
        for spec in &specs {
            if spec.width == 0 || spec.width > MAX_WIDTH {
                return Err(SimError::InvalidWidth { width: spec.width });
            }
            let edge = spec
                .triggers
                .iter()
                .any(|kind| matches!(kind, TriggerKind::Rising | TriggerKind::Falling));
            if edge && spec.width != 1 {
                return Err(SimError::EdgeTriggerWidth {
                    pin: format!("{name}.{}", spec.name),
                    width: spec.width,
                });
            }
        }

        let id = PartId::from_index(self.parts.len());
        let start = self.pins.len();
        self.pins.extend_from_slice(&specs);
        self.pin_owner.extend(specs.iter().map(|_| id));
        self.pin_net.extend(specs.iter().map(|_| None));
        self.part_pins.push(start..self.pins.len());
        self.part_names.push(name);
        self.parts.push(Box::new(part));
        Ok(id)
    }

    /// Declares a net of `width` bits.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateNet`] for a reused name or
    /// [`SimError::InvalidWidth`] outside 1..=64 bits.
    pub fn net(&mut self, name: impl Into<String>, width: u8) -> Result<NetId, SimError> {
        let name = name.into();
        if width == 0 || width > MAX_WIDTH {
            return Err(SimError::InvalidWidth { width });
        }
        if self.nets.iter().any(|net| net.name == name) {
            return Err(SimError::DuplicateNet { name });
        }
        self.nets.push(NetInfo { name, width });
        Ok(NetId::from_index(self.nets.len() - 1))
    }

    /// Resolves pin `pin` of `part`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownComponent`] or [`SimError::UnknownPin`].
    pub fn pin(&self, part: PartId, pin: &str) -> Result<PinId, SimError> {
        let range = self
            .part_pins
            .get(part.index())
            .ok_or(SimError::UnknownComponent {
                component: part.index(),
            })?;
        range
            .clone()
            .find(|&index| self.pins[index].name == pin)
            .map(PinId::from_index)
            .ok_or_else(|| SimError::UnknownPin {
                component: self.part_names[part.index()].clone(),
                pin: pin.to_owned(),
            })
    }

    /// Binds pin `pin` of `part` to `net`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNet`], [`SimError::UnknownComponent`],
    /// [`SimError::UnknownPin`], [`SimError::PinAlreadyConnected`] or
    /// [`SimError::NetWidthMismatch`].
    pub fn connect(&mut self, net: NetId, part: PartId, pin: &str) -> Result<PinId, SimError> {
        let info = self
            .nets
            .get(net.index())
            .ok_or(SimError::UnknownNet { net: net.index() })?;
        let id = self.pin(part, pin)?;
        let spec = self.pins[id.index()];
        let qualified = || format!("{}.{}", self.part_names[part.index()], spec.name);

        if let Some(bound) = self.pin_net[id.index()] {
            return Err(SimError::PinAlreadyConnected {
                pin: qualified(),
                net: self.nets[bound.index()].name.clone(),
            });
        }
        if spec.width != info.width {
            return Err(SimError::NetWidthMismatch {
                net: info.name.clone(),
                pin: qualified(),
                net_width: info.width,
                pin_width: spec.width,
            });
        }

        self.pin_net[id.index()] = Some(net);
        Ok(id)
    }

    /// Finishes wiring.
    ///
    /// Pins left unbound get a private net named `part.pin`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateNet`] when an automatic net name is
    /// already taken by a declared net.
    pub fn build(mut self) -> Result<Engine, SimError> {
        for index in 0..self.pins.len() {
            if self.pin_net[index].is_none() {
                let owner = self.pin_owner[index];
                let name = format!("{}.{}", self.part_names[owner.index()], self.pins[index].name);
                let net = self.net(name, self.pins[index].width)?;
                self.pin_net[index] = Some(net);
            }
        }

        let pin_net: Vec<NetId> = self.pin_net.iter().flatten().copied().collect();
        let mut net_pins = vec![Vec::new(); self.nets.len()];
        let mut triggered: HashMap<(TriggerKind, PinId), Vec<PartId>> = HashMap::new();
        for (index, (&net, spec)) in pin_net.iter().zip(&self.pins).enumerate() {
            let pin = PinId::from_index(index);
            net_pins[net.index()].push(pin);
            for &kind in spec.triggers {
                triggered
                    .entry((kind, pin))
                    .or_default()
                    .push(self.pin_owner[index]);
            }
        }

        let state = self
            .nets
            .iter()
            .map(|net| Signal::zero(net.width))
            .collect();
        log::debug!(
            "engine wired: {} parts, {} pins, {} nets",
            self.parts.len(),
            self.pins.len(),
            self.nets.len()
        );

        Ok(Engine::from_parts(super::Wiring {
            config: self.config,
            parts: self.parts,
            part_names: self.part_names,
            part_pins: self.part_pins,
            pins: self.pins,
            pin_net,
            nets: self.nets,
            net_pins,
            triggered,
            state,
        }))
    }
}
