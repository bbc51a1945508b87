use std::collections::BTreeMap;

use crate::{Signal, SimError};

/// Index of a net inside an [`crate::Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NetId(u32);

impl NetId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the net table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pending net values, ordered by net.
///
/// [`ChangeSet::merge`] combines two drivers of one net with bit-OR, so a
/// conflict between simultaneous writers stays visible in the merged value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: BTreeMap<NetId, Signal>,
}

impl ChangeSet {
    /// Creates an empty change-set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Sets `net` to `signal`, replacing any pending value.
    pub fn insert(&mut self, net: NetId, signal: Signal) {
        self.entries.insert(net, signal);
    }

    /// ORs `signal` into the pending value for `net`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SignalWidthMismatch`] when a pending value of a
    /// different width exists.
    pub fn merge(&mut self, net: NetId, signal: Signal) -> Result<(), SimError> {
        let merged = match self.entries.get(&net) {
            Some(pending) => pending.or(signal)?,
            None => signal,
        };
        self.entries.insert(net, merged);
        Ok(())
    }

    /// Merges every entry of `other` into `self`.
    ///
    /// # Errors
    ///
    /// See [`ChangeSet::merge`].
    pub fn absorb(&mut self, other: Self) -> Result<(), SimError> {
        for (net, signal) in other.entries {
            self.merge(net, signal)?;
        }
        Ok(())
    }

    /// Pending value for `net`.
    #[must_use]
    pub fn get(&self, net: NetId) -> Option<Signal> {
        self.entries.get(&net).copied()
    }

    /// Number of pending nets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in net order.
    pub fn iter(&self) -> impl Iterator<Item = (NetId, Signal)> + '_ {
        self.entries.iter().map(|(&net, &signal)| (net, signal))
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&NetId, &mut Signal) -> bool) {
        self.entries.retain(keep);
    }
}

impl FromIterator<(NetId, Signal)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (NetId, Signal)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeSet, NetId};
    use crate::{Signal, SimError};

    #[test]
    fn merge_ors_overlapping_nets() {
        let net = NetId::from_index(0);
        let mut changes = ChangeSet::new();
        changes.merge(net, Signal::new(4, 0b0101)).expect("same width");
        changes.merge(net, Signal::new(4, 0b0011)).expect("same width");
        assert_eq!(changes.get(net), Some(Signal::new(4, 0b0111)));
    }

    #[test]
    fn insert_replaces_but_merge_checks_width() {
        let net = NetId::from_index(2);
        let mut changes = ChangeSet::new();
        changes.insert(net, Signal::new(8, 0xF0));
        changes.insert(net, Signal::new(8, 0x0F));
        assert_eq!(changes.get(net), Some(Signal::new(8, 0x0F)));
        assert_eq!(
            changes.merge(net, Signal::new(4, 1)),
            Err(SimError::SignalWidthMismatch { left: 8, right: 4 })
        );
    }

    #[test]
    fn absorb_keeps_disjoint_entries_in_net_order() {
        let (a, b) = (NetId::from_index(1), NetId::from_index(0));
        let mut left: ChangeSet = [(a, Signal::new(1, 1))].into_iter().collect();
        let right: ChangeSet = [(b, Signal::new(2, 2)), (a, Signal::new(1, 0))]
            .into_iter()
            .collect();
        left.absorb(right).expect("same widths");
        let nets: Vec<NetId> = left.iter().map(|(net, _)| net).collect();
        assert_eq!(nets, vec![b, a]);
        assert_eq!(left.get(a), Some(Signal::new(1, 1)));
    }
}
