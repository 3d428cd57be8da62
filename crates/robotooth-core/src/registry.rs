//! Discovered-peripheral registry.
//!
//! The registry holds at most one entry per [`PeripheralId`], kept sorted
//! by ascending signal strength (weakest first). Writers publish a fresh
//! vector on every mutation, so readers get an immutable [`Snapshot`] that
//! never observes a half-applied update and can be iterated as often as
//! needed.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::trace;

use robotooth_types::{DiscoveredPeripheral, PeripheralId};

/// Copy-on-write store of discovered peripherals.
#[derive(Debug)]
pub struct DeviceRegistry {
    entries: ArcSwap<Vec<DiscoveredPeripheral>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Insert an unconnected entry, or refresh the signal strength of an
    /// existing one, then restore the ordering.
    ///
    /// Returns the entry as stored.
    pub fn upsert(&self, id: &PeripheralId, signal_strength: i16) -> DiscoveredPeripheral {
        self.upsert_with(id, signal_strength, false)
    }

    /// Like [`upsert`](Self::upsert), for a peripheral the host already holds
    /// a link to. A new entry starts connected; an existing entry's flag is
    /// set.
    pub fn upsert_connected(&self, id: &PeripheralId, signal_strength: i16) -> DiscoveredPeripheral {
        self.upsert_with(id, signal_strength, true)
    }

    fn upsert_with(
        &self,
        id: &PeripheralId,
        signal_strength: i16,
        connected: bool,
    ) -> DiscoveredPeripheral {
        let mut stored = DiscoveredPeripheral::new(id.clone(), signal_strength);
        self.entries.rcu(|current| {
            let mut next = Vec::clone(current);
            match next.iter_mut().find(|entry| &entry.id == id) {
                Some(entry) => {
                    entry.signal_strength = signal_strength;
                    entry.connected |= connected;
                    stored = entry.clone();
                }
                None => {
                    let mut entry = DiscoveredPeripheral::new(id.clone(), signal_strength);
                    entry.connected = connected;
                    stored = entry.clone();
                    next.push(entry);
                }
            }
            // Stable: equal strengths keep insertion order.
            next.sort_by_key(|entry| entry.signal_strength);
            next
        });
        trace!(peripheral = %id, rssi = signal_strength, "Registry upsert");
        stored
    }

    /// Set the connected flag of `id`. Unknown identities are ignored.
    pub fn mark_connected(&self, id: &PeripheralId, connected: bool) {
        let current = self.entries.load();
        if !current
            .iter()
            .any(|entry| &entry.id == id && entry.connected != connected)
        {
            return;
        }
        self.entries.rcu(|current| {
            let mut next = Vec::clone(current);
            if let Some(entry) = next.iter_mut().find(|entry| &entry.id == id) {
                entry.connected = connected;
            }
            next
        });
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.store(Arc::new(Vec::new()));
    }

    /// Look up a single entry.
    pub fn get(&self, id: &PeripheralId) -> Option<DiscoveredPeripheral> {
        self.entries.load().iter().find(|entry| &entry.id == id).cloned()
    }

    /// Whether `id` has been discovered in the current session.
    pub fn contains(&self, id: &PeripheralId) -> bool {
        self.entries.load().iter().any(|entry| &entry.id == id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Immutable view of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self.entries.load_full(),
        }
    }
}

/// Point-in-time view of a [`DeviceRegistry`], ordered weakest first.
///
/// Cloning is cheap and later registry mutations are never visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Arc<Vec<DiscoveredPeripheral>>,
}

impl Snapshot {
    /// Iterate the entries. May be called any number of times.
    pub fn iter(&self) -> std::slice::Iter<'_, DiscoveredPeripheral> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries as a slice.
    pub fn as_slice(&self) -> &[DiscoveredPeripheral] {
        &self.entries
    }

    /// Strongest entry, if any.
    pub fn strongest(&self) -> Option<&DiscoveredPeripheral> {
        self.entries.last()
    }

    /// Find an entry by identity, using [`PeripheralId::matches`].
    pub fn find(&self, id: &str) -> Option<&DiscoveredPeripheral> {
        self.entries.iter().find(|entry| entry.id.matches(id))
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a DiscoveredPeripheral;
    type IntoIter = std::slice::Iter<'a, DiscoveredPeripheral>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
