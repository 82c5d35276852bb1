//! HashMap-based state backend for local execution.
//!
//! Writes made during a bundle are buffered and only become committed on
//! [`flush`](StateBackend::flush); reads always see the buffered view.

use ahash::AHashMap;
use anyhow::{Context, Result};

use super::{StateAddress, StateBackend, StateNamespace};
use crate::types::StreamData;

/// In-memory state backend.
///
/// - `committed` holds flushed cells, `pending` the writes of the current bundle
///   (`None` marks a clear).
/// - Keyed by the full [`StateAddress`], hashed with ahash.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HashMapStateBackend {
    committed: AHashMap<StateAddress, Vec<u8>>,
    pending: AHashMap<StateAddress, Option<Vec<u8>>>,
}

impl HashMapStateBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate all live cells, buffered writes included.
    fn cells(&self) -> impl Iterator<Item = (&StateAddress, &Vec<u8>)> {
        let committed = self
            .committed
            .iter()
            .filter(move |(address, _)| !self.pending.contains_key(*address));
        let pending = self
            .pending
            .iter()
            .filter_map(|(address, value)| value.as_ref().map(|v| (address, v)));
        committed.chain(pending)
    }

    /// Number of live cells.
    pub fn len(&self) -> usize {
        self.cells().count()
    }

    /// Return `true` if no cell is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of buffered writes not yet flushed.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Number of live cells under `key` in `namespace`.
    pub fn cells_in(&self, key: &[u8], namespace: &StateNamespace) -> usize {
        self.cells()
            .filter(|(address, _)| address.key == key && &address.namespace == namespace)
            .count()
    }

    /// Decode every live value stored under `field`, across all keys and namespaces.
    pub fn values_of_field<V: StreamData>(&self, field: &str) -> Result<Vec<V>> {
        self.cells()
            .filter(|(address, _)| address.field == field)
            .map(|(_, bytes)| {
                bincode::deserialize(bytes).with_context(|| format!("decode state cell '{field}'"))
            })
            .collect()
    }
}

impl StateBackend for HashMapStateBackend {
    fn get(&self, address: &StateAddress) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.pending.get(address) {
            return Ok(value.clone());
        }
        Ok(self.committed.get(address).cloned())
    }

    fn put(&mut self, address: StateAddress, value: Vec<u8>) -> Result<()> {
        self.pending.insert(address, Some(value));
        Ok(())
    }

    fn clear(&mut self, address: &StateAddress) -> Result<()> {
        self.pending.insert(address.clone(), None);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for (address, value) in self.pending.drain() {
            match value {
                Some(bytes) => {
                    self.committed.insert(address, bytes);
                }
                None => {
                    self.committed.remove(&address);
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "tests/hashmap_tests.rs"]
mod tests;
