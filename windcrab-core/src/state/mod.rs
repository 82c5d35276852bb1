//! # State Management
//!
//! Per-(key, window) state cells for the windowing engine.
//!
//! Every cell is addressed by the full `(key, namespace, field)` coordinate of a
//! [`StateAddress`]; nothing holds live references into the store, so windows
//! can be merged away or garbage-collected without leaving dangling state.
//!
//! ## Descriptor pattern
//!
//! [`ValueStateHandle`] is a lightweight typed descriptor (field name + value
//! type). It does not borrow the backend, so the engine can keep handles in
//! its own struct and pass the backend in per call.
//!
//! ## Backends
//!
//! - [`HashMapStateBackend`]: in-memory cells with bundle-scoped write buffering.
//! - Anything else implementing [`StateBackend`] (the hosting runtime's store).

use std::marker::PhantomData;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::StreamData;
use crate::window::TimeWindow;

pub mod hashmap;

pub use hashmap::HashMapStateBackend;

/// The scope a state cell belongs to within a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateNamespace {
    /// Key-level state shared by all windows of the key (e.g. the active window set).
    Global,
    /// State of a single window.
    Window(TimeWindow),
}

/// Full coordinate of one state cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateAddress {
    pub key: Vec<u8>,
    pub namespace: StateNamespace,
    pub field: &'static str,
}

impl StateAddress {
    pub fn new(key: &[u8], namespace: StateNamespace, field: &'static str) -> Self {
        Self {
            key: key.to_vec(),
            namespace,
            field,
        }
    }
}

/// Abstract cell store consumed from the hosting runtime.
///
/// Values are opaque bytes; typing lives in [`ValueStateHandle`]. Calls are
/// synchronous and treated as atomic by the engine.
pub trait StateBackend: Send {
    /// Read a cell. `None` if it was never written or has been cleared.
    fn get(&self, address: &StateAddress) -> Result<Option<Vec<u8>>>;

    /// Write a cell, replacing any previous value.
    fn put(&mut self, address: StateAddress, value: Vec<u8>) -> Result<()>;

    /// Remove a cell. Clearing an absent cell is a no-op.
    fn clear(&mut self, address: &StateAddress) -> Result<()>;

    /// Make all buffered writes durable. Called at the end of each bundle.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Typed descriptor for a single-value cell.
#[derive(Debug)]
pub struct ValueStateHandle<V> {
    field: &'static str,
    _phantom: PhantomData<fn() -> V>,
}

// Manual impls: a handle is copyable regardless of `V`.
impl<V> Clone for ValueStateHandle<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for ValueStateHandle<V> {}

impl<V: StreamData> ValueStateHandle<V> {
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            _phantom: PhantomData,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn address(&self, key: &[u8], namespace: &StateNamespace) -> StateAddress {
        StateAddress::new(key, namespace.clone(), self.field)
    }

    pub fn get<B: StateBackend + ?Sized>(
        &self,
        backend: &B,
        key: &[u8],
        namespace: &StateNamespace,
    ) -> Result<Option<V>> {
        match backend.get(&self.address(key, namespace))? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes)
                    .with_context(|| format!("decode state cell '{}'", self.field))?,
            )),
            None => Ok(None),
        }
    }

    pub fn put<B: StateBackend + ?Sized>(
        &self,
        backend: &mut B,
        key: &[u8],
        namespace: &StateNamespace,
        value: &V,
    ) -> Result<()> {
        let bytes = bincode::serialize(value)
            .with_context(|| format!("encode state cell '{}'", self.field))?;
        backend.put(self.address(key, namespace), bytes)
    }

    /// Write `Some(value)` or clear the cell for `None`.
    pub fn set<B: StateBackend + ?Sized>(
        &self,
        backend: &mut B,
        key: &[u8],
        namespace: &StateNamespace,
        value: Option<&V>,
    ) -> Result<()> {
        match value {
            Some(value) => self.put(backend, key, namespace, value),
            None => self.clear(backend, key, namespace),
        }
    }

    pub fn clear<B: StateBackend + ?Sized>(
        &self,
        backend: &mut B,
        key: &[u8],
        namespace: &StateNamespace,
    ) -> Result<()> {
        backend.clear(&self.address(key, namespace))
    }
}
