//! # Runner
//!
//! Per-key windowing engine and its harness boundary.
//!
//! - [`WindowingStrategy`]: assigner, trigger, lateness and pane policies.
//! - [`ReduceFnRunner`]: assigns, merges, accumulates, fires and garbage-collects
//!   windows for the keys it is handed.
//! - [`DoFnRunner`] / [`ReduceFnExecutor`]: the four lifecycle calls a harness
//!   drives, plus the dropped-element [`Counter`].
//! - [`LocalHarness`]: in-memory state and timers for tests, the CLI and demos.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::combine::CombineFn;
use crate::state::{HashMapStateBackend, StateBackend, StateNamespace, ValueStateHandle};
use crate::time::{
    EVENT_TIME_MAX, InMemoryTimerService, TimerData, TimerId, TimerService, duration_millis,
};
use crate::trigger::{FireDecision, Trigger, TriggerContext, TriggerMachine, TriggerState};
use crate::types::{ElementId, EventTime, PaneInfo, StreamData, TimeDomain, Timing, WindowedValue};
use crate::window::{TimeWindow, TimestampBounds, WindowAssigner};

mod executor;
mod local;
mod pane;
mod reduce_fn;
mod strategy;
mod window_state;

pub use executor::*;
pub use local::*;
pub use pane::*;
pub use reduce_fn::*;
pub use strategy::*;
pub use window_state::*;

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;
