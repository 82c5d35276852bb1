//! # Triggers
//!
//! A [`Trigger`] is a declarative tree describing *when* a window's
//! accumulated contents become a pane. Every (key, window) carries a parallel
//! [`TriggerState`] tree holding finished bits and node-local data; the
//! [`TriggerMachine`] walks both trees together.
//!
//! Per node the machine follows four steps:
//!
//! - `on_element` updates node state bottom up
//! - `should_fire` is a pure readiness query
//! - `on_fire` mutates after a firing (finishes once-triggers, resets repeats)
//! - `on_merge` folds the states of merging windows into one
//!
//! Timers a node needs are requested through the [`TriggerContext`]; the
//! runner schedules them.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::WindowingError;
use crate::time::duration_millis;
use crate::types::{EventTime, TimeDomain};
use crate::window::TimeWindow;

mod definition;
mod machine;
mod state;

pub use definition::*;
pub use machine::*;
pub use state::*;

#[cfg(test)]
#[path = "tests/trigger_tests.rs"]
mod tests;
