use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WindowingError;
use crate::time::{
    EVENT_TIME_MAX, EVENT_TIME_MIN, TIMESTAMP_MAX_VALUE, TIMESTAMP_MIN_VALUE, duration_millis,
};
use crate::types::EventTime;

mod assigners;
mod merging;
mod primitives;

pub use assigners::*;
pub use merging::*;
pub use primitives::*;

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;
