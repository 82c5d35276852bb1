use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{EventTime, StreamData, TimeDomain, Watermark};
use crate::window::TimeWindow;

mod timer_service;
mod watermark;

pub use timer_service::*;
pub use watermark::*;

#[cfg(test)]
#[path = "tests/time_tests.rs"]
mod tests;
