use serde::{Deserialize, Serialize};

use crate::window::TimeWindow;

/// Event time in milliseconds since epoch.
pub type EventTime = i64;

/// Stable identity of an input element, used to recognise at-least-once
/// redeliveries.
pub type ElementId = u64;

/// Watermark indicates that no elements with timestamp < this value will arrive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    pub timestamp: EventTime,
}

impl Watermark {
    /// Create a new watermark at the given timestamp.
    pub fn new(timestamp: EventTime) -> Self {
        Self { timestamp }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Watermark({}ms)", self.timestamp)
    }
}

/// The clock a timer is measured against.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum TimeDomain {
    /// Driven by the input watermark.
    EventTime,
    /// Driven by the harness's wall clock.
    ProcessingTime,
}

impl std::fmt::Display for TimeDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeDomain::EventTime => f.write_str("event-time"),
            TimeDomain::ProcessingTime => f.write_str("processing-time"),
        }
    }
}

/// When a pane was produced relative to the input watermark.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timing {
    /// Watermark had not yet passed the end of the window.
    Early,
    /// First pane after the watermark passed the end of the window.
    OnTime,
    /// Any pane after the on-time pane.
    Late,
}

/// Metadata describing one pane emitted for a (key, window).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PaneInfo {
    /// Zero-based index of this pane among all panes of the window.
    pub index: u64,
    /// -1 for early panes, 0 for the on-time pane, incremented for each late pane.
    pub non_speculative_index: i64,
    pub is_first: bool,
    pub is_last: bool,
    pub timing: Timing,
}

impl PaneInfo {
    /// Pane info of the very first pane with the given timing.
    pub fn first(timing: Timing, is_last: bool) -> Self {
        Self {
            index: 0,
            non_speculative_index: if timing == Timing::Early { -1 } else { 0 },
            is_first: true,
            is_last,
            timing,
        }
    }

    /// Pane info of the pane following `self`.
    pub fn next(&self, timing: Timing, is_last: bool) -> Self {
        let non_speculative_index = match timing {
            Timing::Early => -1,
            _ => self.non_speculative_index + 1,
        };
        Self {
            index: self.index + 1,
            non_speculative_index,
            is_first: false,
            is_last,
            timing,
        }
    }

    /// The same pane relabelled as speculative, so the next non-early pane
    /// counts as on time.
    pub fn as_speculative(self) -> Self {
        Self {
            non_speculative_index: -1,
            timing: Timing::Early,
            ..self
        }
    }
}

/// An element together with its event time, window set and pane metadata.
///
/// An empty `windows` set asks the engine to assign windows itself; a
/// non-empty one is taken as already assigned upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowedValue<T> {
    pub value: T,
    pub timestamp: EventTime,
    pub windows: Vec<TimeWindow>,
    pub pane: Option<PaneInfo>,
    pub id: Option<ElementId>,
}

impl<T> WindowedValue<T> {
    /// An element with no windows assigned yet.
    pub fn timestamped(value: T, timestamp: EventTime) -> Self {
        Self {
            value,
            timestamp,
            windows: Vec::new(),
            pane: None,
            id: None,
        }
    }

    /// An element already assigned to `windows`.
    pub fn in_windows(value: T, timestamp: EventTime, windows: Vec<TimeWindow>) -> Self {
        Self {
            value,
            timestamp,
            windows,
            pane: None,
            id: None,
        }
    }

    /// Attach an element id so redeliveries are recognised.
    pub fn with_id(mut self, id: ElementId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Trait bound for types that can flow through the engine.
/// Keys, input values and accumulators must satisfy this.
pub trait StreamData: Send + Clone + Serialize + for<'de> Deserialize<'de> + 'static {}

// Blanket implementation: any type satisfying the bounds is StreamData.
impl<T> StreamData for T where T: Send + Clone + Serialize + for<'de> Deserialize<'de> + 'static {}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
