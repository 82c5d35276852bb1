use super::*;

/// A half-open event-time window `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: EventTime,
    pub end: EventTime,
}

impl TimeWindow {
    pub fn new(start: EventTime, end: EventTime) -> Self {
        Self { start, end }
    }

    /// The window covering all of event time.
    pub fn global() -> Self {
        Self::new(EVENT_TIME_MIN, EVENT_TIME_MAX)
    }

    /// The maximum timestamp that belongs to this window.
    /// The window is complete once the watermark passes it.
    pub fn max_timestamp(&self) -> EventTime {
        self.end - 1
    }

    /// Return true if `timestamp` falls inside this window.
    pub fn contains(&self, timestamp: EventTime) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Return true if the two intervals share a timestamp or touch end-to-start.
    pub fn overlaps_or_abuts(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The smallest window covering both `self` and `other`.
    pub fn span(&self, other: &TimeWindow) -> TimeWindow {
        TimeWindow::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == TimeWindow::global() {
            return f.write_str("GlobalWindow");
        }
        write!(f, "TimeWindow([{}, {}))", self.start, self.end)
    }
}

/// Inclusive range of element timestamps the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampBounds {
    pub min: EventTime,
    pub max: EventTime,
}

impl TimestampBounds {
    pub fn new(min: EventTime, max: EventTime) -> Self {
        Self { min, max }
    }

    /// Reject `timestamp` with [`WindowingError::InvalidTimestamp`] if it lies
    /// outside the bounds.
    pub fn validate(&self, timestamp: EventTime) -> Result<EventTime, WindowingError> {
        if timestamp < self.min || timestamp > self.max {
            return Err(WindowingError::InvalidTimestamp {
                timestamp,
                min: self.min,
                max: self.max,
            });
        }
        Ok(timestamp)
    }
}

impl Default for TimestampBounds {
    fn default() -> Self {
        Self::new(TIMESTAMP_MIN_VALUE, TIMESTAMP_MAX_VALUE)
    }
}

/// Assigns one or more [`TimeWindow`]s to each element based on its
/// event-time timestamp.
///
/// The standard assigners:
/// - [`TumblingWindows`]: fixed-size, non-overlapping
/// - [`SlidingWindows`]: fixed-size, possibly overlapping
/// - [`SessionWindows`]: gap-based, merging
/// - [`GlobalWindows`]: single window for all elements
/// - [`CustomWindows`]: user closure
pub trait WindowAssigner<T>: Send + Sync {
    /// Return the windows that contain the element with the given timestamp.
    ///
    /// Must be pure and deterministic.
    fn assign_windows(&self, element: &T, timestamp: EventTime) -> Vec<TimeWindow>;

    /// Whether windows of this assigner must be merged (Session only).
    fn is_merging(&self) -> bool {
        false
    }

    /// Merge `new_window` into the key's `existing` active windows.
    ///
    /// Non-merging assigners keep every window as it is.
    fn merge_windows(
        &self,
        _existing: &BTreeSet<TimeWindow>,
        new_window: &TimeWindow,
    ) -> MergeResult {
        MergeResult::identity(new_window.clone())
    }
}
