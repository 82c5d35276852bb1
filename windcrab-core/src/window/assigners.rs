use super::*;

fn duration_ms(d: Duration) -> i64 {
    // Zero-sized windows would make every modulus below divide by zero.
    duration_millis(d).max(1)
}

// ── Tumbling ──────────────────────────────────────────────────────────────────

/// Fixed-size, non-overlapping event-time windows aligned to multiples of `size`.
#[derive(Debug, Clone)]
pub struct TumblingWindows {
    size_ms: i64,
    offset_ms: i64,
}

impl TumblingWindows {
    /// Create tumbling windows of the given `size`.
    pub fn of(size: Duration) -> Self {
        Self {
            size_ms: duration_ms(size),
            offset_ms: 0,
        }
    }

    /// Shift window alignment by `offset`.
    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset_ms = duration_millis(offset) % self.size_ms;
        self
    }
}

impl<T: Send + Sync> WindowAssigner<T> for TumblingWindows {
    fn assign_windows(&self, _element: &T, timestamp: EventTime) -> Vec<TimeWindow> {
        let start = timestamp - (timestamp - self.offset_ms).rem_euclid(self.size_ms);
        vec![TimeWindow::new(start, start + self.size_ms)]
    }
}

// ── Sliding ───────────────────────────────────────────────────────────────────

/// Fixed-size, possibly overlapping event-time windows.
/// An element belongs to `ceil(size / period)` windows.
#[derive(Debug, Clone)]
pub struct SlidingWindows {
    size_ms: i64,
    period_ms: i64,
    offset_ms: i64,
}

impl SlidingWindows {
    /// Create sliding windows of the given `size` starting every `period`.
    pub fn of(size: Duration, period: Duration) -> Self {
        Self {
            size_ms: duration_ms(size),
            period_ms: duration_ms(period),
            offset_ms: 0,
        }
    }

    /// Shift window alignment by `offset`.
    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset_ms = duration_millis(offset) % self.period_ms;
        self
    }
}

impl<T: Send + Sync> WindowAssigner<T> for SlidingWindows {
    fn assign_windows(&self, _element: &T, timestamp: EventTime) -> Vec<TimeWindow> {
        // Walk back from the last window start until no window covers ts.
        let last_start = timestamp - (timestamp - self.offset_ms).rem_euclid(self.period_ms);
        let mut windows = Vec::new();
        let mut start = last_start;
        while start > timestamp - self.size_ms {
            windows.push(TimeWindow::new(start, start + self.size_ms));
            start -= self.period_ms;
        }
        windows
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Gap-based windows: each element gets a proto-window `[timestamp, timestamp + gap)`,
/// and proto-windows that overlap or touch are merged into one session.
#[derive(Debug, Clone)]
pub struct SessionWindows {
    gap_ms: i64,
}

impl SessionWindows {
    /// Create session windows with the given minimum `gap` between sessions.
    pub fn with_gap(gap: Duration) -> Self {
        Self {
            gap_ms: duration_ms(gap),
        }
    }
}

impl<T: Send + Sync> WindowAssigner<T> for SessionWindows {
    fn assign_windows(&self, _element: &T, timestamp: EventTime) -> Vec<TimeWindow> {
        vec![TimeWindow::new(timestamp, timestamp + self.gap_ms)]
    }

    fn is_merging(&self) -> bool {
        true
    }

    fn merge_windows(
        &self,
        existing: &BTreeSet<TimeWindow>,
        new_window: &TimeWindow,
    ) -> MergeResult {
        merge_overlapping(existing, new_window)
    }
}

// ── Global ────────────────────────────────────────────────────────────────────

/// A single window that spans all time. Useful with custom triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalWindows;

impl GlobalWindows {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Send + Sync> WindowAssigner<T> for GlobalWindows {
    fn assign_windows(&self, _element: &T, _timestamp: EventTime) -> Vec<TimeWindow> {
        vec![TimeWindow::global()]
    }
}

// ── Custom ────────────────────────────────────────────────────────────────────

/// Windows computed by a user closure. The closure must be deterministic.
pub struct CustomWindows<T> {
    assign: Arc<dyn Fn(&T, EventTime) -> Vec<TimeWindow> + Send + Sync>,
}

impl<T> CustomWindows<T> {
    pub fn new(assign: impl Fn(&T, EventTime) -> Vec<TimeWindow> + Send + Sync + 'static) -> Self {
        Self {
            assign: Arc::new(assign),
        }
    }
}

impl<T> Clone for CustomWindows<T> {
    fn clone(&self) -> Self {
        Self {
            assign: Arc::clone(&self.assign),
        }
    }
}

impl<T> WindowAssigner<T> for CustomWindows<T> {
    fn assign_windows(&self, element: &T, timestamp: EventTime) -> Vec<TimeWindow> {
        (self.assign)(element, timestamp)
    }
}
