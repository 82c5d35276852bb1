use super::*;

/// What happens to a window's accumulated value after a pane fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccumulationMode {
    /// Each pane holds only the elements since the previous pane.
    #[default]
    Discarding,
    /// Each pane holds every element the window has seen.
    Accumulating,
}

/// How a pane's output timestamp is derived from its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimestampCombiner {
    /// The window's max timestamp.
    #[default]
    EndOfWindow,
    /// The earliest element timestamp in the pane.
    Earliest,
    /// The latest element timestamp in the pane.
    Latest,
}

impl TimestampCombiner {
    /// The hold an element at `timestamp` places on `window`.
    pub fn assign(&self, timestamp: EventTime, window: &TimeWindow) -> EventTime {
        match self {
            TimestampCombiner::EndOfWindow => window.max_timestamp(),
            TimestampCombiner::Earliest | TimestampCombiner::Latest => timestamp,
        }
    }

    /// Combine two holds of the same window.
    pub fn combine(&self, a: EventTime, b: EventTime) -> EventTime {
        match self {
            TimestampCombiner::Latest => a.max(b),
            TimestampCombiner::EndOfWindow | TimestampCombiner::Earliest => a.min(b),
        }
    }
}

/// Whether the final pane is emitted at garbage collection when nothing new arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClosingBehavior {
    FireAlways,
    #[default]
    FireIfNonEmpty,
}

/// Whether the on-time pane is emitted when nothing new arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnTimeBehavior {
    #[default]
    FireAlways,
    FireIfNonEmpty,
}

/// Complete windowing configuration for one [`ReduceFnRunner`].
///
/// ```
/// use std::time::Duration;
/// use windcrab_core::runner::{AccumulationMode, WindowingStrategy};
/// use windcrab_core::trigger::Trigger;
/// use windcrab_core::window::TumblingWindows;
///
/// let strategy: WindowingStrategy<i64> =
///     WindowingStrategy::new(TumblingWindows::of(Duration::from_secs(10)))
///         .with_trigger(Trigger::repeatedly(Trigger::after_count(100)))
///         .with_allowed_lateness(Duration::from_secs(5))
///         .accumulating();
/// assert_eq!(strategy.accumulation_mode, AccumulationMode::Accumulating);
/// ```
pub struct WindowingStrategy<V> {
    pub assigner: Arc<dyn WindowAssigner<V>>,
    pub trigger: Trigger,
    pub allowed_lateness: Duration,
    pub accumulation_mode: AccumulationMode,
    pub timestamp_combiner: TimestampCombiner,
    pub closing_behavior: ClosingBehavior,
    pub on_time_behavior: OnTimeBehavior,
    /// Drop all state of a window as soon as its trigger finishes, instead of
    /// keeping the finished bits until garbage collection.
    pub allow_discarding_finished_windows: bool,
    pub timestamp_bounds: TimestampBounds,
}

impl<V> WindowingStrategy<V> {
    /// Strategy with the default trigger and no allowed lateness.
    pub fn new(assigner: impl WindowAssigner<V> + 'static) -> Self {
        Self {
            assigner: Arc::new(assigner),
            trigger: Trigger::default(),
            allowed_lateness: Duration::ZERO,
            accumulation_mode: AccumulationMode::default(),
            timestamp_combiner: TimestampCombiner::default(),
            closing_behavior: ClosingBehavior::default(),
            on_time_behavior: OnTimeBehavior::default(),
            allow_discarding_finished_windows: false,
            timestamp_bounds: TimestampBounds::default(),
        }
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_allowed_lateness(mut self, lateness: Duration) -> Self {
        self.allowed_lateness = lateness;
        self
    }

    pub fn accumulating(mut self) -> Self {
        self.accumulation_mode = AccumulationMode::Accumulating;
        self
    }

    pub fn discarding(mut self) -> Self {
        self.accumulation_mode = AccumulationMode::Discarding;
        self
    }

    pub fn with_timestamp_combiner(mut self, combiner: TimestampCombiner) -> Self {
        self.timestamp_combiner = combiner;
        self
    }

    pub fn with_closing_behavior(mut self, behavior: ClosingBehavior) -> Self {
        self.closing_behavior = behavior;
        self
    }

    pub fn with_on_time_behavior(mut self, behavior: OnTimeBehavior) -> Self {
        self.on_time_behavior = behavior;
        self
    }

    pub fn with_discarding_finished_windows(mut self, allow: bool) -> Self {
        self.allow_discarding_finished_windows = allow;
        self
    }

    pub fn with_timestamp_bounds(mut self, bounds: TimestampBounds) -> Self {
        self.timestamp_bounds = bounds;
        self
    }

    pub fn allowed_lateness_ms(&self) -> i64 {
        duration_millis(self.allowed_lateness)
    }

    /// Event time at which `window`'s state is garbage-collected.
    ///
    /// Clamped below `EVENT_TIME_MAX` so the final watermark still passes it.
    pub fn gc_time(&self, window: &TimeWindow) -> EventTime {
        window
            .max_timestamp()
            .saturating_add(self.allowed_lateness_ms())
            .min(EVENT_TIME_MAX - 1)
    }

    /// Return true if `window` can no longer accept data at `input_watermark`.
    pub fn is_expired(&self, window: &TimeWindow, input_watermark: EventTime) -> bool {
        input_watermark > self.gc_time(window)
    }

    /// Whether a pane must be produced for this firing.
    pub(crate) fn should_emit(&self, is_empty: bool, is_final: bool, timing: Timing) -> bool {
        !is_empty
            || (is_final && self.closing_behavior == ClosingBehavior::FireAlways)
            || (timing == Timing::OnTime && self.on_time_behavior == OnTimeBehavior::FireAlways)
    }
}

// Manual impls: the assigner is shared, not cloned, and has no Debug bound.
impl<V> Clone for WindowingStrategy<V> {
    fn clone(&self) -> Self {
        Self {
            assigner: Arc::clone(&self.assigner),
            trigger: self.trigger.clone(),
            allowed_lateness: self.allowed_lateness,
            accumulation_mode: self.accumulation_mode,
            timestamp_combiner: self.timestamp_combiner,
            closing_behavior: self.closing_behavior,
            on_time_behavior: self.on_time_behavior,
            allow_discarding_finished_windows: self.allow_discarding_finished_windows,
            timestamp_bounds: self.timestamp_bounds,
        }
    }
}

impl<V> std::fmt::Debug for WindowingStrategy<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowingStrategy")
            .field("merging", &self.assigner.is_merging())
            .field("trigger", &self.trigger.to_string())
            .field("allowed_lateness", &self.allowed_lateness)
            .field("accumulation_mode", &self.accumulation_mode)
            .field("timestamp_combiner", &self.timestamp_combiner)
            .field("closing_behavior", &self.closing_behavior)
            .field("on_time_behavior", &self.on_time_behavior)
            .field(
                "allow_discarding_finished_windows",
                &self.allow_discarding_finished_windows,
            )
            .finish()
    }
}
