use super::*;

/// Minimum possible event time. Used as the initial "no watermark" sentinel.
pub const EVENT_TIME_MIN: EventTime = i64::MIN;

/// Maximum possible event time. A watermark at this value means the input is
/// exhausted and every window can be closed.
pub const EVENT_TIME_MAX: EventTime = i64::MAX;

/// Smallest element timestamp the engine accepts by default.
///
/// A quarter of the i64 range keeps `timestamp ± window size` and
/// `max_timestamp + allowed_lateness` clear of overflow.
pub const TIMESTAMP_MIN_VALUE: EventTime = i64::MIN / 4;

/// Largest element timestamp the engine accepts by default.
pub const TIMESTAMP_MAX_VALUE: EventTime = i64::MAX / 4;

/// Whole milliseconds of `d`, saturating at `i64::MAX`.
pub fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Observes element timestamps and decides when to advance the watermark.
///
/// Used by harnesses that have to derive watermarks from the data itself
/// (the CLI replay, the demos).
pub trait WatermarkGenerator: Send {
    /// Notify the generator that an element with `timestamp` was observed.
    ///
    /// Returns the new watermark if it advanced.
    fn on_event(&mut self, timestamp: EventTime) -> Option<Watermark>;

    /// Return the current watermark, or `None` if none has been produced yet.
    fn current_watermark(&self) -> Option<Watermark>;
}

/// Watermarks for input that arrives out of order by at most `max_delay`.
///
/// The watermark trails the largest timestamp seen by `max_delay`, so a
/// window closes only once `max_delay` of event time has passed its end.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use windcrab_core::time::{BoundedOutOfOrderness, WatermarkGenerator};
///
/// let mut wm = BoundedOutOfOrderness::new(Duration::from_secs(5));
/// assert_eq!(wm.on_event(10_000).map(|w| w.timestamp), Some(5_000));
/// ```
#[derive(Debug, Clone)]
pub struct BoundedOutOfOrderness {
    max_delay_ms: i64,
    max_seen_timestamp: EventTime,
}

impl BoundedOutOfOrderness {
    /// Create a generator tolerating `max_delay` of out-of-order arrival.
    pub fn new(max_delay: Duration) -> Self {
        Self {
            max_delay_ms: duration_millis(max_delay),
            max_seen_timestamp: EVENT_TIME_MIN,
        }
    }
}

impl WatermarkGenerator for BoundedOutOfOrderness {
    fn on_event(&mut self, timestamp: EventTime) -> Option<Watermark> {
        if timestamp <= self.max_seen_timestamp {
            return None;
        }
        self.max_seen_timestamp = timestamp;
        self.current_watermark()
    }

    fn current_watermark(&self) -> Option<Watermark> {
        if self.max_seen_timestamp == EVENT_TIME_MIN {
            // Nothing seen yet.
            return None;
        }
        Some(Watermark::new(
            self.max_seen_timestamp.saturating_sub(self.max_delay_ms),
        ))
    }
}
