//! Typed failure conditions raised by the engine.
//!
//! Public operations return [`anyhow::Result`]; these values travel inside the
//! `anyhow::Error` and can be recovered with `err.downcast_ref::<WindowingError>()`.
//! Late drops are not errors: they only bump the dropped-element counters.

use crate::types::EventTime;
use crate::window::TimeWindow;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowingError {
    /// Element timestamp outside the configured valid range.
    #[error("timestamp {timestamp} outside valid range [{min}, {max}]")]
    InvalidTimestamp {
        timestamp: EventTime,
        min: EventTime,
        max: EventTime,
    },

    /// Merging windows found persisted state that violates an invariant.
    #[error("inconsistent state while merging into {window}: {reason}")]
    InconsistentMergeState { window: TimeWindow, reason: String },

    /// Trigger tree that cannot be evaluated, e.g. one deserialized from a script.
    #[error("invalid trigger {trigger}: {reason}")]
    InvalidTrigger { trigger: String, reason: String },

    /// Persisted trigger state does not match the configured trigger.
    #[error("corrupt state for {window}: {reason}")]
    CorruptState { window: TimeWindow, reason: String },
}
