//! # WindCrab Core
//!
//! Windowed grouping, triggering and state-lifecycle engine.
//!
//! For each key, elements are buffered into event-time windows; a composable
//! trigger decides, as the watermark advances, when to emit a pane of the
//! accumulated result; windows that can no longer receive data are
//! garbage-collected.
//!
//! - [`types`]: [`WindowedValue`](types::WindowedValue), [`PaneInfo`](types::PaneInfo),
//!   [`Watermark`](types::Watermark) and the [`StreamData`](types::StreamData) bound.
//! - [`window`]: [`TimeWindow`](window::TimeWindow), the window assigners and session merging.
//! - [`trigger`]: the [`Trigger`](trigger::Trigger) tree and its state machine.
//! - [`combine`]: incremental [`CombineFn`](combine::CombineFn)s.
//! - [`state`]: the [`StateBackend`](state::StateBackend) abstraction and an in-memory backend.
//! - [`time`]: timers, clocks and watermark generation.
//! - [`runner`]: the [`ReduceFnRunner`](runner::ReduceFnRunner) engine, its harness
//!   boundary and the [`LocalHarness`](runner::LocalHarness).

pub mod combine;
pub mod error;
pub mod runner;
pub mod state;
pub mod time;
pub mod trigger;
pub mod types;
pub mod window;
