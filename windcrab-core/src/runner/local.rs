use super::*;

/// A [`ReduceFnRunner`] over in-memory state and timers.
pub type LocalRunner<K, V, ACC, OUT, CF> =
    ReduceFnRunner<K, V, ACC, OUT, CF, HashMapStateBackend, InMemoryTimerService<K>>;

/// Single-partition harness that owns its state and timers.
///
/// Each call runs as one bundle: start, deliver, flush, and return the panes
/// it produced. Advancing a clock delivers every timer that became due, in
/// timestamp order, with trigger wakeups ahead of garbage collection at equal
/// timestamps.
///
/// ```
/// use std::time::Duration;
/// use windcrab_core::combine::SumI64;
/// use windcrab_core::runner::{LocalHarness, WindowingStrategy};
/// use windcrab_core::types::WindowedValue;
/// use windcrab_core::window::TumblingWindows;
///
/// let strategy = WindowingStrategy::new(TumblingWindows::of(Duration::from_millis(10)));
/// let mut harness = LocalHarness::new(strategy, SumI64);
/// harness.process(WindowedValue::timestamped(("a".to_string(), 2_i64), 3)).unwrap();
/// harness.process(WindowedValue::timestamped(("a".to_string(), 5_i64), 7)).unwrap();
///
/// let panes = harness.advance_watermark(10).unwrap();
/// assert_eq!(panes.len(), 1);
/// assert_eq!(panes[0].value, 7);
/// ```
pub struct LocalHarness<K, V, ACC, OUT, CF>
where
    K: StreamData,
    V: StreamData,
    ACC: StreamData,
    CF: CombineFn<V, ACC, OUT>,
{
    runner: LocalRunner<K, V, ACC, OUT, CF>,
}

impl<K, V, ACC, OUT, CF> LocalHarness<K, V, ACC, OUT, CF>
where
    K: StreamData,
    V: StreamData,
    ACC: StreamData,
    CF: CombineFn<V, ACC, OUT>,
{
    pub fn new(strategy: WindowingStrategy<V>, combine_fn: CF) -> Self {
        Self {
            runner: ReduceFnRunner::new(
                strategy,
                combine_fn,
                HashMapStateBackend::new(),
                InMemoryTimerService::new(),
            ),
        }
    }

    /// Deliver one element.
    pub fn process(&mut self, element: WindowedValue<(K, V)>) -> Result<Vec<WindowedPane<K, OUT>>> {
        let runner = self.runner.as_runner();
        runner.start_bundle()?;
        runner.process_element(element)?;
        self.finish_bundle()
    }

    /// Advance the input watermark and deliver every event-time timer before it.
    pub fn advance_watermark(&mut self, watermark: EventTime) -> Result<Vec<WindowedPane<K, OUT>>> {
        if !self.runner.timer_service_mut().advance_input_watermark(watermark) {
            tracing::trace!("watermark {} does not advance", watermark);
        }
        self.runner.as_runner().start_bundle()?;
        while let Some(timer) = self.runner.timer_service_mut().remove_next_event_timer()? {
            self.runner.as_runner().on_timer(timer)?;
        }
        self.finish_bundle()
    }

    /// Advance processing time and deliver every processing-time timer up to it.
    pub fn advance_processing_time(&mut self, now: EventTime) -> Result<Vec<WindowedPane<K, OUT>>> {
        self.runner.timer_service_mut().advance_processing_time(now);
        self.runner.as_runner().start_bundle()?;
        while let Some(timer) = self
            .runner
            .timer_service_mut()
            .remove_next_processing_timer()?
        {
            self.runner.as_runner().on_timer(timer)?;
        }
        self.finish_bundle()
    }

    /// Move the watermark to the end of time, closing and collecting every window.
    pub fn finish(&mut self) -> Result<Vec<WindowedPane<K, OUT>>> {
        self.advance_watermark(EVENT_TIME_MAX)
    }

    pub fn input_watermark(&self) -> EventTime {
        self.runner.timer_service().current_input_watermark()
    }

    /// The input watermark held back by the earliest window hold.
    pub fn output_watermark(&self) -> Result<EventTime> {
        let holds: Vec<EventTime> = self.runner.backend().values_of_field(HOLD_FIELD)?;
        Ok(holds.into_iter().fold(self.input_watermark(), EventTime::min))
    }

    pub fn dropped_due_to_lateness(&self) -> u64 {
        self.runner.dropped_due_to_lateness().get()
    }

    pub fn dropped_due_to_closed_window(&self) -> u64 {
        self.runner.dropped_due_to_closed_window().get()
    }

    pub fn runner(&self) -> &LocalRunner<K, V, ACC, OUT, CF> {
        &self.runner
    }

    fn finish_bundle(&mut self) -> Result<Vec<WindowedPane<K, OUT>>> {
        let runner = self.runner.as_runner();
        runner.finish_bundle()?;
        Ok(runner.take_output())
    }
}
