use super::*;

/// Outcome of evaluating a trigger for one (key, window).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    /// Keep accumulating.
    NoFire,
    /// Emit a pane and keep the window open.
    Fire,
    /// Emit the final pane; the trigger is finished for this window.
    FireAndFinish,
}

impl FireDecision {
    /// Return true if a pane should be produced.
    pub fn is_fire(self) -> bool {
        matches!(self, FireDecision::Fire | FireDecision::FireAndFinish)
    }

    /// Return true if the window's trigger is finished after this decision.
    pub fn is_finish(self) -> bool {
        matches!(self, FireDecision::FireAndFinish)
    }
}

/// Per-window state of one trigger node, mirroring the [`Trigger`] tree.
///
/// Only the fields relevant to the node's variant are used:
/// `count` for `AfterCount`, `deadline` for `AfterProcessingTime`,
/// `fired_on_time` for `AfterWatermark` with early/late sub-triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    pub finished: bool,
    pub count: u64,
    pub deadline: Option<EventTime>,
    pub fired_on_time: bool,
    pub children: Vec<TriggerState>,
}

impl TriggerState {
    /// Fresh, unfinished state for `trigger` and all its descendants.
    pub fn for_trigger(trigger: &Trigger) -> Self {
        Self {
            children: trigger
                .children()
                .into_iter()
                .map(TriggerState::for_trigger)
                .collect(),
            ..Self::default()
        }
    }

    /// Return true if this state tree has the same shape as `trigger`.
    pub fn matches(&self, trigger: &Trigger) -> bool {
        let children = trigger.children();
        self.children.len() == children.len()
            && self
                .children
                .iter()
                .zip(children)
                .all(|(state, child)| state.matches(child))
    }

    /// Reset this node and its descendants to a fresh state.
    pub(crate) fn reset(&mut self, trigger: &Trigger) {
        *self = TriggerState::for_trigger(trigger);
    }
}

/// Read-only view of the window and clocks during trigger evaluation,
/// plus the timers the trigger asks for.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub window: TimeWindow,
    pub input_watermark: EventTime,
    pub processing_time: EventTime,
    timers: Vec<(TimeDomain, EventTime)>,
}

impl TriggerContext {
    pub fn new(window: TimeWindow, input_watermark: EventTime, processing_time: EventTime) -> Self {
        Self {
            window,
            input_watermark,
            processing_time,
            timers: Vec::new(),
        }
    }

    /// Return true if the watermark has passed the end of the window.
    pub fn end_of_window_reached(&self) -> bool {
        self.input_watermark > self.window.max_timestamp()
    }

    /// Ask the runner to wake this window's trigger at `timestamp`.
    pub fn set_timer(&mut self, domain: TimeDomain, timestamp: EventTime) {
        if !self.timers.contains(&(domain, timestamp)) {
            self.timers.push((domain, timestamp));
        }
    }

    /// Drain the timers requested so far.
    pub fn take_timers(&mut self) -> Vec<(TimeDomain, EventTime)> {
        std::mem::take(&mut self.timers)
    }
}
