use super::*;

// ── TriggerMachine ────────────────────────────────────────────────────────────

/// Evaluates a [`Trigger`] tree against per-window [`TriggerState`] trees.
///
/// The machine itself is stateless; all mutable data lives in the state tree
/// the caller loads from and writes back to the state backend.
#[derive(Debug, Clone, Default)]
pub struct TriggerMachine {
    trigger: Trigger,
}

impl TriggerMachine {
    pub fn new(trigger: Trigger) -> Self {
        Self { trigger }
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Fresh state for a newly created window.
    pub fn initial_state(&self) -> TriggerState {
        TriggerState::for_trigger(&self.trigger)
    }

    /// Return true once the root has finished. A closed window never fires again.
    pub fn is_closed(&self, state: &TriggerState) -> bool {
        state.finished
    }

    /// Record one element for the window and fire if the trigger became ready.
    pub fn on_element(
        &self,
        state: &mut TriggerState,
        ctx: &mut TriggerContext,
    ) -> Result<FireDecision> {
        self.validate(state, &ctx.window)?;
        if state.finished {
            return Ok(FireDecision::NoFire);
        }
        on_element(&self.trigger, state, ctx);
        Ok(self.fire_if_ready(state, ctx))
    }

    /// Re-evaluate the window after one of its wakeup timers fired.
    pub fn on_timer(
        &self,
        state: &mut TriggerState,
        ctx: &mut TriggerContext,
    ) -> Result<FireDecision> {
        self.validate(state, &ctx.window)?;
        if state.finished {
            return Ok(FireDecision::NoFire);
        }
        Ok(self.fire_if_ready(state, ctx))
    }

    /// Pure readiness query; does not change `state`.
    pub fn should_fire(&self, state: &TriggerState, ctx: &TriggerContext) -> bool {
        should_fire(&self.trigger, state, ctx)
    }

    /// Merge the trigger states of windows merging into `ctx.window`.
    ///
    /// Every input is checked against the trigger shape before anything is
    /// merged; a mismatch fails with [`WindowingError::InconsistentMergeState`].
    pub fn on_merge(
        &self,
        states: &[TriggerState],
        ctx: &mut TriggerContext,
    ) -> Result<TriggerState> {
        if let Some(bad) = states.iter().position(|s| !s.matches(&self.trigger)) {
            return Err(WindowingError::InconsistentMergeState {
                window: ctx.window.clone(),
                reason: format!(
                    "trigger state #{bad} does not match trigger {}",
                    self.trigger
                ),
            }
            .into());
        }
        if states.is_empty() {
            return Ok(self.initial_state());
        }
        let refs: Vec<&TriggerState> = states.iter().collect();
        Ok(on_merge(&self.trigger, &refs, ctx))
    }

    fn fire_if_ready(&self, state: &mut TriggerState, ctx: &mut TriggerContext) -> FireDecision {
        if !should_fire(&self.trigger, state, ctx) {
            return FireDecision::NoFire;
        }
        on_fire(&self.trigger, state, ctx);
        if state.finished {
            FireDecision::FireAndFinish
        } else {
            FireDecision::Fire
        }
    }

    fn validate(&self, state: &TriggerState, window: &TimeWindow) -> Result<()> {
        if !state.matches(&self.trigger) {
            return Err(WindowingError::CorruptState {
                window: window.clone(),
                reason: format!("trigger state does not match trigger {}", self.trigger),
            }
            .into());
        }
        Ok(())
    }
}

// ── Node semantics ────────────────────────────────────────────────────────────

/// Index of the late sub-trigger's state under an `AfterWatermark` node.
fn late_index(early: &Option<Box<Trigger>>) -> usize {
    usize::from(early.is_some())
}

fn pairs<'a>(
    trigger: &'a Trigger,
    state: &'a mut TriggerState,
) -> impl Iterator<Item = (&'a Trigger, &'a mut TriggerState)> {
    trigger.children().into_iter().zip(state.children.iter_mut())
}

fn on_element(trigger: &Trigger, state: &mut TriggerState, ctx: &mut TriggerContext) {
    if state.finished {
        return;
    }
    match trigger {
        Trigger::AfterWatermark { early, late } => {
            if !state.fired_on_time {
                if !ctx.end_of_window_reached() {
                    let end = ctx.window.max_timestamp();
                    ctx.set_timer(TimeDomain::EventTime, end);
                }
                if let (Some(early), Some(child)) = (early, state.children.first_mut()) {
                    on_element(early, child, ctx);
                }
            } else if let Some(late_trigger) = late {
                if let Some(child) = state.children.get_mut(late_index(early)) {
                    on_element(late_trigger, child, ctx);
                }
            }
        }
        Trigger::AfterProcessingTime { delay_ms } => {
            if state.deadline.is_none() {
                let deadline = ctx.processing_time.saturating_add(*delay_ms);
                state.deadline = Some(deadline);
                ctx.set_timer(TimeDomain::ProcessingTime, deadline);
            }
        }
        Trigger::AfterCount(_) => state.count += 1,
        Trigger::Never => {}
        Trigger::Repeatedly(_)
        | Trigger::AfterAll(_)
        | Trigger::AfterFirst(_)
        | Trigger::OrFinally { .. } => {
            for (child, child_state) in pairs(trigger, state) {
                on_element(child, child_state, ctx);
            }
        }
        Trigger::AfterEach(_) => {
            // Only the current stage sees elements.
            if let Some((child, child_state)) = pairs(trigger, state).find(|(_, s)| !s.finished) {
                on_element(child, child_state, ctx);
            }
        }
    }
}

fn should_fire(trigger: &Trigger, state: &TriggerState, ctx: &TriggerContext) -> bool {
    if state.finished {
        return false;
    }
    let child_ready = |child: &Trigger, index: usize| {
        state
            .children
            .get(index)
            .is_some_and(|s| should_fire(child, s, ctx))
    };
    match trigger {
        Trigger::AfterWatermark { early, late } => {
            if !state.fired_on_time {
                ctx.end_of_window_reached()
                    || early.as_deref().is_some_and(|early| child_ready(early, 0))
            } else {
                late.as_deref()
                    .is_some_and(|late| child_ready(late, late_index(early)))
            }
        }
        Trigger::AfterProcessingTime { .. } => state
            .deadline
            .is_some_and(|deadline| ctx.processing_time >= deadline),
        Trigger::AfterCount(n) => state.count >= *n,
        Trigger::Never => false,
        Trigger::Repeatedly(child) => child_ready(child, 0),
        Trigger::AfterAll(children) => children
            .iter()
            .zip(&state.children)
            .all(|(child, s)| s.finished || should_fire(child, s, ctx)),
        Trigger::AfterFirst(children) => children
            .iter()
            .zip(&state.children)
            .any(|(child, s)| should_fire(child, s, ctx)),
        Trigger::AfterEach(children) => children
            .iter()
            .zip(&state.children)
            .find(|(_, s)| !s.finished)
            .is_some_and(|(child, s)| should_fire(child, s, ctx)),
        Trigger::OrFinally { main, until } => child_ready(main, 0) || child_ready(until, 1),
    }
}

/// Apply a firing. Only called on nodes for which `should_fire` is true.
fn on_fire(trigger: &Trigger, state: &mut TriggerState, ctx: &mut TriggerContext) {
    match trigger {
        Trigger::AfterWatermark { early, late } => {
            if !state.fired_on_time {
                if ctx.end_of_window_reached() {
                    state.fired_on_time = true;
                    match late {
                        None => state.finished = true,
                        Some(late_trigger) => {
                            if let Some(child) = state.children.get_mut(late_index(early)) {
                                child.reset(late_trigger);
                            }
                        }
                    }
                } else if let (Some(early), Some(child)) = (early, state.children.first_mut()) {
                    fire_and_rearm(early, child, ctx);
                }
            } else if let Some(late_trigger) = late {
                if let Some(child) = state.children.get_mut(late_index(early)) {
                    fire_and_rearm(late_trigger, child, ctx);
                }
            }
        }
        Trigger::AfterProcessingTime { .. } | Trigger::AfterCount(_) => state.finished = true,
        Trigger::Never => {}
        Trigger::Repeatedly(child) => {
            if let Some(child_state) = state.children.first_mut() {
                fire_and_rearm(child, child_state, ctx);
            }
        }
        Trigger::AfterAll(_) => {
            for (child, child_state) in pairs(trigger, state) {
                if !child_state.finished {
                    on_fire(child, child_state, ctx);
                }
            }
            state.finished = true;
        }
        Trigger::AfterFirst(_) => {
            for (child, child_state) in pairs(trigger, state) {
                if should_fire(child, child_state, ctx) {
                    on_fire(child, child_state, ctx);
                }
            }
            state.finished = true;
        }
        Trigger::AfterEach(_) => {
            if let Some((child, child_state)) = pairs(trigger, state).find(|(_, s)| !s.finished) {
                on_fire(child, child_state, ctx);
            }
            state.finished = state.children.iter().all(|s| s.finished);
        }
        Trigger::OrFinally { main, until } => {
            let [main_state, until_state] = state.children.as_mut_slice() else {
                return;
            };
            if should_fire(until, until_state, ctx) {
                on_fire(until, until_state, ctx);
                state.finished = true;
            } else {
                on_fire(main, main_state, ctx);
                state.finished = main_state.finished;
            }
        }
    }
}

/// Fire a repeated child and re-arm it once it finished.
fn fire_and_rearm(child: &Trigger, state: &mut TriggerState, ctx: &mut TriggerContext) {
    on_fire(child, state, ctx);
    if state.finished {
        state.reset(child);
    }
}

fn on_merge(trigger: &Trigger, states: &[&TriggerState], ctx: &mut TriggerContext) -> TriggerState {
    let children = trigger
        .children()
        .into_iter()
        .enumerate()
        .map(|(i, child)| {
            let child_states: Vec<&TriggerState> =
                states.iter().filter_map(|s| s.children.get(i)).collect();
            on_merge(child, &child_states, ctx)
        })
        .collect();

    let mut merged = TriggerState {
        finished: states.iter().any(|s| s.finished),
        count: states.iter().map(|s| s.count).sum(),
        deadline: states.iter().filter_map(|s| s.deadline).min(),
        fired_on_time: states.iter().all(|s| s.fired_on_time),
        children,
    };

    match trigger {
        Trigger::AfterWatermark { early, late } => {
            if merged.fired_on_time && ctx.end_of_window_reached() {
                // Every merging window is past its on-time pane and so is
                // the merged window: stay in the late phase.
                if late.is_none() {
                    merged.finished = true;
                }
            } else {
                // The merged window has not had its on-time pane yet.
                merged.finished = false;
                merged.fired_on_time = false;
                if let Some(late_trigger) = late {
                    if let Some(child) = merged.children.get_mut(late_index(early)) {
                        child.reset(late_trigger);
                    }
                }
                if !ctx.end_of_window_reached() {
                    let end = ctx.window.max_timestamp();
                    ctx.set_timer(TimeDomain::EventTime, end);
                }
            }
        }
        Trigger::AfterProcessingTime { .. } => {
            if let (false, Some(deadline)) = (merged.finished, merged.deadline) {
                ctx.set_timer(TimeDomain::ProcessingTime, deadline);
            }
        }
        _ => {}
    }
    merged
}
