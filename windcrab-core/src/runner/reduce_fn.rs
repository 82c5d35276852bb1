use super::*;

// ── ReduceFnRunner ────────────────────────────────────────────────────────────

/// Windowing engine for one key partition.
///
/// Accepts [`WindowedValue<(K, V)>`] elements and due timers, and emits
/// [`WindowedPane<K, OUT>`] values when triggers fire.
///
/// # Processing model
///
/// - **Elements**: timestamp validation, window assignment, late-drop check,
///   merge into the key's active windows, accumulation with the
///   [`CombineFn`], then a trigger `on_element` that may fire a pane.
/// - **Trigger wakeups**: re-evaluate the window's trigger.
/// - **Garbage collection**: emit the final pane if required, then clear every
///   cell of the window. Nothing of the window survives.
///
/// All state lives in the backend `B`; each operation loads the cells of a
/// window, computes their new values and writes them back in one step.
pub struct ReduceFnRunner<K, V, ACC, OUT, CF, B, TS>
where
    K: StreamData,
    V: StreamData,
    ACC: StreamData,
    CF: CombineFn<V, ACC, OUT>,
    B: StateBackend,
    TS: TimerService<K>,
{
    strategy: WindowingStrategy<V>,
    machine: TriggerMachine,
    combine_fn: CF,
    store: WindowStateStore<ACC>,
    backend: B,
    timers: TS,
    output: Vec<WindowedPane<K, OUT>>,
    dropped_due_to_lateness: Counter,
    dropped_due_to_closed_window: Counter,
}

impl<K, V, ACC, OUT, CF, B, TS> ReduceFnRunner<K, V, ACC, OUT, CF, B, TS>
where
    K: StreamData,
    V: StreamData,
    ACC: StreamData,
    CF: CombineFn<V, ACC, OUT>,
    B: StateBackend,
    TS: TimerService<K>,
{
    /// Create a runner over the given state backend and timer service.
    pub fn new(strategy: WindowingStrategy<V>, combine_fn: CF, backend: B, timers: TS) -> Self {
        let machine = TriggerMachine::new(strategy.trigger.clone());
        Self {
            strategy,
            machine,
            combine_fn,
            store: WindowStateStore::new(),
            backend,
            timers,
            output: Vec::new(),
            dropped_due_to_lateness: Counter::new("dropped_due_to_lateness"),
            dropped_due_to_closed_window: Counter::new("dropped_due_to_closed_window"),
        }
    }

    pub fn strategy(&self) -> &WindowingStrategy<V> {
        &self.strategy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn timer_service(&self) -> &TS {
        &self.timers
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn timer_service_mut(&mut self) -> &mut TS {
        &mut self.timers
    }

    /// Elements dropped because their window's trigger had already finished.
    pub fn dropped_due_to_closed_window(&self) -> Counter {
        self.dropped_due_to_closed_window.clone()
    }

    /// Windows of `key` that currently hold state.
    pub fn active_windows(&self, key: &K) -> Result<BTreeSet<TimeWindow>> {
        self.store.active_windows(&self.backend, &key_bytes(key)?)
    }

    /// Snapshot of every cell of (key, window).
    pub fn window_cells(&self, key: &K, window: &TimeWindow) -> Result<WindowCells<ACC>> {
        self.store.load(&self.backend, &key_bytes(key)?, window)
    }

    // ── Elements ──────────────────────────────────────────────────────────────

    fn process(&mut self, element: WindowedValue<(K, V)>) -> Result<()> {
        let timestamp = self.strategy.timestamp_bounds.validate(element.timestamp)?;
        let WindowedValue {
            value: (key, value),
            windows,
            id,
            ..
        } = element;
        let key_bytes = key_bytes(&key)?;
        let windows = if windows.is_empty() {
            self.strategy.assigner.assign_windows(&value, timestamp)
        } else {
            windows
        };
        for window in windows {
            self.process_in_window(&key, &key_bytes, window, &value, timestamp, id)?;
        }
        Ok(())
    }

    fn process_in_window(
        &mut self,
        key: &K,
        key_bytes: &[u8],
        window: TimeWindow,
        value: &V,
        timestamp: EventTime,
        id: Option<ElementId>,
    ) -> Result<()> {
        let input_watermark = self.timers.current_input_watermark();
        if self.strategy.is_expired(&window, input_watermark) {
            self.dropped_due_to_lateness.inc();
            tracing::debug!(
                "drop element at {} for expired {} (watermark {})",
                timestamp,
                window,
                input_watermark
            );
            return Ok(());
        }

        let mut active = self.store.active_windows(&self.backend, key_bytes)?;
        let window = if self.strategy.assigner.is_merging() {
            self.merge_window(key, key_bytes, &mut active, window, input_watermark)?
        } else {
            window
        };

        let mut cells = self
            .store
            .load(&self.backend, key_bytes, &window)
            .with_context(|| format!("load state of {window}"))?;
        if !active.contains(&window) {
            self.init_window(key, &window, &mut cells, input_watermark)?;
            active.insert(window.clone());
            self.store
                .set_active_windows(&mut self.backend, key_bytes, &active)?;
        }

        if id.is_some_and(|id| cells.applied_ids.contains(&id)) {
            tracing::trace!("skip redelivered element at {} in {}", timestamp, window);
            return Ok(());
        }
        let mut trigger_state = cells
            .trigger
            .take()
            .unwrap_or_else(|| self.machine.initial_state());
        if self.machine.is_closed(&trigger_state) {
            self.dropped_due_to_closed_window.inc();
            tracing::debug!("drop element at {} for closed {}", timestamp, window);
            return Ok(());
        }

        if let Some(id) = id {
            cells.applied_ids.insert(id);
        }
        let mut pane = cells
            .pane
            .take()
            .unwrap_or_else(|| PaneState::new(self.combine_fn.create_accumulator()));
        pane.accumulator = self.combine_fn.add_input(pane.accumulator, value);
        pane.observe(timestamp);
        cells.pane = Some(pane);
        cells.hold = self.element_hold(&window, timestamp, cells.hold, input_watermark);

        let mut ctx = TriggerContext::new(
            window.clone(),
            input_watermark,
            self.timers.current_processing_time(),
        );
        let decision = self.machine.on_element(&mut trigger_state, &mut ctx)?;
        cells.trigger = Some(trigger_state);
        self.schedule_trigger_timers(key, &window, &mut cells, ctx.take_timers())?;
        tracing::trace!("element at {} -> {} ({:?})", timestamp, window, decision);

        self.apply_decision(key, key_bytes, &window, cells, decision, input_watermark)
    }

    /// Create the cells and timers of a window seen for the first time.
    fn init_window(
        &mut self,
        key: &K,
        window: &TimeWindow,
        cells: &mut WindowCells<ACC>,
        input_watermark: EventTime,
    ) -> Result<()> {
        cells.trigger = Some(self.machine.initial_state());
        self.timers.set_timer(timer_data(
            key,
            window,
            self.strategy.gc_time(window),
            TimeDomain::EventTime,
            TimerId::GarbageCollection,
        ))?;
        if input_watermark <= window.max_timestamp() {
            let end_of_window = vec![(TimeDomain::EventTime, window.max_timestamp())];
            self.schedule_trigger_timers(key, window, cells, end_of_window)?;
        }
        tracing::trace!("new {} (gc at {})", window, self.strategy.gc_time(window));
        Ok(())
    }

    /// The hold an element places on its window, combined with `existing`.
    ///
    /// A hold behind the input watermark cannot be respected any more; late
    /// elements hold at the garbage-collection time instead, or not at all
    /// without allowed lateness.
    fn element_hold(
        &self,
        window: &TimeWindow,
        timestamp: EventTime,
        existing: Option<EventTime>,
        input_watermark: EventTime,
    ) -> Option<EventTime> {
        let combiner = self.strategy.timestamp_combiner;
        let mut candidate = combiner.assign(timestamp, window);
        if candidate < input_watermark {
            let gc_time = self.strategy.gc_time(window);
            if self.strategy.allowed_lateness.is_zero() || gc_time < input_watermark {
                return existing;
            }
            candidate = gc_time;
        }
        Some(existing.map_or(candidate, |hold| combiner.combine(hold, candidate)))
    }

    // ── Merging ───────────────────────────────────────────────────────────────

    /// Merge `window` into the key's active windows and migrate the state of
    /// every merged-away window into the survivor.
    ///
    /// Everything is read and validated before the first write, so a failed
    /// merge leaves the backend untouched.
    fn merge_window(
        &mut self,
        key: &K,
        key_bytes: &[u8],
        active: &mut BTreeSet<TimeWindow>,
        window: TimeWindow,
        input_watermark: EventTime,
    ) -> Result<TimeWindow> {
        let result = self.strategy.assigner.merge_windows(active, &window);
        if result.is_identity() {
            return Ok(result.surviving);
        }
        let surviving = result.surviving;

        let mut sources: Vec<(TimeWindow, WindowCells<ACC>)> = Vec::new();
        for merging in result.merged_away.iter().chain(active.get(&surviving)) {
            let cells = self
                .store
                .load(&self.backend, key_bytes, merging)
                .with_context(|| format!("load state of merging {merging}"))?;
            sources.push((merging.clone(), cells));
        }

        let mut ctx = TriggerContext::new(
            surviving.clone(),
            input_watermark,
            self.timers.current_processing_time(),
        );
        let trigger_states: Vec<TriggerState> = sources
            .iter()
            .map(|(_, cells)| {
                cells
                    .trigger
                    .clone()
                    .unwrap_or_else(|| self.machine.initial_state())
            })
            .collect();
        let merged_trigger = self.machine.on_merge(&trigger_states, &mut ctx)?;
        let mut merged = self.merge_cells(&surviving, &sources, merged_trigger, input_watermark);

        for (merging, cells) in &sources {
            let mut cells = cells.clone();
            self.cancel_trigger_timers(key, merging, &mut cells)?;
            self.timers.delete_timer(&timer_data(
                key,
                merging,
                self.strategy.gc_time(merging),
                TimeDomain::EventTime,
                TimerId::GarbageCollection,
            ))?;
            if *merging != surviving {
                self.store.clear(&mut self.backend, key_bytes, merging)?;
                active.remove(merging);
            }
        }

        self.timers.set_timer(timer_data(
            key,
            &surviving,
            self.strategy.gc_time(&surviving),
            TimeDomain::EventTime,
            TimerId::GarbageCollection,
        ))?;
        let mut requests = ctx.take_timers();
        if input_watermark <= surviving.max_timestamp() {
            requests.push((TimeDomain::EventTime, surviving.max_timestamp()));
        }
        self.schedule_trigger_timers(key, &surviving, &mut merged, requests)?;
        self.store
            .store(&mut self.backend, key_bytes, &surviving, &merged)?;
        active.insert(surviving.clone());
        self.store
            .set_active_windows(&mut self.backend, key_bytes, active)?;

        tracing::debug!(
            "merged {} window(s) into {}: {:?}",
            result.merged_away.len(),
            surviving,
            result.merged_away
        );
        Ok(surviving)
    }

    fn merge_cells(
        &self,
        surviving: &TimeWindow,
        sources: &[(TimeWindow, WindowCells<ACC>)],
        trigger: TriggerState,
        input_watermark: EventTime,
    ) -> WindowCells<ACC> {
        let panes: Vec<&PaneState<ACC>> = sources
            .iter()
            .filter_map(|(_, cells)| cells.pane.as_ref())
            .collect();
        let pane = (!panes.is_empty()).then(|| PaneState {
            accumulator: self
                .combine_fn
                .merge_accumulators(panes.iter().map(|p| p.accumulator.clone()).collect()),
            total_count: panes.iter().map(|p| p.total_count).sum(),
            count_since_fire: panes.iter().map(|p| p.count_since_fire).sum(),
            min_timestamp: panes.iter().filter_map(|p| p.min_timestamp).min(),
            max_timestamp: panes.iter().filter_map(|p| p.max_timestamp).max(),
        });

        let holds: Vec<EventTime> = sources.iter().filter_map(|(_, cells)| cells.hold).collect();
        let combiner = self.strategy.timestamp_combiner;
        let hold = match combiner {
            // End-of-window holds move to the end of the merged window.
            TimestampCombiner::EndOfWindow if !holds.is_empty() => {
                if input_watermark <= surviving.max_timestamp() {
                    Some(surviving.max_timestamp())
                } else {
                    let gc_time = self.strategy.gc_time(surviving);
                    (!self.strategy.allowed_lateness.is_zero() && gc_time >= input_watermark)
                        .then_some(gc_time)
                }
            }
            _ => holds.into_iter().reduce(|a, b| combiner.combine(a, b)),
        };

        let mut pane_info = sources
            .iter()
            .filter_map(|(_, cells)| cells.pane_info)
            .max_by_key(|info| info.index);
        // Every earlier pane precedes the end of the merged window, so the
        // merged window still owes its on-time pane.
        if input_watermark <= surviving.max_timestamp() {
            pane_info = pane_info.map(PaneInfo::as_speculative);
        }

        WindowCells {
            pane,
            hold,
            trigger: Some(trigger),
            pane_info,
            timers: BTreeSet::new(),
            applied_ids: sources
                .iter()
                .flat_map(|(_, cells)| cells.applied_ids.iter().copied())
                .collect(),
        }
    }

    // ── Timers ────────────────────────────────────────────────────────────────

    fn handle_timer(&mut self, timer: TimerData<K>) -> Result<()> {
        let key_bytes = key_bytes(&timer.key)?;
        let mut active = self.store.active_windows(&self.backend, &key_bytes)?;
        if !active.contains(&timer.window) {
            self.dropped_due_to_lateness.inc();
            tracing::warn!(
                "ignore stale {} timer for {} at {}",
                timer.id,
                timer.window,
                timer.timestamp
            );
            return Ok(());
        }

        let input_watermark = self.timers.current_input_watermark();
        let mut cells = self
            .store
            .load(&self.backend, &key_bytes, &timer.window)
            .with_context(|| format!("load state of {}", timer.window))?;

        match timer.id {
            TimerId::GarbageCollection => self.garbage_collect(
                &timer.key,
                &key_bytes,
                &timer.window,
                cells,
                &mut active,
                input_watermark,
            ),
            TimerId::TriggerWakeup => {
                cells.timers.remove(&(timer.domain, timer.timestamp));
                let mut trigger_state = cells
                    .trigger
                    .take()
                    .unwrap_or_else(|| self.machine.initial_state());
                let mut ctx = TriggerContext::new(
                    timer.window.clone(),
                    input_watermark,
                    self.timers.current_processing_time(),
                );
                let decision = self.machine.on_timer(&mut trigger_state, &mut ctx)?;
                cells.trigger = Some(trigger_state);
                self.schedule_trigger_timers(&timer.key, &timer.window, &mut cells, ctx.take_timers())?;
                tracing::trace!(
                    "{} wakeup at {} for {} ({:?})",
                    timer.domain,
                    timer.timestamp,
                    timer.window,
                    decision
                );
                self.apply_decision(
                    &timer.key,
                    &key_bytes,
                    &timer.window,
                    cells,
                    decision,
                    input_watermark,
                )
            }
        }
    }

    fn schedule_trigger_timers(
        &mut self,
        key: &K,
        window: &TimeWindow,
        cells: &mut WindowCells<ACC>,
        requests: Vec<(TimeDomain, EventTime)>,
    ) -> Result<()> {
        for (domain, timestamp) in requests {
            if cells.timers.insert((domain, timestamp)) {
                self.timers.set_timer(timer_data(
                    key,
                    window,
                    timestamp,
                    domain,
                    TimerId::TriggerWakeup,
                ))?;
            }
        }
        Ok(())
    }

    fn cancel_trigger_timers(
        &mut self,
        key: &K,
        window: &TimeWindow,
        cells: &mut WindowCells<ACC>,
    ) -> Result<()> {
        for (domain, timestamp) in std::mem::take(&mut cells.timers) {
            self.timers.delete_timer(&timer_data(
                key,
                window,
                timestamp,
                domain,
                TimerId::TriggerWakeup,
            ))?;
        }
        Ok(())
    }

    // ── Firing ────────────────────────────────────────────────────────────────

    /// Emit a pane if the trigger fired, then persist the window's cells.
    fn apply_decision(
        &mut self,
        key: &K,
        key_bytes: &[u8],
        window: &TimeWindow,
        mut cells: WindowCells<ACC>,
        decision: FireDecision,
        input_watermark: EventTime,
    ) -> Result<()> {
        if decision.is_fire() {
            self.on_trigger(key, window, &mut cells, decision.is_finish(), input_watermark);
        }
        if decision.is_finish() {
            self.cancel_trigger_timers(key, window, &mut cells)?;
            if self.strategy.allow_discarding_finished_windows {
                return self.discard_window(key, key_bytes, window);
            }
            // The finished trigger stays until GC so later elements are
            // recognised as belonging to a closed window.
            cells.pane = None;
            cells.hold = None;
        }
        self.store
            .store(&mut self.backend, key_bytes, window, &cells)
            .with_context(|| format!("store state of {window}"))
    }

    /// Produce the pane for a firing and move the window to its next pane.
    fn on_trigger(
        &mut self,
        key: &K,
        window: &TimeWindow,
        cells: &mut WindowCells<ACC>,
        is_final: bool,
        input_watermark: EventTime,
    ) {
        let timing = if input_watermark <= window.max_timestamp() {
            Timing::Early
        } else if !cells.on_time_pane_emitted() {
            Timing::OnTime
        } else {
            Timing::Late
        };
        let is_empty = cells
            .pane
            .as_ref()
            .is_none_or(PaneState::is_empty_since_fire);

        if self.strategy.should_emit(is_empty, is_final, timing) {
            let info = match cells.pane_info {
                Some(previous) => previous.next(timing, is_final),
                None => PaneInfo::first(timing, is_final),
            };
            let value = match &cells.pane {
                Some(pane) => self.combine_fn.extract_output(&pane.accumulator),
                None => self
                    .combine_fn
                    .extract_output(&self.combine_fn.create_accumulator()),
            };
            let timestamp = cells.hold.unwrap_or_else(|| window.max_timestamp());
            tracing::debug!(
                "fire {} pane #{} ({:?}{}) at {}",
                window,
                info.index,
                timing,
                if is_final { ", final" } else { "" },
                timestamp
            );
            self.output.push(WindowedPane {
                key: key.clone(),
                window: window.clone(),
                value,
                timestamp,
                pane: info,
            });
            cells.pane_info = Some(info);
        } else {
            tracing::trace!("skip empty {:?} pane for {}", timing, window);
        }

        if let Some(pane) = cells.pane.as_mut() {
            pane.reset_since_fire();
            if self.strategy.accumulation_mode == AccumulationMode::Discarding {
                pane.accumulator = self.combine_fn.create_accumulator();
            }
        }
        cells.hold = if is_final {
            None
        } else if input_watermark <= window.max_timestamp() {
            Some(window.max_timestamp())
        } else {
            self.garbage_collection_hold(window, input_watermark)
        };
    }

    /// Hold at the GC time while the final pane of a
    /// `ClosingBehavior::FireAlways` window is still owed.
    fn garbage_collection_hold(
        &self,
        window: &TimeWindow,
        input_watermark: EventTime,
    ) -> Option<EventTime> {
        let gc_time = self.strategy.gc_time(window);
        (self.strategy.closing_behavior == ClosingBehavior::FireAlways
            && gc_time >= input_watermark)
            .then_some(gc_time)
    }

    // ── Garbage collection ────────────────────────────────────────────────────

    fn garbage_collect(
        &mut self,
        key: &K,
        key_bytes: &[u8],
        window: &TimeWindow,
        mut cells: WindowCells<ACC>,
        active: &mut BTreeSet<TimeWindow>,
        input_watermark: EventTime,
    ) -> Result<()> {
        let closed = cells
            .trigger
            .as_ref()
            .is_some_and(|state| self.machine.is_closed(state));
        if !closed {
            self.on_trigger(key, window, &mut cells, true, input_watermark);
        }
        self.cancel_trigger_timers(key, window, &mut cells)?;
        self.store.clear(&mut self.backend, key_bytes, window)?;
        active.remove(window);
        self.store
            .set_active_windows(&mut self.backend, key_bytes, active)?;
        tracing::debug!(
            "garbage-collected {} at watermark {}",
            window,
            input_watermark
        );
        Ok(())
    }

    /// Drop every trace of a finished window right away.
    fn discard_window(&mut self, key: &K, key_bytes: &[u8], window: &TimeWindow) -> Result<()> {
        self.timers.delete_timer(&timer_data(
            key,
            window,
            self.strategy.gc_time(window),
            TimeDomain::EventTime,
            TimerId::GarbageCollection,
        ))?;
        self.store.clear(&mut self.backend, key_bytes, window)?;
        let mut active = self.store.active_windows(&self.backend, key_bytes)?;
        active.remove(window);
        self.store
            .set_active_windows(&mut self.backend, key_bytes, &active)?;
        tracing::debug!("discarded finished {}", window);
        Ok(())
    }
}

fn key_bytes<K: StreamData>(key: &K) -> Result<Vec<u8>> {
    bincode::serialize(key).context("encode key")
}

fn timer_data<K: StreamData>(
    key: &K,
    window: &TimeWindow,
    timestamp: EventTime,
    domain: TimeDomain,
    id: TimerId,
) -> TimerData<K> {
    TimerData {
        key: key.clone(),
        window: window.clone(),
        timestamp,
        domain,
        id,
    }
}

// ── Harness boundary ──────────────────────────────────────────────────────────

impl<K, V, ACC, OUT, CF, B, TS> DoFnRunner<K, V, OUT> for ReduceFnRunner<K, V, ACC, OUT, CF, B, TS>
where
    K: StreamData,
    V: StreamData,
    ACC: StreamData,
    CF: CombineFn<V, ACC, OUT>,
    B: StateBackend,
    TS: TimerService<K>,
{
    fn start_bundle(&mut self) -> Result<()> {
        tracing::trace!("start bundle");
        Ok(())
    }

    fn process_element(&mut self, element: WindowedValue<(K, V)>) -> Result<()> {
        self.process(element)
    }

    fn on_timer(&mut self, timer: TimerData<K>) -> Result<()> {
        self.handle_timer(timer)
    }

    fn finish_bundle(&mut self) -> Result<()> {
        self.backend.flush().context("flush window state")
    }

    fn take_output(&mut self) -> Vec<WindowedPane<K, OUT>> {
        std::mem::take(&mut self.output)
    }
}

impl<K, V, ACC, OUT, CF, B, TS> ReduceFnExecutor<K, V, OUT>
    for ReduceFnRunner<K, V, ACC, OUT, CF, B, TS>
where
    K: StreamData,
    V: StreamData,
    ACC: StreamData,
    CF: CombineFn<V, ACC, OUT>,
    B: StateBackend,
    TS: TimerService<K>,
{
    fn as_runner(&mut self) -> &mut dyn DoFnRunner<K, V, OUT> {
        self
    }

    fn dropped_due_to_lateness(&self) -> Counter {
        self.dropped_due_to_lateness.clone()
    }
}
