use super::*;

/// Field name of the per-window watermark hold cell.
pub const HOLD_FIELD: &str = "hold";

/// Accumulated contents of one (key, window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneState<ACC> {
    pub accumulator: ACC,
    /// Elements added over the window's lifetime.
    pub total_count: u64,
    /// Elements added since the last firing.
    pub count_since_fire: u64,
    pub min_timestamp: Option<EventTime>,
    pub max_timestamp: Option<EventTime>,
}

impl<ACC> PaneState<ACC> {
    pub fn new(accumulator: ACC) -> Self {
        Self {
            accumulator,
            total_count: 0,
            count_since_fire: 0,
            min_timestamp: None,
            max_timestamp: None,
        }
    }

    /// Record an element's timestamp and counts. The accumulator is updated
    /// by the caller.
    pub fn observe(&mut self, timestamp: EventTime) {
        self.total_count += 1;
        self.count_since_fire += 1;
        self.min_timestamp = Some(self.min_timestamp.map_or(timestamp, |t| t.min(timestamp)));
        self.max_timestamp = Some(self.max_timestamp.map_or(timestamp, |t| t.max(timestamp)));
    }

    /// Return true if nothing arrived since the last firing.
    pub fn is_empty_since_fire(&self) -> bool {
        self.count_since_fire == 0
    }

    /// Start a new pane after firing; the accumulator is left to the caller.
    pub fn reset_since_fire(&mut self) {
        self.count_since_fire = 0;
        self.min_timestamp = None;
        self.max_timestamp = None;
    }
}

/// In-memory copy of every state cell of one (key, window).
///
/// The runner loads it, computes the new values, and writes it back in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCells<ACC> {
    pub pane: Option<PaneState<ACC>>,
    pub hold: Option<EventTime>,
    pub trigger: Option<TriggerState>,
    /// Metadata of the last emitted pane.
    pub pane_info: Option<PaneInfo>,
    /// Outstanding trigger wakeup timers.
    pub timers: BTreeSet<(TimeDomain, EventTime)>,
    /// Ids of elements already folded into this window.
    pub applied_ids: BTreeSet<ElementId>,
}

impl<ACC> Default for WindowCells<ACC> {
    fn default() -> Self {
        Self {
            pane: None,
            hold: None,
            trigger: None,
            pane_info: None,
            timers: BTreeSet::new(),
            applied_ids: BTreeSet::new(),
        }
    }
}

impl<ACC> WindowCells<ACC> {
    /// Return true if the window has no live cell at all.
    pub fn is_empty(&self) -> bool {
        self.pane.is_none()
            && self.hold.is_none()
            && self.trigger.is_none()
            && self.pane_info.is_none()
            && self.timers.is_empty()
            && self.applied_ids.is_empty()
    }

    /// Return true if an on-time pane has already been emitted.
    pub fn on_time_pane_emitted(&self) -> bool {
        self.pane_info.is_some_and(|info| info.timing != Timing::Early)
    }
}

/// Typed access to the cells the runner keeps per key and per window.
pub struct WindowStateStore<ACC> {
    active_windows: ValueStateHandle<BTreeSet<TimeWindow>>,
    pane: ValueStateHandle<PaneState<ACC>>,
    hold: ValueStateHandle<EventTime>,
    trigger: ValueStateHandle<TriggerState>,
    pane_info: ValueStateHandle<PaneInfo>,
    timers: ValueStateHandle<BTreeSet<(TimeDomain, EventTime)>>,
    applied_ids: ValueStateHandle<BTreeSet<ElementId>>,
}

impl<ACC: StreamData> Default for WindowStateStore<ACC> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ACC: StreamData> WindowStateStore<ACC> {
    pub fn new() -> Self {
        Self {
            active_windows: ValueStateHandle::new("active_windows"),
            pane: ValueStateHandle::new("pane"),
            hold: ValueStateHandle::new(HOLD_FIELD),
            trigger: ValueStateHandle::new("trigger"),
            pane_info: ValueStateHandle::new("pane_info"),
            timers: ValueStateHandle::new("timers"),
            applied_ids: ValueStateHandle::new("applied_ids"),
        }
    }

    /// Windows of `key` that currently hold state.
    pub fn active_windows<B: StateBackend + ?Sized>(
        &self,
        backend: &B,
        key: &[u8],
    ) -> Result<BTreeSet<TimeWindow>> {
        Ok(self
            .active_windows
            .get(backend, key, &StateNamespace::Global)?
            .unwrap_or_default())
    }

    pub fn set_active_windows<B: StateBackend + ?Sized>(
        &self,
        backend: &mut B,
        key: &[u8],
        windows: &BTreeSet<TimeWindow>,
    ) -> Result<()> {
        let value = (!windows.is_empty()).then_some(windows);
        self.active_windows
            .set(backend, key, &StateNamespace::Global, value)
    }

    pub fn load<B: StateBackend + ?Sized>(
        &self,
        backend: &B,
        key: &[u8],
        window: &TimeWindow,
    ) -> Result<WindowCells<ACC>> {
        let ns = StateNamespace::Window(window.clone());
        Ok(WindowCells {
            pane: self.pane.get(backend, key, &ns)?,
            hold: self.hold.get(backend, key, &ns)?,
            trigger: self.trigger.get(backend, key, &ns)?,
            pane_info: self.pane_info.get(backend, key, &ns)?,
            timers: self.timers.get(backend, key, &ns)?.unwrap_or_default(),
            applied_ids: self.applied_ids.get(backend, key, &ns)?.unwrap_or_default(),
        })
    }

    /// Write every cell of `cells`; absent values clear their cell.
    pub fn store<B: StateBackend + ?Sized>(
        &self,
        backend: &mut B,
        key: &[u8],
        window: &TimeWindow,
        cells: &WindowCells<ACC>,
    ) -> Result<()> {
        let ns = StateNamespace::Window(window.clone());
        self.pane.set(backend, key, &ns, cells.pane.as_ref())?;
        self.hold.set(backend, key, &ns, cells.hold.as_ref())?;
        self.trigger.set(backend, key, &ns, cells.trigger.as_ref())?;
        self.pane_info.set(backend, key, &ns, cells.pane_info.as_ref())?;
        self.timers
            .set(backend, key, &ns, (!cells.timers.is_empty()).then_some(&cells.timers))?;
        self.applied_ids.set(
            backend,
            key,
            &ns,
            (!cells.applied_ids.is_empty()).then_some(&cells.applied_ids),
        )
    }

    /// Remove every cell of the window.
    pub fn clear<B: StateBackend + ?Sized>(
        &self,
        backend: &mut B,
        key: &[u8],
        window: &TimeWindow,
    ) -> Result<()> {
        self.store(backend, key, window, &WindowCells::default())
    }
}
