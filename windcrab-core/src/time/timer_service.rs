use super::*;

/// What a timer is for. Ordering matters: at equal timestamps trigger wakeups
/// are delivered before garbage collection.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum TimerId {
    /// Re-evaluate the window's trigger.
    TriggerWakeup,
    /// Clear all state of the window.
    GarbageCollection,
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerId::TriggerWakeup => f.write_str("trigger"),
            TimerId::GarbageCollection => f.write_str("gc"),
        }
    }
}

/// A timer scoped to one (key, window).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerData<K> {
    pub key: K,
    pub window: TimeWindow,
    pub timestamp: EventTime,
    pub domain: TimeDomain,
    pub id: TimerId,
}

/// Timer and clock services the engine consumes from its hosting harness.
///
/// Setting the same timer twice is idempotent; deleting an unknown timer is a
/// no-op. The harness later hands due timers back through
/// [`DoFnRunner::on_timer`](crate::runner::DoFnRunner::on_timer).
pub trait TimerService<K>: Send {
    /// Schedule `timer`.
    fn set_timer(&mut self, timer: TimerData<K>) -> Result<()>;

    /// Cancel `timer`.
    fn delete_timer(&mut self, timer: &TimerData<K>) -> Result<()>;

    /// The input watermark of the key partition. Never decreases.
    fn current_input_watermark(&self) -> EventTime;

    /// The harness's current processing time.
    fn current_processing_time(&self) -> EventTime;
}

/// (fire_at, id) -> serialized (key, window) namespaces.
type TimerQueue = BTreeMap<(EventTime, TimerId), BTreeSet<Vec<u8>>>;

/// In-memory timers and clocks for a single key partition.
///
/// Timers are sorted by `(fire_at, id)` in a `BTreeMap` per time domain, which
/// gives O(log n) range scans and a deterministic delivery order.
///
/// # Invariant
/// A `(key, window, fire_at, id)` tuple is registered at most once per domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryTimerService<K> {
    event_timers: TimerQueue,
    processing_timers: TimerQueue,
    input_watermark: EventTime,
    processing_time: EventTime,
    _phantom: PhantomData<K>,
}

impl<K: StreamData> InMemoryTimerService<K> {
    /// Create an empty service with both clocks at `EVENT_TIME_MIN`.
    pub fn new() -> Self {
        Self {
            event_timers: BTreeMap::new(),
            processing_timers: BTreeMap::new(),
            input_watermark: EVENT_TIME_MIN,
            processing_time: EVENT_TIME_MIN,
            _phantom: PhantomData,
        }
    }

    fn timers_mut(&mut self, domain: TimeDomain) -> &mut TimerQueue {
        match domain {
            TimeDomain::EventTime => &mut self.event_timers,
            TimeDomain::ProcessingTime => &mut self.processing_timers,
        }
    }

    fn timers(&self, domain: TimeDomain) -> &TimerQueue {
        match domain {
            TimeDomain::EventTime => &self.event_timers,
            TimeDomain::ProcessingTime => &self.processing_timers,
        }
    }

    /// Advance the input watermark. Regressions are ignored.
    ///
    /// Returns `true` if the watermark moved.
    pub fn advance_input_watermark(&mut self, watermark: EventTime) -> bool {
        if watermark <= self.input_watermark {
            return false;
        }
        self.input_watermark = watermark;
        true
    }

    /// Advance processing time. Regressions are ignored.
    pub fn advance_processing_time(&mut self, now: EventTime) -> bool {
        if now <= self.processing_time {
            return false;
        }
        self.processing_time = now;
        true
    }

    /// Remove and return the earliest event-time timer strictly before the
    /// input watermark, if any.
    pub fn remove_next_event_timer(&mut self) -> Result<Option<TimerData<K>>> {
        let watermark = self.input_watermark;
        self.remove_next(TimeDomain::EventTime, |fire_at| fire_at < watermark)
    }

    /// Remove and return the earliest processing-time timer at or before the
    /// current processing time, if any.
    pub fn remove_next_processing_timer(&mut self) -> Result<Option<TimerData<K>>> {
        let now = self.processing_time;
        self.remove_next(TimeDomain::ProcessingTime, |fire_at| fire_at <= now)
    }

    fn remove_next(
        &mut self,
        domain: TimeDomain,
        is_due: impl Fn(EventTime) -> bool,
    ) -> Result<Option<TimerData<K>>> {
        let timers = self.timers_mut(domain);
        let Some((&(fire_at, id), namespaces)) = timers.iter_mut().next() else {
            return Ok(None);
        };
        if !is_due(fire_at) {
            return Ok(None);
        }
        let Some(bytes) = namespaces.pop_first() else {
            timers.remove(&(fire_at, id));
            return Ok(None);
        };
        if namespaces.is_empty() {
            timers.remove(&(fire_at, id));
        }
        let (key, window): (K, TimeWindow) =
            bincode::deserialize(&bytes).context("decode timer namespace")?;
        Ok(Some(TimerData {
            key,
            window,
            timestamp: fire_at,
            domain,
            id,
        }))
    }

    /// Return the timestamp of the earliest pending timer in `domain`, or `None`.
    pub fn next_timer(&self, domain: TimeDomain) -> Option<EventTime> {
        self.timers(domain).keys().next().map(|(fire_at, _)| *fire_at)
    }

    /// Return true if `timer` is currently scheduled.
    pub fn contains(&self, timer: &TimerData<K>) -> Result<bool> {
        let bytes = bincode::serialize(&(&timer.key, &timer.window))?;
        Ok(self
            .timers(timer.domain)
            .get(&(timer.timestamp, timer.id))
            .is_some_and(|namespaces| namespaces.contains(&bytes)))
    }

    /// Return the total count of registered timers across both domains.
    pub fn len(&self) -> usize {
        self.event_timers
            .values()
            .chain(self.processing_timers.values())
            .map(|namespaces| namespaces.len())
            .sum()
    }

    /// Return `true` if no timers are registered.
    pub fn is_empty(&self) -> bool {
        self.event_timers.is_empty() && self.processing_timers.is_empty()
    }
}

impl<K: StreamData> Default for InMemoryTimerService<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StreamData> TimerService<K> for InMemoryTimerService<K> {
    fn set_timer(&mut self, timer: TimerData<K>) -> Result<()> {
        let bytes = bincode::serialize(&(&timer.key, &timer.window))?;
        self.timers_mut(timer.domain)
            .entry((timer.timestamp, timer.id))
            .or_default()
            .insert(bytes);
        Ok(())
    }

    fn delete_timer(&mut self, timer: &TimerData<K>) -> Result<()> {
        let bytes = bincode::serialize(&(&timer.key, &timer.window))?;
        let timers = self.timers_mut(timer.domain);
        if let Some(namespaces) = timers.get_mut(&(timer.timestamp, timer.id)) {
            namespaces.remove(&bytes);
            if namespaces.is_empty() {
                timers.remove(&(timer.timestamp, timer.id));
            }
        }
        Ok(())
    }

    fn current_input_watermark(&self) -> EventTime {
        self.input_watermark
    }

    fn current_processing_time(&self) -> EventTime {
        self.processing_time
    }
}
