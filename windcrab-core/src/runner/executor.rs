use super::*;

// ── Counter ───────────────────────────────────────────────────────────────────

/// Monotonic, shareable counter.
///
/// Clones share the same value, so a harness can keep a clone and read it
/// from another thread while the runner increments it. There is no reset.
#[derive(Debug, Clone)]
pub struct Counter {
    name: &'static str,
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

// ── Harness boundary ──────────────────────────────────────────────────────────

/// The lifecycle calls a hosting harness makes on a windowing engine.
///
/// Calls for one key partition must not interleave; `&mut self` enforces that
/// for a single runner.
pub trait DoFnRunner<K, V, OUT> {
    /// Prepare for a batch of calls.
    fn start_bundle(&mut self) -> Result<()>;

    /// Handle one element. Panes it completes become available via
    /// [`take_output`](DoFnRunner::take_output).
    fn process_element(&mut self, element: WindowedValue<(K, V)>) -> Result<()>;

    /// Handle one due timer previously set through the [`TimerService`].
    fn on_timer(&mut self, timer: TimerData<K>) -> Result<()>;

    /// Flush buffered state writes. Makes no windowing decisions.
    fn finish_bundle(&mut self) -> Result<()>;

    /// Drain the panes emitted so far.
    fn take_output(&mut self) -> Vec<WindowedPane<K, OUT>>;
}

/// A windowing engine as seen by the harness.
pub trait ReduceFnExecutor<K, V, OUT> {
    /// The invokable view used to drive the engine.
    fn as_runner(&mut self) -> &mut dyn DoFnRunner<K, V, OUT>;

    /// Elements and timers discarded because their window was already
    /// garbage-collected. Never reset.
    fn dropped_due_to_lateness(&self) -> Counter;
}
