use super::*;

// ── Trigger tree ──────────────────────────────────────────────────────────────

/// Declarative trigger tree.
///
/// Atomic triggers fire on a single condition; composite triggers combine
/// their children. Build trees with the constructor helpers:
///
/// ```
/// use std::time::Duration;
/// use windcrab_core::trigger::Trigger;
///
/// // Speculative pane every 2 elements, on-time pane, then one pane per late element.
/// let trigger = Trigger::after_watermark()
///     .with_early_firings(Trigger::after_count(2))
///     .with_late_firings(Trigger::after_count(1));
/// assert!(!trigger.may_finish());
///
/// let bounded = Trigger::repeatedly(Trigger::after_processing_time(Duration::from_secs(1)))
///     .or_finally(Trigger::after_count(100));
/// assert!(bounded.may_finish());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Fires once the watermark passes the end of the window. Optional early
    /// and late sub-triggers fire repeatedly before and after that point.
    AfterWatermark {
        early: Option<Box<Trigger>>,
        late: Option<Box<Trigger>>,
    },
    /// Fires once processing time reaches `delay_ms` after the first element of the pane.
    AfterProcessingTime { delay_ms: i64 },
    /// Fires once the pane has received `n` elements.
    AfterCount(u64),
    /// Never fires. Windows close only through garbage collection.
    Never,
    /// Fires every time its child fires; never finishes.
    Repeatedly(Box<Trigger>),
    /// Fires once every child is ready or finished.
    AfterAll(Vec<Trigger>),
    /// Fires once any child is ready.
    AfterFirst(Vec<Trigger>),
    /// Runs children in sequence, each until it finishes.
    AfterEach(Vec<Trigger>),
    /// Fires like the main trigger until the `until` trigger fires, then finishes.
    OrFinally {
        main: Box<Trigger>,
        until: Box<Trigger>,
    },
}

impl Trigger {
    pub fn after_watermark() -> Self {
        Trigger::AfterWatermark {
            early: None,
            late: None,
        }
    }

    pub fn after_processing_time(delay: Duration) -> Self {
        Trigger::AfterProcessingTime {
            delay_ms: duration_millis(delay),
        }
    }

    pub fn after_count(n: u64) -> Self {
        Trigger::AfterCount(n.max(1))
    }

    pub fn never() -> Self {
        Trigger::Never
    }

    pub fn repeatedly(trigger: Trigger) -> Self {
        Trigger::Repeatedly(Box::new(trigger))
    }

    pub fn after_all(triggers: Vec<Trigger>) -> Self {
        Trigger::AfterAll(triggers)
    }

    pub fn after_first(triggers: Vec<Trigger>) -> Self {
        Trigger::AfterFirst(triggers)
    }

    pub fn after_each(triggers: Vec<Trigger>) -> Self {
        Trigger::AfterEach(triggers)
    }

    /// Finish as soon as `until` fires.
    pub fn or_finally(self, until: Trigger) -> Self {
        Trigger::OrFinally {
            main: Box::new(self),
            until: Box::new(until),
        }
    }

    /// Add speculative firings before the end of the window.
    /// Has no effect on anything but `AfterWatermark`.
    pub fn with_early_firings(self, early_trigger: Trigger) -> Self {
        match self {
            Trigger::AfterWatermark { late, .. } => Trigger::AfterWatermark {
                early: Some(Box::new(early_trigger)),
                late,
            },
            other => other,
        }
    }

    /// Add firings for late data after the on-time pane.
    /// Has no effect on anything but `AfterWatermark`.
    pub fn with_late_firings(self, late_trigger: Trigger) -> Self {
        match self {
            Trigger::AfterWatermark { early, .. } => Trigger::AfterWatermark {
                early,
                late: Some(Box::new(late_trigger)),
            },
            other => other,
        }
    }

    /// Child triggers in state-tree order. For `AfterWatermark` that is the
    /// early trigger (if any) followed by the late trigger (if any).
    pub fn children(&self) -> Vec<&Trigger> {
        match self {
            Trigger::AfterWatermark { early, late } => {
                early.iter().chain(late.iter()).map(|t| t.as_ref()).collect()
            }
            Trigger::Repeatedly(child) => vec![child.as_ref()],
            Trigger::AfterAll(children)
            | Trigger::AfterFirst(children)
            | Trigger::AfterEach(children) => children.iter().collect(),
            Trigger::OrFinally { main, until } => vec![main.as_ref(), until.as_ref()],
            Trigger::AfterProcessingTime { .. } | Trigger::AfterCount(_) | Trigger::Never => {
                Vec::new()
            }
        }
    }

    /// Check the invariants the constructors enforce, for trees built by hand
    /// or deserialized.
    pub fn validate(&self) -> Result<()> {
        let reason = match self {
            Trigger::AfterCount(0) => Some("element count must be at least 1"),
            Trigger::AfterProcessingTime { delay_ms } if *delay_ms < 0 => {
                Some("processing-time delay must not be negative")
            }
            Trigger::AfterAll(children)
            | Trigger::AfterFirst(children)
            | Trigger::AfterEach(children)
                if children.is_empty() =>
            {
                Some("composite trigger needs at least one child")
            }
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(WindowingError::InvalidTrigger {
                trigger: self.to_string(),
                reason: reason.to_string(),
            }
            .into());
        }
        self.children().into_iter().try_for_each(Trigger::validate)
    }

    /// Return true if this trigger can ever reach a finished state.
    pub fn may_finish(&self) -> bool {
        match self {
            Trigger::AfterWatermark { late, .. } => late.is_none(),
            Trigger::AfterProcessingTime { .. } | Trigger::AfterCount(_) => true,
            Trigger::Never | Trigger::Repeatedly(_) => false,
            Trigger::AfterAll(children) => children.iter().all(Trigger::may_finish),
            Trigger::AfterFirst(children) => children.iter().any(Trigger::may_finish),
            Trigger::AfterEach(children) => children.iter().all(Trigger::may_finish),
            Trigger::OrFinally { main, until } => main.may_finish() || until.may_finish(),
        }
    }
}

impl Default for Trigger {
    /// Fire on time, then once for every late element.
    fn default() -> Self {
        Trigger::repeatedly(Trigger::after_watermark())
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn list(f: &mut std::fmt::Formatter<'_>, name: &str, children: &[Trigger]) -> std::fmt::Result {
            write!(f, "{name}(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")
        }

        match self {
            Trigger::AfterWatermark { early, late } => {
                f.write_str("AfterWatermark")?;
                if let Some(early) = early {
                    write!(f, ".early({early})")?;
                }
                if let Some(late) = late {
                    write!(f, ".late({late})")?;
                }
                Ok(())
            }
            Trigger::AfterProcessingTime { delay_ms } => {
                write!(f, "AfterProcessingTime({delay_ms}ms)")
            }
            Trigger::AfterCount(n) => write!(f, "AfterCount({n})"),
            Trigger::Never => f.write_str("Never"),
            Trigger::Repeatedly(child) => write!(f, "Repeatedly({child})"),
            Trigger::AfterAll(children) => list(f, "AfterAll", children),
            Trigger::AfterFirst(children) => list(f, "AfterFirst", children),
            Trigger::AfterEach(children) => list(f, "AfterEach", children),
            Trigger::OrFinally { main, until } => write!(f, "{main}.orFinally({until})"),
        }
    }
}
