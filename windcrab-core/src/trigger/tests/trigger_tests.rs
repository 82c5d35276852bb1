use super::*;

const WINDOW: TimeWindow = TimeWindow { start: 0, end: 10 };

fn ctx(watermark: EventTime) -> TriggerContext {
    TriggerContext::new(WINDOW, watermark, 0)
}

fn ctx_at(watermark: EventTime, processing_time: EventTime) -> TriggerContext {
    TriggerContext::new(WINDOW, watermark, processing_time)
}

/// Feed `n` elements, returning every decision.
fn elements(machine: &TriggerMachine, state: &mut TriggerState, n: usize, watermark: EventTime) -> Vec<FireDecision> {
    (0..n)
        .map(|_| machine.on_element(state, &mut ctx(watermark)).unwrap())
        .collect()
}

// ── Tree construction ─────────────────────────────────────────────────────────

#[test]
fn test_default_trigger_is_repeated_watermark() {
    assert_eq!(Trigger::default(), Trigger::repeatedly(Trigger::after_watermark()));
    assert_eq!(Trigger::default().to_string(), "Repeatedly(AfterWatermark)");
}

#[test]
fn test_state_shape_follows_trigger() {
    let trigger = Trigger::after_watermark()
        .with_early_firings(Trigger::after_count(2))
        .with_late_firings(Trigger::after_count(1));
    let state = TriggerState::for_trigger(&trigger);
    assert_eq!(state.children.len(), 2);
    assert!(state.matches(&trigger));
    assert!(!state.matches(&Trigger::after_watermark()));
}

#[test]
fn test_validate_rejects_degenerate_trees() {
    assert!(Trigger::default().validate().is_ok());
    assert!(Trigger::after_count(0).validate().is_ok());
    assert_eq!(
        Trigger::after_processing_time(Duration::MAX),
        Trigger::AfterProcessingTime { delay_ms: i64::MAX }
    );

    for bad in [
        Trigger::repeatedly(Trigger::AfterCount(0)),
        Trigger::after_watermark().with_late_firings(Trigger::AfterProcessingTime { delay_ms: -1 }),
        Trigger::after_first(Vec::new()),
    ] {
        let err = bad.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WindowingError>(),
            Some(WindowingError::InvalidTrigger { .. })
        ));
    }
}

#[test]
fn test_may_finish() {
    assert!(Trigger::after_watermark().may_finish());
    assert!(!Trigger::default().may_finish());
    assert!(!Trigger::after_watermark().with_late_firings(Trigger::after_count(1)).may_finish());
    assert!(Trigger::repeatedly(Trigger::after_count(2)).or_finally(Trigger::after_watermark()).may_finish());
}

// ── Atomic triggers ───────────────────────────────────────────────────────────

#[test]
fn test_after_count_fires_and_finishes() {
    let machine = TriggerMachine::new(Trigger::after_count(2));
    let mut state = machine.initial_state();
    let decisions = elements(&machine, &mut state, 2, 0);
    assert_eq!(decisions, vec![FireDecision::NoFire, FireDecision::FireAndFinish]);
    assert!(machine.is_closed(&state));
    // A finished trigger ignores further elements.
    assert_eq!(elements(&machine, &mut state, 3, 0), vec![FireDecision::NoFire; 3]);
}

#[test]
fn test_repeated_count_resets_after_each_fire() {
    let machine = TriggerMachine::new(Trigger::repeatedly(Trigger::after_count(2)));
    let mut state = machine.initial_state();
    let decisions = elements(&machine, &mut state, 5, 0);
    assert_eq!(
        decisions,
        vec![
            FireDecision::NoFire,
            FireDecision::Fire,
            FireDecision::NoFire,
            FireDecision::Fire,
            FireDecision::NoFire,
        ]
    );
    assert_eq!(state.children[0].count, 1);
}

#[test]
fn test_after_watermark_requests_end_of_window_timer() {
    let machine = TriggerMachine::new(Trigger::after_watermark());
    let mut state = machine.initial_state();
    let mut c = ctx(5);
    assert_eq!(machine.on_element(&mut state, &mut c).unwrap(), FireDecision::NoFire);
    assert_eq!(c.take_timers(), vec![(TimeDomain::EventTime, 9)]);

    // Watermark equal to max timestamp is not past the window yet.
    assert_eq!(machine.on_timer(&mut state, &mut ctx(9)).unwrap(), FireDecision::NoFire);
    assert_eq!(
        machine.on_timer(&mut state, &mut ctx(10)).unwrap(),
        FireDecision::FireAndFinish
    );
}

#[test]
fn test_after_processing_time_sets_deadline_from_first_element() {
    let machine = TriggerMachine::new(Trigger::after_processing_time(Duration::from_millis(100)));
    let mut state = machine.initial_state();

    let mut c = ctx_at(0, 1_000);
    machine.on_element(&mut state, &mut c).unwrap();
    assert_eq!(c.take_timers(), vec![(TimeDomain::ProcessingTime, 1_100)]);

    // A second element does not move the deadline.
    let mut c = ctx_at(0, 1_050);
    machine.on_element(&mut state, &mut c).unwrap();
    assert!(c.take_timers().is_empty());
    assert_eq!(state.deadline, Some(1_100));

    assert_eq!(machine.on_timer(&mut state, &mut ctx_at(0, 1_099)).unwrap(), FireDecision::NoFire);
    assert_eq!(
        machine.on_timer(&mut state, &mut ctx_at(0, 1_100)).unwrap(),
        FireDecision::FireAndFinish
    );
}

#[test]
fn test_never_does_not_fire() {
    let machine = TriggerMachine::new(Trigger::never());
    let mut state = machine.initial_state();
    assert_eq!(elements(&machine, &mut state, 3, 100), vec![FireDecision::NoFire; 3]);
    assert_eq!(machine.on_timer(&mut state, &mut ctx(100)).unwrap(), FireDecision::NoFire);
}

// ── Early / late firings ──────────────────────────────────────────────────────

#[test]
fn test_early_on_time_and_late_firings() {
    let machine = TriggerMachine::new(
        Trigger::after_watermark()
            .with_early_firings(Trigger::after_count(2))
            .with_late_firings(Trigger::after_count(1)),
    );
    let mut state = machine.initial_state();

    // Early: every second element.
    let decisions = elements(&machine, &mut state, 4, 0);
    assert_eq!(
        decisions,
        vec![FireDecision::NoFire, FireDecision::Fire, FireDecision::NoFire, FireDecision::Fire]
    );

    // On time.
    assert_eq!(machine.on_timer(&mut state, &mut ctx(10)).unwrap(), FireDecision::Fire);
    assert!(state.fired_on_time);
    // Nothing new happened since.
    assert_eq!(machine.on_timer(&mut state, &mut ctx(11)).unwrap(), FireDecision::NoFire);

    // Late: once per element, never finishing.
    assert_eq!(elements(&machine, &mut state, 2, 12), vec![FireDecision::Fire; 2]);
    assert!(!machine.is_closed(&state));
}

#[test]
fn test_early_firings_without_late_finish_on_time() {
    let machine = TriggerMachine::new(
        Trigger::after_watermark().with_early_firings(Trigger::after_count(1)),
    );
    let mut state = machine.initial_state();
    assert_eq!(elements(&machine, &mut state, 1, 0), vec![FireDecision::Fire]);
    assert_eq!(
        machine.on_timer(&mut state, &mut ctx(10)).unwrap(),
        FireDecision::FireAndFinish
    );
}

#[test]
fn test_repeated_watermark_fires_per_late_element() {
    let machine = TriggerMachine::new(Trigger::default());
    let mut state = machine.initial_state();
    assert_eq!(elements(&machine, &mut state, 1, 3), vec![FireDecision::NoFire]);
    assert_eq!(machine.on_timer(&mut state, &mut ctx(10)).unwrap(), FireDecision::Fire);
    assert_eq!(elements(&machine, &mut state, 1, 12), vec![FireDecision::Fire]);
}

// ── Composites ────────────────────────────────────────────────────────────────

#[test]
fn test_after_all_requires_every_child() {
    let machine = TriggerMachine::new(Trigger::after_all(vec![
        Trigger::after_count(2),
        Trigger::after_watermark(),
    ]));
    let mut state = machine.initial_state();
    assert_eq!(elements(&machine, &mut state, 3, 0), vec![FireDecision::NoFire; 3]);
    assert_eq!(
        machine.on_timer(&mut state, &mut ctx(10)).unwrap(),
        FireDecision::FireAndFinish
    );
}

#[test]
fn test_after_first_fires_on_any_child() {
    let machine = TriggerMachine::new(Trigger::after_first(vec![
        Trigger::after_count(3),
        Trigger::after_watermark(),
    ]));
    let mut state = machine.initial_state();
    elements(&machine, &mut state, 1, 0);
    assert_eq!(
        machine.on_timer(&mut state, &mut ctx(10)).unwrap(),
        FireDecision::FireAndFinish
    );
}

#[test]
fn test_after_each_runs_in_sequence() {
    let machine = TriggerMachine::new(Trigger::after_each(vec![
        Trigger::after_count(2),
        Trigger::after_count(1),
    ]));
    let mut state = machine.initial_state();
    assert_eq!(
        elements(&machine, &mut state, 3, 0),
        vec![FireDecision::NoFire, FireDecision::Fire, FireDecision::FireAndFinish]
    );
}

#[test]
fn test_or_finally_stops_repetition() {
    let machine = TriggerMachine::new(
        Trigger::repeatedly(Trigger::after_count(1)).or_finally(Trigger::after_count(3)),
    );
    let mut state = machine.initial_state();
    assert_eq!(
        elements(&machine, &mut state, 4, 0),
        vec![
            FireDecision::Fire,
            FireDecision::Fire,
            FireDecision::FireAndFinish,
            FireDecision::NoFire,
        ]
    );
}

#[test]
fn test_should_fire_is_pure() {
    let machine = TriggerMachine::new(Trigger::after_count(1));
    let mut state = machine.initial_state();
    state.count = 1;
    let before = state.clone();
    assert!(machine.should_fire(&state, &ctx(0)));
    assert!(machine.should_fire(&state, &ctx(0)));
    assert_eq!(state, before);
}

#[test]
fn test_corrupt_state_is_rejected() {
    let machine = TriggerMachine::new(Trigger::default());
    let mut state = TriggerState::default(); // no child for Repeatedly
    let err = machine.on_element(&mut state, &mut ctx(0)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WindowingError>(),
        Some(WindowingError::CorruptState { .. })
    ));
}

// ── Merging ───────────────────────────────────────────────────────────────────

#[test]
fn test_merge_sums_counts_and_takes_earliest_deadline() {
    let machine = TriggerMachine::new(Trigger::after_first(vec![
        Trigger::after_count(10),
        Trigger::after_processing_time(Duration::from_millis(50)),
    ]));
    let mut a = machine.initial_state();
    let mut b = machine.initial_state();
    machine.on_element(&mut a, &mut ctx_at(0, 100)).unwrap();
    machine.on_element(&mut b, &mut ctx_at(0, 120)).unwrap();
    machine.on_element(&mut b, &mut ctx_at(0, 130)).unwrap();

    let mut c = ctx_at(0, 140);
    let merged = machine.on_merge(&[a, b], &mut c).unwrap();
    assert_eq!(merged.children[0].count, 3);
    assert_eq!(merged.children[1].deadline, Some(150));
    assert_eq!(c.take_timers(), vec![(TimeDomain::ProcessingTime, 150)]);
}

#[test]
fn test_merge_unfinishes_watermark_when_end_not_reached() {
    let machine = TriggerMachine::new(Trigger::after_watermark());
    let mut finished = machine.initial_state();
    assert_eq!(
        machine.on_timer(&mut finished, &mut ctx(10)).unwrap(),
        FireDecision::FireAndFinish
    );

    // The merged window extends past the watermark, so it needs an on-time pane again.
    let mut c = TriggerContext::new(TimeWindow::new(0, 20), 10, 0);
    let merged = machine.on_merge(&[finished.clone(), machine.initial_state()], &mut c).unwrap();
    assert!(!merged.finished);
    assert_eq!(c.take_timers(), vec![(TimeDomain::EventTime, 19)]);

    // Past the merged end, finished bits stay set when every window fired on time.
    let mut c = TriggerContext::new(TimeWindow::new(0, 10), 30, 0);
    let merged = machine.on_merge(&[finished.clone(), finished], &mut c).unwrap();
    assert!(merged.finished);
}

#[test]
fn test_merge_ors_finished_bits_of_once_triggers() {
    let machine = TriggerMachine::new(Trigger::after_count(1));
    let mut done = machine.initial_state();
    machine.on_element(&mut done, &mut ctx(0)).unwrap();
    let merged = machine.on_merge(&[done, machine.initial_state()], &mut ctx(0)).unwrap();
    assert!(merged.finished);
}

#[test]
fn test_merge_rejects_mismatched_shape() {
    let machine = TriggerMachine::new(Trigger::default());
    let bad = TriggerState::default();
    let err = machine
        .on_merge(&[machine.initial_state(), bad], &mut ctx(0))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WindowingError>(),
        Some(WindowingError::InconsistentMergeState { .. })
    ));
}
