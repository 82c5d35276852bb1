use super::*;

fn timer(key: &str, window: TimeWindow, fire_at: EventTime, id: TimerId) -> TimerData<String> {
    TimerData {
        key: key.to_string(),
        window,
        timestamp: fire_at,
        domain: TimeDomain::EventTime,
        id,
    }
}

// --- Watermark generation ---

#[test]
fn test_no_watermark_before_first_event() {
    let wm_gen = BoundedOutOfOrderness::new(Duration::from_secs(5));
    assert_eq!(wm_gen.current_watermark(), None);
}

#[test]
fn test_watermark_advances_with_max_seen() {
    let mut wm_gen = BoundedOutOfOrderness::new(Duration::from_secs(5));

    assert_eq!(wm_gen.on_event(10_000), Some(Watermark::new(5_000))); // 10s - 5s
    assert_eq!(wm_gen.on_event(20_000), Some(Watermark::new(15_000))); // 20s - 5s
}

#[test]
fn test_out_of_order_event_does_not_regress_watermark() {
    let mut wm_gen = BoundedOutOfOrderness::new(Duration::from_secs(5));

    wm_gen.on_event(20_000);
    assert_eq!(wm_gen.on_event(5_000), None); // older than max_seen
    assert_eq!(wm_gen.current_watermark(), Some(Watermark::new(15_000)));
}

#[test]
fn test_zero_delay_watermark() {
    let mut wm_gen = BoundedOutOfOrderness::new(Duration::ZERO);
    assert_eq!(wm_gen.on_event(1_000), Some(Watermark::new(1_000)));
}

#[test]
fn test_unbounded_delay_saturates() {
    assert_eq!(duration_millis(Duration::from_millis(1_500)), 1_500);
    assert_eq!(duration_millis(Duration::MAX), i64::MAX);

    let mut wm_gen = BoundedOutOfOrderness::new(Duration::MAX);
    let watermark = wm_gen.on_event(1_000).unwrap();
    assert_eq!(watermark.timestamp, 1_000 - i64::MAX);
}

// --- InMemoryTimerService ---

#[test]
fn test_event_timer_fires_only_once_watermark_passes() {
    let mut svc = InMemoryTimerService::<String>::new();
    let w = TimeWindow::new(0, 10);
    svc.set_timer(timer("a", w.clone(), 9, TimerId::TriggerWakeup)).unwrap();

    // Watermark 9 asserts nothing below 9 arrives; the window may still see t=9.
    svc.advance_input_watermark(9);
    assert_eq!(svc.remove_next_event_timer().unwrap(), None);

    svc.advance_input_watermark(10);
    let fired = svc.remove_next_event_timer().unwrap().unwrap();
    assert_eq!(fired.key, "a");
    assert_eq!(fired.window, w);
    assert_eq!(fired.timestamp, 9);
    assert!(svc.is_empty());
}

#[test]
fn test_timers_fire_in_ascending_order_trigger_before_gc() {
    let mut svc = InMemoryTimerService::<String>::new();
    let w = TimeWindow::new(0, 10);
    svc.set_timer(timer("a", w.clone(), 9, TimerId::GarbageCollection)).unwrap();
    svc.set_timer(timer("a", w.clone(), 9, TimerId::TriggerWakeup)).unwrap();
    svc.set_timer(timer("b", w.clone(), 3, TimerId::TriggerWakeup)).unwrap();

    svc.advance_input_watermark(100);
    let mut fired = Vec::new();
    while let Some(t) = svc.remove_next_event_timer().unwrap() {
        fired.push((t.key, t.timestamp, t.id));
    }
    assert_eq!(
        fired,
        vec![
            ("b".to_string(), 3, TimerId::TriggerWakeup),
            ("a".to_string(), 9, TimerId::TriggerWakeup),
            ("a".to_string(), 9, TimerId::GarbageCollection),
        ]
    );
}

#[test]
fn test_delete_cancels_timer() {
    let mut svc = InMemoryTimerService::<String>::new();
    let t = timer("a", TimeWindow::new(0, 10), 9, TimerId::TriggerWakeup);
    svc.set_timer(t.clone()).unwrap();
    assert!(svc.contains(&t).unwrap());

    svc.delete_timer(&t).unwrap();
    assert!(!svc.contains(&t).unwrap());
    svc.advance_input_watermark(EVENT_TIME_MAX);
    assert_eq!(svc.remove_next_event_timer().unwrap(), None);
}

#[test]
fn test_set_timer_idempotent() {
    let mut svc = InMemoryTimerService::<String>::new();
    let t = timer("a", TimeWindow::new(0, 10), 9, TimerId::TriggerWakeup);
    svc.set_timer(t.clone()).unwrap();
    svc.set_timer(t).unwrap();
    assert_eq!(svc.len(), 1);
}

#[test]
fn test_processing_timers_fire_at_deadline() {
    let mut svc = InMemoryTimerService::<String>::new();
    let mut t = timer("a", TimeWindow::new(0, 10), 500, TimerId::TriggerWakeup);
    t.domain = TimeDomain::ProcessingTime;
    svc.set_timer(t.clone()).unwrap();

    // Event-time progress never fires processing-time timers.
    svc.advance_input_watermark(EVENT_TIME_MAX);
    assert_eq!(svc.remove_next_event_timer().unwrap(), None);

    svc.advance_processing_time(499);
    assert_eq!(svc.remove_next_processing_timer().unwrap(), None);
    svc.advance_processing_time(500);
    assert_eq!(svc.remove_next_processing_timer().unwrap(), Some(t));
}

#[test]
fn test_clocks_never_regress() {
    let mut svc = InMemoryTimerService::<String>::new();
    assert!(svc.advance_input_watermark(100));
    assert!(!svc.advance_input_watermark(50));
    assert_eq!(svc.current_input_watermark(), 100);

    assert!(svc.advance_processing_time(7));
    assert!(!svc.advance_processing_time(7));
    assert_eq!(svc.current_processing_time(), 7);
}

#[test]
fn test_next_timer_reports_earliest() {
    let mut svc = InMemoryTimerService::<String>::new();
    assert_eq!(svc.next_timer(TimeDomain::EventTime), None);
    svc.set_timer(timer("a", TimeWindow::new(0, 10), 30, TimerId::TriggerWakeup)).unwrap();
    svc.set_timer(timer("b", TimeWindow::new(0, 10), 20, TimerId::GarbageCollection)).unwrap();
    assert_eq!(svc.next_timer(TimeDomain::EventTime), Some(20));
}
