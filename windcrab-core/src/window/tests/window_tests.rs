use super::*;

fn active(windows: &[(i64, i64)]) -> BTreeSet<TimeWindow> {
    windows.iter().map(|(s, e)| TimeWindow::new(*s, *e)).collect()
}

// ── TimeWindow ────────────────────────────────────────────────────────────

#[test]
fn test_time_window_contains_half_open() {
    let w = TimeWindow::new(0, 10_000);
    assert!(w.contains(0));
    assert!(w.contains(5_000));
    assert!(!w.contains(10_000)); // end is exclusive
}

#[test]
fn test_time_window_max_timestamp() {
    let w = TimeWindow::new(0, 10_000);
    assert_eq!(w.max_timestamp(), 9_999);
}

#[test]
fn test_time_window_overlaps_or_abuts() {
    let w = TimeWindow::new(0, 5);
    assert!(w.overlaps_or_abuts(&TimeWindow::new(3, 8)));
    assert!(w.overlaps_or_abuts(&TimeWindow::new(5, 8))); // touching
    assert!(!w.overlaps_or_abuts(&TimeWindow::new(6, 8)));
    assert_eq!(w.span(&TimeWindow::new(6, 8)), TimeWindow::new(0, 8));
}

#[test]
fn test_global_window_display() {
    assert_eq!(TimeWindow::global().to_string(), "GlobalWindow");
    assert_eq!(TimeWindow::new(0, 10).to_string(), "TimeWindow([0, 10))");
}

// ── Timestamp validation ──────────────────────────────────────────────────

#[test]
fn test_timestamp_bounds_reject_sentinels() {
    let bounds = TimestampBounds::default();
    assert_eq!(bounds.validate(0), Ok(0));
    assert_eq!(bounds.validate(TIMESTAMP_MAX_VALUE), Ok(TIMESTAMP_MAX_VALUE));
    assert!(matches!(
        bounds.validate(EVENT_TIME_MAX),
        Err(WindowingError::InvalidTimestamp { timestamp, .. }) if timestamp == EVENT_TIME_MAX
    ));
    assert!(bounds.validate(EVENT_TIME_MIN).is_err());
}

#[test]
fn test_timestamp_bounds_custom_range() {
    let bounds = TimestampBounds::new(0, 100);
    assert!(bounds.validate(-1).is_err());
    assert!(bounds.validate(101).is_err());
    assert_eq!(bounds.validate(100), Ok(100));
}

// ── Tumbling ──────────────────────────────────────────────────────────────

#[test]
fn test_tumbling_assigns_correct_window() {
    let assigner = TumblingWindows::of(Duration::from_secs(10));
    // timestamp 3s falls in [0, 10s)
    let wins = assigner.assign_windows(&(), 3_000);
    assert_eq!(wins, vec![TimeWindow::new(0, 10_000)]);
    // timestamp 10s falls in [10s, 20s)
    let wins = assigner.assign_windows(&(), 10_000);
    assert_eq!(wins, vec![TimeWindow::new(10_000, 20_000)]);
}

#[test]
fn test_tumbling_negative_timestamps() {
    let assigner = TumblingWindows::of(Duration::from_millis(10));
    assert_eq!(assigner.assign_windows(&(), -1), vec![TimeWindow::new(-10, 0)]);
    assert_eq!(assigner.assign_windows(&(), -10), vec![TimeWindow::new(-10, 0)]);
}

#[test]
fn test_tumbling_with_offset() {
    let assigner = TumblingWindows::of(Duration::from_millis(10)).with_offset(Duration::from_millis(3));
    assert_eq!(assigner.assign_windows(&(), 2), vec![TimeWindow::new(-7, 3)]);
    assert_eq!(assigner.assign_windows(&(), 3), vec![TimeWindow::new(3, 13)]);
}

#[test]
fn test_huge_offset_wraps_within_size() {
    // i64::MAX % 10 == 7
    let assigner = TumblingWindows::of(Duration::from_millis(10)).with_offset(Duration::MAX);
    assert_eq!(assigner.assign_windows(&(), 8), vec![TimeWindow::new(7, 17)]);

    let sliding = SlidingWindows::of(Duration::from_millis(10), Duration::from_millis(5))
        .with_offset(Duration::MAX);
    // i64::MAX % 5 == 2
    assert_eq!(
        sliding.assign_windows(&(), 8),
        vec![TimeWindow::new(7, 17), TimeWindow::new(2, 12)]
    );
}

#[test]
fn test_tumbling_is_not_merging() {
    let tumbling = TumblingWindows::of(Duration::from_secs(10));
    assert!(!<TumblingWindows as WindowAssigner<()>>::is_merging(&tumbling));
    let existing = active(&[(0, 10_000)]);
    let result = <TumblingWindows as WindowAssigner<()>>::merge_windows(
        &tumbling,
        &existing,
        &TimeWindow::new(0, 10_000),
    );
    assert!(result.is_identity());
}

// ── Sliding ───────────────────────────────────────────────────────────────

#[test]
fn test_sliding_element_in_multiple_windows() {
    // size=10s, period=5s -> each element belongs to 2 windows
    let assigner = SlidingWindows::of(Duration::from_secs(10), Duration::from_secs(5));
    let wins = assigner.assign_windows(&(), 7_000);
    assert_eq!(
        wins,
        vec![TimeWindow::new(5_000, 15_000), TimeWindow::new(0, 10_000)]
    );
    for w in &wins {
        assert!(w.contains(7_000), "{w} should contain 7000ms");
    }
}

#[test]
fn test_sliding_windows_cover_timestamp() {
    // size=15s, period=5s -> each element belongs to 3 windows
    let assigner = SlidingWindows::of(Duration::from_secs(15), Duration::from_secs(5));
    let wins = assigner.assign_windows(&(), 12_000);
    assert_eq!(wins.len(), 3);
}

// ── Session ───────────────────────────────────────────────────────────────

#[test]
fn test_session_assigns_gap_window() {
    let assigner = SessionWindows::with_gap(Duration::from_secs(5));
    let wins = assigner.assign_windows(&(), 10_000);
    assert_eq!(wins, vec![TimeWindow::new(10_000, 15_000)]);
    assert!(<SessionWindows as WindowAssigner<()>>::is_merging(&assigner));
}

#[test]
fn test_session_merge_with_no_overlap_is_identity() {
    let existing = active(&[(0, 5)]);
    let result = merge_overlapping(&existing, &TimeWindow::new(10, 15));
    assert_eq!(result, MergeResult::identity(TimeWindow::new(10, 15)));
}

#[test]
fn test_session_merge_overlapping_windows() {
    let existing = active(&[(0, 5)]);
    let result = merge_overlapping(&existing, &TimeWindow::new(3, 8));
    assert_eq!(result.surviving, TimeWindow::new(0, 8));
    assert_eq!(result.merged_away, vec![TimeWindow::new(0, 5)]);
}

#[test]
fn test_session_merge_abutting_windows() {
    let existing = active(&[(0, 5)]);
    let result = merge_overlapping(&existing, &TimeWindow::new(5, 10));
    assert_eq!(result.surviving, TimeWindow::new(0, 10));
}

#[test]
fn test_session_merge_bridges_two_sessions() {
    // A new element between two sessions joins them into one.
    let existing = active(&[(0, 5), (9, 14), (30, 35)]);
    let result = merge_overlapping(&existing, &TimeWindow::new(4, 9));
    assert_eq!(result.surviving, TimeWindow::new(0, 14));
    assert_eq!(
        result.merged_away,
        vec![TimeWindow::new(0, 5), TimeWindow::new(9, 14)]
    );
}

#[test]
fn test_session_merge_reaches_fixed_point() {
    // Joining (8, 12) grows the window to reach (12, 16), then (16, 20).
    let existing = active(&[(12, 16), (16, 20), (40, 50)]);
    let result = merge_overlapping(&existing, &TimeWindow::new(8, 12));
    assert_eq!(result.surviving, TimeWindow::new(8, 20));
    assert_eq!(result.merged_away.len(), 2);
}

#[test]
fn test_session_merge_contained_window_keeps_existing() {
    let existing = active(&[(0, 20)]);
    let result = merge_overlapping(&existing, &TimeWindow::new(5, 10));
    assert_eq!(result.surviving, TimeWindow::new(0, 20));
    assert!(result.merged_away.is_empty());
}

// ── Global / Custom ───────────────────────────────────────────────────────

#[test]
fn test_global_single_all_time_window() {
    let assigner = GlobalWindows::new();
    let wins = assigner.assign_windows(&(), 999_999_999);
    assert_eq!(wins, vec![TimeWindow::new(EVENT_TIME_MIN, EVENT_TIME_MAX)]);
}

#[test]
fn test_custom_windows_use_element() {
    let assigner = CustomWindows::new(|len: &usize, ts: EventTime| {
        vec![TimeWindow::new(ts, ts + *len as i64)]
    });
    assert_eq!(assigner.assign_windows(&4, 10), vec![TimeWindow::new(10, 14)]);
}
