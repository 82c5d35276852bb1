use std::time::Duration;

use windcrab_core::combine::SumI64;
use windcrab_core::runner::{LocalHarness, WindowingStrategy};
use windcrab_core::time::{BoundedOutOfOrderness, WatermarkGenerator};
use windcrab_core::types::WindowedValue;
use windcrab_core::window::TumblingWindows;

fn main() -> anyhow::Result<()> {
    // (user, ts_ms, value)
    let events: Vec<(&str, i64, i64)> = vec![
        ("u1", 1_000, 1),
        ("u2", 2_500, 7),
        ("u1", 9_000, 2),
        // Out of order but within the 2s delay.
        ("u1", 8_000, 3),
        // Advances the watermark to 10_000, closing [0, 10_000).
        ("u1", 12_000, 10),
        // Behind the watermark by more than the allowed lateness: dropped.
        ("u2", 4_000, 100),
    ];

    let strategy = WindowingStrategy::new(TumblingWindows::of(Duration::from_secs(10)));
    let mut harness = LocalHarness::new(strategy, SumI64);
    let mut watermarks = BoundedOutOfOrderness::new(Duration::from_secs(2));

    let mut panes = Vec::new();
    for (user, ts, value) in events {
        panes.extend(harness.process(WindowedValue::timestamped((user.to_string(), value), ts))?);
        if let Some(wm) = watermarks.on_event(ts) {
            panes.extend(harness.advance_watermark(wm.timestamp)?);
        }
    }
    panes.extend(harness.finish()?);

    for pane in &panes {
        println!(
            "ts={} key={} window=[{}, {}) sum={} ({:?})",
            pane.timestamp, pane.key, pane.window.start, pane.window.end, pane.value, pane.pane.timing
        );
    }
    println!("dropped late: {}", harness.dropped_due_to_lateness());

    Ok(())
}
