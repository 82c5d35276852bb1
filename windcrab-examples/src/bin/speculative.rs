//! Early, on-time and late panes for one window, with a processing-time
//! trigger providing the speculative results.

use std::time::Duration;

use windcrab_core::combine::SumI64;
use windcrab_core::runner::{LocalHarness, WindowingStrategy};
use windcrab_core::trigger::Trigger;
use windcrab_core::types::WindowedValue;
use windcrab_core::window::TumblingWindows;

fn main() -> anyhow::Result<()> {
    let trigger = Trigger::after_watermark()
        .with_early_firings(Trigger::after_processing_time(Duration::from_millis(500)))
        .with_late_firings(Trigger::after_count(1));
    let strategy = WindowingStrategy::new(TumblingWindows::of(Duration::from_secs(60)))
        .with_trigger(trigger)
        .with_allowed_lateness(Duration::from_secs(120))
        .accumulating();
    println!("trigger: {}", strategy.trigger);
    let mut harness = LocalHarness::new(strategy, SumI64);

    let order = |amount: i64, ts: i64| WindowedValue::timestamped(("orders".to_string(), amount), ts);
    let mut panes = Vec::new();

    harness.advance_processing_time(0)?;
    panes.extend(harness.process(order(20, 5_000))?);
    panes.extend(harness.process(order(15, 20_000))?);
    panes.extend(harness.advance_processing_time(500)?);
    panes.extend(harness.process(order(40, 45_000))?);
    panes.extend(harness.advance_processing_time(1_000)?);
    panes.extend(harness.advance_watermark(60_000)?);
    panes.extend(harness.process(order(5, 30_000))?);
    panes.extend(harness.finish()?);

    for pane in &panes {
        println!(
            "pane #{} {:?} total={} ts={}{}",
            pane.pane.index,
            pane.pane.timing,
            pane.value,
            pane.timestamp,
            if pane.pane.is_last { " (final)" } else { "" }
        );
    }

    Ok(())
}
