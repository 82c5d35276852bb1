//! Session windows: activity bursts separated by a gap merge into one window,
//! and a late element can bridge two sessions after the fact.

use std::time::Duration;

use windcrab_core::combine::ToList;
use windcrab_core::runner::{LocalHarness, WindowingStrategy};
use windcrab_core::types::WindowedValue;
use windcrab_core::window::SessionWindows;

fn main() -> anyhow::Result<()> {
    let strategy = WindowingStrategy::new(SessionWindows::with_gap(Duration::from_secs(5)))
        .with_allowed_lateness(Duration::from_secs(30));
    let mut harness = LocalHarness::new(strategy, ToList);

    let clicks = [
        ("alice", "home", 0),
        ("alice", "search", 2_000),
        ("bob", "home", 3_000),
        ("alice", "cart", 12_000),
        ("bob", "checkout", 30_000),
    ];
    for (user, page, ts) in clicks {
        harness.process(WindowedValue::timestamped((user.to_string(), page.to_string()), ts))?;
    }
    for window in harness.runner().active_windows(&"alice".to_string())? {
        println!("alice session before bridging: {window}");
    }

    // Lands in the gap between alice's two sessions and merges them.
    harness.process(WindowedValue::timestamped(("alice".to_string(), "product".to_string()), 7_000))?;
    for window in harness.runner().active_windows(&"alice".to_string())? {
        println!("alice session after bridging: {window}");
    }

    for pane in harness.finish()? {
        println!("{} {}: {:?}", pane.key, pane.window, pane.value);
    }

    Ok(())
}
