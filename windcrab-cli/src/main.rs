use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use windcrab_core::combine::{CombineFn, SumI64, ToList};
use windcrab_core::runner::{
    ClosingBehavior, LocalHarness, OnTimeBehavior, TimestampCombiner, WindowedPane,
    WindowingStrategy,
};
use windcrab_core::types::{StreamData, WindowedValue};

mod script;

use script::{Script, Step, WindowShape, parse_trigger};

#[derive(Parser, Debug)]
#[command(name = "windcrab")]
#[command(about = "Replay an event script through the windowing engine", long_about = None)]
struct Cli {
    /// JSON event script, or `-` for stdin.
    script: PathBuf,
    /// tumbling:SIZE, sliding:SIZE:PERIOD, session:GAP or global (milliseconds).
    #[arg(long, default_value = "tumbling:10000")]
    window: WindowShape,
    /// Trigger expression, e.g. `watermark.early(repeat(count:2)).late(count:1)`.
    /// Overrides the script's trigger.
    #[arg(long)]
    trigger: Option<String>,
    #[arg(long, default_value_t = 0)]
    allowed_lateness_ms: u64,
    /// Keep accumulating across panes instead of discarding after each firing.
    #[arg(long)]
    accumulating: bool,
    #[arg(long, value_enum, default_value_t = CombinerArg::EndOfWindow)]
    timestamp_combiner: CombinerArg,
    /// Emit the final pane at garbage collection even if it is empty.
    #[arg(long)]
    fire_empty_final: bool,
    /// Suppress the on-time pane when nothing arrived since the last one.
    #[arg(long)]
    skip_empty_on_time: bool,
    /// Drop a window's state as soon as its trigger finishes.
    #[arg(long)]
    discard_finished: bool,
    #[arg(long, value_enum, default_value_t = Combine::Sum)]
    combine: Combine,
    /// Print panes as JSON lines.
    #[arg(long)]
    json: bool,
    /// Raise the default log level (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CombinerArg {
    EndOfWindow,
    Earliest,
    Latest,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Combine {
    Sum,
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let raw = if cli.script.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("read script from stdin")?;
        buf
    } else {
        std::fs::read(&cli.script)
            .with_context(|| format!("read script {}", cli.script.display()))?
    };
    let script = Script::parse(&raw)?;
    let strategy = build_strategy(&cli, &script)?;
    tracing::info!(
        "replaying {} steps, window {:?}, trigger {}",
        script.steps.len(),
        cli.window,
        strategy.trigger
    );

    match cli.combine {
        Combine::Sum => replay(strategy, SumI64, &script, cli.json),
        Combine::List => replay(strategy, ToList, &script, cli.json),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "windcrab=info,windcrab_core=info",
        1 => "windcrab=debug,windcrab_core=debug",
        _ => "windcrab=trace,windcrab_core=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_strategy(cli: &Cli, script: &Script) -> Result<WindowingStrategy<i64>> {
    let trigger = match (&cli.trigger, &script.trigger) {
        (Some(expr), _) => parse_trigger(expr).context("invalid --trigger")?,
        (None, Some(trigger)) => trigger.clone(),
        (None, None) => Default::default(),
    };
    let mut strategy = cli
        .window
        .strategy()
        .with_trigger(trigger)
        .with_allowed_lateness(Duration::from_millis(cli.allowed_lateness_ms))
        .with_timestamp_combiner(match cli.timestamp_combiner {
            CombinerArg::EndOfWindow => TimestampCombiner::EndOfWindow,
            CombinerArg::Earliest => TimestampCombiner::Earliest,
            CombinerArg::Latest => TimestampCombiner::Latest,
        })
        .with_discarding_finished_windows(cli.discard_finished);
    if cli.accumulating {
        strategy = strategy.accumulating();
    }
    if cli.fire_empty_final {
        strategy = strategy.with_closing_behavior(ClosingBehavior::FireAlways);
    }
    if cli.skip_empty_on_time {
        strategy = strategy.with_on_time_behavior(OnTimeBehavior::FireIfNonEmpty);
    }
    Ok(strategy)
}

fn replay<ACC, OUT, CF>(
    strategy: WindowingStrategy<i64>,
    combine_fn: CF,
    script: &Script,
    json: bool,
) -> Result<()>
where
    ACC: StreamData,
    OUT: std::fmt::Debug + Serialize,
    CF: CombineFn<i64, ACC, OUT>,
{
    let mut harness = LocalHarness::new(strategy, combine_fn);
    for (index, step) in script.steps.iter().enumerate() {
        let panes = match step {
            Step::Element(element) => {
                let mut value =
                    WindowedValue::timestamped((element.key.clone(), element.value), element.timestamp);
                if let Some(id) = element.id {
                    value = value.with_id(id);
                }
                harness.process(value)
            }
            Step::Watermark(watermark) => harness.advance_watermark(*watermark),
            Step::ProcessingTime(now) => harness.advance_processing_time(*now),
        }
        .with_context(|| format!("step {index} ({step:?})"))?;
        print_panes(&panes, json)?;
    }
    print_panes(&harness.finish()?, json)?;

    tracing::info!(
        "dropped {} late element(s), {} for closed windows",
        harness.dropped_due_to_lateness(),
        harness.dropped_due_to_closed_window()
    );
    Ok(())
}

fn print_panes<OUT>(panes: &[WindowedPane<String, OUT>], json: bool) -> Result<()>
where
    OUT: std::fmt::Debug + Serialize,
{
    for pane in panes {
        if json {
            println!("{}", serde_json::to_string(pane).context("encode pane")?);
        } else {
            println!("{pane}");
        }
    }
    Ok(())
}
