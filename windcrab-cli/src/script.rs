use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use windcrab_core::runner::WindowingStrategy;
use windcrab_core::trigger::Trigger;
use windcrab_core::types::{ElementId, EventTime};
use windcrab_core::window::{GlobalWindows, SessionWindows, SlidingWindows, TumblingWindows};

/// A replayable sequence of harness calls.
///
/// ```json
/// {
///   "steps": [
///     { "element": { "key": "a", "value": 3, "timestamp": 5 } },
///     { "watermark": 10 },
///     { "processing_time": 1000 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Trigger tree used when `--trigger` is not given.
    #[serde(default)]
    pub trigger: Option<Trigger>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Element(ScriptElement),
    Watermark(EventTime),
    ProcessingTime(EventTime),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptElement {
    pub key: String,
    pub value: i64,
    pub timestamp: EventTime,
    #[serde(default)]
    pub id: Option<ElementId>,
}

impl Script {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let script: Script = serde_json::from_slice(bytes).context("parse event script")?;
        if let Some(trigger) = &script.trigger {
            trigger.validate().context("invalid script trigger")?;
        }
        Ok(script)
    }
}

// ── Window shape ──────────────────────────────────────────────────────────────

/// `tumbling:SIZE`, `sliding:SIZE:PERIOD`, `session:GAP` or `global`, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowShape {
    Tumbling(u64),
    Sliding(u64, u64),
    Session(u64),
    Global,
}

impl WindowShape {
    /// A default strategy over this window shape.
    pub fn strategy(&self) -> WindowingStrategy<i64> {
        let ms = Duration::from_millis;
        match *self {
            WindowShape::Tumbling(size) => WindowingStrategy::new(TumblingWindows::of(ms(size))),
            WindowShape::Sliding(size, period) => {
                WindowingStrategy::new(SlidingWindows::of(ms(size), ms(period)))
            }
            WindowShape::Session(gap) => WindowingStrategy::new(SessionWindows::with_gap(ms(gap))),
            WindowShape::Global => WindowingStrategy::new(GlobalWindows::new()),
        }
    }
}

impl FromStr for WindowShape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let millis = |part: &str| -> Result<u64> {
            let value: u64 = part
                .parse()
                .with_context(|| format!("invalid duration '{part}' in window '{s}'"))?;
            if value == 0 {
                bail!("window durations must be positive in '{s}'");
            }
            Ok(value)
        };
        match parts.as_slice() {
            ["tumbling", size] => Ok(WindowShape::Tumbling(millis(size)?)),
            ["sliding", size, period] => Ok(WindowShape::Sliding(millis(size)?, millis(period)?)),
            ["session", gap] => Ok(WindowShape::Session(millis(gap)?)),
            ["global"] => Ok(WindowShape::Global),
            _ => bail!(
                "unknown window '{s}', expected tumbling:SIZE, sliding:SIZE:PERIOD, session:GAP or global"
            ),
        }
    }
}

// ── Trigger expressions ───────────────────────────────────────────────────────

/// Parse a trigger expression.
///
/// Atoms are `default`, `watermark`, `never`, `count:N` and `processing:MS`.
/// `repeat(T)`, `all(T, ...)`, `first(T, ...)` and `each(T, ...)` combine them,
/// and `.early(T)`, `.late(T)` and `.until(T)` decorate the preceding trigger:
///
/// `watermark.early(repeat(count:2)).late(count:1)`
pub fn parse_trigger(input: &str) -> Result<Trigger> {
    let mut parser = TriggerParser { input, pos: 0 };
    let trigger = parser.trigger()?;
    parser.skip_whitespace();
    if parser.pos != input.len() {
        bail!("unexpected '{}' in trigger '{input}'", &input[parser.pos..]);
    }
    Ok(trigger)
}

struct TriggerParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TriggerParser<'a> {
    fn trigger(&mut self) -> Result<Trigger> {
        let mut trigger = self.atom()?;
        while self.eat('.') {
            let modifier = self.word();
            let argument = self.parenthesised()?;
            trigger = match modifier {
                "early" => {
                    require_watermark(&trigger, modifier)?;
                    trigger.with_early_firings(argument)
                }
                "late" => {
                    require_watermark(&trigger, modifier)?;
                    trigger.with_late_firings(argument)
                }
                "until" => trigger.or_finally(argument),
                other => bail!("unknown trigger modifier '{other}'"),
            };
        }
        Ok(trigger)
    }

    fn atom(&mut self) -> Result<Trigger> {
        let name = self.word();
        match name {
            "default" => Ok(Trigger::default()),
            "watermark" => Ok(Trigger::after_watermark()),
            "never" => Ok(Trigger::never()),
            "count" => Ok(Trigger::after_count(self.number()?)),
            "processing" => Ok(Trigger::after_processing_time(Duration::from_millis(
                self.number()?,
            ))),
            "repeat" => Ok(Trigger::repeatedly(self.parenthesised()?)),
            "all" => Ok(Trigger::after_all(self.list()?)),
            "first" => Ok(Trigger::after_first(self.list()?)),
            "each" => Ok(Trigger::after_each(self.list()?)),
            "" => bail!("expected a trigger at offset {} of '{}'", self.pos, self.input),
            other => bail!("unknown trigger '{other}'"),
        }
    }

    fn number(&mut self) -> Result<u64> {
        if !self.eat(':') {
            bail!("expected ':N' at offset {} of '{}'", self.pos, self.input);
        }
        let digits = self.word();
        digits
            .parse()
            .with_context(|| format!("invalid number '{digits}' in trigger '{}'", self.input))
    }

    fn parenthesised(&mut self) -> Result<Trigger> {
        self.expect('(')?;
        let trigger = self.trigger()?;
        self.expect(')')?;
        Ok(trigger)
    }

    fn list(&mut self) -> Result<Vec<Trigger>> {
        self.expect('(')?;
        let mut triggers = vec![self.trigger()?];
        while self.eat(',') {
            triggers.push(self.trigger()?);
        }
        self.expect(')')?;
        Ok(triggers)
    }

    fn word(&mut self) -> &'a str {
        self.skip_whitespace();
        let input = self.input;
        let start = self.pos;
        let rest = &input[start..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += len;
        &input[start..self.pos]
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.input[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(anyhow!(
                "expected '{c}' at offset {} of '{}'",
                self.pos,
                self.input
            ))
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }
}

fn require_watermark(trigger: &Trigger, modifier: &str) -> Result<()> {
    match trigger {
        Trigger::AfterWatermark { .. } => Ok(()),
        other => bail!(".{modifier}(...) only applies to watermark, not {other}"),
    }
}

#[cfg(test)]
mod tests {
    use windcrab_core::error::WindowingError;

    use super::*;

    #[test]
    fn test_window_specs() {
        assert_eq!("tumbling:10".parse::<WindowShape>().unwrap(), WindowShape::Tumbling(10));
        assert_eq!(
            "sliding:10:5".parse::<WindowShape>().unwrap(),
            WindowShape::Sliding(10, 5)
        );
        assert_eq!("session:30".parse::<WindowShape>().unwrap(), WindowShape::Session(30));
        assert_eq!("global".parse::<WindowShape>().unwrap(), WindowShape::Global);
        assert!("tumbling:0".parse::<WindowShape>().is_err());
        assert!("hopping:10".parse::<WindowShape>().is_err());
    }

    #[test]
    fn test_parse_atoms() {
        assert_eq!(parse_trigger("default").unwrap(), Trigger::default());
        assert_eq!(parse_trigger("count:3").unwrap(), Trigger::after_count(3));
        assert_eq!(
            parse_trigger("processing:250").unwrap(),
            Trigger::after_processing_time(Duration::from_millis(250))
        );
        assert_eq!(parse_trigger(" never ").unwrap(), Trigger::never());
    }

    #[test]
    fn test_parse_speculative_watermark() {
        let parsed = parse_trigger("watermark.early(repeat(count:2)).late(count:1)").unwrap();
        let expected = Trigger::after_watermark()
            .with_early_firings(Trigger::repeatedly(Trigger::after_count(2)))
            .with_late_firings(Trigger::after_count(1));
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_composites() {
        let parsed = parse_trigger("first(count:5, processing:100).until(watermark)").unwrap();
        let expected = Trigger::after_first(vec![
            Trigger::after_count(5),
            Trigger::after_processing_time(Duration::from_millis(100)),
        ])
        .or_finally(Trigger::after_watermark());
        assert_eq!(parsed, expected);

        let parsed = parse_trigger("each(count:1, all(count:2, watermark))").unwrap();
        assert_eq!(
            parsed,
            Trigger::after_each(vec![
                Trigger::after_count(1),
                Trigger::after_all(vec![Trigger::after_count(2), Trigger::after_watermark()]),
            ])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_trigger("").is_err());
        assert!(parse_trigger("count").is_err());
        assert!(parse_trigger("count:x").is_err());
        assert!(parse_trigger("repeat(count:1").is_err());
        assert!(parse_trigger("count:1.early(count:1)").is_err());
        assert!(parse_trigger("watermark extra").is_err());
    }

    #[test]
    fn test_script_json() {
        let script = Script::parse(
            br#"{
                "trigger": {"AfterCount": 2},
                "steps": [
                    {"element": {"key": "a", "value": 3, "timestamp": 5, "id": 7}},
                    {"watermark": 10},
                    {"processing_time": 1000}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(script.trigger, Some(Trigger::after_count(2)));
        assert_eq!(script.steps.len(), 3);
        match &script.steps[0] {
            Step::Element(e) => {
                assert_eq!(e.key, "a");
                assert_eq!(e.id, Some(7));
            }
            other => panic!("expected element, got {other:?}"),
        }
        assert!(matches!(script.steps[1], Step::Watermark(10)));
        assert!(matches!(script.steps[2], Step::ProcessingTime(1000)));
    }

    #[test]
    fn test_script_rejects_zero_count_trigger() {
        let err = Script::parse(
            br#"{"trigger": {"Repeatedly": {"AfterCount": 0}}, "steps": []}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WindowingError>(),
            Some(WindowingError::InvalidTrigger { .. })
        ));

        let err = Script::parse(br#"{"trigger": {"AfterAll": []}, "steps": []}"#).unwrap_err();
        assert!(format!("{err:#}").contains("at least one child"));
    }
}
