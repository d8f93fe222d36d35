//! `delay`: suspend the run for a bounded time.

use std::time::Duration;

use nodeflow_types::graph::Record;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ExecutionContext;

use super::value::{lenient_number, lenient_string, number_value};
use super::{extend, parse_config, StepError, StepExecutor, StepResult};

/// Upper bound on a single delay.
pub const MAX_DELAY_MS: f64 = 30_000.0;

const DEFAULT_DURATION: f64 = 1000.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DelaySettings {
    #[serde(deserialize_with = "lenient_number")]
    duration: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    unit: String,
}

impl DelaySettings {
    fn millis(&self) -> f64 {
        let duration = self
            .duration
            .filter(|d| *d != 0.0)
            .unwrap_or(DEFAULT_DURATION);
        let scaled = match self.unit.as_str() {
            "s" => duration * 1000.0,
            "m" => duration * 60.0 * 1000.0,
            _ => duration,
        };
        scaled.clamp(0.0, MAX_DELAY_MS)
    }
}

/// Waits `duration` (`ms`, `s` or `m`), capped at 30 seconds, then passes
/// the input through with `delayed` and `delayMs`.
pub struct DelayStep;

impl StepExecutor for DelayStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: DelaySettings = parse_config(config)?;
        let ms = settings.millis();

        tokio::time::sleep(Duration::from_secs_f64(ms / 1000.0)).await;

        Ok(StepResult::new(extend(
            input,
            [("delayed", Value::Bool(true)), ("delayMs", number_value(ms))],
        )))
    }
}
