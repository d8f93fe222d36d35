//! Trigger node types.
//!
//! Entry-point triggers are seeded by the engine with the trigger payload
//! and never reach these executors. They only run when wired as a
//! downstream hop (or, for schedule/error triggers, when not configured
//! as entry types).

use nodeflow_types::graph::Record;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ExecutionContext;

use super::value::lenient_string;
use super::{extend, or_default, parse_config, timestamp, StepError, StepExecutor, StepResult};

/// `webhookTrigger`: identity pass-through.
pub struct WebhookTriggerStep;

impl StepExecutor for WebhookTriggerStep {
    async fn execute(
        &self,
        _config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        Ok(StepResult::new(input.clone()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScheduleSettings {
    #[serde(deserialize_with = "lenient_string")]
    cron: String,
    #[serde(deserialize_with = "lenient_string")]
    timezone: String,
}

/// `scheduleTrigger`: records that a schedule fired. Scheduling itself
/// happens outside the engine.
pub struct ScheduleTriggerStep;

impl StepExecutor for ScheduleTriggerStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: ScheduleSettings = parse_config(config)?;
        Ok(StepResult::new(extend(
            input,
            [
                ("trigger", Value::from("schedule")),
                ("cron", Value::from(or_default(&settings.cron, "* * * * *"))),
                ("timezone", Value::from(or_default(&settings.timezone, "UTC"))),
                ("triggeredAt", Value::from(timestamp())),
            ],
        )))
    }
}

/// `errorTrigger`: marks the record as handled by an error branch.
pub struct ErrorTriggerStep;

impl StepExecutor for ErrorTriggerStep {
    async fn execute(
        &self,
        _config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        Ok(StepResult::new(extend(
            input,
            [
                ("isErrorHandler", Value::Bool(true)),
                ("handledAt", Value::from(timestamp())),
            ],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Uuid::now_v7(), Uuid::now_v7())
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn webhook_passes_input_through() {
        let input = record(json!({"body": {"a": 1}}));
        let result = WebhookTriggerStep
            .execute(&Record::new(), &input, &ctx())
            .await
            .unwrap();
        assert_eq!(result.output, input);
    }

    #[tokio::test]
    async fn schedule_adds_metadata_with_defaults() {
        let input = record(json!({"x": 1}));
        let result = ScheduleTriggerStep
            .execute(&Record::new(), &input, &ctx())
            .await
            .unwrap();
        let out = result.output;
        assert_eq!(out["x"], json!(1));
        assert_eq!(out["trigger"], json!("schedule"));
        assert_eq!(out["cron"], json!("* * * * *"));
        assert_eq!(out["timezone"], json!("UTC"));
        assert!(out["triggeredAt"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn schedule_uses_configured_cron() {
        let config = record(json!({"cron": "0 9 * * 1", "timezone": "Europe/Berlin"}));
        let result = ScheduleTriggerStep
            .execute(&config, &Record::new(), &ctx())
            .await
            .unwrap();
        assert_eq!(result.output["cron"], json!("0 9 * * 1"));
        assert_eq!(result.output["timezone"], json!("Europe/Berlin"));
    }

    #[tokio::test]
    async fn error_trigger_marks_handled() {
        let input = record(json!({"error": "boom"}));
        let result = ErrorTriggerStep
            .execute(&Record::new(), &input, &ctx())
            .await
            .unwrap();
        assert_eq!(result.output["error"], json!("boom"));
        assert_eq!(result.output["isErrorHandler"], json!(true));
        assert!(result.output.contains_key("handledAt"));
    }
}
