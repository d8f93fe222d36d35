//! Notification node types: `emailSend` (simulated) and `log`.

use nodeflow_types::graph::Record;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ExecutionContext;

use super::value::{lenient_string, lookup_path, render_fields, replace_tokens, to_display_string, TokenSyntax};
use super::{extend, or_default, parse_config, timestamp, StepError, StepExecutor, StepResult};

// ---------------------------------------------------------------------------
// emailSend
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmailSettings {
    #[serde(deserialize_with = "lenient_string")]
    to: String,
    #[serde(deserialize_with = "lenient_string")]
    subject: String,
    #[serde(deserialize_with = "lenient_string")]
    body: String,
}

/// `emailSend`: renders the message and records it as sent. No mail is
/// delivered.
pub struct EmailSendStep;

impl StepExecutor for EmailSendStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: EmailSettings = parse_config(config)?;
        let to = render_fields(&settings.to, input);
        let subject = render_fields(&settings.subject, input);
        let body = render_fields(&settings.body, input);

        tracing::info!(
            execution_id = %ctx.execution_id(),
            to = %to,
            subject = %subject,
            "email send simulated"
        );

        Ok(StepResult::new(extend(
            input,
            [
                ("emailSent", Value::Bool(true)),
                ("emailTo", Value::from(to)),
                ("emailSubject", Value::from(subject)),
                ("emailBody", Value::from(body)),
                ("sentAt", Value::from(timestamp())),
            ],
        )))
    }
}

// ---------------------------------------------------------------------------
// log
// ---------------------------------------------------------------------------

/// Token that renders the whole input record as JSON.
const WHOLE_INPUT_TOKEN: &str = "input";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogSettings {
    #[serde(deserialize_with = "lenient_string")]
    message: String,
}

/// Render a log template; `{{input}}` is the whole record as JSON.
pub fn render_log_message(template: &str, input: &Record) -> String {
    replace_tokens(template, TokenSyntax::Fields, |path| {
        if path == WHOLE_INPUT_TOKEN {
            return serde_json::to_string(input).ok();
        }
        lookup_path(input, path).map(|v| to_display_string(Some(v)))
    })
}

/// `log`: emits the rendered message as a tracing event and passes the
/// input through with `logged`, `logMessage` and `loggedAt`.
pub struct LogStep;

impl StepExecutor for LogStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: LogSettings = parse_config(config)?;
        let template = or_default(&settings.message, "{{input}}");
        let message = render_log_message(template, input);

        tracing::info!(execution_id = %ctx.execution_id(), "{message}");

        Ok(StepResult::new(extend(
            input,
            [
                ("logged", Value::Bool(true)),
                ("logMessage", Value::from(message)),
                ("loggedAt", Value::from(timestamp())),
            ],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Uuid::now_v7(), Uuid::now_v7())
    }

    #[tokio::test]
    async fn email_renders_fields() {
        let config = record(json!({
            "to": "{{user.email}}",
            "subject": "Hello {{user.name}}",
            "body": "Order {{order}} ships {{when}}"
        }));
        let input = record(json!({"user": {"email": "a@b.c", "name": "Ada"}, "order": 42}));

        let result = EmailSendStep.execute(&config, &input, &ctx()).await.unwrap();
        let out = result.output;
        assert_eq!(out["emailSent"], json!(true));
        assert_eq!(out["emailTo"], json!("a@b.c"));
        assert_eq!(out["emailSubject"], json!("Hello Ada"));
        assert_eq!(out["emailBody"], json!("Order 42 ships {{when}}"));
        assert_eq!(out["order"], json!(42));
        assert!(out.contains_key("sentAt"));
    }

    #[test]
    fn log_message_tokens() {
        let input = record(json!({"a": 1, "b": {"c": "x"}}));
        assert_eq!(render_log_message("{{input}}", &input), r#"{"a":1,"b":{"c":"x"}}"#);
        assert_eq!(render_log_message("c={{b.c}} d={{d}}", &input), "c=x d={{d}}");
    }

    #[tokio::test]
    async fn log_defaults_to_whole_input() {
        let input = record(json!({"k": "v"}));
        let result = LogStep
            .execute(&Record::new(), &input, &ctx())
            .await
            .unwrap();
        assert_eq!(result.output["logged"], json!(true));
        assert_eq!(result.output["logMessage"], json!(r#"{"k":"v"}"#));
        assert_eq!(result.output["k"], json!("v"));
    }
}
