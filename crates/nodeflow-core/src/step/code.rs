//! `codeFunction`: evaluate a user script against a copy of the input.

use nodeflow_types::graph::Record;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::context::ExecutionContext;

use super::script::{self, SCRIPT_TIMEOUT};
use super::value::lenient_string;
use super::{or_default, parse_config, StepError, StepExecutor, StepResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CodeSettings {
    #[serde(deserialize_with = "lenient_string")]
    code: String,
}

/// Runs the `code` expression with `input` bound to the node's input.
///
/// An object result becomes the output; anything else is wrapped as
/// `{"value": result}`.
pub struct CodeFunctionStep;

impl StepExecutor for CodeFunctionStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: CodeSettings = parse_config(config)?;
        let expression = or_default(settings.code.trim(), "input");

        let mut scope = Map::new();
        scope.insert("input".to_string(), Value::Object(input.clone()));

        let result = script::evaluate(expression, Value::Object(scope), SCRIPT_TIMEOUT).await?;

        let output = match result {
            Value::Object(map) => map,
            other => {
                let mut wrapped = Record::new();
                wrapped.insert("value".to_string(), other);
                wrapped
            }
        };
        Ok(StepResult::new(output))
    }
}
