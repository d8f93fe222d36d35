//! JEXL evaluator backing the code step.
//!
//! Scripts are single JEXL expressions evaluated against a context object
//! (`{"input": {...}}`). Evaluation runs on the blocking pool under a
//! wall-clock timeout; the payload is always passed as context and never
//! spliced into the expression text.

use std::time::Duration;

use serde_json::{json, Value};

use super::value::{is_truthy, number_value, to_display_string, to_number};

/// Wall-clock limit for one script evaluation.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Script error: {0}")]
    EvalFailed(String),

    #[error("Script execution timed out after {0}ms")]
    Timeout(u128),

    #[error("Script worker failed: {0}")]
    Worker(String),
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate `expression` against `context` on the blocking pool.
///
/// The evaluator is built inside the worker so nothing non-`Send` crosses
/// threads. A timed-out evaluation is abandoned, not interrupted.
pub async fn evaluate(
    expression: &str,
    context: Value,
    limit: Duration,
) -> Result<Value, ScriptError> {
    let expression = expression.to_string();
    let worker = tokio::task::spawn_blocking(move || {
        build_evaluator()
            .eval_in_context(&expression, &context)
            .map_err(|e| e.to_string())
    });

    match tokio::time::timeout(limit, worker).await {
        Err(_) => Err(ScriptError::Timeout(limit.as_millis())),
        Ok(Err(join)) => Err(ScriptError::Worker(join.to_string())),
        Ok(Ok(Err(message))) => Err(ScriptError::EvalFailed(message)),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

fn first_str(args: &[Value]) -> String {
    args.first()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => to_display_string(Some(other)),
        })
        .unwrap_or_default()
}

fn build_evaluator() -> jexl_eval::Evaluator<'static> {
    jexl_eval::Evaluator::new()
        // Strings
        .with_transform("lower", |args: &[Value]| Ok(json!(first_str(args).to_lowercase())))
        .with_transform("upper", |args: &[Value]| Ok(json!(first_str(args).to_uppercase())))
        .with_transform("trim", |args: &[Value]| Ok(json!(first_str(args).trim())))
        .with_transform("split", |args: &[Value]| {
            let s = first_str(args);
            let delimiter = args.get(1).and_then(|v| v.as_str()).unwrap_or(",");
            let parts: Vec<&str> = s.split(delimiter).collect();
            Ok(json!(parts))
        })
        .with_transform("string", |args: &[Value]| {
            Ok(json!(to_display_string(args.first())))
        })
        .with_transform("contains", |args: &[Value]| {
            let needle = args.get(1).cloned().unwrap_or(Value::Null);
            let found = match args.first() {
                Some(Value::Array(items)) => items.contains(&needle),
                Some(Value::Object(map)) => needle.as_str().is_some_and(|k| map.contains_key(k)),
                other => to_display_string(other).contains(&to_display_string(Some(&needle))),
            };
            Ok(json!(found))
        })
        // Collections
        .with_transform("join", |args: &[Value]| {
            let delimiter = args.get(1).and_then(|v| v.as_str()).unwrap_or(",");
            let joined = match args.first() {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| to_display_string(Some(item)))
                    .collect::<Vec<_>>()
                    .join(delimiter),
                other => to_display_string(other),
            };
            Ok(json!(joined))
        })
        .with_transform("length", |args: &[Value]| {
            let len = match args.first() {
                Some(Value::String(s)) => s.chars().count(),
                Some(Value::Array(a)) => a.len(),
                Some(Value::Object(o)) => o.len(),
                _ => 0,
            };
            Ok(json!(len))
        })
        .with_transform("keys", |args: &[Value]| {
            let keys: Vec<&String> = match args.first() {
                Some(Value::Object(o)) => o.keys().collect(),
                _ => Vec::new(),
            };
            Ok(json!(keys))
        })
        .with_transform("values", |args: &[Value]| {
            let values: Vec<Value> = match args.first() {
                Some(Value::Object(o)) => o.values().cloned().collect(),
                _ => Vec::new(),
            };
            Ok(Value::Array(values))
        })
        // Numbers and booleans
        .with_transform("number", |args: &[Value]| Ok(number_value(to_number(args.first()))))
        .with_transform("round", |args: &[Value]| {
            Ok(number_value(to_number(args.first()).round()))
        })
        .with_transform("not", |args: &[Value]| Ok(json!(!is_truthy(args.first()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evaluates_against_input() {
        let context = json!({"input": {"a": 2, "b": 3, "name": " Ada "}});
        let value = evaluate("input.a * input.b", context.clone(), SCRIPT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(value.as_f64(), Some(6.0));

        let value = evaluate("input.name|trim|upper", context, SCRIPT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(value, json!("ADA"));
    }

    #[tokio::test]
    async fn builds_objects() {
        let context = json!({"input": {"x": 1}});
        let value = evaluate("{doubled: input.x * 2, ok: true}", context, SCRIPT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(value["ok"], json!(true));
        assert_eq!(value["doubled"].as_f64(), Some(2.0));
    }

    #[tokio::test]
    async fn syntax_errors_are_reported() {
        let err = evaluate("input.(", json!({"input": {}}), SCRIPT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::EvalFailed(_)));
        assert!(err.to_string().starts_with("Script error"));
    }

    #[test]
    fn timeout_message() {
        let err = ScriptError::Timeout(SCRIPT_TIMEOUT.as_millis());
        assert_eq!(err.to_string(), "Script execution timed out after 5000ms");
    }
}
