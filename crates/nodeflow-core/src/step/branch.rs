//! Routing node types: `ifCondition`, `filter` and `switch`.
//!
//! All three return a branch tag and route by it. Conditions compare with
//! loose coercion: equality and `contains` on the string form, `gt`/`lt`
//! on the numeric form.

use nodeflow_types::graph::Record;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ExecutionContext;

use super::value::{lenient_list, lenient_string, lookup_path, to_display_string, to_number};
use super::{extend, parse_config, StepError, StepExecutor, StepResult};

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Comparison applied by `ifCondition` and `filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    Gt,
    Lt,
    Contains,
    Exists,
    /// Unrecognised operators never match.
    #[serde(other)]
    Unknown,
}

impl Operator {
    /// Compare a resolved field (`None` when absent) with the configured
    /// literal.
    pub fn evaluate(self, actual: Option<&Value>, expected: &str) -> bool {
        match self {
            Operator::Equals => to_display_string(actual) == expected,
            Operator::NotEquals => to_display_string(actual) != expected,
            Operator::Gt => to_number(actual) > literal_number(expected),
            Operator::Lt => to_number(actual) < literal_number(expected),
            Operator::Contains => to_display_string(actual).contains(expected),
            Operator::Exists => actual.is_some_and(|v| !v.is_null()),
            Operator::Unknown => false,
        }
    }
}

fn literal_number(s: &str) -> f64 {
    to_number(Some(&Value::String(s.to_string())))
}

fn branch_tag(matched: bool) -> &'static str {
    if matched { "true" } else { "false" }
}

// ---------------------------------------------------------------------------
// ifCondition
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConditionSettings {
    #[serde(deserialize_with = "lenient_string")]
    field: String,
    operator: Option<Operator>,
    #[serde(deserialize_with = "lenient_string")]
    value: String,
}

/// `ifCondition`: dot-path field test; output is the input unchanged.
pub struct IfConditionStep;

impl StepExecutor for IfConditionStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: ConditionSettings = parse_config(config)?;
        let operator = settings.operator.unwrap_or(Operator::Unknown);
        let matched = operator.evaluate(lookup_path(input, &settings.field), &settings.value);
        Ok(StepResult::with_branch(input.clone(), branch_tag(matched)))
    }

    fn routes_by_branch(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// filter
// ---------------------------------------------------------------------------

/// `filter`: top-level field test; adds `filterMatch` to the input.
pub struct FilterStep;

impl StepExecutor for FilterStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: ConditionSettings = parse_config(config)?;
        let operator = settings.operator.unwrap_or(Operator::Exists);
        let matched = operator.evaluate(input.get(&settings.field), &settings.value);
        Ok(StepResult::with_branch(
            extend(input, [("filterMatch", Value::Bool(matched))]),
            branch_tag(matched),
        ))
    }

    fn routes_by_branch(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// switch
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SwitchSettings {
    #[serde(deserialize_with = "lenient_string")]
    field: String,
    #[serde(deserialize_with = "lenient_list")]
    cases: Vec<SwitchCase>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SwitchCase {
    #[serde(deserialize_with = "lenient_string")]
    value: String,
}

/// Branch tag when no case matches.
const SWITCH_FALLBACK: &str = "false";

/// `switch`: first case whose value equals the field's string form.
///
/// Branch tag is the case index; handles `caseN` or `N` select case `N`,
/// handles `fallback`, `default` or `false` select the no-match branch.
pub struct SwitchStep;

impl StepExecutor for SwitchStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: SwitchSettings = parse_config(config)?;
        let value = match input.get(&settings.field) {
            None | Some(Value::Null) => String::new(),
            Some(v) => to_display_string(Some(v)),
        };

        let matched = settings.cases.iter().position(|c| c.value == value);
        let (matched_case, branch) = match matched {
            Some(index) => (Value::from(index), index.to_string()),
            None => (Value::from("default"), SWITCH_FALLBACK.to_string()),
        };

        let output = extend(
            input,
            [
                ("switchField", Value::from(settings.field)),
                ("switchValue", Value::from(value)),
                ("matchedCase", matched_case),
            ],
        );
        Ok(StepResult::with_branch(output, branch))
    }

    fn routes_by_branch(&self) -> bool {
        true
    }

    fn selects(&self, branch: &str, source_handle: &str) -> bool {
        if branch == SWITCH_FALLBACK {
            return matches!(source_handle, "false" | "fallback" | "default");
        }
        source_handle == branch || source_handle.strip_prefix("case") == Some(branch)
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

    async fn if_branch(config: Value, input: Value) -> String {
        IfConditionStep
            .execute(&record(config), &record(input), &ctx())
            .await
            .unwrap()
            .branch
            .unwrap()
    }

    #[test]
    fn operators_coerce_loosely() {
        assert!(Operator::Equals.evaluate(Some(&json!(1)), "1"));
        assert!(Operator::Equals.evaluate(Some(&Value::Null), "null"));
        assert!(Operator::Equals.evaluate(None, "undefined"));
        assert!(Operator::NotEquals.evaluate(Some(&json!("a")), "b"));
        assert!(Operator::Gt.evaluate(Some(&json!("10")), "9"));
        assert!(!Operator::Gt.evaluate(Some(&json!("abc")), "1"));
        assert!(Operator::Lt.evaluate(Some(&json!(2.5)), "3"));
        assert!(Operator::Contains.evaluate(Some(&json!("hello world")), "lo w"));
        assert!(Operator::Contains.evaluate(Some(&json!([1, 2])), "1,2"));
        assert!(Operator::Exists.evaluate(Some(&json!(false)), ""));
        assert!(!Operator::Exists.evaluate(Some(&Value::Null), ""));
        assert!(!Operator::Exists.evaluate(None, ""));
        assert!(!Operator::Unknown.evaluate(Some(&json!(1)), "1"));
    }

    #[test]
    fn unknown_operator_deserializes() {
        let op: Operator = serde_json::from_value(json!("matchesRegex")).unwrap();
        assert_eq!(op, Operator::Unknown);
        let op: Operator = serde_json::from_value(json!("notEquals")).unwrap();
        assert_eq!(op, Operator::NotEquals);
    }

    #[tokio::test]
    async fn if_condition_uses_dot_paths() {
        let config = json!({"field": "user.age", "operator": "gt", "value": "18"});
        assert_eq!(if_branch(config.clone(), json!({"user": {"age": 30}})).await, "true");
        assert_eq!(if_branch(config, json!({"user": {"age": 12}})).await, "false");
    }

    #[tokio::test]
    async fn if_condition_without_operator_is_false() {
        assert_eq!(if_branch(json!({"field": "x"}), json!({"x": 1})).await, "false");
    }

    #[tokio::test]
    async fn if_condition_output_is_input() {
        let input = record(json!({"x": "1"}));
        let config = record(json!({"field": "x", "operator": "equals", "value": "1"}));
        let result = IfConditionStep.execute(&config, &input, &ctx()).await.unwrap();
        assert_eq!(result.output, input);
        assert_eq!(result.branch.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn filter_defaults_to_exists() {
        let config = record(json!({"field": "email"}));
        let hit = FilterStep
            .execute(&config, &record(json!({"email": "a@b.c"})), &ctx())
            .await
            .unwrap();
        assert_eq!(hit.output["filterMatch"], json!(true));
        assert_eq!(hit.branch.as_deref(), Some("true"));

        let miss = FilterStep
            .execute(&config, &Record::new(), &ctx())
            .await
            .unwrap();
        assert_eq!(miss.output["filterMatch"], json!(false));
        assert_eq!(miss.branch.as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn switch_matches_case_index() {
        let config = record(json!({
            "field": "status",
            "cases": [{"value": "new", "output": 0}, {"value": "done", "output": 1}]
        }));
        let result = SwitchStep
            .execute(&config, &record(json!({"status": "done"})), &ctx())
            .await
            .unwrap();
        assert_eq!(result.branch.as_deref(), Some("1"));
        assert_eq!(result.output["matchedCase"], json!(1));
        assert_eq!(result.output["switchValue"], json!("done"));
        assert_eq!(result.output["switchField"], json!("status"));

        let result = SwitchStep
            .execute(&config, &record(json!({"status": null})), &ctx())
            .await
            .unwrap();
        assert_eq!(result.branch.as_deref(), Some("false"));
        assert_eq!(result.output["matchedCase"], json!("default"));
        assert_eq!(result.output["switchValue"], json!(""));
    }

    #[tokio::test]
    async fn switch_with_null_cases_falls_through() {
        let config = record(json!({"field": "status", "cases": null}));
        let result = SwitchStep
            .execute(&config, &record(json!({"status": "done"})), &ctx())
            .await
            .unwrap();
        assert_eq!(result.branch.as_deref(), Some("false"));
        assert_eq!(result.output["matchedCase"], json!("default"));
    }

    #[test]
    fn switch_handle_selection() {
        let step = SwitchStep;
        assert!(StepExecutor::selects(&step, "1", "case1"));
        assert!(StepExecutor::selects(&step, "1", "1"));
        assert!(!StepExecutor::selects(&step, "1", "case10"));
        assert!(!StepExecutor::selects(&step, "1", "fallback"));
        assert!(StepExecutor::selects(&step, "false", "fallback"));
        assert!(StepExecutor::selects(&step, "false", "false"));
        assert!(!StepExecutor::selects(&step, "false", "case0"));
    }
}
