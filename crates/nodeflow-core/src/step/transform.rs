//! Data-shaping node types: `setData`, `merge`, `sort`, `split`,
//! `aggregate` and `loop`.
//!
//! `loop` and `split` only prepare data; they never re-run the graph.

use std::cmp::Ordering;

use nodeflow_types::graph::{Record, MERGE_INPUTS_KEY};
use serde::Deserialize;
use serde_json::Value;

use crate::context::ExecutionContext;

use super::value::{
    lenient_list, lenient_number, lenient_string, loose_compare, parse_literal, resolve_exact_token,
    set_path, stable_sort, to_display_string,
};
use super::{extend, or_default, parse_config, StepError, StepExecutor, StepResult};

// ---------------------------------------------------------------------------
// setData
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SetDataSettings {
    #[serde(deserialize_with = "lenient_string")]
    mode: String,
    #[serde(deserialize_with = "lenient_list")]
    assignments: Vec<Assignment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Assignment {
    #[serde(deserialize_with = "lenient_string")]
    field: String,
    #[serde(deserialize_with = "lenient_string")]
    value: String,
}

/// `setData`: ordered dot-path assignments.
///
/// Mode `replace` starts from an empty record, anything else from the
/// input. A value of the form `{{path}}` copies the raw value at that
/// input path; other values are parsed as literals.
pub struct SetDataStep;

impl StepExecutor for SetDataStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: SetDataSettings = parse_config(config)?;
        let mut output = if settings.mode == "replace" {
            Record::new()
        } else {
            input.clone()
        };

        for assignment in settings.assignments.iter().filter(|a| !a.field.is_empty()) {
            let value = if assignment.value.starts_with("{{") {
                resolve_exact_token(&assignment.value, input)
                    .unwrap_or_else(|| Value::String(assignment.value.clone()))
            } else {
                parse_literal(&assignment.value)
            };
            set_path(&mut output, &assignment.field, value);
        }

        Ok(StepResult::new(output))
    }
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MergeSettings {
    #[serde(deserialize_with = "lenient_string")]
    mode: String,
    #[serde(deserialize_with = "lenient_string")]
    merge_key: String,
}

/// `merge`: combines the producer outputs the engine wrapped under
/// `__mergeInputs`. A single producer passes through unchanged.
pub struct MergeStep;

impl StepExecutor for MergeStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: MergeSettings = parse_config(config)?;
        let Some(Value::Object(inputs)) = input.get(MERGE_INPUTS_KEY) else {
            return Ok(StepResult::new(input.clone()));
        };
        let values: Vec<&Value> = inputs.values().collect();

        let output = match settings.mode.as_str() {
            "mergeByIndex" => {
                let mut merged = Record::new();
                for value in values {
                    if let Value::Object(map) = value {
                        merged.extend(map.clone());
                    }
                }
                merged
            }
            "mergeByKey" => {
                let mut buckets = Record::new();
                for value in values {
                    let key = match value.get(&settings.merge_key) {
                        None | Some(Value::Null) => String::new(),
                        Some(k) => to_display_string(Some(k)),
                    };
                    let bucket = buckets
                        .entry(key)
                        .or_insert_with(|| Value::Object(Record::new()));
                    if let (Value::Object(bucket), Value::Object(map)) = (bucket, value) {
                        bucket.extend(map.clone());
                    }
                }
                buckets
            }
            _ => {
                let mut appended = Record::new();
                appended.insert(
                    "items".to_string(),
                    Value::Array(values.into_iter().cloned().collect()),
                );
                appended
            }
        };

        Ok(StepResult::new(output))
    }
}

// ---------------------------------------------------------------------------
// sort
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SortSettings {
    #[serde(deserialize_with = "lenient_string")]
    field: String,
    #[serde(deserialize_with = "lenient_string")]
    direction: String,
}

/// `sort`: stable sort of every array-valued input field by `item[field]`
/// (or the item itself when that is missing).
pub struct SortStep;

impl StepExecutor for SortStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: SortSettings = parse_config(config)?;
        let descending = settings.direction == "desc";
        let field = settings.field.as_str();

        let sort_key = |item: &Value| -> Value {
            match item.get(field) {
                Some(v) if !v.is_null() => v.clone(),
                _ => item.clone(),
            }
        };
        let compare = |a: &Value, b: &Value| -> Ordering {
            let ordering = loose_compare(&sort_key(a), &sort_key(b));
            if descending { ordering.reverse() } else { ordering }
        };

        let mut output = input.clone();
        for value in output.values_mut() {
            if let Value::Array(items) = value {
                *items = stable_sort(std::mem::take(items), &compare);
            }
        }
        Ok(StepResult::new(output))
    }
}

// ---------------------------------------------------------------------------
// split
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ArrayFieldSettings {
    #[serde(deserialize_with = "lenient_string")]
    array_field: String,
    #[serde(deserialize_with = "lenient_number")]
    batch_size: Option<f64>,
}

impl ArrayFieldSettings {
    fn items<'a>(&self, input: &'a Record) -> Option<&'a Vec<Value>> {
        input
            .get(or_default(&self.array_field, "items"))
            .and_then(Value::as_array)
    }
}

/// `split`: exposes an array field as `splitItems` plus `splitCount`.
pub struct SplitStep;

impl StepExecutor for SplitStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: ArrayFieldSettings = parse_config(config)?;
        let output = match settings.items(input) {
            Some(items) => extend(
                input,
                [
                    ("splitItems", Value::Array(items.clone())),
                    ("splitCount", Value::from(items.len())),
                ],
            ),
            None => extend(input, [("splitItems", Value::Array(Vec::new()))]),
        };
        Ok(StepResult::new(output))
    }
}

// ---------------------------------------------------------------------------
// aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AggregateSettings {
    #[serde(deserialize_with = "lenient_string")]
    output_field: String,
}

/// `aggregate`: flattens every input value into one array.
pub struct AggregateStep;

impl StepExecutor for AggregateStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: AggregateSettings = parse_config(config)?;

        let mut aggregated = Vec::new();
        for value in input.values() {
            match value {
                Value::Array(items) => aggregated.extend(items.iter().cloned()),
                other => aggregated.push(other.clone()),
            }
        }

        let count = aggregated.len();
        let mut output = Record::new();
        output.insert(
            or_default(&settings.output_field, "items").to_string(),
            Value::Array(aggregated),
        );
        output.insert("count".to_string(), Value::from(count));
        Ok(StepResult::new(output))
    }
}

// ---------------------------------------------------------------------------
// loop
// ---------------------------------------------------------------------------

/// `loop`: partitions an array field into fixed-size batches.
pub struct LoopStep;

impl StepExecutor for LoopStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: ArrayFieldSettings = parse_config(config)?;
        let Some(items) = settings.items(input) else {
            return Ok(StepResult::new(extend(
                input,
                [
                    ("loopItems", Value::Array(Vec::new())),
                    ("batchCount", Value::from(0)),
                ],
            )));
        };

        let batch_size = settings
            .batch_size
            .filter(|n| *n >= 1.0)
            .map_or(1, |n| n.floor() as usize);
        let batches: Vec<Value> = items
            .chunks(batch_size)
            .map(|chunk| Value::Array(chunk.to_vec()))
            .collect();

        Ok(StepResult::new(extend(
            input,
            [
                ("loopItems", Value::Array(items.clone())),
                ("batchCount", Value::from(batches.len())),
                ("batches", Value::Array(batches)),
                ("totalItems", Value::from(items.len())),
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

    async fn run(step: impl StepExecutor, config: Value, input: Value) -> Record {
        step.execute(&record(config), &record(input), &ctx())
            .await
            .unwrap()
            .output
    }

    // -------------------------------------------------------------------
    // setData
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn set_data_assigns_literals_and_templates() {
        let output = run(
            SetDataStep,
            json!({"assignments": [
                {"field": "greeting", "value": "hi"},
                {"field": "count", "value": "3"},
                {"field": "flag", "value": "false"},
                {"field": "profile.name", "value": "{{user.name}}"},
                {"field": "copy", "value": "{{user}}"},
                {"field": "", "value": "ignored"}
            ]}),
            json!({"user": {"name": "Ada"}}),
        )
        .await;

        assert_eq!(output["greeting"], json!("hi"));
        assert_eq!(output["count"], json!(3));
        assert_eq!(output["flag"], json!(false));
        assert_eq!(output["profile"], json!({"name": "Ada"}));
        assert_eq!(output["copy"], json!({"name": "Ada"}));
        assert_eq!(output["user"], json!({"name": "Ada"}));
        assert!(!output.contains_key(""));
    }

    #[tokio::test]
    async fn set_data_replace_mode_starts_empty() {
        let output = run(
            SetDataStep,
            json!({"mode": "replace", "assignments": [{"field": "only", "value": "x"}]}),
            json!({"dropped": true}),
        )
        .await;
        assert_eq!(Value::Object(output), json!({"only": "x"}));
    }

    #[tokio::test]
    async fn set_data_null_assignments_pass_input_through() {
        let output = run(
            SetDataStep,
            json!({"mode": null, "assignments": null}),
            json!({"kept": 1}),
        )
        .await;
        assert_eq!(Value::Object(output), json!({"kept": 1}));
    }

    // -------------------------------------------------------------------
    // merge
    // -------------------------------------------------------------------

    fn merge_input() -> Value {
        json!({"__mergeInputs": {
            "a": {"id": 1, "x": "a"},
            "b": {"id": 2, "x": "b"},
            "c": {"id": 1, "y": "c"}
        }})
    }

    #[tokio::test]
    async fn merge_append_keeps_order() {
        let output = run(MergeStep, json!({}), merge_input()).await;
        assert_eq!(
            output["items"],
            json!([{"id": 1, "x": "a"}, {"id": 2, "x": "b"}, {"id": 1, "y": "c"}])
        );
    }

    #[tokio::test]
    async fn merge_by_index_overwrites_in_order() {
        let output = run(MergeStep, json!({"mode": "mergeByIndex"}), merge_input()).await;
        assert_eq!(Value::Object(output), json!({"id": 1, "x": "b", "y": "c"}));
    }

    #[tokio::test]
    async fn merge_by_key_buckets() {
        let output = run(
            MergeStep,
            json!({"mode": "mergeByKey", "mergeKey": "id"}),
            merge_input(),
        )
        .await;
        assert_eq!(
            Value::Object(output),
            json!({"1": {"id": 1, "x": "a", "y": "c"}, "2": {"id": 2, "x": "b"}})
        );
    }

    #[tokio::test]
    async fn merge_without_wrapper_passes_through() {
        let output = run(MergeStep, json!({}), json!({"solo": true})).await;
        assert_eq!(Value::Object(output), json!({"solo": true}));
    }

    // -------------------------------------------------------------------
    // sort / split / aggregate / loop
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn sort_orders_every_array_field() {
        let output = run(
            SortStep,
            json!({"field": "age", "direction": "desc"}),
            json!({
                "people": [{"n": "a", "age": 20}, {"n": "b", "age": 40}, {"n": "c", "age": 30}],
                "nums": [3, 1, 2],
                "label": "kept"
            }),
        )
        .await;
        let names: Vec<&str> = output["people"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["n"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert_eq!(output["nums"], json!([3, 2, 1]));
        assert_eq!(output["label"], json!("kept"));
    }

    #[tokio::test]
    async fn split_exposes_items() {
        let output = run(SplitStep, json!({"arrayField": "rows"}), json!({"rows": [1, 2]})).await;
        assert_eq!(output["splitItems"], json!([1, 2]));
        assert_eq!(output["splitCount"], json!(2));

        let output = run(SplitStep, json!({}), json!({"items": "nope"})).await;
        assert_eq!(output["splitItems"], json!([]));
        assert!(!output.contains_key("splitCount"));
    }

    #[tokio::test]
    async fn aggregate_spreads_arrays() {
        let output = run(
            AggregateStep,
            json!({"outputField": "all"}),
            json!({"a": [1, 2], "b": "x", "c": {"k": 1}}),
        )
        .await;
        assert_eq!(
            Value::Object(output),
            json!({"all": [1, 2, "x", {"k": 1}], "count": 4})
        );
    }

    #[tokio::test]
    async fn loop_batches_items() {
        let output = run(
            LoopStep,
            json!({"batchSize": "2"}),
            json!({"items": [1, 2, 3, 4, 5]}),
        )
        .await;
        assert_eq!(output["batches"], json!([[1, 2], [3, 4], [5]]));
        assert_eq!(output["batchCount"], json!(3));
        assert_eq!(output["totalItems"], json!(5));
        assert_eq!(output["loopItems"], json!([1, 2, 3, 4, 5]));
    }

    #[tokio::test]
    async fn loop_on_missing_array() {
        let output = run(LoopStep, json!({"batchSize": 0}), json!({})).await;
        assert_eq!(output["loopItems"], json!([]));
        assert_eq!(output["batchCount"], json!(0));
        assert!(!output.contains_key("batches"));
    }
}
