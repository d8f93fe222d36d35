//! Record helpers shared by the step executors.
//!
//! Dot-path lookup and nested writes, `{{path}}` template rendering, and
//! loose value coercions. Workflow authors compare and format values the
//! way the editor's expression language does (`"1" == 1` after string
//! coercion, `null` formats as `"null"`), so the coercions here follow
//! those rules rather than Rust's.

use std::cmp::Ordering;

use nodeflow_types::graph::Record;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Resolve a dot path (`user.address.city`) through nested objects.
///
/// Numeric segments index into arrays. Returns `None` when any segment is
/// missing; a present `null` resolves to `Some(Value::Null)`.
pub fn lookup_path<'a>(data: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = data.get(first)?;
    for key in segments {
        current = match current {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at a dot path, creating (or replacing non-object)
/// intermediate objects.
pub fn set_path(data: &mut Record, path: &str, value: Value) {
    let mut keys: Vec<&str> = path.split('.').collect();
    let Some(last) = keys.pop() else {
        return;
    };

    let mut current = data;
    for key in keys {
        let slot = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Record::new()));
        if !slot.is_object() {
            *slot = Value::Object(Record::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Render `{{ any.path }}` tokens; missing paths render as an empty string.
///
/// Used for request URLs, headers and bodies.
pub fn render_template(template: &str, data: &Record) -> String {
    replace_tokens(template, TokenSyntax::Loose, |path| {
        Some(
            lookup_path(data, path.trim())
                .map(|v| to_display_string(Some(v)))
                .unwrap_or_default(),
        )
    })
}

/// Render `{{field.path}}` tokens (word characters and dots only); tokens
/// that do not resolve are left in place.
///
/// Used for prompts, e-mail fields and log messages.
pub fn render_fields(template: &str, data: &Record) -> String {
    replace_tokens(template, TokenSyntax::Fields, |path| {
        lookup_path(data, path).map(|v| to_display_string(Some(v)))
    })
}

/// Token grammar accepted by [`replace_tokens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSyntax {
    /// Anything non-empty between the braces.
    Loose,
    /// ASCII word characters and dots.
    Fields,
}

/// Replace each `{{path}}` token with `resolve(path)`.
///
/// A token for which `resolve` returns `None` is copied through verbatim.
pub fn replace_tokens(
    template: &str,
    syntax: TokenSyntax,
    mut resolve: impl FnMut(&str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match token_len(after, syntax) {
            Some(len) => {
                let path = &after[..len];
                match resolve(path) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("{{");
                        out.push_str(path);
                        out.push_str("}}");
                    }
                }
                rest = &after[len + 2..];
            }
            None => {
                out.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn token_len(s: &str, syntax: TokenSyntax) -> Option<usize> {
    match syntax {
        TokenSyntax::Fields => {
            let len = s
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
                .unwrap_or(s.len());
            (len > 0 && s[len..].starts_with("}}")).then_some(len)
        }
        TokenSyntax::Loose => {
            let first = s.chars().next()?;
            let skip = first.len_utf8();
            s[skip..].find("}}").map(|i| i + skip)
        }
    }
}

/// If `template` is exactly one `{{path}}` token, resolve it to the raw
/// value at that path (`Value::Null` when missing).
pub fn resolve_exact_token(template: &str, data: &Record) -> Option<Value> {
    let inner = template.strip_prefix("{{")?;
    let len = token_len(inner, TokenSyntax::Loose)?;
    if len + 2 != inner.len() {
        return None;
    }
    Some(
        lookup_path(data, inner[..len].trim())
            .cloned()
            .unwrap_or(Value::Null),
    )
}

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// String form of a value; `None` stands for an absent field.
///
/// `null` → `"null"`, absent → `"undefined"`, integral numbers without a
/// fraction, arrays comma-joined, objects `"[object Object]"`.
pub fn to_display_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => format_number(n),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_display_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

/// Numeric form of a value; `NaN` when it has none.
///
/// `null`/`""`/`[]` → 0, booleans → 0/1, numeric strings parse after
/// trimming, absent fields and objects → `NaN`.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_number(s),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => parse_number(&to_display_string(Some(single))),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// JSON value for a number, keeping integral values as integers.
///
/// Non-finite numbers have no JSON form and become `null`.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Parse a literal typed into the editor: booleans, `null`, numbers,
/// otherwise the string itself.
pub fn parse_literal(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            let n = parse_number(raw);
            if raw.trim().is_empty() || !n.is_finite() {
                Value::String(raw.to_string())
            } else {
                number_value(n)
            }
        }
    }
}

/// Truthiness of an optional value (absent, `null`, `false`, `0`, `NaN`
/// and `""` are falsy).
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Loose three-way comparison: strings compare lexically, everything else
/// numerically. Incomparable pairs (`NaN`) are `Equal`.
pub fn loose_compare(a: &Value, b: &Value) -> Ordering {
    let a = to_primitive(a);
    let b = to_primitive(b);
    if let (Value::String(x), Value::String(y)) = (&a, &b) {
        return x.cmp(y);
    }
    let x = to_number(Some(&a));
    let y = to_number(Some(&b));
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(to_display_string(Some(value))),
        other => other.clone(),
    }
}

/// Stable merge sort driven by an arbitrary comparator.
///
/// Unlike `slice::sort_by`, this tolerates comparators that are not a
/// total order (the loose comparison above is not).
pub fn stable_sort(items: Vec<Value>, cmp: &impl Fn(&Value, &Value) -> Ordering) -> Vec<Value> {
    if items.len() <= 1 {
        return items;
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = stable_sort(left, cmp);
    let right = stable_sort(right, cmp);

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    loop {
        let take_right = match (l.peek(), r.peek()) {
            (Some(a), Some(b)) => cmp(b, a) == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { r.next() } else { l.next() };
        out.extend(next);
    }
    out
}

// ---------------------------------------------------------------------------
// Config deserialization
// ---------------------------------------------------------------------------

/// Deserialize an optional number that may arrive as a numeric string.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .map(|v| to_number(Some(&v)))
        .filter(|n| !n.is_nan()))
}

/// Deserialize an optional scalar into its display string.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(v) => to_display_string(Some(&v)),
    })
}

/// Deserialize an optional list; `null` reads as empty.
pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    // -------------------------------------------------------------------
    // Paths
    // -------------------------------------------------------------------

    #[test]
    fn lookup_nested_and_array_paths() {
        let data = record(json!({
            "user": {"name": "Ada", "tags": ["a", "b"], "nick": null}
        }));
        assert_eq!(lookup_path(&data, "user.name"), Some(&json!("Ada")));
        assert_eq!(lookup_path(&data, "user.tags.1"), Some(&json!("b")));
        assert_eq!(lookup_path(&data, "user.nick"), Some(&Value::Null));
        assert_eq!(lookup_path(&data, "user.missing"), None);
        assert_eq!(lookup_path(&data, "user.name.first"), None);
        assert_eq!(lookup_path(&data, ""), None);
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut data = record(json!({"a": 5}));
        set_path(&mut data, "a.b.c", json!(true));
        set_path(&mut data, "top", json!("x"));
        assert_eq!(Value::Object(data), json!({"a": {"b": {"c": true}}, "top": "x"}));
    }

    // -------------------------------------------------------------------
    // Templates
    // -------------------------------------------------------------------

    #[test]
    fn render_template_replaces_and_blanks_missing() {
        let data = record(json!({"id": 7, "user": {"name": "Ada"}, "none": null}));
        assert_eq!(
            render_template("https://x/{{ id }}/{{user.name}}?q={{missing}}&n={{none}}", &data),
            "https://x/7/Ada?q=&n=null"
        );
        assert_eq!(render_template("{{}} stays", &data), "{{}} stays");
        assert_eq!(render_template("no tokens", &data), "no tokens");
    }

    #[test]
    fn render_fields_keeps_unresolved_tokens() {
        let data = record(json!({"message": "hi", "n": 2.5}));
        assert_eq!(
            render_fields("say {{message}} x{{n}} {{input.message}} {{ spaced }}", &data),
            "say hi x2.5 {{input.message}} {{ spaced }}"
        );
    }

    #[test]
    fn exact_token_resolves_raw_value() {
        let data = record(json!({"list": [1, 2], "o": {"k": "v"}}));
        assert_eq!(resolve_exact_token("{{list}}", &data), Some(json!([1, 2])));
        assert_eq!(resolve_exact_token("{{ o.k }}", &data), Some(json!("v")));
        assert_eq!(resolve_exact_token("{{nope}}", &data), Some(Value::Null));
        assert_eq!(resolve_exact_token("{{list}} extra", &data), None);
        assert_eq!(resolve_exact_token("plain", &data), None);
    }

    // -------------------------------------------------------------------
    // Coercions
    // -------------------------------------------------------------------

    #[test]
    fn display_strings() {
        assert_eq!(to_display_string(None), "undefined");
        assert_eq!(to_display_string(Some(&Value::Null)), "null");
        assert_eq!(to_display_string(Some(&json!(1))), "1");
        assert_eq!(to_display_string(Some(&json!(1.0))), "1");
        assert_eq!(to_display_string(Some(&json!(0.5))), "0.5");
        assert_eq!(to_display_string(Some(&json!([1, null, "a"]))), "1,,a");
        assert_eq!(to_display_string(Some(&json!({"a": 1}))), "[object Object]");
    }

    #[test]
    fn numbers() {
        assert_eq!(to_number(Some(&json!(" 42 "))), 42.0);
        assert_eq!(to_number(Some(&json!(""))), 0.0);
        assert_eq!(to_number(Some(&Value::Null)), 0.0);
        assert_eq!(to_number(Some(&json!(true))), 1.0);
        assert_eq!(to_number(Some(&json!([7]))), 7.0);
        assert!(to_number(Some(&json!("abc"))).is_nan());
        assert!(to_number(Some(&json!("inf"))).is_nan());
        assert!(to_number(None).is_nan());
        assert_eq!(to_number(Some(&json!("1e3"))), 1000.0);
    }

    #[test]
    fn literals() {
        assert_eq!(parse_literal("true"), json!(true));
        assert_eq!(parse_literal("null"), Value::Null);
        assert_eq!(parse_literal("12"), json!(12));
        assert_eq!(parse_literal("1.5"), json!(1.5));
        assert_eq!(parse_literal(" "), json!(" "));
        assert_eq!(parse_literal("hi"), json!("hi"));
        assert_eq!(parse_literal("Infinity"), json!("Infinity"));
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(is_truthy(Some(&json!("0"))));
        assert!(is_truthy(Some(&json!([]))));
    }

    // -------------------------------------------------------------------
    // Sorting
    // -------------------------------------------------------------------

    #[test]
    fn loose_compare_mixes_types() {
        assert_eq!(loose_compare(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(loose_compare(&json!("2"), &json!("10")), Ordering::Greater);
        assert_eq!(loose_compare(&json!("2"), &json!(10)), Ordering::Less);
        assert_eq!(loose_compare(&json!("x"), &json!(1)), Ordering::Equal);
    }

    #[test]
    fn stable_sort_keeps_equal_order() {
        let items = vec![
            json!({"k": 2, "id": "a"}),
            json!({"k": 1, "id": "b"}),
            json!({"k": 2, "id": "c"}),
            json!({"k": 1, "id": "d"}),
        ];
        let sorted = stable_sort(items, &|a, b| loose_compare(&a["k"], &b["k"]));
        let ids: Vec<&str> = sorted.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn lenient_config_fields() {
        #[derive(Deserialize)]
        struct Cfg {
            #[serde(default, deserialize_with = "lenient_number")]
            n: Option<f64>,
            #[serde(default, deserialize_with = "lenient_string")]
            s: String,
        }
        let cfg: Cfg = serde_json::from_value(json!({"n": "5", "s": 3})).unwrap();
        assert_eq!(cfg.n, Some(5.0));
        assert_eq!(cfg.s, "3");

        let empty: Cfg = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.n, None);
        assert_eq!(empty.s, "");
    }
}
