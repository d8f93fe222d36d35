//! `httpRequest`: outbound HTTP call with `{{path}}` templating.

use std::sync::Arc;

use nodeflow_types::graph::Record;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::transport::{HttpRequest, HttpTransport};

use super::value::{lenient_string, render_template, to_display_string};
use super::{or_default, parse_config, StepError, StepExecutor, StepResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpSettings {
    #[serde(deserialize_with = "lenient_string")]
    method: String,
    #[serde(deserialize_with = "lenient_string")]
    url: String,
    /// A JSON object, or a string holding one.
    headers: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    body: String,
}

pub struct HttpRequestStep {
    transport: Arc<dyn HttpTransport>,
}

impl HttpRequestStep {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

impl StepExecutor for HttpRequestStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: HttpSettings = parse_config(config)?;
        let request = build_request(&settings, input);
        tracing::debug!(method = %request.method, url = %request.url, "sending http request");

        let response = self.transport.send(request).await?;

        let body = if response.is_json() {
            serde_json::from_str(&response.body).map_err(|e| {
                StepError::ExecutionFailed(format!("Invalid JSON response body: {e}"))
            })?
        } else {
            Value::String(response.body)
        };

        let mut output = input.clone();
        output.insert("statusCode".to_string(), Value::from(response.status));
        output.insert("body".to_string(), body);
        Ok(StepResult::new(output))
    }
}

fn build_request(settings: &HttpSettings, input: &Record) -> HttpRequest {
    let method = or_default(&settings.method, "GET").to_ascii_uppercase();
    let url = render_template(&settings.url, input);
    let body = render_template(&settings.body, input);

    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    for (name, value) in configured_headers(settings.headers.as_ref()) {
        let value = render_template(&to_display_string(Some(&value)), input);
        match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.1 = value,
            None => headers.push((name, value)),
        }
    }

    let body = (method != "GET" && method != "HEAD" && !body.is_empty()).then_some(body);

    HttpRequest {
        method,
        url,
        headers,
        body,
    }
}

/// Header map from config; unparseable strings contribute nothing.
fn configured_headers(raw: Option<&Value>) -> Record {
    match raw {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => serde_json::from_str::<Record>(s).unwrap_or_default(),
        _ => Record::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::transport::{HttpResponse, TransportError, TransportFuture};
    use serde_json::json;
    use uuid::Uuid;

    struct FakeHttp {
        response: HttpResponse,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FakeHttp {
        fn replying(content_type: &str, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse {
                    status: 201,
                    content_type: Some(content_type.to_string()),
                    body: body.to_string(),
                },
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpTransport for FakeHttp {
        fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
            self.seen.lock().unwrap().push(request);
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    struct DownHttp;

    impl HttpTransport for DownHttp {
        fn send(&self, _request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
            Box::pin(async { Err(TransportError::Request("connection refused".to_string())) })
        }
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Uuid::now_v7(), Uuid::now_v7())
    }

    #[tokio::test]
    async fn renders_request_and_merges_json_response() {
        let http = FakeHttp::replying("application/json", r#"{"ok":true}"#);
        let step = HttpRequestStep::new(http.clone());
        let config = record(json!({
            "method": "post",
            "url": "https://api.test/users/{{ user.id }}",
            "headers": "{\"X-Token\": \"{{token}}\", \"content-type\": \"text/plain\"}",
            "body": "{\"name\": \"{{user.name}}\"}"
        }));
        let input = record(json!({
            "user": {"id": 7, "name": "Ada"},
            "token": "t0k",
            "statusCode": "shadowed"
        }));

        let result = step.execute(&config, &input, &ctx()).await.unwrap();
        assert_eq!(result.output["statusCode"], json!(201));
        assert_eq!(result.output["body"], json!({"ok": true}));
        assert_eq!(result.output["token"], json!("t0k"));

        let seen = http.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://api.test/users/7");
        assert_eq!(request.body.as_deref(), Some(r#"{"name": "Ada"}"#));
        assert_eq!(
            request.headers,
            vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("X-Token".to_string(), "t0k".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn get_requests_carry_no_body_and_keep_text() {
        let http = FakeHttp::replying("text/html", "<p>hi</p>");
        let step = HttpRequestStep::new(http.clone());
        let config = record(json!({"url": "https://x.test", "body": "ignored"}));

        let result = step.execute(&config, &Record::new(), &ctx()).await.unwrap();
        assert_eq!(result.output["body"], json!("<p>hi</p>"));

        let seen = http.seen.lock().unwrap();
        assert_eq!(seen[0].method, "GET");
        assert!(seen[0].body.is_none());
    }

    #[tokio::test]
    async fn transport_failure_is_a_step_error() {
        let step = HttpRequestStep::new(Arc::new(DownHttp));
        let config = record(json!({"url": "https://x.test"}));
        let err = step.execute(&config, &Record::new(), &ctx()).await.unwrap_err();
        assert!(matches!(err, StepError::Transport(_)));
        assert_eq!(err.to_string(), "request failed: connection refused");
    }

    #[tokio::test]
    async fn malformed_json_body_fails() {
        let http = FakeHttp::replying("application/json", "not json");
        let step = HttpRequestStep::new(http);
        let err = step
            .execute(&Record::new(), &Record::new(), &ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON response body"));
    }
}
