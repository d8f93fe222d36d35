//! `ChatTransport` for the hosted OpenAI and Anthropic chat APIs.
//!
//! One non-streaming request per call. The API key travels in a
//! [`SecretString`] and is exposed only when the auth header is built.

use std::time::Duration;

use nodeflow_core::transport::{
    ChatCompletion, ChatProvider, ChatRequest, ChatTransport, TransportError, TransportFuture,
};
use nodeflow_types::config::LlmConfig;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Chat transport dispatching on [`ChatProvider`].
pub struct ProviderChatTransport {
    client: reqwest::Client,
    openai_base_url: String,
    anthropic_base_url: String,
}

impl ProviderChatTransport {
    pub fn new(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300)) // long generations
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            openai_base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            anthropic_base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn complete_request(&self, request: ChatRequest) -> Result<ChatCompletion, TransportError> {
        tracing::debug!(
            provider = request.provider.as_str(),
            model = %request.model,
            "sending chat completion"
        );

        let builder = match request.provider {
            ChatProvider::OpenAi => {
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = request.system.as_deref() {
                    messages.push(ChatMessage {
                        role: "system",
                        content: system,
                    });
                }
                messages.push(ChatMessage {
                    role: "user",
                    content: &request.user,
                });
                self.client
                    .post(format!("{}/chat/completions", self.openai_base_url))
                    .bearer_auth(request.api_key.expose_secret())
                    .json(&OpenAiBody {
                        model: &request.model,
                        messages,
                        temperature: request.temperature,
                        max_tokens: request.max_tokens,
                    })
            }
            ChatProvider::Anthropic => self
                .client
                .post(format!("{}/messages", self.anthropic_base_url))
                .header("x-api-key", request.api_key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&AnthropicBody {
                    model: &request.model,
                    max_tokens: request.max_tokens,
                    system: request.system.as_deref(),
                    messages: vec![ChatMessage {
                        role: "user",
                        content: &request.user,
                    }],
                    temperature: request.temperature,
                }),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: raw,
            });
        }

        Ok(ChatCompletion {
            content: extract_content(request.provider, &raw),
            raw,
        })
    }
}

impl ChatTransport for ProviderChatTransport {
    fn complete(&self, request: ChatRequest) -> TransportFuture<'_, ChatCompletion> {
        Box::pin(self.complete_request(request))
    }
}

/// First text block of a successful response, if the body has one.
fn extract_content(provider: ChatProvider, raw: &str) -> Option<String> {
    let content = match provider {
        ChatProvider::OpenAi => serde_json::from_str::<OpenAiResponse>(raw)
            .ok()?
            .choices
            .into_iter()
            .next()?
            .message
            .content,
        ChatProvider::Anthropic => serde_json::from_str::<AnthropicResponse>(raw)
            .ok()?
            .content
            .into_iter()
            .next()?
            .text,
    };
    content.filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use secrecy::SecretString;
    use serde_json::{Value, json};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn transport(base: &str) -> ProviderChatTransport {
        ProviderChatTransport::new(&LlmConfig {
            openai_base_url: format!("{base}/v1/"),
            anthropic_base_url: format!("{base}/v1"),
        })
    }

    fn request(provider: ChatProvider) -> ChatRequest {
        ChatRequest {
            provider,
            model: "test-model".into(),
            api_key: SecretString::from("sk-test".to_string()),
            system: Some("be brief".into()),
            user: "hello".into(),
            temperature: Some(0.2),
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn openai_request_shape_and_content() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "hello");
                assert_eq!(body["max_tokens"], 64);
                axum::Json(json!({"choices": [{"message": {"content": "hi there"}}]}))
            }),
        );
        let base = serve(app).await;

        let completion = transport(&base)
            .complete(request(ChatProvider::OpenAi))
            .await
            .unwrap();
        assert_eq!(completion.content.as_deref(), Some("hi there"));
        assert!(completion.raw.contains("choices"));
    }

    #[tokio::test]
    async fn anthropic_request_shape_and_content() {
        let app = Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
                assert_eq!(headers["x-api-key"], "sk-test");
                assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
                assert_eq!(body["system"], "be brief");
                assert_eq!(body["messages"].as_array().unwrap().len(), 1);
                axum::Json(json!({"content": [{"type": "text", "text": "hey"}]}))
            }),
        );
        let base = serve(app).await;

        let completion = transport(&base)
            .complete(request(ChatProvider::Anthropic))
            .await
            .unwrap();
        assert_eq!(completion.content.as_deref(), Some("hey"));
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = serve(app).await;

        let err = transport(&base)
            .complete(request(ChatProvider::Anthropic))
            .await
            .unwrap_err();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn content_missing_from_unexpected_bodies() {
        assert_eq!(extract_content(ChatProvider::OpenAi, r#"{"choices": []}"#), None);
        assert_eq!(extract_content(ChatProvider::Anthropic, "not json"), None);
        assert_eq!(
            extract_content(ChatProvider::Anthropic, r#"{"content": [{"text": ""}]}"#),
            None
        );
    }
}
