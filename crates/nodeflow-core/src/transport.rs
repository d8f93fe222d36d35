//! Outbound transport ports used by network-facing step executors.
//!
//! The HTTP request step and the AI steps talk to the outside world only
//! through these traits. Implementations live in nodeflow-infra
//! (`ReqwestHttpTransport`, `ProviderChatTransport`); tests use in-memory
//! fakes.
//!
//! Both traits return boxed futures so they can be shared as
//! `Arc<dyn HttpTransport>` / `Arc<dyn ChatTransport>` across executors.

use std::future::Future;
use std::pin::Pin;

use secrecy::SecretString;

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Errors surfaced by transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("request failed: {0}")]
    Request(String),

    /// The remote answered with a non-success status.
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// A fully rendered outbound HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// The parts of an HTTP response the request step needs.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// Whether the response declares a JSON body.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
    }
}

/// Sends arbitrary HTTP requests.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse>;
}

// ---------------------------------------------------------------------------
// Chat completion
// ---------------------------------------------------------------------------

/// Chat completion provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    OpenAi,
    Anthropic,
}

impl ChatProvider {
    /// Map a node's `provider` setting; anything but `"anthropic"` uses OpenAI.
    pub fn from_setting(value: &str) -> Self {
        if value == "anthropic" {
            ChatProvider::Anthropic
        } else {
            ChatProvider::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatProvider::OpenAi => "openai",
            ChatProvider::Anthropic => "anthropic",
        }
    }
}

/// A single-turn chat completion request.
#[derive(Debug)]
pub struct ChatRequest {
    pub provider: ChatProvider,
    pub model: String,
    pub api_key: SecretString,
    pub system: Option<String>,
    pub user: String,
    pub temperature: Option<f64>,
    pub max_tokens: u32,
}

/// A decoded chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    /// The first text content block, when the provider returned one.
    pub content: Option<String>,
    /// The raw response body.
    pub raw: String,
}

/// Calls hosted chat completion APIs.
pub trait ChatTransport: Send + Sync {
    fn complete(&self, request: ChatRequest) -> TransportFuture<'_, ChatCompletion>;
}
