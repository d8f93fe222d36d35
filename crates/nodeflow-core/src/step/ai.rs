//! AI node types: `aiLlm`, `aiClassifier` and `aiSummarize`.
//!
//! These never fail the run. A missing API key, a bad config or a
//! transport error is written into the output's `error` field instead.

use std::sync::Arc;

use nodeflow_types::graph::Record;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::transport::{ChatProvider, ChatRequest, ChatTransport};

use super::value::{
    is_truthy, lenient_number, lenient_string, number_value, render_fields, to_display_string,
};
use super::{extend, or_default, parse_config, StepError, StepExecutor, StepResult};

const NO_API_KEY: &str = "No API key provided";

// ---------------------------------------------------------------------------
// Shared settings
// ---------------------------------------------------------------------------

/// Provider selection shared by the three AI steps.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProviderSettings {
    #[serde(deserialize_with = "lenient_string")]
    provider: String,
    #[serde(deserialize_with = "lenient_string")]
    model: String,
    #[serde(deserialize_with = "lenient_string")]
    api_key: String,
}

impl ProviderSettings {
    fn provider_name(&self) -> &str {
        or_default(&self.provider, "openai")
    }

    fn request(&self, default_model: &str, user: String) -> ChatRequest {
        ChatRequest {
            provider: ChatProvider::from_setting(self.provider_name()),
            model: or_default(&self.model, default_model).to_string(),
            api_key: SecretString::from(self.api_key.clone()),
            system: None,
            user,
            temperature: None,
            max_tokens: 1024,
        }
    }
}

/// Parse settings, turning a config error into the output `error` field.
fn settings_or_error<T: DeserializeOwned>(
    config: &Record,
    input: &Record,
    result_field: &'static str,
) -> Result<T, Record> {
    parse_config(config).map_err(|e: StepError| {
        extend(
            input,
            [
                (result_field, Value::Null),
                ("error", Value::from(e.to_string())),
            ],
        )
    })
}

/// `String(input[field] || '')`.
fn text_field(input: &Record, field: &str) -> String {
    let value = input.get(or_default(field, "text"));
    if is_truthy(value) {
        to_display_string(value)
    } else {
        String::new()
    }
}

// ---------------------------------------------------------------------------
// aiLlm
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LlmSettings {
    #[serde(flatten)]
    provider: ProviderSettings,
    #[serde(deserialize_with = "lenient_string")]
    system_prompt: String,
    #[serde(deserialize_with = "lenient_string")]
    user_prompt: String,
    #[serde(deserialize_with = "lenient_number")]
    temperature: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    max_tokens: Option<f64>,
}

/// `aiLlm`: free-form chat completion with templated prompts.
pub struct AiLlmStep {
    chat: Arc<dyn ChatTransport>,
}

impl AiLlmStep {
    pub fn new(chat: Arc<dyn ChatTransport>) -> Self {
        Self { chat }
    }
}

impl StepExecutor for AiLlmStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: LlmSettings = match settings_or_error(config, input, "response") {
            Ok(settings) => settings,
            Err(output) => return Ok(StepResult::new(output)),
        };
        let provider = &settings.provider;
        if provider.api_key.is_empty() {
            return Ok(StepResult::new(extend(
                input,
                [("error", Value::from(NO_API_KEY)), ("response", Value::Null)],
            )));
        }

        let system = render_fields(&settings.system_prompt, input);
        let mut request = provider.request("gpt-4o", render_fields(&settings.user_prompt, input));
        request.system = (!system.is_empty()).then_some(system);
        request.temperature = Some(settings.temperature.unwrap_or(0.7));
        request.max_tokens = settings
            .max_tokens
            .filter(|n| *n >= 1.0)
            .map_or(1024, |n| n as u32);
        let model = request.model.clone();

        let output = match self.chat.complete(request).await {
            Ok(completion) => {
                let response = completion
                    .content
                    .filter(|c| !c.is_empty())
                    .unwrap_or(completion.raw);
                extend(
                    input,
                    [
                        ("response", Value::from(response)),
                        ("provider", Value::from(provider.provider_name())),
                        ("model", Value::from(model)),
                    ],
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "llm call failed");
                extend(
                    input,
                    [("error", Value::from(e.to_string())), ("response", Value::Null)],
                )
            }
        };
        Ok(StepResult::new(output))
    }
}

// ---------------------------------------------------------------------------
// aiClassifier
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ClassifierSettings {
    #[serde(flatten)]
    provider: ProviderSettings,
    #[serde(deserialize_with = "lenient_string")]
    input_field: String,
    #[serde(deserialize_with = "lenient_string")]
    categories: String,
}

/// `aiClassifier`: single-label classification of one text field.
pub struct AiClassifierStep {
    chat: Arc<dyn ChatTransport>,
}

impl AiClassifierStep {
    pub fn new(chat: Arc<dyn ChatTransport>) -> Self {
        Self { chat }
    }
}

fn classification_prompt(categories: &str, text: &str) -> String {
    format!(
        "Classify the following text into exactly one of these categories: {categories}.\n\n\
         Text: \"{text}\"\n\n\
         Respond with ONLY the category name, nothing else."
    )
}

impl StepExecutor for AiClassifierStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: ClassifierSettings = match settings_or_error(config, input, "category") {
            Ok(settings) => settings,
            Err(output) => return Ok(StepResult::new(output)),
        };
        let provider = &settings.provider;
        if provider.api_key.is_empty() {
            return Ok(StepResult::new(extend(
                input,
                [("category", Value::Null), ("error", Value::from(NO_API_KEY))],
            )));
        }

        let categories = or_default(&settings.categories, "positive, negative, neutral");
        let text = text_field(input, &settings.input_field);
        let mut request = provider.request(
            "gpt-4o-mini",
            classification_prompt(categories, &text),
        );
        request.temperature = Some(0.0);
        request.max_tokens = 50;
        let model = request.model.clone();

        let output = match self.chat.complete(request).await {
            Ok(completion) => extend(
                input,
                [
                    (
                        "category",
                        Value::from(completion.content.unwrap_or_default().trim()),
                    ),
                    ("provider", Value::from(provider.provider_name())),
                    ("model", Value::from(model)),
                ],
            ),
            Err(e) => {
                tracing::warn!(error = %e, "classifier call failed");
                extend(
                    input,
                    [("category", Value::Null), ("error", Value::from(e.to_string()))],
                )
            }
        };
        Ok(StepResult::new(output))
    }
}

// ---------------------------------------------------------------------------
// aiSummarize
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SummarizeSettings {
    #[serde(flatten)]
    provider: ProviderSettings,
    #[serde(deserialize_with = "lenient_string")]
    input_field: String,
    #[serde(deserialize_with = "lenient_number")]
    max_length: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    language: String,
}

/// Display name for a language code; unknown codes fall back to English.
pub fn language_name(code: &str) -> &'static str {
    match code {
        "ru" => "Russian",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "zh" => "Chinese",
        "ja" => "Japanese",
        _ => "English",
    }
}

/// `aiSummarize`: bounded-length summary in a chosen language.
pub struct AiSummarizeStep {
    chat: Arc<dyn ChatTransport>,
}

impl AiSummarizeStep {
    pub fn new(chat: Arc<dyn ChatTransport>) -> Self {
        Self { chat }
    }
}

impl StepExecutor for AiSummarizeStep {
    async fn execute(
        &self,
        config: &Record,
        input: &Record,
        _ctx: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let settings: SummarizeSettings = match settings_or_error(config, input, "summary") {
            Ok(settings) => settings,
            Err(output) => return Ok(StepResult::new(output)),
        };
        let provider = &settings.provider;
        if provider.api_key.is_empty() {
            return Ok(StepResult::new(extend(
                input,
                [("summary", Value::Null), ("error", Value::from(NO_API_KEY))],
            )));
        }

        let max_length = settings
            .max_length
            .filter(|n| *n != 0.0)
            .unwrap_or(200.0);
        let prompt = format!(
            "Summarize the following text in {}, using at most {} words:\n\n{}",
            language_name(&settings.language),
            to_display_string(Some(&number_value(max_length))),
            text_field(input, &settings.input_field),
        );
        let mut request = provider.request("gpt-4o-mini", prompt);
        request.temperature = Some(0.3);
        let model = request.model.clone();

        let output = match self.chat.complete(request).await {
            Ok(completion) => extend(
                input,
                [
                    (
                        "summary",
                        Value::from(completion.content.unwrap_or_default().trim()),
                    ),
                    ("provider", Value::from(provider.provider_name())),
                    ("model", Value::from(model)),
                ],
            ),
            Err(e) => {
                tracing::warn!(error = %e, "summarize call failed");
                extend(
                    input,
                    [("summary", Value::Null), ("error", Value::from(e.to_string()))],
                )
            }
        };
        Ok(StepResult::new(output))
    }
}
