//! Step registry: node type string to executor.
//!
//! Built once at startup and shared read-only (behind `Arc`) by every run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::transport::{ChatTransport, HttpTransport};

use super::ai::{AiClassifierStep, AiLlmStep, AiSummarizeStep};
use super::box_step::BoxStepExecutor;
use super::branch::{FilterStep, IfConditionStep, SwitchStep};
use super::code::CodeFunctionStep;
use super::delay::DelayStep;
use super::http::HttpRequestStep;
use super::notify::{EmailSendStep, LogStep};
use super::transform::{AggregateStep, LoopStep, MergeStep, SetDataStep, SortStep, SplitStep};
use super::trigger::{ErrorTriggerStep, ScheduleTriggerStep, WebhookTriggerStep};
use super::StepExecutor;

/// Registry of step executors, indexed by node type.
pub struct StepRegistry {
    executors: HashMap<String, BoxStepExecutor>,
}

impl StepRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Registry with all built-in node types.
    ///
    /// `http` backs `httpRequest`; `chat` backs the three AI steps.
    pub fn builtin(http: Arc<dyn HttpTransport>, chat: Arc<dyn ChatTransport>) -> Self {
        let mut registry = Self::new();
        registry.register("webhookTrigger", WebhookTriggerStep);
        registry.register("scheduleTrigger", ScheduleTriggerStep);
        registry.register("errorTrigger", ErrorTriggerStep);
        registry.register("httpRequest", HttpRequestStep::new(http));
        registry.register("codeFunction", CodeFunctionStep);
        registry.register("ifCondition", IfConditionStep);
        registry.register("filter", FilterStep);
        registry.register("switch", SwitchStep);
        registry.register("setData", SetDataStep);
        registry.register("merge", MergeStep);
        registry.register("sort", SortStep);
        registry.register("split", SplitStep);
        registry.register("aggregate", AggregateStep);
        registry.register("loop", LoopStep);
        registry.register("delay", DelayStep);
        registry.register("aiLlm", AiLlmStep::new(chat.clone()));
        registry.register("aiClassifier", AiClassifierStep::new(chat.clone()));
        registry.register("aiSummarize", AiSummarizeStep::new(chat));
        registry.register("emailSend", EmailSendStep);
        registry.register("log", LogStep);
        registry
    }

    /// Register an executor under a node type, replacing any previous one.
    pub fn register<T: StepExecutor + 'static>(&mut self, node_type: impl Into<String>, executor: T) {
        self.executors
            .insert(node_type.into(), BoxStepExecutor::new(executor));
    }

    /// Look up the executor for a node type.
    pub fn get(&self, node_type: &str) -> Option<&BoxStepExecutor> {
        self.executors.get(node_type)
    }

    /// All registered node types, sorted.
    pub fn list_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.executors.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("types", &self.list_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{
        ChatCompletion, ChatRequest, HttpRequest, HttpResponse, TransportError, TransportFuture,
    };

    struct NoHttp;

    impl HttpTransport for NoHttp {
        fn send(&self, _request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
            Box::pin(async { Err(TransportError::Request("offline".to_string())) })
        }
    }

    struct NoChat;

    impl ChatTransport for NoChat {
        fn complete(&self, _request: ChatRequest) -> TransportFuture<'_, ChatCompletion> {
            Box::pin(async { Err(TransportError::Request("offline".to_string())) })
        }
    }

    #[test]
    fn builtin_registers_every_node_type() {
        let registry = StepRegistry::builtin(Arc::new(NoHttp), Arc::new(NoChat));
        let types = registry.list_types();
        assert_eq!(types.len(), 20);
        for expected in [
            "webhookTrigger",
            "httpRequest",
            "codeFunction",
            "ifCondition",
            "setData",
            "merge",
            "scheduleTrigger",
            "delay",
            "switch",
            "loop",
            "filter",
            "sort",
            "split",
            "aggregate",
            "aiLlm",
            "aiClassifier",
            "aiSummarize",
            "emailSend",
            "log",
            "errorTrigger",
        ] {
            assert!(registry.get(expected).is_some(), "missing {expected}");
        }
        assert!(registry.get("unknownType").is_none());
    }

    #[test]
    fn routing_types_route_by_branch() {
        let registry = StepRegistry::builtin(Arc::new(NoHttp), Arc::new(NoChat));
        for routing in ["ifCondition", "filter", "switch"] {
            assert!(registry.get(routing).unwrap().routes_by_branch(), "{routing}");
        }
        assert!(!registry.get("setData").unwrap().routes_by_branch());
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = StepRegistry::new();
        registry.register("x", LogStep);
        registry.register("x", IfConditionStep);
        assert_eq!(registry.list_types(), vec!["x"]);
        assert!(registry.get("x").unwrap().routes_by_branch());
    }
}
