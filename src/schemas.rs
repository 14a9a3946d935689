//! # Wire Schemas
//!
//! Data structures for the fixed chat-completions request/response
//! contract. The request is always non-streaming; the response carries
//! token usage and, for servers that report them, a native timing
//! breakdown of the prompt and generation phases.

use serde::{Deserialize, Serialize};

/// Chat completion request body sent to the target endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Conversation messages; the benchmark always sends a single user message.
    pub messages: Vec<Message>,
    /// Generation token budget.
    pub max_tokens: u32,
    /// Sampling temperature, fixed per run.
    pub temperature: f32,
    /// Always false; the engine measures complete responses only.
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Build the canonical single-user-message benchmark request.
    pub fn for_prompt(prompt: &str, max_tokens: u32) -> Self {
        Self {
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature: DEFAULT_TEMPERATURE,
            stream: false,
        }
    }
}

/// Fixed sampling temperature used for every benchmark request.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Chat completion response. Fields the statistics path does not consume
/// (choices, model id, ...) are intentionally not modeled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub usage: Usage,
    /// Native timing breakdown, present on llama.cpp-style servers.
    pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Server-reported timing metadata. `prompt_ms > 0` is the signal that
/// the target provides its own phase breakdown; otherwise the driver
/// falls back to a derived generation-rate estimate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timings {
    #[serde(default)]
    pub prompt_ms: f64,
    #[serde(default)]
    pub predicted_ms: f64,
    #[serde(default)]
    pub prompt_per_second: f64,
    #[serde(default)]
    pub predicted_per_second: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_contract() {
        let req = ChatCompletionRequest::for_prompt("hello", 64);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn response_parses_without_timings() {
        let raw = r#"{"usage":{"prompt_tokens":10,"completion_tokens":20,"total_tokens":30}}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.usage.completion_tokens, 20);
        assert!(resp.timings.is_none());
    }

    #[test]
    fn response_parses_partial_timings() {
        let raw = r#"{"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3},
                      "timings":{"predicted_per_second":50.0}}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let timings = resp.timings.unwrap();
        assert_eq!(timings.prompt_ms, 0.0);
        assert_eq!(timings.predicted_per_second, 50.0);
    }
}
