//! # Request Driver
//!
//! Issues one chat-completion request at a time and measures it. The
//! driver owns a pooled `reqwest::Client`; wall-clock time is taken
//! strictly around the network call. When the target reports its own
//! prompt/generation timing breakdown that is used directly, otherwise a
//! derived generation-rate estimate keeps throughput measurable against
//! targets that omit timing metadata.

use crate::error::{BenchError, Result};
use crate::schemas::{ChatCompletionRequest, ChatCompletionResponse};
use crate::stats::{summarize, RequestOutcome, RunSummary};
use chrono::Utc;
use reqwest::{Client, ClientBuilder};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Path of the chat-completions endpoint relative to the base URL.
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug)]
pub struct RequestDriver {
    client: Client,
    base_url: String,
    max_tokens: u32,
}

impl RequestDriver {
    /// Build a driver for one endpoint with a per-request timeout.
    pub fn new(base_url: &str, max_tokens: u32, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(64)
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request and return its measured outcome.
    ///
    /// Non-2xx responses come back as [`BenchError::HttpStatus`]; the
    /// caller decides whether to record that as a failed outcome. The
    /// driver never retries.
    pub async fn execute(&self, prompt: &str, iteration: usize) -> Result<RequestOutcome> {
        let body = ChatCompletionRequest::for_prompt(prompt, self.max_tokens);
        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH);

        let started = Instant::now();
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        let total = started.elapsed();

        if !status.is_success() {
            return Err(BenchError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| BenchError::Request(format!("malformed response body: {e}")))?;

        let total_ms = total.as_secs_f64() * 1000.0;
        let usage = parsed.usage;

        let native = parsed.timings.filter(|t| t.prompt_ms > 0.0);
        let outcome = match native {
            Some(timings) => RequestOutcome {
                iteration,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                prompt_time_ms: timings.prompt_ms,
                generation_time_ms: timings.predicted_ms,
                total_time_ms: total_ms,
                prompt_tok_per_sec: timings.prompt_per_second,
                generation_tok_per_sec: timings.predicted_per_second,
                error: None,
            },
            None => {
                // Only throughput signal available against targets that
                // omit timing metadata.
                let derived = if total.as_secs_f64() > 0.0 {
                    usage.completion_tokens as f64 / total.as_secs_f64()
                } else {
                    0.0
                };
                RequestOutcome {
                    iteration,
                    prompt_tokens: usage.prompt_tokens,
                    completion_tokens: usage.completion_tokens,
                    total_tokens: usage.total_tokens,
                    prompt_time_ms: 0.0,
                    generation_time_ms: 0.0,
                    total_time_ms: total_ms,
                    prompt_tok_per_sec: 0.0,
                    generation_tok_per_sec: derived,
                    error: None,
                }
            }
        };

        debug!(
            iteration,
            latency_ms = outcome.total_time_ms,
            gen_tok_per_sec = outcome.generation_tok_per_sec,
            "request complete"
        );
        Ok(outcome)
    }
}

/// Run a sequential single-shot benchmark: `warmup` uncounted requests,
/// then `iterations` measured attempts.
///
/// Individual failures are recorded as outcomes with error strings; the
/// run as a whole errors only when zero iterations succeeded, since a
/// summary with no successes is not actionable.
pub async fn run_benchmark(
    driver: &RequestDriver,
    prompt: &str,
    iterations: usize,
    warmup: usize,
) -> Result<RunSummary> {
    let started_at = Utc::now();
    let started = Instant::now();

    for i in 0..warmup {
        match driver.execute(prompt, 0).await {
            Ok(_) => debug!(warmup = i + 1, "warm-up request complete"),
            Err(e) => warn!(warmup = i + 1, error = %e, "warm-up request failed"),
        }
    }

    let mut outcomes = Vec::with_capacity(iterations);
    for i in 1..=iterations {
        let outcome = match driver.execute(prompt, i).await {
            Ok(o) => o,
            Err(e) => {
                warn!(iteration = i, error = %e, "request failed");
                RequestOutcome::failed(i, e.to_string())
            }
        };
        outcomes.push(outcome);
    }

    let summary = summarize(&outcomes, started_at, started.elapsed());
    if summary.successful_runs == 0 {
        return Err(BenchError::AllIterationsFailed);
    }
    Ok(summary)
}
