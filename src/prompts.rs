//! Prompt sources for benchmark runs: a single fixed prompt, a
//! user-supplied list loaded from a file (one prompt per line), or the
//! built-in varied set used by default in concurrency/duration mode.

use crate::error::{BenchError, Result};
use std::path::Path;

/// Default single-shot prompt when the user supplies none.
pub const DEFAULT_PROMPT: &str =
    "Explain the difference between latency and throughput in one paragraph.";

/// Built-in varied set: one short, one medium, one long prompt, so a
/// stress run exercises different prompt-processing costs.
const VARIED_PROMPTS: [&str; 3] = [
    "What is the capital of France?",
    "Explain the difference between latency and throughput in a networked \
     system, and give one example of a workload that optimizes for each.",
    "Write a detailed walkthrough of how a transformer language model serves \
     a chat completion request: tokenization of the prompt, the prefill pass \
     over the full context, incremental decoding with a KV cache, sampling \
     from the output distribution, and detokenization of the generated \
     tokens. Mention where batching across concurrent requests helps and \
     where it hurts tail latency.",
];

/// An ordered, immutable prompt list shared by all workers of a run.
#[derive(Debug, Clone)]
pub struct PromptSet {
    prompts: Vec<String>,
}

impl PromptSet {
    /// One fixed prompt repeated for every request.
    pub fn fixed(prompt: &str) -> Self {
        Self {
            prompts: vec![prompt.to_string()],
        }
    }

    /// Load prompts from a file, one per line; blank lines are skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!("cannot read prompt file {}: {e}", path.display()))
        })?;
        let prompts: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if prompts.is_empty() {
            return Err(BenchError::Config(format!(
                "prompt file {} contains no prompts",
                path.display()
            )));
        }
        Ok(Self { prompts })
    }

    /// The built-in short/medium/long set.
    pub fn varied() -> Self {
        Self {
            prompts: VARIED_PROMPTS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Round-robin selection by 1-based global iteration index. All
    /// workers draw from this same rotating sequence.
    pub fn get(&self, iteration: usize) -> &str {
        &self.prompts[(iteration - 1) % self.prompts.len()]
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
