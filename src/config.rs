//! # Configuration
//!
//! Command-line and environment configuration for the benchmark engine,
//! with `.env` loading and fail-fast validation of anything that would
//! otherwise waste a long run.

use clap::Parser;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(name = "loadllm")]
#[command(about = "Benchmark and load-test an OpenAI-compatible LLM inference endpoint")]
#[command(version)]
pub struct Config {
    /// Base URL of the target endpoint
    #[arg(long, env = "LOADLLM_URL", default_value = "http://localhost:8080")]
    pub url: String,

    /// Fixed prompt sent on every request; overrides the built-in prompt set
    #[arg(long, env = "LOADLLM_PROMPT")]
    pub prompt: Option<String>,

    /// File with one prompt per line, rotated round-robin across requests
    #[arg(long, env = "LOADLLM_PROMPT_FILE")]
    pub prompt_file: Option<String>,

    /// Measured iterations for single-shot and iteration-bound runs
    #[arg(long, env = "LOADLLM_ITERATIONS", default_value = "10")]
    pub iterations: usize,

    /// Uncounted warm-up requests before measurement
    #[arg(long, env = "LOADLLM_WARMUP", default_value = "2")]
    pub warmup: usize,

    /// Generation token budget per request
    #[arg(long, env = "LOADLLM_MAX_TOKENS", default_value = "128")]
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "LOADLLM_TIMEOUT", default_value = "120")]
    pub timeout_secs: u64,

    /// Concurrent workers; enables stress mode
    #[arg(long, env = "LOADLLM_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Wall-clock duration in seconds; enables duration-bound stress mode
    #[arg(long, env = "LOADLLM_DURATION")]
    pub duration_secs: Option<u64>,

    /// Comma-separated concurrency levels to sweep
    #[arg(long, env = "LOADLLM_CONCURRENCY_SWEEP")]
    pub concurrency_sweep: Option<String>,

    /// Comma-separated generation-length caps to sweep
    #[arg(long, env = "LOADLLM_TOKENS_SWEEP")]
    pub tokens_sweep: Option<String>,

    /// Write a markdown report to this path
    #[arg(long, env = "LOADLLM_REPORT")]
    pub report: Option<String>,

    /// Leave deployments running after redeploying sweeps and suites
    #[arg(long, env = "LOADLLM_NO_CLEANUP", default_value = "false")]
    pub no_cleanup: bool,

    /// Deployment readiness timeout in seconds
    #[arg(long, env = "LOADLLM_DEPLOY_WAIT", default_value = "600")]
    pub deploy_wait_secs: u64,

    /// Sample accelerator telemetry while stress runs are active
    #[arg(long, env = "LOADLLM_TELEMETRY", default_value = "false")]
    pub telemetry: bool,

    /// Telemetry sampling interval in seconds
    #[arg(long, env = "LOADLLM_TELEMETRY_INTERVAL", default_value = "5")]
    pub telemetry_interval_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Parse configuration from CLI arguments and environment, set up
    /// logging, and validate. Exits with a message on invalid input.
    pub fn parse_args() -> Self {
        let _ = dotenv::dotenv();
        let config = Self::parse();
        config.setup_logging();
        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {err}");
            std::process::exit(1);
        }
        config
    }

    /// Minimal configuration for tests.
    pub fn for_test() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            prompt: None,
            prompt_file: None,
            iterations: 3,
            warmup: 0,
            max_tokens: 16,
            timeout_secs: 10,
            concurrency: None,
            duration_secs: None,
            concurrency_sweep: None,
            tokens_sweep: None,
            report: None,
            no_cleanup: false,
            deploy_wait_secs: 60,
            telemetry: false,
            telemetry_interval_secs: 5,
            log_level: "info".to_string(),
        }
    }

    fn setup_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_new(&self.log_level)
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub fn validate(&self) -> Result<(), String> {
        match Url::parse(&self.url) {
            Ok(url) => {
                if !["http", "https"].contains(&url.scheme()) {
                    return Err(format!(
                        "invalid URL scheme '{}': only http and https are supported",
                        url.scheme()
                    ));
                }
                if url.host().is_none() {
                    return Err("target URL must include a host".to_string());
                }
            }
            Err(err) => return Err(format!("invalid target URL '{}': {err}", self.url)),
        }

        if self.iterations == 0 && self.duration_secs.is_none() {
            return Err("iterations must be greater than 0 for iteration-bound runs".to_string());
        }
        if self.max_tokens == 0 {
            return Err("max-tokens must be greater than 0".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout must be greater than 0 seconds".to_string());
        }
        if let Some(d) = self.duration_secs {
            if d == 0 {
                return Err("duration must be greater than 0 seconds".to_string());
            }
        }
        if self.concurrency_sweep.is_some() && self.tokens_sweep.is_some() {
            return Err("only one sweep dimension may be given per run".to_string());
        }

        if let Some(workers) = self.concurrency {
            if workers == 0 {
                eprintln!("Warning: concurrency 0 will be coerced up to 1 worker.");
            }
            if workers > 512 {
                eprintln!(
                    "Warning: concurrency {workers} is very high; client-side contention may \
                     distort latency figures."
                );
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    pub fn deploy_wait(&self) -> Duration {
        Duration::from_secs(self.deploy_wait_secs)
    }

    pub fn telemetry_interval(&self) -> Option<Duration> {
        self.telemetry
            .then(|| Duration::from_secs(self.telemetry_interval_secs))
    }

    /// Stress mode is active whenever concurrency or a duration is set.
    pub fn is_stress(&self) -> bool {
        self.concurrency.is_some() || self.duration_secs.is_some()
    }
}
