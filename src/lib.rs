//! # loadllm - LLM Endpoint Benchmarking Engine
//!
//! A benchmarking and load-testing engine for OpenAI-compatible chat
//! completion endpoints. loadllm drives single-shot timing runs,
//! sustained concurrent stress tests, and multi-dimensional parameter
//! sweeps (concurrency, generation length, context size, accelerator
//! count), reduces raw per-request measurements into latency and
//! throughput statistics, and renders them as incremental reports.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use loadllm::{driver::{run_benchmark, RequestDriver}, report::render_run_summary};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> loadllm::Result<()> {
//!     let driver = RequestDriver::new("http://localhost:8080", 128, Duration::from_secs(60))?;
//!     let summary = run_benchmark(&driver, "Hello!", 10, 2).await?;
//!     println!("{}", render_run_summary(&summary));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Data flows strictly upward through the modules:
//!
//! - [`driver`] - builds, sends, and measures one request at a time
//! - [`stats`] - pure reduction of outcome slices into summaries
//! - [`stress`] - fixed worker pool with shared counters and stop flag
//! - [`sweep`] - one run per value of one varied parameter
//! - [`suite`] - ordered phases executed against catalog targets
//! - [`report`] - incremental, crash-tolerant report accumulation
//!
//! Supporting modules: [`config`], [`schemas`], [`prompts`],
//! [`catalog`], [`telemetry`], [`error`].

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod prompts;
pub mod report;
pub mod schemas;
pub mod stats;
pub mod stress;
pub mod suite;
pub mod sweep;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use catalog::{Catalog, CatalogEntry};
pub use config::Config;
pub use error::{BenchError, Result};
pub use prompts::PromptSet;
pub use stats::{RequestOutcome, RunSummary, StressSummary};
pub use stress::StressConfig;
pub use suite::{PhaseKind, PhaseOutcome, SuitePhase, SuitePlan, SuiteRunner};
pub use sweep::{
    DeployConfig, DeploymentManager, PointOutcome, RunConfig, SweepKind, SweepPoint, SweepSet,
};
pub use telemetry::TelemetrySample;
