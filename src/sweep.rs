//! # Sweep Orchestrator
//!
//! Repeats a benchmark or stress run once per value of one ordered
//! parameter list. Request-shape parameters (concurrency, generation
//! length) only mutate a copy of the run configuration; deployment-shape
//! parameters (context window, accelerator count) additionally drive the
//! external deployment manager for every value.
//!
//! Output ordering is significant: `values[i]` and `points[i]` always
//! correspond, even when some values error out. Sweep values run one at
//! a time - concurrency exists only within a value's stress run, never
//! across values.

use crate::driver::{run_benchmark, RequestDriver};
use crate::error::{BenchError, Result};
use crate::prompts::PromptSet;
use crate::stats::{RunSummary, StressSummary};
use crate::stress::{run_stress, StressConfig};
use crate::telemetry::{TelemetrySample, TelemetrySampler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The one parameter a sweep varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    Concurrency,
    MaxTokens,
    ContextSize,
    GpuCount,
}

impl SweepKind {
    pub fn label(self) -> &'static str {
        match self {
            SweepKind::Concurrency => "concurrency",
            SweepKind::MaxTokens => "max_tokens",
            SweepKind::ContextSize => "context_size",
            SweepKind::GpuCount => "gpu_count",
        }
    }

    /// Whether each value needs its own deployment of the target.
    pub fn requires_redeploy(self) -> bool {
        matches!(self, SweepKind::ContextSize | SweepKind::GpuCount)
    }
}

/// Outcome of one sweep value: exactly one variant is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PointOutcome {
    Single(RunSummary),
    Stress(StressSummary),
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: u64,
    pub outcome: PointOutcome,
}

/// One complete sweep: ordered values and index-aligned results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSet {
    pub name: String,
    pub kind: SweepKind,
    pub values: Vec<u64>,
    pub points: Vec<SweepPoint>,
    pub elapsed_secs: f64,
    pub telemetry: Vec<TelemetrySample>,
}

/// Parse a comma-separated list of integers. A malformed entry fails the
/// whole sweep before any run starts.
pub fn parse_value_list(raw: &str) -> Result<Vec<u64>> {
    let values: Vec<u64> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| BenchError::Config(format!("invalid sweep value: {s:?}")))
        })
        .collect::<Result<_>>()?;
    if values.is_empty() {
        return Err(BenchError::Config("empty sweep value list".to_string()));
    }
    Ok(values)
}

/// Run configuration copied and mutated per sweep value.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub endpoint: String,
    pub prompts: Arc<PromptSet>,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub iterations: usize,
    pub warmup: usize,
    pub concurrency: Option<usize>,
    pub duration: Option<Duration>,
}

impl RunConfig {
    /// Concurrency/duration mode engages the stress executor.
    pub fn is_stress(&self) -> bool {
        self.concurrency.is_some() || self.duration.is_some()
    }
}

/// Deployment parameters handed to the deployment manager for values
/// that require re-provisioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    pub context_size: Option<u64>,
    pub gpu_count: Option<u64>,
    pub size_class: Option<String>,
    pub resource_profile: Option<String>,
}

/// External collaborator managing the lifecycle of the thing being
/// benchmarked. Implementations poll at a fixed interval with their own
/// timeouts; failures surface as sweep/phase errors, never as crashes.
#[async_trait]
pub trait DeploymentManager: Send + Sync {
    async fn deploy(&self, target: &str, config: &DeployConfig) -> Result<()>;
    async fn wait_ready(&self, target: &str, timeout: Duration) -> Result<()>;
    /// Resolve a reachable base URL for the deployed target.
    async fn resolve_endpoint(&self, target: &str) -> Result<String>;
    /// Release whatever `resolve_endpoint` set up (tunnels, forwards).
    async fn release_endpoint(&self, target: &str) -> Result<()>;
    async fn teardown(&self, target: &str) -> Result<()>;
}

/// Options applying to a whole sweep.
pub struct SweepOptions<'a> {
    pub manager: Option<&'a dyn DeploymentManager>,
    /// Logical deployment name for redeploying sweeps.
    pub target: String,
    pub deploy_wait: Duration,
    /// Tear deployments down after each value (disabled by `--no-cleanup`).
    pub cleanup: bool,
    /// Telemetry tick interval; `None` disables sampling.
    pub telemetry_interval: Option<Duration>,
    /// Deployment parameters shared by every value; the swept parameter
    /// is overlaid on a copy of this per value.
    pub base_deploy: DeployConfig,
}

impl Default for SweepOptions<'_> {
    fn default() -> Self {
        Self {
            manager: None,
            target: String::new(),
            deploy_wait: Duration::from_secs(600),
            cleanup: true,
            telemetry_interval: None,
            base_deploy: DeployConfig::default(),
        }
    }
}

/// Execute one sweep over `values`, producing one point per value in
/// declared order.
pub async fn run_sweep(
    name: &str,
    kind: SweepKind,
    values: &[u64],
    base: &RunConfig,
    opts: &SweepOptions<'_>,
) -> Result<SweepSet> {
    if kind.requires_redeploy() && opts.manager.is_none() {
        return Err(BenchError::Config(format!(
            "{} sweep requires a deployment manager",
            kind.label()
        )));
    }

    let sampler = opts.telemetry_interval.map(TelemetrySampler::start);
    let started = Instant::now();
    let mut points = Vec::with_capacity(values.len());

    for &value in values {
        info!(sweep = name, parameter = kind.label(), value, "sweep value starting");
        let outcome = if kind.requires_redeploy() {
            run_deployed_point(kind, value, base, opts).await
        } else {
            run_point(&shaped_config(kind, value, base)).await
        };
        if let PointOutcome::Failed(err) = &outcome {
            warn!(sweep = name, value, error = %err, "sweep value failed");
        }
        points.push(SweepPoint { value, outcome });
    }

    let telemetry = match sampler {
        Some(s) => s.stop().await,
        None => Vec::new(),
    };

    Ok(SweepSet {
        name: name.to_string(),
        kind,
        values: values.to_vec(),
        points,
        elapsed_secs: started.elapsed().as_secs_f64(),
        telemetry,
    })
}

/// Apply a request-shape parameter to a copy of the base configuration.
fn shaped_config(kind: SweepKind, value: u64, base: &RunConfig) -> RunConfig {
    let mut config = base.clone();
    match kind {
        SweepKind::Concurrency => config.concurrency = Some(value as usize),
        SweepKind::MaxTokens => config.max_tokens = value as u32,
        // Deployment-shape parameters leave the request untouched.
        SweepKind::ContextSize | SweepKind::GpuCount => {}
    }
    config
}

/// Run one value against an already-reachable endpoint.
pub(crate) async fn run_point(config: &RunConfig) -> PointOutcome {
    let driver = match RequestDriver::new(&config.endpoint, config.max_tokens, config.timeout) {
        Ok(d) => Arc::new(d),
        Err(e) => return PointOutcome::Failed(e.to_string()),
    };

    if config.is_stress() {
        let stress = StressConfig {
            workers: config.concurrency.unwrap_or(1),
            duration: config.duration,
            iterations: if config.duration.is_some() {
                None
            } else {
                Some(config.iterations)
            },
            warmup: config.warmup,
        };
        match run_stress(driver, Arc::clone(&config.prompts), stress).await {
            Ok(summary) => PointOutcome::Stress(summary),
            Err(e) => PointOutcome::Failed(e.to_string()),
        }
    } else {
        match run_benchmark(&driver, config.prompts.get(1), config.iterations, config.warmup).await
        {
            Ok(summary) => PointOutcome::Single(summary),
            Err(e) => PointOutcome::Failed(e.to_string()),
        }
    }
}

/// Provision, run, and (optionally) tear down one deployment-shape value.
/// A failure at any step becomes this point's error; the sweep proceeds
/// to the next value.
async fn run_deployed_point(
    kind: SweepKind,
    value: u64,
    base: &RunConfig,
    opts: &SweepOptions<'_>,
) -> PointOutcome {
    let manager = match opts.manager {
        Some(m) => m,
        None => return PointOutcome::Failed("no deployment manager".to_string()),
    };

    // Any prior deployment of the same logical name is in the way.
    if let Err(e) = manager.teardown(&opts.target).await {
        warn!(target = %opts.target, error = %e, "pre-run teardown failed");
    }

    let mut deploy_config = opts.base_deploy.clone();
    match kind {
        SweepKind::ContextSize => deploy_config.context_size = Some(value),
        SweepKind::GpuCount => deploy_config.gpu_count = Some(value),
        _ => {}
    }

    let outcome = match provision_and_run(manager, &deploy_config, value, kind, base, opts).await {
        Ok(outcome) => outcome,
        Err(e) => PointOutcome::Failed(e.to_string()),
    };

    if opts.cleanup {
        if let Err(e) = manager.teardown(&opts.target).await {
            warn!(target = %opts.target, error = %e, "post-run teardown failed");
        }
    }
    outcome
}

async fn provision_and_run(
    manager: &dyn DeploymentManager,
    deploy_config: &DeployConfig,
    value: u64,
    kind: SweepKind,
    base: &RunConfig,
    opts: &SweepOptions<'_>,
) -> Result<PointOutcome> {
    manager.deploy(&opts.target, deploy_config).await?;
    manager.wait_ready(&opts.target, opts.deploy_wait).await?;
    let endpoint = manager.resolve_endpoint(&opts.target).await?;

    let mut config = shaped_config(kind, value, base);
    config.endpoint = endpoint;
    let outcome = run_point(&config).await;

    if let Err(e) = manager.release_endpoint(&opts.target).await {
        warn!(target = %opts.target, error = %e, "endpoint release failed");
    }
    Ok(outcome)
}
