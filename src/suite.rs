//! # Suite Runner
//!
//! Executes a named, ordered list of phases against one or more catalog
//! targets. Each phase varies at most one sweep dimension; a phase with
//! no dimension is a pure cache-preload step, and a concurrency phase
//! with exactly one value and a duration is a stability run. One failed
//! phase never prevents later phases from running.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::report::{render_stress_summary, ReportWriter};
use crate::stats::StressSummary;
use crate::stress::{run_stress, StressConfig};
use crate::sweep::{
    run_sweep, DeployConfig, DeploymentManager, PointOutcome, RunConfig, SweepKind, SweepOptions,
    SweepPoint, SweepSet,
};
use crate::driver::RequestDriver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The sweep dimension a phase varies. Mutually exclusive by
/// construction: a phase holds exactly one variant.
#[derive(Debug, Clone)]
pub enum PhaseKind {
    /// Concurrency levels. One value plus a phase duration is a
    /// stability run; several values are a multi-point sweep.
    Concurrency(Vec<u64>),
    /// Generation-length caps; request-shape only, no redeploys.
    MaxTokens(Vec<u64>),
    /// Context window sizes; always redeploys per value.
    ContextSize(Vec<u64>),
    /// Nested: for each accelerator count, redeploy once and sweep
    /// concurrency within that deployment.
    GpuScaling {
        gpus: Vec<u64>,
        concurrency: Vec<u64>,
    },
    /// Cache-preload step with no request traffic.
    Preload,
}

#[derive(Debug, Clone)]
pub struct SuitePhase {
    pub description: String,
    /// Stress duration applied to each value's run, where applicable.
    pub duration: Option<Duration>,
    pub kind: PhaseKind,
}

/// A declarative, ordered benchmark suite.
#[derive(Debug, Clone)]
pub struct SuitePlan {
    pub name: String,
    pub phases: Vec<SuitePhase>,
}

impl SuitePlan {
    /// The default suite: preload, a short concurrency sweep, a
    /// stability hold, generation-length and context sweeps, then GPU
    /// scaling.
    pub fn standard(phase_duration: Duration) -> Self {
        Self {
            name: "standard".to_string(),
            phases: vec![
                SuitePhase {
                    description: "Cache preload".to_string(),
                    duration: None,
                    kind: PhaseKind::Preload,
                },
                SuitePhase {
                    description: "Concurrency scaling".to_string(),
                    duration: Some(phase_duration),
                    kind: PhaseKind::Concurrency(vec![1, 2, 4, 8]),
                },
                SuitePhase {
                    description: "Stability hold".to_string(),
                    duration: Some(phase_duration * 4),
                    kind: PhaseKind::Concurrency(vec![4]),
                },
                SuitePhase {
                    description: "Generation length".to_string(),
                    duration: None,
                    kind: PhaseKind::MaxTokens(vec![64, 256, 1024]),
                },
                SuitePhase {
                    description: "Context size".to_string(),
                    duration: None,
                    kind: PhaseKind::ContextSize(vec![8192, 32768]),
                },
                SuitePhase {
                    description: "GPU scaling".to_string(),
                    duration: Some(phase_duration),
                    kind: PhaseKind::GpuScaling {
                        gpus: vec![1, 2],
                        concurrency: vec![1, 4, 8],
                    },
                },
            ],
        }
    }
}

/// What one phase produced for one target.
#[derive(Debug, Clone)]
pub enum PhaseOutcome {
    Sweep(SweepSet),
    Stability(StressSummary),
    /// One concurrency sweep per accelerator count, in declared order.
    Scaling(Vec<SweepSet>),
    Preload,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub description: String,
    /// (catalog target id, outcome) per target, in declared order.
    pub outcomes: Vec<(String, PhaseOutcome)>,
}

pub struct SuiteRunner<'a> {
    pub manager: &'a dyn DeploymentManager,
    pub catalog: &'a Catalog,
    /// Base run configuration; endpoint is filled per deployment.
    pub base: RunConfig,
    pub deploy_wait: Duration,
    pub cleanup: bool,
    pub telemetry_interval: Option<Duration>,
}

impl SuiteRunner<'_> {
    /// Execute the plan phase by phase, appending one report section per
    /// phase as it completes. Phase failures are recorded and the runner
    /// continues; only report I/O failures abort the suite.
    pub async fn run(
        &self,
        plan: &SuitePlan,
        targets: &[String],
        report: &mut ReportWriter,
    ) -> Result<Vec<PhaseResult>> {
        info!(suite = %plan.name, phases = plan.phases.len(), targets = targets.len(), "suite starting");
        let mut results = Vec::with_capacity(plan.phases.len());

        for phase in &plan.phases {
            let mut outcomes = Vec::with_capacity(targets.len());
            for target in targets {
                info!(phase = %phase.description, target = %target, "phase starting");
                let outcome = self.run_phase(phase, target).await;
                if let PhaseOutcome::Failed(err) = &outcome {
                    warn!(phase = %phase.description, target = %target, error = %err, "phase failed");
                }
                outcomes.push((target.clone(), outcome));
            }

            let result = PhaseResult {
                description: phase.description.clone(),
                outcomes,
            };
            self.write_phase(report, &result)?;
            results.push(result);
        }
        Ok(results)
    }

    async fn run_phase(&self, phase: &SuitePhase, target: &str) -> PhaseOutcome {
        match &phase.kind {
            // Deployment-shape sweeps drive provisioning per value
            // themselves; no outer bracket.
            PhaseKind::ContextSize(values) => {
                let opts = self.sweep_options(target);
                let name = format!("{} [{target}]", phase.description);
                match run_sweep(&name, SweepKind::ContextSize, values, &self.base, &opts).await {
                    Ok(sweep) => PhaseOutcome::Sweep(sweep),
                    Err(e) => PhaseOutcome::Failed(e.to_string()),
                }
            }
            PhaseKind::GpuScaling { gpus, concurrency } => {
                self.run_gpu_scaling(phase, target, gpus, concurrency).await
            }
            // Everything else runs inside one deployment of the target.
            _ => match self.run_bracketed_phase(phase, target).await {
                Ok(outcome) => outcome,
                Err(e) => PhaseOutcome::Failed(e.to_string()),
            },
        }
    }

    /// Deploy the target, run the phase body against its endpoint, then
    /// release and (optionally) tear down.
    async fn run_bracketed_phase(
        &self,
        phase: &SuitePhase,
        target: &str,
    ) -> Result<PhaseOutcome> {
        let endpoint = self.provision(target, &self.deploy_defaults(target)?).await?;
        let outcome = self.run_phase_body(phase, target, &endpoint).await;
        self.release(target).await;
        outcome
    }

    async fn run_phase_body(
        &self,
        phase: &SuitePhase,
        target: &str,
        endpoint: &str,
    ) -> Result<PhaseOutcome> {
        let mut base = self.base.clone();
        base.endpoint = endpoint.to_string();
        base.duration = phase.duration.or(base.duration);

        match &phase.kind {
            PhaseKind::Preload => {
                // Readiness polling already forced the cold-start work;
                // no request traffic in this phase.
                Ok(PhaseOutcome::Preload)
            }
            PhaseKind::Concurrency(values) if values.len() == 1 && phase.duration.is_some() => {
                let driver = Arc::new(RequestDriver::new(
                    &base.endpoint,
                    base.max_tokens,
                    base.timeout,
                )?);
                let summary = run_stress(
                    driver,
                    Arc::clone(&base.prompts),
                    StressConfig {
                        workers: values[0] as usize,
                        duration: phase.duration,
                        iterations: None,
                        warmup: base.warmup,
                    },
                )
                .await?;
                Ok(PhaseOutcome::Stability(summary))
            }
            PhaseKind::Concurrency(values) => {
                let name = format!("{} [{target}]", phase.description);
                let sweep = run_sweep(
                    &name,
                    SweepKind::Concurrency,
                    values,
                    &base,
                    &self.sweep_options(target),
                )
                .await?;
                Ok(PhaseOutcome::Sweep(sweep))
            }
            PhaseKind::MaxTokens(values) => {
                let name = format!("{} [{target}]", phase.description);
                let sweep = run_sweep(
                    &name,
                    SweepKind::MaxTokens,
                    values,
                    &base,
                    &self.sweep_options(target),
                )
                .await?;
                Ok(PhaseOutcome::Sweep(sweep))
            }
            PhaseKind::ContextSize(_) | PhaseKind::GpuScaling { .. } => {
                unreachable!("deployment-shape phases are dispatched in run_phase")
            }
        }
    }

    /// For each accelerator count: redeploy once, sweep concurrency
    /// within that deployment. A failed bracket yields a sweep whose
    /// points all carry the bracket error, keeping the declared
    /// concurrency values in the rendered output.
    async fn run_gpu_scaling(
        &self,
        phase: &SuitePhase,
        target: &str,
        gpus: &[u64],
        concurrency: &[u64],
    ) -> PhaseOutcome {
        let mut sweeps = Vec::with_capacity(gpus.len());
        for &gpu_count in gpus {
            let name = format!("{} [{target}] gpus={gpu_count}", phase.description);
            let deploy = match self.deploy_defaults(target) {
                Ok(mut d) => {
                    d.gpu_count = Some(gpu_count);
                    d
                }
                Err(e) => {
                    sweeps.push(failed_sweep(&name, SweepKind::Concurrency, concurrency, &e.to_string()));
                    continue;
                }
            };

            match self.provision(target, &deploy).await {
                Ok(endpoint) => {
                    let mut base = self.base.clone();
                    base.endpoint = endpoint;
                    base.duration = phase.duration.or(base.duration);
                    let result = run_sweep(
                        &name,
                        SweepKind::Concurrency,
                        concurrency,
                        &base,
                        &self.sweep_options(target),
                    )
                    .await;
                    self.release(target).await;
                    match result {
                        Ok(sweep) => sweeps.push(sweep),
                        Err(e) => sweeps.push(failed_sweep(
                            &name,
                            SweepKind::Concurrency,
                            concurrency,
                            &e.to_string(),
                        )),
                    }
                }
                Err(e) => {
                    warn!(target = %target, gpu_count, error = %e, "gpu scaling bracket failed");
                    sweeps.push(failed_sweep(
                        &name,
                        SweepKind::Concurrency,
                        concurrency,
                        &e.to_string(),
                    ));
                }
            }
        }
        PhaseOutcome::Scaling(sweeps)
    }

    async fn provision(&self, target: &str, config: &DeployConfig) -> Result<String> {
        if let Err(e) = self.manager.teardown(target).await {
            warn!(target = %target, error = %e, "pre-phase teardown failed");
        }
        self.manager.deploy(target, config).await?;
        self.manager.wait_ready(target, self.deploy_wait).await?;
        self.manager.resolve_endpoint(target).await
    }

    async fn release(&self, target: &str) {
        if let Err(e) = self.manager.release_endpoint(target).await {
            warn!(target = %target, error = %e, "endpoint release failed");
        }
        if self.cleanup {
            if let Err(e) = self.manager.teardown(target).await {
                warn!(target = %target, error = %e, "post-phase teardown failed");
            }
        }
    }

    fn deploy_defaults(&self, target: &str) -> Result<DeployConfig> {
        let entry = self.catalog.entry(target)?;
        Ok(DeployConfig {
            context_size: None,
            gpu_count: Some(entry.default_gpus),
            size_class: Some(entry.size_class.clone()),
            resource_profile: Some(entry.resource_profile.clone()),
        })
    }

    fn sweep_options(&self, target: &str) -> SweepOptions<'_> {
        let base_deploy = self.deploy_defaults(target).unwrap_or_default();
        SweepOptions {
            manager: Some(self.manager),
            target: target.to_string(),
            deploy_wait: self.deploy_wait,
            cleanup: self.cleanup,
            telemetry_interval: self.telemetry_interval,
            base_deploy,
        }
    }

    fn write_phase(&self, report: &mut ReportWriter, result: &PhaseResult) -> Result<()> {
        for (target, outcome) in &result.outcomes {
            match outcome {
                PhaseOutcome::Sweep(sweep) => report.sweep_section(sweep)?,
                PhaseOutcome::Scaling(sweeps) => {
                    for sweep in sweeps {
                        report.sweep_section(sweep)?;
                    }
                }
                PhaseOutcome::Stability(summary) => report.section(
                    &format!("{} [{target}]", result.description),
                    &render_stress_summary(summary),
                )?,
                PhaseOutcome::Preload => report.section(
                    &format!("{} [{target}]", result.description),
                    "Cache preload completed; no request traffic issued.",
                )?,
                PhaseOutcome::Failed(err) => report.note(&format!(
                    "phase '{}' failed for {target}: {err}",
                    result.description
                ))?,
            }
        }
        Ok(())
    }
}

/// A sweep whose every point records the same error, used when an
/// enclosing deployment bracket failed before any value could run.
fn failed_sweep(name: &str, kind: SweepKind, values: &[u64], error: &str) -> SweepSet {
    SweepSet {
        name: name.to_string(),
        kind,
        values: values.to_vec(),
        points: values
            .iter()
            .map(|&value| SweepPoint {
                value,
                outcome: PointOutcome::Failed(error.to_string()),
            })
            .collect(),
        elapsed_secs: 0.0,
        telemetry: Vec::new(),
    }
}
