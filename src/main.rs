//! loadllm CLI: single-shot runs, stress tests, and request-shape sweeps
//! against a reachable endpoint. Deployment-driven sweeps and suites are
//! library-level operations wired in by deployment-manager integrations.

use loadllm::config::Config;
use loadllm::driver::{run_benchmark, RequestDriver};
use loadllm::error::Result;
use loadllm::prompts::PromptSet;
use loadllm::report::{
    render_run_summary, render_stress_summary, render_sweep, ReportWriter,
};
use loadllm::stress::{run_stress, StressConfig};
use loadllm::sweep::{parse_value_list, run_sweep, RunConfig, SweepKind, SweepOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse_args();
    info!(url = %config.url, "loadllm starting");

    let prompts = Arc::new(load_prompts(&config)?);
    let mut report = match &config.report {
        Some(path) => Some(ReportWriter::create(Path::new(path))?),
        None => None,
    };

    let run_config = RunConfig {
        endpoint: config.url.clone(),
        prompts: Arc::clone(&prompts),
        max_tokens: config.max_tokens,
        timeout: config.timeout(),
        iterations: config.iterations,
        warmup: config.warmup,
        concurrency: config.concurrency,
        duration: config.duration(),
    };

    if let Some(raw) = &config.concurrency_sweep {
        run_cli_sweep("Concurrency sweep", SweepKind::Concurrency, raw, &run_config, &config, report.as_mut()).await?;
    } else if let Some(raw) = &config.tokens_sweep {
        run_cli_sweep("Generation length sweep", SweepKind::MaxTokens, raw, &run_config, &config, report.as_mut()).await?;
    } else if config.is_stress() {
        let driver = Arc::new(RequestDriver::new(&config.url, config.max_tokens, config.timeout())?);
        let summary = run_stress(
            driver,
            prompts,
            StressConfig {
                workers: config.concurrency.unwrap_or(1),
                duration: config.duration(),
                iterations: if config.duration_secs.is_some() {
                    None
                } else {
                    Some(config.iterations)
                },
                warmup: config.warmup,
            },
        )
        .await?;
        println!("{}", render_stress_summary(&summary));
        if let Some(writer) = report.as_mut() {
            writer.stress_section("Stress run", &summary)?;
        }
    } else {
        let driver = RequestDriver::new(&config.url, config.max_tokens, config.timeout())?;
        let summary = run_benchmark(&driver, prompts.get(1), config.iterations, config.warmup).await?;
        println!("{}", render_run_summary(&summary));
        if let Some(writer) = report.as_mut() {
            writer.run_section("Single-shot benchmark", &summary)?;
        }
    }

    if let Some(writer) = report {
        writer.finish()?;
        if let Some(path) = &config.report {
            info!(path = %path, "report written");
        }
    }
    Ok(())
}

/// Prompt source precedence: explicit file, then an explicit fixed
/// prompt, then the built-in varied set in stress mode, then the
/// default single prompt.
fn load_prompts(config: &Config) -> Result<PromptSet> {
    if let Some(path) = &config.prompt_file {
        return PromptSet::from_file(Path::new(path));
    }
    if let Some(prompt) = &config.prompt {
        return Ok(PromptSet::fixed(prompt));
    }
    if config.is_stress() {
        return Ok(PromptSet::varied());
    }
    Ok(PromptSet::fixed(loadllm::prompts::DEFAULT_PROMPT))
}

async fn run_cli_sweep(
    name: &str,
    kind: SweepKind,
    raw_values: &str,
    run_config: &RunConfig,
    config: &Config,
    report: Option<&mut ReportWriter>,
) -> Result<()> {
    let values = parse_value_list(raw_values)?;
    let opts = SweepOptions {
        telemetry_interval: config.telemetry_interval(),
        cleanup: !config.no_cleanup,
        deploy_wait: config.deploy_wait(),
        ..SweepOptions::default()
    };
    let sweep = run_sweep(name, kind, &values, run_config, &opts).await?;
    println!("{}", render_sweep(&sweep));
    if let Some(writer) = report {
        writer.sweep_section(&sweep)?;
    }
    Ok(())
}
