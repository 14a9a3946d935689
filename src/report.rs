//! # Report Accumulator
//!
//! Serializes run/sweep/phase outcomes into a human-readable report
//! incrementally as they complete. The writer holds one open output
//! stream for the suite's lifetime and flushes after every section, so a
//! crash mid-suite still leaves a partial report on disk. I/O errors are
//! always surfaced - a requested report that cannot be written is a
//! contract violation.

use crate::error::Result;
use crate::stats::{RunSummary, StressSummary};
use crate::sweep::{PointOutcome, SweepSet};
use chrono::Utc;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// Placeholder for table cells that are unavailable for a point (errored
/// values, fields not applicable to the run kind).
const PLACEHOLDER: &str = "-";

pub struct ReportWriter {
    out: BufWriter<File>,
    started: Instant,
}

impl ReportWriter {
    /// Open the report file and write its header.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = Self {
            out: BufWriter::new(file),
            started: Instant::now(),
        };
        writeln!(writer.out, "# loadllm benchmark report")?;
        writeln!(writer.out)?;
        writeln!(writer.out, "Generated: {}", Utc::now().to_rfc3339())?;
        writer.out.flush()?;
        Ok(writer)
    }

    /// Append a titled free-form section.
    pub fn section(&mut self, title: &str, body: &str) -> Result<()> {
        writeln!(self.out, "\n## {title}\n")?;
        writeln!(self.out, "{body}")?;
        self.out.flush()?;
        Ok(())
    }

    pub fn run_section(&mut self, title: &str, summary: &RunSummary) -> Result<()> {
        self.section(title, &render_run_summary(summary))
    }

    pub fn stress_section(&mut self, title: &str, summary: &StressSummary) -> Result<()> {
        self.section(title, &render_stress_summary(summary))
    }

    pub fn sweep_section(&mut self, sweep: &SweepSet) -> Result<()> {
        self.section(&sweep.name, &render_sweep(sweep))
    }

    /// Append a short note, used for per-phase failure records.
    pub fn note(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "\n> {text}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Append the trailer and close the stream.
    pub fn finish(mut self) -> Result<()> {
        writeln!(self.out, "\n---")?;
        writeln!(
            self.out,
            "Total elapsed: {:.1}s | loadllm v{}",
            self.started.elapsed().as_secs_f64(),
            env!("CARGO_PKG_VERSION"),
        )?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn render_run_summary(s: &RunSummary) -> String {
    format!(
        "iterations: {} (ok {}, failed {})\n\
         input tokens: {}\n\
         latency ms: min {:.1} / mean {:.1} / max {:.1}\n\
         latency percentiles ms: p50 {:.1} / p95 {:.1} / p99 {:.1}\n\
         generation tok/s: min {:.1} / mean {:.1} / max {:.1}\n\
         started: {} | elapsed: {:.1}s",
        s.iterations,
        s.successful_runs,
        s.failed_runs,
        s.input_tokens,
        s.latency_min_ms,
        s.latency_mean_ms,
        s.latency_max_ms,
        s.latency_p50_ms,
        s.latency_p95_ms,
        s.latency_p99_ms,
        s.generation_tok_per_sec_min,
        s.generation_tok_per_sec_mean,
        s.generation_tok_per_sec_max,
        s.started_at.to_rfc3339(),
        s.elapsed_secs,
    )
}

pub fn render_stress_summary(s: &StressSummary) -> String {
    let duration = s
        .target_duration_secs
        .map_or_else(|| PLACEHOLDER.to_string(), |d| format!("{d}s"));
    format!(
        "{}\nworkers: {} | target duration: {}\n\
         total requests: {} | req/s: {:.2} | error rate: {:.1}%\n\
         peak throughput: {:.1} tok/s | throughput spread: {:.2}",
        render_run_summary(&s.run),
        s.workers,
        duration,
        s.total_requests,
        s.requests_per_sec,
        s.error_rate_pct,
        s.peak_throughput,
        s.throughput_spread,
    )
}

/// Render a sweep as a table. Every declared parameter value appears
/// exactly once, with placeholders for cells a point cannot fill.
pub fn render_sweep(sweep: &SweepSet) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "parameter: {} | values: {:?} | elapsed: {:.1}s\n\n",
        sweep.kind.label(),
        sweep.values,
        sweep.elapsed_secs,
    ));
    out.push_str("| value | requests | ok | failed | mean ms | p95 ms | p99 ms | gen tok/s | req/s | error |\n");
    out.push_str("|-------|----------|----|--------|---------|--------|--------|-----------|-------|-------|\n");

    for point in &sweep.points {
        let row = match &point.outcome {
            PointOutcome::Single(run) => format!(
                "| {} | {} | {} | {} | {:.1} | {:.1} | {:.1} | {:.1} | {} | {} |",
                point.value,
                run.iterations,
                run.successful_runs,
                run.failed_runs,
                run.latency_mean_ms,
                run.latency_p95_ms,
                run.latency_p99_ms,
                run.generation_tok_per_sec_mean,
                PLACEHOLDER,
                PLACEHOLDER,
            ),
            PointOutcome::Stress(s) => format!(
                "| {} | {} | {} | {} | {:.1} | {:.1} | {:.1} | {:.1} | {:.2} | {} |",
                point.value,
                s.total_requests,
                s.run.successful_runs,
                s.run.failed_runs,
                s.run.latency_mean_ms,
                s.run.latency_p95_ms,
                s.run.latency_p99_ms,
                s.run.generation_tok_per_sec_mean,
                s.requests_per_sec,
                PLACEHOLDER,
            ),
            PointOutcome::Failed(err) => format!(
                "| {} | {p} | {p} | {p} | {p} | {p} | {p} | {p} | {p} | {} |",
                point.value,
                err.replace('|', "/"),
                p = PLACEHOLDER,
            ),
        };
        out.push_str(&row);
        out.push('\n');
    }

    if !sweep.telemetry.is_empty() {
        let peak_util = sweep
            .telemetry
            .iter()
            .map(|t| t.utilization_pct)
            .fold(0.0, f64::max);
        let peak_mem = sweep
            .telemetry
            .iter()
            .map(|t| t.memory_used_mib)
            .max()
            .unwrap_or(0);
        out.push_str(&format!(
            "\ntelemetry: {} samples | peak utilization {:.0}% | peak memory {} MiB\n",
            sweep.telemetry.len(),
            peak_util,
            peak_mem,
        ));
    }
    out
}
