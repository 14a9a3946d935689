//! # Stress Executor
//!
//! Runs a fixed-size pool of concurrent workers against one endpoint
//! until a stop condition fires, then reduces the collected outcomes.
//!
//! Shared state is deliberately minimal: the result collection behind a
//! single mutex, three independent atomic counters for live progress,
//! and a stop flag checked at loop-iteration boundaries. Cancellation is
//! cooperative - a worker mid-request finishes that request before it
//! observes the flag, so a duration-bound run's wall clock is a soft
//! lower bound rather than a hard deadline.

use crate::driver::RequestDriver;
use crate::error::Result;
use crate::prompts::PromptSet;
use crate::stats::{summarize_stress, RequestOutcome, StressSummary};
use chrono::Utc;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Minimum spacing between progress lines.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Stress run parameters. Duration and iteration targets are mutually
/// exclusive; duration takes priority when both are set.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Worker count; any non-positive value is coerced up to 1.
    pub workers: usize,
    /// Wall-clock target for duration-bound runs.
    pub duration: Option<Duration>,
    /// Iteration budget for count-bound runs.
    pub iterations: Option<usize>,
    /// Uncounted sequential warm-up requests issued before the pool starts.
    pub warmup: usize,
}

struct SharedState {
    results: Mutex<Vec<RequestOutcome>>,
    stop: AtomicBool,
    next_iteration: AtomicUsize,
    successes: AtomicU64,
    failures: AtomicU64,
    completion_tokens: AtomicU64,
    /// Guards only the progress-print timestamp, so progress reporting
    /// never contends with result appending.
    last_progress: Mutex<Instant>,
}

/// Run a stress test and reduce it into a [`StressSummary`].
///
/// Individual request failures are recorded and counted, never fatal;
/// the returned summary may legitimately contain zero successes.
pub async fn run_stress(
    driver: Arc<RequestDriver>,
    prompts: Arc<PromptSet>,
    config: StressConfig,
) -> Result<StressSummary> {
    let workers = config.workers.max(1);
    // Duration-bound mode wins when both stop conditions are configured.
    let iteration_target = if config.duration.is_some() {
        None
    } else {
        config.iterations
    };

    warmup(&driver, &prompts, config.warmup).await;

    let state = Arc::new(SharedState {
        results: Mutex::new(Vec::new()),
        stop: AtomicBool::new(false),
        next_iteration: AtomicUsize::new(0),
        successes: AtomicU64::new(0),
        failures: AtomicU64::new(0),
        completion_tokens: AtomicU64::new(0),
        last_progress: Mutex::new(Instant::now()),
    });

    let started_at = Utc::now();
    let started = Instant::now();

    if let Some(duration) = config.duration {
        let timer_state = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            timer_state.stop.store(true, Ordering::SeqCst);
        });
    }

    info!(
        workers,
        duration_secs = config.duration.map(|d| d.as_secs()),
        iterations = iteration_target,
        prompts = prompts.len(),
        "starting stress run"
    );

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        let driver = Arc::clone(&driver);
        let prompts = Arc::clone(&prompts);
        let state = Arc::clone(&state);
        pool.spawn(async move {
            worker_loop(worker_id, driver, prompts, state, iteration_target, started).await;
        });
    }

    // Sleep out the target duration before joining so the stop flag has
    // flipped close to the deadline by the time workers are awaited.
    if let Some(duration) = config.duration {
        tokio::time::sleep(duration).await;
        state.stop.store(true, Ordering::SeqCst);
    }

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "stress worker panicked");
        }
    }

    let elapsed = started.elapsed();
    let outcomes = state.results.lock().await;
    clear_progress_line();
    let summary = summarize_stress(&outcomes, workers, config.duration, started_at, elapsed);
    info!(
        total_requests = summary.total_requests,
        requests_per_sec = summary.requests_per_sec,
        error_rate_pct = summary.error_rate_pct,
        "stress run complete"
    );
    Ok(summary)
}

async fn warmup(driver: &RequestDriver, prompts: &PromptSet, count: usize) {
    for i in 1..=count {
        match driver.execute(prompts.get(i), 0).await {
            Ok(_) => debug!(warmup = i, "warm-up request complete"),
            Err(e) => warn!(warmup = i, error = %e, "warm-up request failed"),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    driver: Arc<RequestDriver>,
    prompts: Arc<PromptSet>,
    state: Arc<SharedState>,
    iteration_target: Option<usize>,
    started: Instant,
) {
    loop {
        if state.stop.load(Ordering::SeqCst) {
            break;
        }

        // Claim the next global iteration index (1-based). All workers
        // draw prompts from the same rotating sequence.
        let iteration = state.next_iteration.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(target) = iteration_target {
            if iteration > target {
                break;
            }
        }

        let prompt = prompts.get(iteration);
        let outcome = match driver.execute(prompt, iteration).await {
            Ok(o) => o,
            Err(e) => RequestOutcome::failed(iteration, e.to_string()),
        };

        if outcome.is_success() {
            state.successes.fetch_add(1, Ordering::Relaxed);
            state
                .completion_tokens
                .fetch_add(u64::from(outcome.completion_tokens), Ordering::Relaxed);
        } else {
            state.failures.fetch_add(1, Ordering::Relaxed);
        }

        state.results.lock().await.push(outcome);
        report_progress(&state, started).await;
    }
    debug!(worker_id, "worker finished");
}

/// Emit one overwritten status line at most every [`PROGRESS_INTERVAL`].
/// Cadence is a usability property only; the counters it reads are the
/// source of truth.
async fn report_progress(state: &SharedState, started: Instant) {
    {
        let mut last = state.last_progress.lock().await;
        if last.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        *last = Instant::now();
    }

    let successes = state.successes.load(Ordering::Relaxed);
    let failures = state.failures.load(Ordering::Relaxed);
    let tokens = state.completion_tokens.load(Ordering::Relaxed);
    let elapsed = started.elapsed().as_secs_f64();
    if elapsed <= 0.0 {
        return;
    }

    let total = successes + failures;
    let error_rate = if total > 0 {
        failures as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    eprint!(
        "\r[{elapsed:7.1}s] requests: {total} ({:.1} req/s) | tokens/s: {:.1} | errors: {error_rate:.1}%   ",
        total as f64 / elapsed,
        tokens as f64 / elapsed,
    );
    let _ = std::io::stderr().flush();
}

fn clear_progress_line() {
    eprint!("\r{:width$}\r", "", width = 100);
    let _ = std::io::stderr().flush();
}
