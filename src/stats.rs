//! # Statistics Reducer
//!
//! Pure functions that reduce a slice of per-request outcomes into
//! latency/throughput summaries. Nothing here performs I/O or holds
//! state; summaries are constructed once and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of one request attempt, success or failure, with its
/// measurements. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// 1-based global iteration index that issued this request.
    pub iteration: usize,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Prompt-phase time in milliseconds (0 when the target reports no timings).
    pub prompt_time_ms: f64,
    /// Generation-phase time in milliseconds (0 when the target reports no timings).
    pub generation_time_ms: f64,
    /// Wall-clock time of the whole request in milliseconds.
    pub total_time_ms: f64,
    pub prompt_tok_per_sec: f64,
    pub generation_tok_per_sec: f64,
    /// Non-empty when the attempt failed; such outcomes carry no valid
    /// measurements and are excluded from latency/throughput statistics.
    pub error: Option<String>,
}

impl RequestOutcome {
    /// Outcome recording a failed attempt.
    pub fn failed(iteration: usize, error: String) -> Self {
        Self {
            iteration,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            prompt_time_ms: 0.0,
            generation_time_ms: 0.0,
            total_time_ms: 0.0,
            prompt_tok_per_sec: 0.0,
            generation_tok_per_sec: 0.0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Statistical reduction of many outcomes for one fixed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total measured attempts (warm-ups excluded).
    pub iterations: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    /// Prompt token count, assumed constant across attempts.
    pub input_tokens: u32,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
    pub latency_mean_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub generation_tok_per_sec_mean: f64,
    pub generation_tok_per_sec_min: f64,
    pub generation_tok_per_sec_max: f64,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
}

/// A [`RunSummary`] plus concurrency-specific fields for stress runs.
///
/// Invariant: `total_requests == run.successful_runs + run.failed_runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressSummary {
    #[serde(flatten)]
    pub run: RunSummary,
    pub workers: usize,
    /// Target duration in seconds for duration-bound runs.
    pub target_duration_secs: Option<u64>,
    pub total_requests: usize,
    pub requests_per_sec: f64,
    pub error_rate_pct: f64,
    /// Highest generation rate observed in any single successful request.
    pub peak_throughput: f64,
    /// Spread of generation rates: sum of squared deviations scaled by
    /// 1/n, truncated to two decimals. Not a true standard deviation;
    /// downstream comparisons rely on this scale.
    pub throughput_spread: f64,
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolation percentile over an ascending-sorted slice.
///
/// For index `k = (p/100) * (n-1)` the result interpolates between
/// `floor(k)` and `ceil(k)` weighted by the fractional part. A single
/// element is returned as-is for any `p`; an empty slice yields 0.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let k = (p / 100.0) * (n - 1) as f64;
            let lo = k.floor() as usize;
            let hi = k.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                let frac = k - lo as f64;
                sorted[lo] + (sorted[hi] - sorted[lo]) * frac
            }
        }
    }
}

/// Reduce an outcome sequence into a [`RunSummary`].
///
/// Latency statistics are computed from the wall time of successful
/// outcomes only. Throughput statistics additionally exclude outcomes
/// with a non-positive generation rate, so a zero rate from a missing
/// timing field never pollutes the distribution.
pub fn summarize(
    outcomes: &[RequestOutcome],
    started_at: DateTime<Utc>,
    elapsed: Duration,
) -> RunSummary {
    let successful: Vec<&RequestOutcome> = outcomes.iter().filter(|o| o.is_success()).collect();
    let failed = outcomes.len() - successful.len();

    let mut latencies: Vec<f64> = successful.iter().map(|o| o.total_time_ms).collect();
    latencies.sort_by(|a, b| a.total_cmp(b));

    let rates: Vec<f64> = successful
        .iter()
        .map(|o| o.generation_tok_per_sec)
        .filter(|r| *r > 0.0)
        .collect();

    RunSummary {
        iterations: outcomes.len(),
        successful_runs: successful.len(),
        failed_runs: failed,
        input_tokens: successful.first().map_or(0, |o| o.prompt_tokens),
        latency_min_ms: latencies.first().copied().unwrap_or(0.0),
        latency_max_ms: latencies.last().copied().unwrap_or(0.0),
        latency_mean_ms: mean(&latencies),
        latency_p50_ms: percentile(&latencies, 50.0),
        latency_p95_ms: percentile(&latencies, 95.0),
        latency_p99_ms: percentile(&latencies, 99.0),
        generation_tok_per_sec_mean: mean(&rates),
        generation_tok_per_sec_min: if rates.is_empty() {
            0.0
        } else {
            rates.iter().copied().fold(f64::INFINITY, f64::min)
        },
        generation_tok_per_sec_max: rates.iter().copied().fold(0.0, f64::max),
        started_at,
        elapsed_secs: elapsed.as_secs_f64(),
    }
}

/// Reduce a stress run's outcomes into a [`StressSummary`].
pub fn summarize_stress(
    outcomes: &[RequestOutcome],
    workers: usize,
    target_duration: Option<Duration>,
    started_at: DateTime<Utc>,
    elapsed: Duration,
) -> StressSummary {
    let run = summarize(outcomes, started_at, elapsed);
    let total = outcomes.len();

    let elapsed_secs = elapsed.as_secs_f64();
    let requests_per_sec = if elapsed_secs > 0.0 {
        total as f64 / elapsed_secs
    } else {
        0.0
    };
    let error_rate_pct = if total > 0 {
        run.failed_runs as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let rates: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.is_success() && o.generation_tok_per_sec > 0.0)
        .map(|o| o.generation_tok_per_sec)
        .collect();
    let peak_throughput = rates.iter().copied().fold(0.0, f64::max);
    let spread_mean = mean(&rates);
    let spread = if rates.is_empty() {
        0.0
    } else {
        // sqrt approximation via variance; kept on this scale on purpose
        let sum_sq: f64 = rates.iter().map(|r| (r - spread_mean).powi(2)).sum();
        ((sum_sq / rates.len() as f64) * 100.0).trunc() / 100.0
    };

    StressSummary {
        run,
        workers,
        target_duration_secs: target_duration.map(|d| d.as_secs()),
        total_requests: total,
        requests_per_sec,
        error_rate_pct,
        peak_throughput,
        throughput_spread: spread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(latency_ms: f64, rate: f64) -> RequestOutcome {
        RequestOutcome {
            iteration: 1,
            prompt_tokens: 10,
            completion_tokens: 20,
            total_tokens: 30,
            prompt_time_ms: 0.0,
            generation_time_ms: 0.0,
            total_time_ms: latency_ms,
            prompt_tok_per_sec: 0.0,
            generation_tok_per_sec: rate,
            error: None,
        }
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn mean_basic() {
        assert_eq!(mean(&[10.0, 20.0, 30.0, 40.0]), 25.0);
    }

    #[test]
    fn percentile_single_element_for_any_p() {
        for p in [0.0, 1.0, 50.0, 95.0, 100.0] {
            assert_eq!(percentile(&[42.0], p), 42.0);
        }
    }

    #[test]
    fn percentile_empty_is_zero() {
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn percentile_linear_interpolation() {
        let xs = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&xs, 50.0), 30.0);
        assert!((percentile(&xs, 95.0) - 48.0).abs() < 1e-9);
        assert!((percentile(&xs, 99.0) - 49.6).abs() < 1e-9);
    }

    #[test]
    fn summary_partitions_and_uses_only_successes() {
        let mut outcomes: Vec<RequestOutcome> = [90.0, 95.0, 100.0, 110.0, 120.0]
            .iter()
            .map(|l| ok(*l, 40.0))
            .collect();
        outcomes.push(RequestOutcome::failed(6, "boom".to_string()));
        outcomes.push(RequestOutcome::failed(7, "boom".to_string()));

        let summary = summarize(&outcomes, Utc::now(), Duration::from_secs(1));
        assert_eq!(summary.iterations, 7);
        assert_eq!(summary.successful_runs, 5);
        assert_eq!(summary.failed_runs, 2);
        assert_eq!(summary.latency_min_ms, 90.0);
        assert_eq!(summary.latency_max_ms, 120.0);
        assert_eq!(summary.latency_mean_ms, 103.0);
    }

    #[test]
    fn zero_rates_do_not_pollute_throughput() {
        let outcomes = vec![ok(100.0, 0.0), ok(100.0, 50.0)];
        let summary = summarize(&outcomes, Utc::now(), Duration::from_secs(1));
        assert_eq!(summary.generation_tok_per_sec_mean, 50.0);
        assert_eq!(summary.generation_tok_per_sec_min, 50.0);
        assert_eq!(summary.generation_tok_per_sec_max, 50.0);
    }

    #[test]
    fn stress_invariants_hold() {
        let mut outcomes: Vec<RequestOutcome> = (0..8).map(|_| ok(10.0, 40.0)).collect();
        outcomes.push(RequestOutcome::failed(9, "503".to_string()));
        outcomes.push(RequestOutcome::failed(10, "503".to_string()));

        let s = summarize_stress(&outcomes, 4, None, Utc::now(), Duration::from_secs(2));
        assert_eq!(s.total_requests, s.run.successful_runs + s.run.failed_runs);
        assert!((s.error_rate_pct - 20.0).abs() < 1e-9);
        assert!((s.requests_per_sec - 5.0).abs() < 1e-9);
        assert_eq!(s.peak_throughput, 40.0);
    }

    #[test]
    fn spread_is_variance_truncated_to_two_decimals() {
        let outcomes = vec![ok(10.0, 10.0), ok(10.0, 20.0)];
        // mean 15, squared deviations 25 + 25, /2 = 25.0
        let s = summarize_stress(&outcomes, 1, None, Utc::now(), Duration::from_secs(1));
        assert_eq!(s.throughput_spread, 25.0);

        let outcomes = vec![ok(10.0, 10.0), ok(10.0, 10.5)];
        // variance 0.0625 -> truncated to 0.06
        let s = summarize_stress(&outcomes, 1, None, Utc::now(), Duration::from_secs(1));
        assert_eq!(s.throughput_spread, 0.06);
    }

    #[test]
    fn summary_round_trips_through_json() {
        let outcomes = vec![ok(93.7, 41.25), ok(101.3, 39.5)];
        let summary = summarize_stress(&outcomes, 2, Some(Duration::from_secs(30)), Utc::now(), Duration::from_millis(1500));
        let json = serde_json::to_string(&summary).unwrap();
        let back: StressSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run.latency_mean_ms, summary.run.latency_mean_ms);
        assert_eq!(back.run.latency_p99_ms, summary.run.latency_p99_ms);
        assert_eq!(back.requests_per_sec, summary.requests_per_sec);
        assert_eq!(back.throughput_spread, summary.throughput_spread);
        assert_eq!(back.target_duration_secs, Some(30));
    }

    #[test]
    fn outcome_round_trips_through_json() {
        let outcome = ok(123.456, 78.9);
        let json = serde_json::to_string(&outcome).unwrap();
        let back: RequestOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_time_ms, outcome.total_time_ms);
        assert_eq!(back.generation_tok_per_sec, outcome.generation_tok_per_sec);
        assert_eq!(back.completion_tokens, outcome.completion_tokens);
    }
}
