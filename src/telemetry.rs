//! Accelerator telemetry sampling during stress runs.
//!
//! A background task invokes the system query utility on a fixed
//! interval and parses its CSV output into [`TelemetrySample`]s. A
//! failed invocation or an unparseable line simply yields no sample for
//! that tick - telemetry is advisory and never fails a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One point-in-time accelerator reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub memory_used_mib: u64,
    pub memory_total_mib: u64,
    pub utilization_pct: f64,
    pub temperature_c: f64,
    pub power_w: f64,
}

const QUERY_ARGS: [&str; 2] = [
    "--query-gpu=memory.used,memory.total,utilization.gpu,temperature.gpu,power.draw",
    "--format=csv,noheader,nounits",
];

/// Periodic sampler running for the lifetime of one stress run or sweep.
pub struct TelemetrySampler {
    stop: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<TelemetrySample>>>,
    handle: JoinHandle<()>,
}

impl TelemetrySampler {
    /// Spawn the sampling task with the given tick interval.
    pub fn start(interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let samples = Arc::new(Mutex::new(Vec::new()));

        let task_stop = Arc::clone(&stop);
        let task_samples = Arc::clone(&samples);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if task_stop.load(Ordering::SeqCst) {
                    break;
                }
                match sample_once().await {
                    Some(sample) => task_samples.lock().await.push(sample),
                    None => debug!("telemetry tick yielded no sample"),
                }
            }
        });

        Self {
            stop,
            samples,
            handle,
        }
    }

    /// Stop the sampler and return the ordered samples collected so far.
    pub async fn stop(self) -> Vec<TelemetrySample> {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.abort();
        let _ = self.handle.await;
        let samples = self.samples.lock().await;
        samples.clone()
    }
}

async fn sample_once() -> Option<TelemetrySample> {
    let output = tokio::process::Command::new("nvidia-smi")
        .args(QUERY_ARGS)
        .output()
        .await;
    let output = match output {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            warn!(status = %o.status, "telemetry query exited nonzero");
            return None;
        }
        Err(e) => {
            debug!(error = %e, "telemetry query unavailable");
            return None;
        }
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().and_then(parse_line)
}

/// Parse one CSV line of `memory.used, memory.total, utilization.gpu,
/// temperature.gpu, power.draw` with `nounits` formatting.
fn parse_line(line: &str) -> Option<TelemetrySample> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 5 {
        return None;
    }
    Some(TelemetrySample {
        timestamp: Utc::now(),
        memory_used_mib: fields[0].parse().ok()?,
        memory_total_mib: fields[1].parse().ok()?,
        utilization_pct: fields[2].parse().ok()?,
        temperature_c: fields[3].parse().ok()?,
        power_w: fields[4].parse().ok()?,
    })
}
