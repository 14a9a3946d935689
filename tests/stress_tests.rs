//! Stress executor tests: iteration-bound and duration-bound runs
//! against a mocked endpoint, counter invariants, and failure mixing.

use loadllm::driver::RequestDriver;
use loadllm::prompts::PromptSet;
use loadllm::stress::{run_stress, StressConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn ok_body() -> serde_json::Value {
    json!({
        "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30},
        "timings": {"prompt_ms": 5.0, "predicted_per_second": 50.0}
    })
}

async fn mock_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .mount(server)
        .await;
}

fn driver_for(server: &MockServer) -> Arc<RequestDriver> {
    Arc::new(RequestDriver::new(&server.uri(), 64, TIMEOUT).unwrap())
}

#[tokio::test]
async fn iteration_bound_run_issues_exactly_the_budget() {
    let server = MockServer::start().await;
    mock_ok(&server).await;

    let summary = run_stress(
        driver_for(&server),
        Arc::new(PromptSet::varied()),
        StressConfig {
            workers: 4,
            duration: None,
            iterations: Some(20),
            warmup: 0,
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.total_requests, 20);
    assert_eq!(summary.run.successful_runs, 20);
    assert_eq!(summary.run.failed_runs, 0);
    assert_eq!(summary.workers, 4);
    assert_eq!(summary.error_rate_pct, 0.0);
    assert_eq!(summary.run.generation_tok_per_sec_mean, 50.0);
    assert_eq!(summary.peak_throughput, 50.0);
}

#[tokio::test]
async fn warmup_requests_are_not_counted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(7) // 2 warm-ups + 5 measured
        .mount(&server)
        .await;

    let summary = run_stress(
        driver_for(&server),
        Arc::new(PromptSet::fixed("hello")),
        StressConfig {
            workers: 1,
            duration: None,
            iterations: Some(5),
            warmup: 2,
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.run.iterations, 5);
    assert_eq!(summary.run.successful_runs, 5);
}

#[tokio::test]
async fn duration_bound_run_stops_near_the_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_body())
                .set_delay(Duration::from_millis(10)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let summary = run_stress(
        driver_for(&server),
        Arc::new(PromptSet::fixed("hello")),
        StressConfig {
            workers: 4,
            duration: Some(Duration::from_millis(200)),
            // Ignored: duration wins when both stop conditions are set.
            iterations: Some(1_000_000),
            warmup: 0,
        },
    )
    .await
    .unwrap();

    // Soft deadline: the wall clock plus at most one in-flight request.
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(summary.total_requests > 0);
    assert_eq!(summary.target_duration_secs, Some(0)); // 200ms truncates to 0s
    assert!(summary.run.elapsed_secs >= 0.2);
    assert!(summary.requests_per_sec > 0.0);
}

#[tokio::test]
async fn failures_are_counted_not_fatal() {
    let server = MockServer::start().await;
    // First three requests fail, the rest succeed.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mock_ok(&server).await;

    let summary = run_stress(
        driver_for(&server),
        Arc::new(PromptSet::fixed("hello")),
        StressConfig {
            workers: 1,
            duration: None,
            iterations: Some(10),
            warmup: 0,
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.total_requests, 10);
    assert_eq!(summary.run.failed_runs, 3);
    assert_eq!(summary.run.successful_runs, 7);
    assert!((summary.error_rate_pct - 30.0).abs() < 1e-9);
    assert_eq!(
        summary.total_requests,
        summary.run.successful_runs + summary.run.failed_runs
    );
}

#[tokio::test]
async fn all_failed_stress_run_still_returns_a_summary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let summary = run_stress(
        driver_for(&server),
        Arc::new(PromptSet::fixed("hello")),
        StressConfig {
            workers: 2,
            duration: None,
            iterations: Some(6),
            warmup: 0,
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.total_requests, 6);
    assert_eq!(summary.run.successful_runs, 0);
    assert_eq!(summary.error_rate_pct, 100.0);
    assert_eq!(summary.run.latency_mean_ms, 0.0);
    assert_eq!(summary.peak_throughput, 0.0);
}
