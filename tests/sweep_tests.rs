//! Sweep orchestrator tests: request-shape sweeps against a mocked
//! endpoint and deployment-shape sweeps through a scripted deployment
//! manager. The values/points alignment invariant is checked throughout.

use async_trait::async_trait;
use loadllm::error::{BenchError, Result};
use loadllm::prompts::PromptSet;
use loadllm::sweep::{
    parse_value_list, run_sweep, DeployConfig, DeploymentManager, PointOutcome, RunConfig,
    SweepKind, SweepOptions,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Deployment manager that records its call sequence and can be scripted
/// to fail deploys for one context size or accelerator count.
struct ScriptedManager {
    endpoint: String,
    calls: Mutex<Vec<String>>,
    deploys: Mutex<Vec<DeployConfig>>,
    fail_deploy_context: Option<u64>,
    fail_deploy_gpus: Option<u64>,
}

impl ScriptedManager {
    fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            calls: Mutex::new(Vec::new()),
            deploys: Mutex::new(Vec::new()),
            fail_deploy_context: None,
            fail_deploy_gpus: None,
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentManager for ScriptedManager {
    async fn deploy(&self, _target: &str, config: &DeployConfig) -> Result<()> {
        self.record("deploy");
        self.deploys.lock().unwrap().push(config.clone());
        if self.fail_deploy_context.is_some() && config.context_size == self.fail_deploy_context {
            return Err(BenchError::Deployment("quota exceeded".to_string()));
        }
        if self.fail_deploy_gpus.is_some() && config.gpu_count == self.fail_deploy_gpus {
            return Err(BenchError::Deployment("no such accelerator pool".to_string()));
        }
        Ok(())
    }

    async fn wait_ready(&self, _target: &str, _timeout: Duration) -> Result<()> {
        self.record("wait_ready");
        Ok(())
    }

    async fn resolve_endpoint(&self, _target: &str) -> Result<String> {
        self.record("resolve_endpoint");
        Ok(self.endpoint.clone())
    }

    async fn release_endpoint(&self, _target: &str) -> Result<()> {
        self.record("release_endpoint");
        Ok(())
    }

    async fn teardown(&self, _target: &str) -> Result<()> {
        self.record("teardown");
        Ok(())
    }
}

async fn mock_endpoint() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30},
            "timings": {"prompt_ms": 5.0, "predicted_per_second": 50.0}
        })))
        .mount(&server)
        .await;
    server
}

fn base_config(endpoint: &str) -> RunConfig {
    RunConfig {
        endpoint: endpoint.to_string(),
        prompts: Arc::new(PromptSet::fixed("hello")),
        max_tokens: 64,
        timeout: Duration::from_secs(5),
        iterations: 3,
        warmup: 0,
        concurrency: None,
        duration: None,
    }
}

#[tokio::test]
async fn concurrency_sweep_runs_stress_per_value() {
    let server = mock_endpoint().await;
    let base = base_config(&server.uri());
    let values = parse_value_list("1,2").unwrap();

    let sweep = run_sweep(
        "Concurrency sweep",
        SweepKind::Concurrency,
        &values,
        &base,
        &SweepOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(sweep.values, vec![1, 2]);
    assert_eq!(sweep.points.len(), 2);
    for (i, point) in sweep.points.iter().enumerate() {
        assert_eq!(point.value, sweep.values[i]);
        match &point.outcome {
            PointOutcome::Stress(s) => {
                assert_eq!(s.workers, point.value as usize);
                assert_eq!(s.total_requests, 3);
            }
            other => panic!("expected stress outcome, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn max_tokens_sweep_runs_single_shot_per_value() {
    let server = mock_endpoint().await;
    let base = base_config(&server.uri());

    let sweep = run_sweep(
        "Generation length sweep",
        SweepKind::MaxTokens,
        &[16, 32],
        &base,
        &SweepOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(sweep.points.len(), 2);
    for point in &sweep.points {
        match &point.outcome {
            PointOutcome::Single(run) => assert_eq!(run.iterations, 3),
            other => panic!("expected single-shot outcome, got {other:?}"),
        }
    }
    // The base configuration is never mutated across values.
    assert_eq!(base.max_tokens, 64);
}

#[tokio::test]
async fn redeploy_sweep_without_a_manager_is_a_config_error() {
    let server = mock_endpoint().await;
    let base = base_config(&server.uri());

    let err = run_sweep(
        "Context sweep",
        SweepKind::ContextSize,
        &[4096],
        &base,
        &SweepOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BenchError::Config(_)));
}

#[tokio::test]
async fn context_sweep_redeploys_per_value_and_isolates_failures() {
    let server = mock_endpoint().await;
    let base = base_config(&server.uri());
    let mut manager = ScriptedManager::new(&server.uri());
    manager.fail_deploy_context = Some(4096);

    let opts = SweepOptions {
        manager: Some(&manager),
        target: "small-8b".to_string(),
        deploy_wait: Duration::from_secs(5),
        base_deploy: DeployConfig {
            gpu_count: Some(1),
            size_class: Some("8B".to_string()),
            ..DeployConfig::default()
        },
        ..SweepOptions::default()
    };

    let sweep = run_sweep("Context sweep", SweepKind::ContextSize, &[1024, 4096, 8192], &base, &opts)
        .await
        .unwrap();

    // Failed middle value, successful neighbors, order preserved.
    assert_eq!(sweep.values, vec![1024, 4096, 8192]);
    assert!(matches!(sweep.points[0].outcome, PointOutcome::Single(_)));
    assert!(
        matches!(&sweep.points[1].outcome, PointOutcome::Failed(e) if e.contains("quota exceeded"))
    );
    assert!(matches!(sweep.points[2].outcome, PointOutcome::Single(_)));

    // Each value overlays only the swept parameter on the base deploy.
    let deploys = manager.deploys.lock().unwrap().clone();
    assert_eq!(deploys.len(), 3);
    for (deploy, value) in deploys.iter().zip([1024u64, 4096, 8192]) {
        assert_eq!(deploy.context_size, Some(value));
        assert_eq!(deploy.gpu_count, Some(1));
        assert_eq!(deploy.size_class.as_deref(), Some("8B"));
    }

    // Per-value lifecycle: pre-run teardown, provision, release, cleanup
    // teardown. The failed value skips everything after its deploy.
    let calls = manager.calls();
    let expected = [
        "teardown", "deploy", "wait_ready", "resolve_endpoint", "release_endpoint", "teardown",
        "teardown", "deploy", "teardown",
        "teardown", "deploy", "wait_ready", "resolve_endpoint", "release_endpoint", "teardown",
    ];
    assert_eq!(calls, expected);
}

#[tokio::test]
async fn no_cleanup_leaves_deployments_running() {
    let server = mock_endpoint().await;
    let base = base_config(&server.uri());
    let manager = ScriptedManager::new(&server.uri());

    let opts = SweepOptions {
        manager: Some(&manager),
        target: "small-8b".to_string(),
        deploy_wait: Duration::from_secs(5),
        cleanup: false,
        ..SweepOptions::default()
    };

    run_sweep("Context sweep", SweepKind::ContextSize, &[2048], &base, &opts)
        .await
        .unwrap();

    // Only the pre-run teardown runs; the deployment stays up afterwards.
    let teardowns = manager.calls().iter().filter(|c| *c == "teardown").count();
    assert_eq!(teardowns, 1);
}
