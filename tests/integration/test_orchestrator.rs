//! Validate-then-run orchestration against a scripted analysis service.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fff_graph::orchestrator::FailureKind;
use fff_graph::rules::HAS_FAILURE;
use fff_graph::validation::{Check, ValidationStats};
use fff_graph::{
    AlgorithmOrchestrator, AnalysisService, CheckStatus, Edge, Graph, GraphStore, Layer,
    LocalAnalysisService, Node, OrchestratorConfig, OrchestratorError, RuleSet, RunOutcome,
    RunRequest, RunResponse, RunState, SharedGraphStore, TransportError, ValidationPolicy,
    ValidationReport, ValidationRequest,
};
use serde_json::{Map, Value, json};
use tokio::sync::Notify;

const FMEA: &str = "fmea_risk_analysis";

// ── Spy service ───────────────────────────────────────────────────────────

struct SpyService {
    validation: Result<ValidationReport, TransportError>,
    response: Result<RunResponse, TransportError>,
    validate_calls: AtomicUsize,
    run_calls: AtomicUsize,
    /// When set, `run` signals `entered` and waits for `release`.
    gated: bool,
    entered: Notify,
    release: Notify,
}

impl SpyService {
    fn new(
        validation: Result<ValidationReport, TransportError>,
        response: Result<RunResponse, TransportError>,
    ) -> Self {
        Self {
            validation,
            response,
            validate_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            gated: false,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    fn runs(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    fn validations(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisService for SpyService {
    async fn validate(&self, _request: ValidationRequest) -> Result<ValidationReport, TransportError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validation.clone()
    }

    async fn run(&self, _request: RunRequest) -> Result<RunResponse, TransportError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.response.clone()
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────

fn check(name: &str, status: CheckStatus, items: &[&str]) -> Check {
    Check {
        check: name.to_string(),
        status,
        message: format!("{name} message"),
        items: items.iter().map(|s| s.to_string()).collect(),
    }
}

fn report(valid: bool, checks: Vec<Check>) -> ValidationReport {
    ValidationReport {
        valid,
        summary: if valid { "Validation PASSED".into() } else { "Validation FAILED: 1 error(s), 0 warning(s).".into() },
        stats: ValidationStats::default(),
        checks,
    }
}

fn clean() -> ValidationReport {
    report(true, vec![check("Form Connectivity", CheckStatus::Pass, &[])])
}

fn model() -> Graph {
    Graph::new(
        vec![
            Node::new("F1", Layer::Form, "Brake unit"),
            Node::new("X1", Layer::Failure, "Pad wear")
                .with_attribute("severity", 8)
                .with_attribute("occurrence", 5)
                .with_attribute("detection", 4),
        ],
        vec![Edge::new("e1", "F1", "X1", HAS_FAILURE)],
    )
}

fn shared(graph: Graph) -> SharedGraphStore {
    GraphStore::from_graph(graph, RuleSet::reference())
        .unwrap()
        .into_shared()
}

fn orchestrator(spy: &Arc<SpyService>, policy: ValidationPolicy) -> AlgorithmOrchestrator {
    AlgorithmOrchestrator::new(spy.clone(), OrchestratorConfig::new().with_policy(policy))
}

fn ok_response(results: Value, updated: Option<Graph>) -> RunResponse {
    let Value::Object(results) = results else {
        panic!("results must be an object");
    };
    RunResponse::succeeded(results, updated)
}

// ── Gating ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_blocking_validation_never_runs() {
    let blocked = report(
        false,
        vec![check("Form Hierarchy Cycles", CheckStatus::Error, &["A", "B"])],
    );
    let spy = Arc::new(SpyService::new(Ok(blocked), Ok(RunResponse::default())));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());

    let result = orch.submit(&store, FMEA, Map::new()).await.unwrap();

    assert_eq!(spy.runs(), 0);
    assert_eq!(spy.validations(), 1);
    assert!(matches!(result.outcome, RunOutcome::Blocked { .. }));
    assert_eq!(
        result.phases,
        vec![RunState::Validating, RunState::ValidationBlocked, RunState::Idle]
    );
    let lines = orch.log().lines();
    assert!(lines.iter().any(|l| l.contains("aborted")));
    assert!(lines.iter().any(|l| l == "[error] Form Hierarchy Cycles: Form Hierarchy Cycles message"));
    assert_eq!(orch.state(), RunState::Idle);
}

#[tokio::test]
async fn test_successful_run_replaces_graph_and_logs_each_key() {
    let mut updated = model();
    updated.nodes[1] = updated.nodes[1].clone().with_attribute("rpn", 160);
    let results = json!({
        "high_risk_failures": [{"node_id": "X1", "rpn": 160}],
        "total_analyzed": 1,
        "threshold": 100,
    });
    let spy = Arc::new(SpyService::new(
        Ok(clean()),
        Ok(ok_response(results, Some(updated.clone()))),
    ));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());

    let result = orch.submit(&store, FMEA, Map::new()).await.unwrap();

    assert!(result.is_success());
    assert!(matches!(
        result.outcome,
        RunOutcome::Succeeded { graph_replaced: true, .. }
    ));
    assert_eq!(store.read().await.snapshot(), updated);
    assert_eq!(
        result.phases,
        vec![
            RunState::Validating,
            RunState::ValidationClean,
            RunState::Running,
            RunState::Succeeded,
            RunState::Idle,
        ]
    );

    let lines = orch.log().lines();
    for key in ["high_risk_failures", "total_analyzed", "threshold"] {
        let prefix = format!("  {key}: ");
        assert_eq!(lines.iter().filter(|l| l.starts_with(&prefix)).count(), 1, "{key}");
    }
    assert!(lines.contains(&"  high_risk_failures: 1 item(s)".to_string()));
    assert!(orch.last_results().unwrap().contains_key("threshold"));
}

#[tokio::test]
async fn test_warnings_are_logged_and_run_proceeds() {
    let warned = report(
        true,
        vec![check("Function Allocation", CheckStatus::Warn, &["Fn1"])],
    );
    let spy = Arc::new(SpyService::new(
        Ok(warned),
        Ok(ok_response(json!({}), None)),
    ));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());

    let result = orch.submit(&store, FMEA, Map::new()).await.unwrap();

    assert_eq!(spy.runs(), 1);
    assert_eq!(result.phases[1], RunState::ValidationWarned);
    assert_eq!(result.warnings().len(), 1);
    assert!(matches!(
        result.outcome,
        RunOutcome::Succeeded { graph_replaced: false, .. }
    ));
    assert!(orch.log().lines().iter().any(|l| l.contains("Function Allocation")));
}

// ── validate_diagram ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_validate_diagram_logs_and_never_runs() {
    let many = report(
        true,
        vec![check(
            "Failure Allocation",
            CheckStatus::Warn,
            &["a", "b", "c", "d", "e", "f", "g"],
        )],
    );
    let spy = Arc::new(SpyService::new(Ok(many), Ok(RunResponse::default())));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());
    let revision = store.read().await.revision();

    let result = orch.validate(&store).await.unwrap();

    assert_eq!(spy.runs(), 0);
    assert_eq!(result.outcome, RunOutcome::Validated);
    assert_eq!(result.phases, vec![RunState::Validating, RunState::Idle]);
    assert_eq!(store.read().await.snapshot(), model());
    assert_eq!(store.read().await.revision(), revision);

    let lines = orch.log().lines();
    assert!(lines.contains(&"[warn] Failure Allocation: Failure Allocation message".to_string()));
    assert_eq!(lines.iter().filter(|l| l.starts_with("    - ")).count(), 5);
    assert!(lines.contains(&"    ... and 2 more".to_string()));
}

#[tokio::test]
async fn test_validate_diagram_unreachable_is_a_failed_outcome() {
    let spy = Arc::new(SpyService::new(
        Err(TransportError::Unreachable("connection refused".into())),
        Ok(RunResponse::default()),
    ));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let result = orch.validate(&shared(model())).await.unwrap();
    assert!(matches!(
        result.outcome,
        RunOutcome::Failed { kind: FailureKind::Transport, .. }
    ));
    assert_eq!(spy.runs(), 0);
    assert_eq!(orch.state(), RunState::Idle);
}

// ── Validator availability policy ─────────────────────────────────────────

#[tokio::test]
async fn test_fail_open_runs_without_validation() {
    let spy = Arc::new(SpyService::new(
        Err(TransportError::Timeout),
        Ok(ok_response(json!({"total_analyzed": 0}), None)),
    ));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);

    let result = orch.submit(&shared(model()), FMEA, Map::new()).await.unwrap();

    assert_eq!(spy.runs(), 1);
    assert!(result.validation.is_none());
    assert_eq!(result.phases[1], RunState::ValidationWarned);
    assert!(result.is_success());
    assert!(
        orch.log()
            .snapshot()
            .iter()
            .any(|e| e.message.contains("proceeding without validation"))
    );
}

#[tokio::test]
async fn test_fail_closed_blocks_without_validation() {
    let spy = Arc::new(SpyService::new(
        Err(TransportError::Timeout),
        Ok(ok_response(json!({}), None)),
    ));
    let orch = orchestrator(&spy, ValidationPolicy::FailClosed);

    let result = orch.submit(&shared(model()), FMEA, Map::new()).await.unwrap();

    assert_eq!(spy.runs(), 0);
    assert!(matches!(result.outcome, RunOutcome::Blocked { .. }));
    assert_eq!(orch.state(), RunState::Idle);
}

// ── Run failures ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reported_failure_keeps_graph() {
    let spy = Arc::new(SpyService::new(
        Ok(clean()),
        Ok(RunResponse::failed("division by zero")),
    ));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());

    let result = orch.submit(&store, FMEA, Map::new()).await.unwrap();

    assert_eq!(
        result.outcome,
        RunOutcome::Failed {
            kind: FailureKind::Algorithm,
            error: "division by zero".into()
        }
    );
    assert_eq!(store.read().await.snapshot(), model());
    assert!(orch.log().lines().iter().any(|l| l.contains("division by zero")));
    assert!(orch.last_results().is_none());
}

#[tokio::test]
async fn test_transport_failure_on_run() {
    let spy = Arc::new(SpyService::new(
        Ok(clean()),
        Err(TransportError::InvalidResponse("not json".into())),
    ));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);

    let result = orch.submit(&shared(model()), FMEA, Map::new()).await.unwrap();

    assert!(matches!(
        result.outcome,
        RunOutcome::Failed { kind: FailureKind::Transport, .. }
    ));
    assert_eq!(result.phases.last(), Some(&RunState::Idle));
    assert!(result.phases.contains(&RunState::Failed));
}

#[tokio::test]
async fn test_unusable_updated_graph_is_rejected() {
    let broken = Graph::new(
        vec![Node::bare("A", Layer::Form), Node::bare("A", Layer::Form)],
        vec![],
    );
    let spy = Arc::new(SpyService::new(
        Ok(clean()),
        Ok(ok_response(json!({}), Some(broken))),
    ));
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());

    let result = orch.submit(&store, FMEA, Map::new()).await.unwrap();

    assert!(matches!(
        result.outcome,
        RunOutcome::Failed { kind: FailureKind::Algorithm, .. }
    ));
    assert_eq!(store.read().await.snapshot(), model());
}

// ── Concurrency ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_submission_is_rejected_while_busy() {
    let spy = Arc::new(
        SpyService::new(Ok(clean()), Ok(ok_response(json!({"done": true}), None))).gated(),
    );
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());

    let first = orch.submit(&store, FMEA, Map::new());
    let second = async {
        spy.entered.notified().await;
        let rejected = orch.submit(&store, "failure_propagation", Map::new()).await;
        spy.release.notify_one();
        rejected
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.unwrap().is_success());
    assert_eq!(second.unwrap_err(), OrchestratorError::Busy(RunState::Running));
    assert_eq!(spy.runs(), 1);
    assert_eq!(orch.state(), RunState::Idle);
}

#[tokio::test]
async fn test_edit_during_run_is_overwritten_and_logged() {
    let updated = model();
    let spy = Arc::new(
        SpyService::new(Ok(clean()), Ok(ok_response(json!({}), Some(updated.clone())))).gated(),
    );
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());

    let run = orch.submit(&store, FMEA, Map::new());
    let edit = async {
        spy.entered.notified().await;
        store
            .write()
            .await
            .add_node(Node::bare("late", Layer::Form))
            .unwrap();
        spy.release.notify_one();
    };
    let (result, ()) = tokio::join!(run, edit);

    assert!(result.unwrap().is_success());
    assert!(store.read().await.node("late").is_none());
    assert!(orch.log().lines().iter().any(|l| l.contains("overwritten")));
}

#[tokio::test]
async fn test_dropped_submission_returns_to_idle() {
    let spy = Arc::new(SpyService::new(Ok(clean()), Ok(ok_response(json!({}), None))).gated());
    let orch = orchestrator(&spy, ValidationPolicy::FailOpen);
    let store = shared(model());

    {
        let fut = orch.submit(&store, FMEA, Map::new());
        tokio::pin!(fut);
        tokio::select! {
            _ = &mut fut => panic!("run should be parked"),
            _ = spy.entered.notified() => {}
        }
        assert_eq!(orch.state(), RunState::Running);
    }
    assert_eq!(orch.state(), RunState::Idle);
}

// ── In-process service ────────────────────────────────────────────────────

#[tokio::test]
async fn test_local_fmea_annotates_store() {
    let service = Arc::new(LocalAnalysisService::new("automotive", RuleSet::reference()));
    let orch = AlgorithmOrchestrator::new(service, OrchestratorConfig::default());
    let store = shared(model());

    let mut params = Map::new();
    params.insert("rpn_threshold".into(), json!(150));
    let result = orch.submit(&store, FMEA, params).await.unwrap();

    let RunOutcome::Succeeded { results, graph_replaced } = result.outcome else {
        panic!("unexpected outcome: {:?}", result.outcome);
    };
    assert!(graph_replaced);
    assert_eq!(results["threshold"], json!(150));
    assert_eq!(results["high_risk_failures"][0]["rpn"], json!(160));
    let store = store.read().await;
    assert_eq!(store.node("X1").unwrap().attributes["risk_level"], json!("high"));
}

#[tokio::test]
async fn test_local_unknown_algorithm_fails_after_validation() {
    let service = Arc::new(LocalAnalysisService::new("automotive", RuleSet::reference()));
    let orch = AlgorithmOrchestrator::new(service, OrchestratorConfig::default());

    let result = orch
        .submit(&shared(model()), "centrality", Map::new())
        .await
        .unwrap();

    assert_eq!(
        result.outcome,
        RunOutcome::Failed {
            kind: FailureKind::Algorithm,
            error: "Algorithm 'centrality' not found in domain 'automotive'".into()
        }
    );
}
