//! Algorithm orchestrator — validate a snapshot, then run.
//!
//! One submission at a time. `submit` moves the state machine through
//! `RunState` and always leaves it at `Idle`, including when the returned
//! future is dropped mid-flight. The store lock is only taken to snapshot
//! the graph and to apply an `updated_graph`; it is never held across a call
//! to the analysis service.

pub mod log;
pub mod state;

pub use log::{LogEntry, LogLevel, RunLog};
pub use state::RunState;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::analysis::{AnalysisService, RunRequest, VALIDATE_DIAGRAM, ValidationRequest};
use crate::config::{OrchestratorConfig, ValidationPolicy};
use crate::error::OrchestratorError;
use crate::model::Graph;
use crate::store::SharedGraphStore;
use crate::validation::{Check, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The service could not be reached or answered with garbage.
    Transport,
    /// The algorithm ran and reported failure, or returned an unusable graph.
    Algorithm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// `validate_diagram` finished; the report is in `RunReport::validation`.
    Validated,
    /// Validation failed (or was unavailable under `FailClosed`). Nothing ran.
    Blocked { reason: String },
    Succeeded {
        results: Map<String, Value>,
        graph_replaced: bool,
    },
    Failed { kind: FailureKind, error: String },
}

/// Everything one submission did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub algorithm: String,
    /// Every state entered, starting at `Validating` and ending at `Idle`.
    pub phases: Vec<RunState>,
    /// `None` when the validator was unreachable.
    pub validation: Option<ValidationReport>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::Validated | RunOutcome::Succeeded { .. }
        )
    }

    /// `warn` checks raised by validation, if it ran.
    pub fn warnings(&self) -> Vec<&Check> {
        self.validation
            .as_ref()
            .map(|report| report.warnings().collect())
            .unwrap_or_default()
    }
}

pub struct AlgorithmOrchestrator {
    service: Arc<dyn AnalysisService>,
    config: OrchestratorConfig,
    state: Mutex<RunState>,
    log: RunLog,
    last_results: Mutex<Option<Map<String, Value>>>,
}

// ─── Construction & accessors ────────────────────────────────────────────────

impl AlgorithmOrchestrator {
    pub fn new(service: Arc<dyn AnalysisService>, config: OrchestratorConfig) -> Self {
        let log = RunLog::new(config.log_buffer);
        Self {
            service,
            config,
            state: Mutex::new(RunState::Idle),
            log,
            last_results: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RunState {
        *self.lock_state()
    }

    pub fn is_busy(&self) -> bool {
        !self.state().is_idle()
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Results of the most recent successful run.
    pub fn last_results(&self) -> Option<Map<String, Value>> {
        self.last_results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ─── Submission ──────────────────────────────────────────────────────────────

impl AlgorithmOrchestrator {
    /// Run diagram validation only.
    pub async fn validate(&self, store: &SharedGraphStore) -> Result<RunReport, OrchestratorError> {
        self.submit(store, VALIDATE_DIAGRAM, Map::new()).await
    }

    /// Validate the current graph and, unless blocked, run `algorithm`.
    ///
    /// Returns `Busy` without side effects when another submission is in
    /// flight. Any other path returns `Ok` with the outcome as a value.
    pub async fn submit(
        &self,
        store: &SharedGraphStore,
        algorithm: &str,
        params: Map<String, Value>,
    ) -> Result<RunReport, OrchestratorError> {
        let mut run = Submission::begin(self, algorithm)?;

        if params.is_empty() {
            self.log.info(format!("Running {algorithm}"));
        } else {
            self.log.info(format!(
                "Running {algorithm} with params {}",
                Value::Object(params.clone())
            ));
        }

        let (snapshot, revision) = {
            let store = store.read().await;
            (store.snapshot(), store.revision())
        };
        debug!(
            algorithm,
            revision,
            nodes = snapshot.nodes.len(),
            "graph snapshot taken"
        );

        let validation = self
            .service
            .validate(ValidationRequest {
                domain: self.config.domain.clone(),
                graph: snapshot.clone(),
            })
            .await;

        if algorithm == VALIDATE_DIAGRAM {
            return match validation {
                Ok(report) => {
                    self.log_report(&report);
                    run.advance(RunState::Idle)?;
                    Ok(run.finish(Some(report), RunOutcome::Validated))
                }
                Err(e) => {
                    self.log.error(format!("Validation service unavailable: {e}"));
                    run.advance(RunState::Idle)?;
                    Ok(run.finish(
                        None,
                        RunOutcome::Failed {
                            kind: FailureKind::Transport,
                            error: e.to_string(),
                        },
                    ))
                }
            };
        }

        let report = match validation {
            Ok(report) if !report.valid => {
                for check in report.problems() {
                    self.log_check(check);
                }
                self.log.error(format!(
                    "{algorithm} aborted: {}. Fix the errors above and retry.",
                    report.summary
                ));
                run.advance(RunState::ValidationBlocked)?;
                run.advance(RunState::Idle)?;
                let reason = report.summary.clone();
                return Ok(run.finish(Some(report), RunOutcome::Blocked { reason }));
            }
            Ok(report) => {
                let warnings: Vec<&Check> = report.warnings().collect();
                if warnings.is_empty() {
                    self.log.info(report.summary.clone());
                    run.advance(RunState::ValidationClean)?;
                } else {
                    for check in &warnings {
                        self.log_check(check);
                    }
                    self.log.warn(format!(
                        "Proceeding with {} validation warning(s)",
                        warnings.len()
                    ));
                    run.advance(RunState::ValidationWarned)?;
                }
                Some(report)
            }
            Err(e) => match self.config.validation_policy {
                ValidationPolicy::FailOpen => {
                    self.log.warn(format!(
                        "Validation service unavailable ({e}); proceeding without validation"
                    ));
                    run.advance(RunState::ValidationWarned)?;
                    None
                }
                ValidationPolicy::FailClosed => {
                    let reason = format!("Validation service unavailable: {e}");
                    self.log.error(format!("{algorithm} aborted: {reason}"));
                    run.advance(RunState::ValidationBlocked)?;
                    run.advance(RunState::Idle)?;
                    return Ok(run.finish(None, RunOutcome::Blocked { reason }));
                }
            },
        };

        run.advance(RunState::Running)?;
        let response = self
            .service
            .run(RunRequest {
                domain: self.config.domain.clone(),
                algorithm_name: algorithm.to_string(),
                graph: snapshot,
                params,
            })
            .await;

        let outcome = match response {
            Ok(resp) if resp.success => {
                let results = resp.results.unwrap_or_default();
                match self.apply_update(store, algorithm, revision, resp.updated_graph).await {
                    Ok(graph_replaced) => {
                        self.log.success(format!("{algorithm} completed"));
                        for (key, value) in &results {
                            self.log.info(format!("  {key}: {}", summarize(value)));
                        }
                        *self
                            .last_results
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(results.clone());
                        RunOutcome::Succeeded {
                            results,
                            graph_replaced,
                        }
                    }
                    Err(error) => {
                        self.log.error(format!("{algorithm} failed: {error}"));
                        RunOutcome::Failed {
                            kind: FailureKind::Algorithm,
                            error,
                        }
                    }
                }
            }
            Ok(resp) => {
                let error = resp.error.unwrap_or_else(|| "unknown error".to_string());
                self.log.error(format!("{algorithm} failed: {error}"));
                RunOutcome::Failed {
                    kind: FailureKind::Algorithm,
                    error,
                }
            }
            Err(e) => {
                self.log.error(format!("{algorithm} failed: {e}"));
                RunOutcome::Failed {
                    kind: FailureKind::Transport,
                    error: e.to_string(),
                }
            }
        };

        let terminal = match outcome {
            RunOutcome::Succeeded { .. } => RunState::Succeeded,
            _ => RunState::Failed,
        };
        run.advance(terminal)?;
        run.advance(RunState::Idle)?;
        Ok(run.finish(report, outcome))
    }

    /// Replace the store's graph with an algorithm's output, if any.
    async fn apply_update(
        &self,
        store: &SharedGraphStore,
        algorithm: &str,
        snapshot_revision: u64,
        updated: Option<Graph>,
    ) -> Result<bool, String> {
        let Some(graph) = updated else {
            return Ok(false);
        };
        let mut store = store.write().await;
        if store.revision() != snapshot_revision {
            self.log.warn(format!(
                "Diagram changed while {algorithm} was running; those edits are overwritten"
            ));
        }
        store
            .replace_graph(graph)
            .map(|()| true)
            .map_err(|e| format!("returned an unusable graph ({e})"))
    }

    fn log_report(&self, report: &ValidationReport) {
        if report.valid {
            self.log.success(report.summary.clone());
        } else {
            self.log.error(report.summary.clone());
        }
        for check in &report.checks {
            self.log_check(check);
        }
    }

    fn log_check(&self, check: &Check) {
        use crate::validation::CheckStatus;

        let line = format!("[{}] {}: {}", check.status, check.check, check.message);
        match check.status {
            CheckStatus::Error => self.log.error(line),
            CheckStatus::Warn => self.log.warn(line),
            CheckStatus::Pass | CheckStatus::Info => self.log.info(line),
        }
        let limit = self.config.max_items_per_check;
        for item in check.items.iter().take(limit) {
            self.log.info(format!("    - {item}"));
        }
        if check.items.len() > limit {
            self.log
                .info(format!("    ... and {} more", check.items.len() - limit));
        }
    }
}

/// One in-flight submission. Dropping it returns the orchestrator to `Idle`.
struct Submission<'a> {
    orchestrator: &'a AlgorithmOrchestrator,
    algorithm: String,
    phases: Vec<RunState>,
}

impl<'a> Submission<'a> {
    fn begin(orchestrator: &'a AlgorithmOrchestrator, algorithm: &str) -> Result<Self, OrchestratorError> {
        let mut state = orchestrator.lock_state();
        if !state.is_idle() {
            warn!(algorithm, state = %*state, "submission rejected, orchestrator busy");
            return Err(OrchestratorError::Busy(*state));
        }
        *state = RunState::Validating;
        Ok(Self {
            orchestrator,
            algorithm: algorithm.to_string(),
            phases: vec![RunState::Validating],
        })
    }

    fn advance(&mut self, next: RunState) -> Result<(), OrchestratorError> {
        let mut state = self.orchestrator.lock_state();
        if !state.can_advance_to(next) {
            return Err(OrchestratorError::InvalidTransition {
                from: *state,
                to: next,
            });
        }
        debug!(algorithm = %self.algorithm, from = %*state, to = %next, "run state");
        *state = next;
        self.phases.push(next);
        Ok(())
    }

    fn finish(mut self, validation: Option<ValidationReport>, outcome: RunOutcome) -> RunReport {
        RunReport {
            algorithm: std::mem::take(&mut self.algorithm),
            phases: std::mem::take(&mut self.phases),
            validation,
            outcome,
        }
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        *self.orchestrator.lock_state() = RunState::Idle;
    }
}

/// One-line rendering of a result value for the log.
fn summarize(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("{} item(s)", items.len()),
        Value::Object(fields) => format!("{} field(s)", fields.len()),
        Value::Null => "none".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
