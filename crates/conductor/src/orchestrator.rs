//! Engine facade: description in, structured results out.
//!
//! One call runs the whole pipeline: complexity analysis → mode
//! selection/subtask planning → context window assembly (rank, admit
//! under budget, compress) → graph execution. Non-orchestrated tasks come
//! back as a single [`TaskResult`]; orchestrated ones as an ordered result
//! list plus an aggregate [`OrchestrationReport`].
//!
//! The engine is a library: callers parse their own inputs (issue bodies,
//! comments) and hand in plain strings and maps.

use crate::analysis::{ComplexityScorer, SubtaskPlanner};
use crate::context::compressor::ContentCompressor;
use crate::context::ranker::{InfoItem, InfoKind, PriorityRanker};
use crate::context::store::ContextBudgetStore;
use crate::error::Result;
use crate::graph::scheduler::{
    DependencyFailurePolicy, GraphScheduler, NoopObserver, ProgressObserver, SimulatedExecutor,
    SubtaskExecutor,
};
use crate::graph::TaskResult;
use crate::modes::{ModeId, ModeSelector, DEFAULT_MODE};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Default context window ceiling, in tokens.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 4000;

// ── Configuration ──────────────────────────────────────────────────

/// Tunables for one [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Token ceiling for the assembled context window.
    pub max_context_tokens: usize,
    /// Bound on concurrently executing subtasks.
    pub max_concurrency: usize,
    /// What dependents of a failed subtask do.
    pub policy: DependencyFailurePolicy,
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self {
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            max_concurrency: crate::graph::scheduler::DEFAULT_MAX_CONCURRENCY,
            policy: DependencyFailurePolicy::default(),
        }
    }

    /// Set the context window token ceiling.
    pub fn with_max_context_tokens(mut self, tokens: usize) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    /// Set the subtask concurrency bound.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the dependency-failure policy.
    pub fn with_policy(mut self, policy: DependencyFailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Results ────────────────────────────────────────────────────────

/// Aggregate over an orchestrated run.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationReport {
    /// True iff every subtask succeeded.
    pub success: bool,
    /// Sum of per-subtask wall-clock durations.
    pub total_duration_ms: u64,
    /// Sum of per-subtask token estimates.
    pub total_tokens_used: usize,
    /// Fixed-format summary: `"Completed X/Y subtasks. Z failed."`.
    pub summary: String,
}

impl OrchestrationReport {
    /// Aggregate a result list.
    pub fn from_results(results: &[TaskResult]) -> Self {
        let total = results.len();
        let completed = results.iter().filter(|r| r.success).count();
        let failed = total - completed;
        Self {
            success: failed == 0,
            total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
            total_tokens_used: results.iter().map(|r| r.tokens_used).sum(),
            summary: format!("Completed {completed}/{total} subtasks. {failed} failed."),
        }
    }
}

/// What one orchestration request produced.
#[derive(Debug, Clone, Serialize)]
pub enum OrchestrationOutcome {
    /// The task was simple enough to run as-is.
    Single(TaskResult),
    /// The task was decomposed; results are in plan order.
    Orchestrated {
        results: Vec<TaskResult>,
        report: OrchestrationReport,
    },
}

impl OrchestrationOutcome {
    /// All results, regardless of shape.
    pub fn results(&self) -> &[TaskResult] {
        match self {
            OrchestrationOutcome::Single(result) => std::slice::from_ref(result),
            OrchestrationOutcome::Orchestrated { results, .. } => results,
        }
    }

    /// Whether every subtask succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.results().iter().all(|r| r.success)
    }
}

// ── Facade ─────────────────────────────────────────────────────────

/// The engine facade. Holds the stateless pipeline stages and the
/// executor; per-request state (analysis, plan, context store) is built
/// fresh each call and discarded.
pub struct Orchestrator {
    config: OrchestratorConfig,
    scorer: ComplexityScorer,
    selector: ModeSelector,
    planner: SubtaskPlanner,
    ranker: PriorityRanker,
    compressor: ContentCompressor,
    executor: Arc<dyn SubtaskExecutor>,
    observer: Arc<dyn ProgressObserver>,
}

impl Orchestrator {
    /// Build an orchestrator over an executor with default configuration.
    pub fn new(executor: Arc<dyn SubtaskExecutor>) -> Self {
        Self {
            config: OrchestratorConfig::default(),
            scorer: ComplexityScorer::new(),
            selector: ModeSelector::new(),
            planner: SubtaskPlanner::new(),
            ranker: PriorityRanker::new(),
            compressor: ContentCompressor::default(),
            executor,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Build an orchestrator over the deterministic simulated executor.
    pub fn simulated() -> Self {
        Self::new(Arc::new(SimulatedExecutor::default()))
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a progress observer, handed through to the scheduler.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Orchestrate a task with no caller-supplied context.
    pub async fn orchestrate(&self, description: &str) -> Result<OrchestrationOutcome> {
        self.orchestrate_with_context(description, &HashMap::new(), &HashMap::new())
            .await
    }

    /// Orchestrate a task, seeding the context window from prior-result
    /// and global-context maps supplied by the caller.
    pub async fn orchestrate_with_context(
        &self,
        description: &str,
        prior_results: &HashMap<String, String>,
        global_context: &HashMap<String, String>,
    ) -> Result<OrchestrationOutcome> {
        let analysis = self.scorer.analyze(description);
        let mut graph = self.planner.plan(&analysis);

        // For single-subtask plans the selector's keyword/pattern scoring
        // refines the mode choice over the analysis's coarse scan.
        if !analysis.requires_orchestration
            && let Some(task) = graph.nodes.first_mut()
        {
            task.mode = self.selector.select(description);
        }

        let primary_mode = graph.nodes.first().map(|n| n.mode).unwrap_or(DEFAULT_MODE);
        let window = self.assemble_window(primary_mode, prior_results, global_context);

        info!(
            complexity = analysis.complexity,
            subtasks = graph.len(),
            orchestrated = analysis.requires_orchestration,
            "orchestration starting"
        );

        let scheduler = GraphScheduler::new(Arc::clone(&self.executor))
            .with_max_concurrency(self.config.max_concurrency)
            .with_policy(self.config.policy)
            .with_observer(Arc::clone(&self.observer));
        let results = scheduler.execute_dependency_graph(&graph, &window).await?;

        let outcome = if analysis.requires_orchestration {
            let report = OrchestrationReport::from_results(&results);
            info!(summary = %report.summary, "orchestration finished");
            OrchestrationOutcome::Orchestrated { results, report }
        } else {
            let result = results.into_iter().next().unwrap_or_else(|| {
                TaskResult::failed("subtask-1", "planner produced an empty graph", 0)
            });
            OrchestrationOutcome::Single(result)
        };
        Ok(outcome)
    }

    /// Rank caller-supplied context entries for the primary mode, admit
    /// them into a budgeted store, and render the surviving snapshot
    /// most-important-first, compressed to the window ceiling.
    fn assemble_window(
        &self,
        mode: ModeId,
        prior_results: &HashMap<String, String>,
        global_context: &HashMap<String, String>,
    ) -> String {
        if prior_results.is_empty() && global_context.is_empty() {
            return String::new();
        }

        let mut store = ContextBudgetStore::new(self.config.max_context_tokens);
        let entries = prior_results
            .iter()
            .map(|(k, v)| (k, v, InfoKind::TechnicalDetail))
            .chain(
                global_context
                    .iter()
                    .map(|(k, v)| (k, v, InfoKind::Discussion)),
            );
        for (key, content, fallback) in entries {
            let kind = infer_kind(key, content).unwrap_or(fallback);
            let score = self.ranker.score(&InfoItem::new(kind, content.clone()), mode);
            // Store priorities are integers; keep two digits of the score.
            store.put(key.clone(), Value::String(content.clone()), (score * 100.0) as i32);
        }

        let window = store
            .snapshot()
            .iter()
            .map(|item| match &item.value {
                Value::String(s) => format!("{}: {}", item.key, s),
                other => format!("{}: {}", item.key, other),
            })
            .collect::<Vec<_>>()
            .join("\n");

        match self
            .compressor
            .compress(&Value::String(window), self.config.max_context_tokens)
        {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

/// Guess the information kind from a context entry's key and content.
/// `None` defers to the source-based fallback.
fn infer_kind(key: &str, content: &str) -> Option<InfoKind> {
    let key = key.to_lowercase();
    let content = content.to_lowercase();
    let hit = |needle: &str| key.contains(needle) || content.contains(needle);
    if hit("error") || hit("panic") || hit("stack trace") || hit("failed") {
        Some(InfoKind::ErrorInfo)
    } else if hit("design") || hit("decision") || hit("architecture") {
        Some(InfoKind::DesignDecision)
    } else if hit("requirement") || hit("must ") || hit("acceptance") {
        Some(InfoKind::Requirement)
    } else if hit("file") || hit("changed") || hit("modified") || hit("diff") {
        Some(InfoKind::FileChange)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_summary_has_fixed_format() {
        let results = vec![
            TaskResult::completed("a", "ok", 10, 2),
            TaskResult::completed("b", "ok", 15, 3),
            TaskResult::failed("c", "boom", 5),
        ];
        let report = OrchestrationReport::from_results(&results);
        assert!(!report.success);
        assert_eq!(report.summary, "Completed 2/3 subtasks. 1 failed.");
        assert_eq!(report.total_duration_ms, 30);
        assert_eq!(report.total_tokens_used, 5);
    }

    #[test]
    fn report_on_all_success() {
        let results = vec![TaskResult::completed("a", "ok", 1, 1)];
        let report = OrchestrationReport::from_results(&results);
        assert!(report.success);
        assert_eq!(report.summary, "Completed 1/1 subtasks. 0 failed.");
    }

    #[test]
    fn kind_inference_prefers_error_signals() {
        assert_eq!(
            infer_kind("build_error", "trait bound not satisfied"),
            Some(InfoKind::ErrorInfo)
        );
        assert_eq!(
            infer_kind("notes", "the design decision was to cache eagerly"),
            Some(InfoKind::DesignDecision)
        );
        assert_eq!(
            infer_kind("review", "modified src/lib.rs and src/main.rs"),
            Some(InfoKind::FileChange)
        );
        assert_eq!(infer_kind("chat", "sounds good to me"), None);
    }

    #[tokio::test]
    async fn simple_task_returns_single_result() {
        let outcome = Orchestrator::simulated()
            .orchestrate("Fix typo in README.md")
            .await
            .unwrap();
        match outcome {
            OrchestrationOutcome::Single(result) => {
                assert!(result.success);
                assert!(result.output.is_some());
            }
            other => panic!("expected single result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn complex_task_returns_ordered_results_and_report() {
        let outcome = Orchestrator::simulated()
            .orchestrate(
                "Implement a complete user authentication system with JWT, OAuth, \
                 and role-based permissions across multiple files",
            )
            .await
            .unwrap();
        match outcome {
            OrchestrationOutcome::Orchestrated { results, report } => {
                assert!(results.len() > 1);
                assert!(report.success);
                assert_eq!(
                    report.summary,
                    format!("Completed {n}/{n} subtasks. 0 failed.", n = results.len())
                );
                // Plan order: ids are sequential.
                for (i, result) in results.iter().enumerate() {
                    assert_eq!(result.task_id, format!("subtask-{}", i + 1));
                }
            }
            other => panic!("expected orchestrated outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn context_maps_flow_into_the_window() {
        struct WindowProbe(std::sync::Mutex<Vec<String>>);
        impl SubtaskExecutor for Arc<WindowProbe> {
            fn execute(
                &self,
                _task: crate::graph::SubTask,
                ctx: crate::graph::scheduler::ExecutionContext,
            ) -> crate::graph::scheduler::ExecutionFuture {
                use futures::FutureExt;
                self.0.lock().unwrap().push(ctx.context_window.clone());
                async { Ok("ok".to_string()) }.boxed()
            }
        }

        let probe = Arc::new(WindowProbe(std::sync::Mutex::new(Vec::new())));
        let orchestrator = Orchestrator::new(Arc::new(Arc::clone(&probe)));

        let mut global = HashMap::new();
        global.insert(
            "build_error".to_string(),
            "error: mismatched types in src/store.rs line 42".to_string(),
        );
        orchestrator
            .orchestrate_with_context("Fix typo in README.md", &HashMap::new(), &global)
            .await
            .unwrap();

        let windows = probe.0.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].contains("build_error"));
        assert!(windows[0].contains("mismatched types"));
    }
}
