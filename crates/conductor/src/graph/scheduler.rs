//! Dependency-respecting subtask execution with bounded concurrency and
//! per-node single-flight memoization.
//!
//! Three entry points: [`GraphScheduler::execute_parallel`] for
//! independent subtasks, [`GraphScheduler::execute_sequential`] for strict
//! left-to-right execution with an aggregator of prior results, and
//! [`GraphScheduler::execute_dependency_graph`] for full DAG execution.
//!
//! The DAG hazard is fan-in: two sibling nodes sharing a dependency must
//! not trigger two executions of it. The first caller installs a shared,
//! awaitable future for the node id before any recursive dependency walk;
//! later callers await the same future. Cycle detection runs before any
//! node starts, so a cyclic graph produces no partial results.
//!
//! Per-node failures become failed [`TaskResult`]s and never abort
//! siblings; only graph-topology errors are fatal.

use crate::context::{CharTokenEstimator, TokenEstimator};
use crate::error::{Result, SchedulerError};
use crate::graph::{DependencyGraph, SubTask, TaskResult, TaskStatus};
use crate::modes::ModeRegistry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default bound on concurrently executing subtasks.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

// ── Executor seam ──────────────────────────────────────────────────

/// Everything a subtask execution gets to see: strictly-prior results and
/// the budget-trimmed context window assembled for this run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Results of dependencies (graph execution) or of all prior subtasks
    /// (sequential execution). Strictly prior; never includes the running
    /// subtask itself.
    pub prior_results: Vec<TaskResult>,
    /// The assembled context window, most important first.
    pub context_window: String,
}

/// Boxed future returned by [`SubtaskExecutor::execute`].
pub type ExecutionFuture = BoxFuture<'static, std::result::Result<String, String>>;

/// Executes one subtask. The single suspension point of the engine.
///
/// Implementors receive owned arguments and return a `'static` future so
/// executions can be memoized and shared across concurrent dependents.
/// Errors are strings: they are contained per node as failed
/// [`TaskResult`]s, never raised through the scheduler.
pub trait SubtaskExecutor: Send + Sync {
    /// Execute the subtask with the given context.
    fn execute(&self, task: SubTask, ctx: ExecutionContext) -> ExecutionFuture;
}

/// Deterministic executor used by tests and dry runs: renders a
/// mode-stamped line instead of calling a model. Fails when the subtask's
/// mode is absent from its registry, exercising the per-node failure path.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    registry: ModeRegistry,
}

impl SimulatedExecutor {
    /// Build a simulated executor over a mode registry.
    pub fn new(registry: ModeRegistry) -> Self {
        Self { registry }
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(ModeRegistry::standard())
    }
}

impl SubtaskExecutor for SimulatedExecutor {
    fn execute(&self, task: SubTask, ctx: ExecutionContext) -> ExecutionFuture {
        let role = self.registry.get(task.mode).map(|d| d.role);
        async move {
            match role {
                Some(role) => Ok(format!(
                    "[{}] {} — {} ({} prior result(s))",
                    task.mode,
                    role,
                    task.description,
                    ctx.prior_results.len()
                )),
                None => Err(format!("unrecognized mode: {}", task.mode)),
            }
        }
        .boxed()
    }
}

// ── Progress side channel ──────────────────────────────────────────

/// Observer for node status transitions
/// (`pending → in_progress → completed|failed`).
///
/// A side-channel notification, not part of the result contract: observers
/// must not block, and their view has no effect on scheduling.
pub trait ProgressObserver: Send + Sync {
    /// Called on every status transition of every node.
    fn on_status(&self, task_id: &str, status: TaskStatus) {
        let _ = (task_id, status);
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Observer that logs transitions via `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ProgressObserver for LoggingObserver {
    fn on_status(&self, task_id: &str, status: TaskStatus) {
        info!(task = task_id, status = %status, "subtask status");
    }
}

// ── Policy ─────────────────────────────────────────────────────────

/// What to do with a node whose dependency produced a failed result.
///
/// `RunDegraded` matches the source behavior: the dependent still runs
/// with whatever prior results exist, and its own result stands on its
/// own merits. A deliberate, documented policy choice — not a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyFailurePolicy {
    /// Run the dependent anyway; failed dependencies appear in its
    /// `prior_results` as failed entries.
    #[default]
    RunDegraded,
    /// Mark the dependent failed without executing it.
    Skip,
}

// ── Scheduler ──────────────────────────────────────────────────────

/// Executes subtask graphs. Cheap to construct per run; all per-run
/// mutable state lives in an internal, run-scoped structure.
pub struct GraphScheduler {
    executor: Arc<dyn SubtaskExecutor>,
    observer: Arc<dyn ProgressObserver>,
    estimator: Arc<dyn TokenEstimator>,
    max_concurrency: usize,
    policy: DependencyFailurePolicy,
}

impl GraphScheduler {
    /// Build a scheduler over an executor, with defaults: no observer,
    /// length-based token estimation, concurrency of
    /// [`DEFAULT_MAX_CONCURRENCY`], and the `RunDegraded` policy.
    pub fn new(executor: Arc<dyn SubtaskExecutor>) -> Self {
        Self {
            executor,
            observer: Arc::new(NoopObserver),
            estimator: Arc::new(CharTokenEstimator::default()),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            policy: DependencyFailurePolicy::default(),
        }
    }

    /// Register a progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override the token estimator used for result accounting.
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Bound the number of concurrently executing subtasks.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the dependency-failure policy.
    pub fn with_policy(mut self, policy: DependencyFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run inter-independent subtasks concurrently (bounded). No ordering
    /// guarantee between members; results come back in input order once
    /// all complete.
    pub async fn execute_parallel(&self, tasks: Vec<SubTask>, window: &str) -> Vec<TaskResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let futures: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                self.observer.on_status(&task.id, TaskStatus::Pending);
                let semaphore = Arc::clone(&semaphore);
                let executor = Arc::clone(&self.executor);
                let observer = Arc::clone(&self.observer);
                let estimator = Arc::clone(&self.estimator);
                let ctx = ExecutionContext {
                    prior_results: Vec::new(),
                    context_window: window.to_string(),
                };
                async move {
                    // The semaphore is never closed; a failed acquire just
                    // runs unthrottled.
                    let _permit = semaphore.acquire().await.ok();
                    run_single(&executor, &observer, &estimator, task, ctx).await
                }
            })
            .collect();
        join_all(futures).await
    }

    /// Run subtasks strictly in list order. Each completed result feeds
    /// the aggregator handed to subsequent subtasks as `prior_results`.
    pub async fn execute_sequential(&self, tasks: Vec<SubTask>, window: &str) -> Vec<TaskResult> {
        let mut results: Vec<TaskResult> = Vec::with_capacity(tasks.len());
        for task in tasks {
            self.observer.on_status(&task.id, TaskStatus::Pending);
            let ctx = ExecutionContext {
                prior_results: results.clone(),
                context_window: window.to_string(),
            };
            let result =
                run_single(&self.executor, &self.observer, &self.estimator, task, ctx).await;
            results.push(result);
        }
        results
    }

    /// Execute a dependency graph. A node starts only after all of its
    /// declared dependencies hold a [`TaskResult`]; nodes with satisfied
    /// dependencies run concurrently (bounded). Each node executes at most
    /// once, even under concurrent fan-in.
    ///
    /// Cycle detection and dependency validation run before any execution;
    /// a cyclic or malformed graph aborts with no partial results.
    /// Results come back in node (plan) order.
    pub async fn execute_dependency_graph(
        &self,
        graph: &DependencyGraph,
        window: &str,
    ) -> Result<Vec<TaskResult>> {
        let levels = graph.execution_levels()?;
        debug!(
            nodes = graph.len(),
            levels = levels.len(),
            "dependency graph resolved, starting execution"
        );
        if graph.is_empty() {
            return Ok(Vec::new());
        }

        let state = Arc::new(RunState {
            tasks: graph
                .nodes
                .iter()
                .map(|n| (n.id.clone(), n.clone()))
                .collect(),
            window: window.to_string(),
            inflight: Mutex::new(HashMap::new()),
            executor: Arc::clone(&self.executor),
            observer: Arc::clone(&self.observer),
            estimator: Arc::clone(&self.estimator),
            semaphore: Semaphore::new(self.max_concurrency),
            policy: self.policy,
        });

        let futures: Vec<_> = graph
            .nodes
            .iter()
            .map(|node| node_future(&state, &node.id))
            .collect();
        Ok(join_all(futures).await)
    }
}

// ── Run internals ──────────────────────────────────────────────────

/// Per-run shared state. The in-flight map is the single-flight mechanism:
/// it maps node id to a shared future, installed before any recursive
/// dependency walk for that node begins. The lock is never held across an
/// await.
struct RunState {
    tasks: HashMap<String, SubTask>,
    window: String,
    inflight: Mutex<HashMap<String, Shared<BoxFuture<'static, TaskResult>>>>,
    executor: Arc<dyn SubtaskExecutor>,
    observer: Arc<dyn ProgressObserver>,
    estimator: Arc<dyn TokenEstimator>,
    semaphore: Semaphore,
    policy: DependencyFailurePolicy,
}

/// Get-or-install the shared execution future for a node id.
fn node_future(state: &Arc<RunState>, id: &str) -> Shared<BoxFuture<'static, TaskResult>> {
    let fut = {
        let mut inflight = state.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = inflight.get(id) {
            return existing.clone();
        }

        // Unreachable after `execution_levels` validation, but a missing
        // node must still resolve to a terminal result.
        let Some(task) = state.tasks.get(id).cloned() else {
            let missing = id.to_string();
            let fut = async move {
                let error = SchedulerError::NodeNotFound(missing.clone());
                TaskResult::failed(&missing, error.to_string(), 0)
            }
            .boxed()
            .shared();
            inflight.insert(id.to_string(), fut.clone());
            return fut;
        };

        let st = Arc::clone(state);
        let fut = async move { run_node(st, task).await }.boxed().shared();
        inflight.insert(id.to_string(), fut.clone());
        fut
    };
    state.observer.on_status(id, TaskStatus::Pending);
    fut
}

/// Resolve a node's dependencies (through the shared in-flight map), apply
/// the dependency-failure policy, then execute.
async fn run_node(state: Arc<RunState>, task: SubTask) -> TaskResult {
    let dep_futures: Vec<_> = task
        .dependencies
        .iter()
        .map(|dep| node_future(&state, dep))
        .collect();
    let prior_results = join_all(dep_futures).await;

    let failed_deps: Vec<&str> = prior_results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.task_id.as_str())
        .collect();
    if !failed_deps.is_empty() {
        match state.policy {
            DependencyFailurePolicy::Skip => {
                let reason = format!(
                    "skipped: dependency `{}` did not succeed",
                    failed_deps.join("`, `")
                );
                warn!(task = %task.id, %reason, "skipping subtask");
                state.observer.on_status(&task.id, TaskStatus::Failed);
                return TaskResult::failed(&task.id, reason, 0);
            }
            DependencyFailurePolicy::RunDegraded => {
                debug!(
                    task = %task.id,
                    failed = ?failed_deps,
                    "running with degraded dependency context"
                );
            }
        }
    }

    let _permit = state.semaphore.acquire().await.ok();
    let ctx = ExecutionContext {
        prior_results,
        context_window: state.window.clone(),
    };
    run_single(&state.executor, &state.observer, &state.estimator, task, ctx).await
}

/// Execute one subtask and convert the outcome into a terminal
/// [`TaskResult`], emitting status transitions around it.
async fn run_single(
    executor: &Arc<dyn SubtaskExecutor>,
    observer: &Arc<dyn ProgressObserver>,
    estimator: &Arc<dyn TokenEstimator>,
    task: SubTask,
    ctx: ExecutionContext,
) -> TaskResult {
    let task_id = task.id.clone();
    observer.on_status(&task_id, TaskStatus::InProgress);

    let start = Instant::now();
    let outcome = executor.execute(task, ctx).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            let tokens_used = estimator.estimate_str(&output);
            observer.on_status(&task_id, TaskStatus::Completed);
            TaskResult::completed(&task_id, output, duration_ms, tokens_used)
        }
        Err(error) => {
            warn!(task = %task_id, %error, "subtask failed");
            observer.on_status(&task_id, TaskStatus::Failed);
            TaskResult::failed(&task_id, error, duration_ms)
        }
    }
}
