//! Task orchestration and context-budget engine.
//!
//! `conductor` turns a free-form task description into executed work: it
//! scores the task's complexity, decides whether to decompose it, plans a
//! dependency graph of mode-assigned subtasks, and executes that graph
//! with bounded concurrency — while assembling each subtask's context
//! window from a token-budgeted, priority-ranked store.
//!
//! The core abstraction is the [`Orchestrator`](orchestrator::Orchestrator)
//! facade: one call runs the whole pipeline and returns either a single
//! [`TaskResult`](graph::TaskResult) or an ordered result list with an
//! aggregate report.
//!
//! # Getting started
//!
//! Add `conductor` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! conductor = { path = "../conductor" }
//! ```
//!
//! Then orchestrate a task:
//!
//! ```ignore
//! use conductor::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), conductor::error::SchedulerError> {
//!     // Bring your own executor, or use the deterministic simulator.
//!     let orchestrator = Orchestrator::simulated()
//!         .with_config(
//!             OrchestratorConfig::new()
//!                 .with_max_context_tokens(4000)
//!                 .with_max_concurrency(4),
//!         )
//!         .with_observer(Arc::new(LoggingObserver));
//!
//!     let outcome = orchestrator
//!         .orchestrate("Implement a complete user authentication system")
//!         .await?;
//!
//!     for result in outcome.results() {
//!         println!("{}: success={}", result.task_id, result.success);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! If you're looking for how to...
//!
//! - **Score a task and pick modes:** see
//!   [`ComplexityScorer`](analysis::ComplexityScorer) for the factor-based
//!   score and required-mode scan, and [`ModeSelector`](modes::ModeSelector)
//!   for keyword/pattern mode selection over arbitrary text.
//!
//! - **Plan and execute subtask graphs:** see
//!   [`SubtaskPlanner`](analysis::SubtaskPlanner),
//!   [`DependencyGraph`](graph::DependencyGraph), and
//!   [`GraphScheduler`](graph::scheduler::GraphScheduler). Plug in your own
//!   execution backend via the
//!   [`SubtaskExecutor`](graph::scheduler::SubtaskExecutor) trait; watch
//!   progress via [`ProgressObserver`](graph::scheduler::ProgressObserver).
//!
//! - **Manage context under a token budget:** see
//!   [`ContextBudgetStore`](context::store::ContextBudgetStore) for
//!   priority-evicting admission, [`PriorityRanker`](context::ranker::PriorityRanker)
//!   for mode-aware item scoring, and
//!   [`ContentCompressor`](context::compressor::ContentCompressor) for
//!   sentence-level compression of oversized content. Token accounting is
//!   pluggable through [`TokenEstimator`](context::TokenEstimator).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | [`Orchestrator`](orchestrator::Orchestrator) facade, configuration, aggregate reports |
//! | [`analysis`] | Complexity scoring, factor detection, subtask planning |
//! | [`modes`] | Mode registry, ids, keyword/pattern mode selection |
//! | [`graph`] | Subtask graphs, validation, cycle detection, the bounded-concurrency scheduler |
//! | [`context`] | Token-budgeted store, priority ranking, content compression, token estimation |
//! | [`error`] | Fatal scheduling errors (topology); per-node failures stay in [`TaskResult`](graph::TaskResult) |
//!
//! # Design principles
//!
//! 1. **Context is the scarcest resource.** Every stage treats the context
//!    window as a finite token budget: items are ranked, evicted, and
//!    compressed before a subtask ever sees them.
//!
//! 2. **Two error channels, never confused.** Graph-topology problems
//!    (unknown dependency, cycle) abort the run as
//!    [`SchedulerError`](error::SchedulerError); a subtask's own failure is
//!    a terminal, contained [`TaskResult`](graph::TaskResult) that siblings
//!    never observe as an abort.
//!
//! 3. **At-most-once execution.** A node shared by many dependents runs
//!    exactly once; concurrent dependents await the same in-flight future.
//!
//! 4. **Observability over magic.** The scheduler decides ordering and
//!    concurrency automatically but reports every status transition through
//!    [`ProgressObserver`](graph::scheduler::ProgressObserver).

pub mod analysis;
pub mod context;
pub mod error;
pub mod graph;
pub mod modes;
pub mod orchestrator;
pub mod prelude;

pub use orchestrator::{OrchestrationOutcome, OrchestrationReport, Orchestrator, OrchestratorConfig};
