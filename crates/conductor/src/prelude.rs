//! Convenience re-exports for common `conductor` types.
//!
//! Meant to be glob-imported when embedding the engine:
//!
//! ```ignore
//! use conductor::prelude::*;
//! ```
//!
//! This pulls in the types most callers need: the [`Orchestrator`] facade
//! and its config, the analysis and planning entry points, the graph and
//! result types, and the executor/observer seams. Specialized types
//! (compressor config, estimator trait, mode pattern rules) are
//! intentionally excluded — import those from their modules directly.

// ── Facade ──────────────────────────────────────────────────────────
pub use crate::orchestrator::{
    OrchestrationOutcome, OrchestrationReport, Orchestrator, OrchestratorConfig,
};

// ── Analysis and planning ───────────────────────────────────────────
pub use crate::analysis::{ComplexityScorer, SubtaskPlanner, TaskAnalysis};

// ── Modes ───────────────────────────────────────────────────────────
pub use crate::modes::{ModeId, ModeRegistry, ModeSelector};

// ── Graph and execution ─────────────────────────────────────────────
pub use crate::graph::scheduler::{
    DependencyFailurePolicy, ExecutionContext, GraphScheduler, LoggingObserver, NoopObserver,
    ProgressObserver, SimulatedExecutor, SubtaskExecutor,
};
pub use crate::graph::{DependencyGraph, SubTask, TaskResult, TaskStatus};

// ── Context management ──────────────────────────────────────────────
pub use crate::context::ranker::{InfoItem, InfoKind, PriorityRanker};
pub use crate::context::store::ContextBudgetStore;

// ── Errors ──────────────────────────────────────────────────────────
pub use crate::error::SchedulerError;
