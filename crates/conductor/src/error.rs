//! Error taxonomy for the orchestration engine.
//!
//! Failures travel on two deliberately separate channels. Graph-topology
//! problems (an unknown subtask id, a dependency cycle) are fatal: they
//! surface as [`SchedulerError`] and abort the whole run before any partial
//! result is reported. Per-subtask execution failures never appear here —
//! they are contained as failed [`TaskResult`](crate::graph::TaskResult)
//! values so sibling nodes keep running.
//!
//! Capacity rejection in the context store is the third case: a silent no-op
//! (with a `tracing` warning), observable via
//! [`ContextBudgetStore::contains`](crate::context::store::ContextBudgetStore::contains)
//! and [`usage`](crate::context::store::ContextBudgetStore::usage).

use thiserror::Error;

/// Fatal scheduling errors. Raising one of these aborts the entire graph
/// run; no `TaskResult` is produced for any node.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A subtask id was looked up during scheduling but is not in the graph.
    #[error("subtask not found: {0}")]
    NodeNotFound(String),

    /// A subtask declares a dependency on an id that is not in the graph.
    #[error("subtask `{task}` depends on unknown subtask `{dependency}`")]
    UnknownDependency {
        /// The subtask declaring the dependency.
        task: String,
        /// The missing dependency id.
        dependency: String,
    },

    /// Level-by-level dependency resolution made no progress while
    /// incomplete nodes remained — the graph contains a cycle.
    #[error("circular dependency: {unresolved} of {total} subtasks could not be ordered")]
    CircularDependency {
        /// Number of subtasks left unordered when resolution stalled.
        unresolved: usize,
        /// Total number of subtasks in the graph.
        total: usize,
    },
}

/// Convenience alias used throughout the scheduler and orchestrator.
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(
            SchedulerError::NodeNotFound("subtask-3".into()).to_string(),
            "subtask not found: subtask-3"
        );
        assert_eq!(
            SchedulerError::UnknownDependency {
                task: "b".into(),
                dependency: "z".into(),
            }
            .to_string(),
            "subtask `b` depends on unknown subtask `z`"
        );
        assert_eq!(
            SchedulerError::CircularDependency {
                unresolved: 2,
                total: 4,
            }
            .to_string(),
            "circular dependency: 2 of 4 subtasks could not be ordered"
        );
    }
}
