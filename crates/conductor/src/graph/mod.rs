//! Subtask dependency graphs: node and edge types, validation, and
//! level-by-level dependency resolution.
//!
//! A [`DependencyGraph`] is built once per planning run and never mutated
//! during execution; all execution state (completion sets, in-flight
//! futures) lives in the [`scheduler`]. The graph's invariant is
//! acyclicity: [`DependencyGraph::execution_levels`] resolves nodes level
//! by level and reports a [`SchedulerError::CircularDependency`] the moment
//! a pass makes no progress while incomplete nodes remain.

pub mod scheduler;

use crate::error::{Result, SchedulerError};
use crate::modes::ModeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ── Nodes and edges ────────────────────────────────────────────────

/// One unit of plannable work. Immutable after creation; ids are unique
/// within a single planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Id, unique within one plan.
    pub id: String,
    /// What this subtask does.
    pub description: String,
    /// The mode it runs under.
    pub mode: ModeId,
    /// Positional priority within the plan (lower runs earlier).
    pub priority: u32,
    /// Ids of subtasks that must complete first.
    pub dependencies: Vec<String>,
    /// Complexity estimate in `[0, 10]`.
    pub estimated_complexity: f64,
}

impl SubTask {
    /// Build a dependency-free subtask.
    pub fn new(id: impl Into<String>, description: impl Into<String>, mode: ModeId) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            mode,
            priority: 0,
            dependencies: Vec::new(),
            estimated_complexity: 1.0,
        }
    }

    /// Set the positional priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a dependency on another subtask id.
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Set the complexity estimate.
    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.estimated_complexity = complexity;
        self
    }
}

/// Why one subtask must complete before another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Ordinary data/order dependency.
    Data,
    /// Fan-in edge into a final integration subtask.
    Integration,
}

/// One edge: `from` must complete before `to` starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The prerequisite subtask.
    pub from: String,
    /// The dependent subtask.
    pub to: String,
    /// Edge kind.
    pub kind: DependencyKind,
}

// ── Graph ──────────────────────────────────────────────────────────

/// A dependency graph of subtasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// Subtasks, in plan order.
    pub nodes: Vec<SubTask>,
    /// Declared edges.
    pub edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Build a graph from subtasks, deriving `Data` edges from each node's
    /// declared dependencies.
    pub fn from_subtasks(nodes: Vec<SubTask>) -> Self {
        let edges = nodes
            .iter()
            .flat_map(|node| {
                node.dependencies.iter().map(|dep| DependencyEdge {
                    from: dep.clone(),
                    to: node.id.clone(),
                    kind: DependencyKind::Data,
                })
            })
            .collect();
        Self { nodes, edges }
    }

    /// Look up a node by id.
    pub fn get(&self, id: &str) -> Option<&SubTask> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every declared dependency refers to a node in the graph.
    pub fn validate(&self) -> Result<()> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for node in &self.nodes {
            for dep in &node.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(SchedulerError::UnknownDependency {
                        task: node.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve the graph into execution levels: a node enters a level once
    /// all of its dependencies are in the completed set, and nodes within a
    /// level are mutually independent.
    ///
    /// If a pass completes no new nodes while incomplete nodes remain, the
    /// graph contains a cycle and [`SchedulerError::CircularDependency`] is
    /// returned — before any execution begins.
    pub fn execution_levels(&self) -> Result<Vec<Vec<String>>> {
        self.validate()?;

        let mut completed: HashSet<&str> = HashSet::new();
        let mut levels: Vec<Vec<String>> = Vec::new();

        while completed.len() < self.nodes.len() {
            let ready: Vec<&SubTask> = self
                .nodes
                .iter()
                .filter(|n| !completed.contains(n.id.as_str()))
                .filter(|n| n.dependencies.iter().all(|d| completed.contains(d.as_str())))
                .collect();

            if ready.is_empty() {
                return Err(SchedulerError::CircularDependency {
                    unresolved: self.nodes.len() - completed.len(),
                    total: self.nodes.len(),
                });
            }

            for node in &ready {
                completed.insert(node.id.as_str());
            }
            levels.push(ready.into_iter().map(|n| n.id.clone()).collect());
        }

        Ok(levels)
    }
}

// ── Execution state types ──────────────────────────────────────────

/// Status of one node as observed through the scheduler's side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Scheduled but not started.
    Pending,
    /// Currently executing.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of one subtask execution. Never mutated after
/// creation; failures are a terminal result, not an escaping error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The subtask this result belongs to.
    pub task_id: String,
    /// Whether execution succeeded.
    pub success: bool,
    /// Output text, when successful.
    pub output: Option<String>,
    /// Failure description, when not.
    pub error: Option<String>,
    /// Wall-clock execution time in milliseconds.
    pub duration_ms: u64,
    /// Estimated tokens consumed by the output.
    pub tokens_used: usize,
}

impl TaskResult {
    /// A successful result.
    pub fn completed(
        task_id: impl Into<String>,
        output: impl Into<String>,
        duration_ms: u64,
        tokens_used: usize,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            output: Some(output.into()),
            error: None,
            duration_ms,
            tokens_used,
        }
    }

    /// A failed result.
    pub fn failed(task_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms,
            tokens_used: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, deps: &[&str]) -> SubTask {
        let mut task = SubTask::new(id, format!("{id} work"), ModeId::Code);
        for dep in deps {
            task = task.depends_on(*dep);
        }
        task
    }

    #[test]
    fn from_subtasks_derives_edges() {
        let graph =
            DependencyGraph::from_subtasks(vec![node("a", &[]), node("b", &["a"]), node("c", &["a", "b"])]);
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edges.len(), 3);
        assert!(graph
            .edges
            .iter()
            .any(|e| e.from == "a" && e.to == "c" && e.kind == DependencyKind::Data));
    }

    #[test]
    fn validate_rejects_unknown_dependency() {
        let graph = DependencyGraph::from_subtasks(vec![node("a", &["ghost"])]);
        let err = graph.validate().unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownDependency { .. }));
    }

    #[test]
    fn levels_for_diamond() {
        // a → b, a → c, b → d, c → d
        let graph = DependencyGraph::from_subtasks(vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
            node("d", &["b", "c"]),
        ]);
        let levels = graph.execution_levels().unwrap();
        assert_eq!(levels, vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
            vec!["d".to_string()],
        ]);
    }

    #[test]
    fn levels_for_independent_nodes_is_single_level() {
        let graph =
            DependencyGraph::from_subtasks(vec![node("a", &[]), node("b", &[]), node("c", &[])]);
        let levels = graph.execution_levels().unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].len(), 3);
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let graph = DependencyGraph::from_subtasks(vec![node("a", &["b"]), node("b", &["a"])]);
        let err = graph.execution_levels().unwrap_err();
        match err {
            SchedulerError::CircularDependency { unresolved, total } => {
                assert_eq!(unresolved, 2);
                assert_eq!(total, 2);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn partial_cycle_behind_valid_prefix_is_detected() {
        // a is fine; b and c form a cycle downstream.
        let graph = DependencyGraph::from_subtasks(vec![
            node("a", &[]),
            node("b", &["a", "c"]),
            node("c", &["b"]),
        ]);
        let err = graph.execution_levels().unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::CircularDependency { unresolved: 2, total: 3 }
        ));
    }

    #[test]
    fn empty_graph_has_no_levels() {
        let graph = DependencyGraph::default();
        assert!(graph.execution_levels().unwrap().is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn task_result_constructors() {
        let ok = TaskResult::completed("t1", "done", 12, 3);
        assert!(ok.success);
        assert_eq!(ok.output.as_deref(), Some("done"));
        assert!(ok.error.is_none());

        let bad = TaskResult::failed("t2", "boom", 5);
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("boom"));
        assert_eq!(bad.tokens_used, 0);
    }

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
    }
}
