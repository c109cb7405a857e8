//! Task analysis: heuristic complexity scoring and subtask planning.
//!
//! [`complexity`] turns a raw task description into a [`TaskAnalysis`];
//! [`planner`] turns that analysis into a dependency graph of subtasks.
//! Both are pure with respect to their inputs — no persisted state, a
//! fresh analysis per request.

pub mod complexity;
pub mod planner;

pub use complexity::{
    ComplexityFactor, ComplexityScorer, FactorKind, TaskAnalysis, ORCHESTRATION_THRESHOLD,
};
pub use planner::SubtaskPlanner;
