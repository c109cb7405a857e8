//! Turns a [`TaskAnalysis`] into a dependency graph of subtasks.
//!
//! Non-orchestrated analyses plan as a single subtask in the task's
//! primary mode. Orchestrated analyses plan one subtask per required mode,
//! chained in mode order, with a final integration subtask (default mode)
//! fanning in from every prior subtask when more than one mode is
//! involved. Ids are scoped to one planning run.

use crate::analysis::complexity::TaskAnalysis;
use crate::graph::{DependencyGraph, DependencyKind, SubTask};
use crate::modes::{DEFAULT_MODE, ModeId};
use tracing::debug;

/// Stateless planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtaskPlanner;

impl SubtaskPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan the subtask graph for an analysis. The output always validates
    /// and is always acyclic: a chain plus fan-in edges into a fresh final
    /// node cannot close a cycle.
    pub fn plan(&self, analysis: &TaskAnalysis) -> DependencyGraph {
        if !analysis.requires_orchestration {
            let mode = analysis.required_modes.first().copied().unwrap_or(DEFAULT_MODE);
            let task = SubTask::new("subtask-1", analysis.description.clone(), mode)
                .with_complexity(analysis.complexity);
            return DependencyGraph::from_subtasks(vec![task]);
        }

        let modes = &analysis.required_modes;
        let per_subtask =
            (analysis.complexity / modes.len() as f64).floor().min(10.0);

        let mut nodes: Vec<SubTask> = modes
            .iter()
            .enumerate()
            .map(|(index, mode)| {
                let id = format!("subtask-{}", index + 1);
                let mut task = SubTask::new(id, phase_description(*mode, analysis), *mode)
                    .with_priority(index as u32)
                    .with_complexity(per_subtask);
                if index > 0 {
                    task = task.depends_on(format!("subtask-{index}"));
                }
                task
            })
            .collect();

        let mut graph = if modes.len() > 1 {
            let prior_ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
            let mut integration = SubTask::new(
                format!("subtask-{}", nodes.len() + 1),
                format!("Integrate and verify the combined results: {}", analysis.description),
                DEFAULT_MODE,
            )
            .with_priority(nodes.len() as u32)
            .with_complexity(per_subtask);
            for id in &prior_ids {
                integration = integration.depends_on(id.clone());
            }
            nodes.push(integration);

            let mut graph = DependencyGraph::from_subtasks(nodes);
            // Reclassify the fan-in edges so reports can tell integration
            // ordering apart from data ordering.
            let final_id = format!("subtask-{}", graph.len());
            for edge in graph.edges.iter_mut().filter(|e| e.to == final_id) {
                edge.kind = DependencyKind::Integration;
            }
            graph
        } else {
            DependencyGraph::from_subtasks(nodes)
        };

        // from_subtasks derives edges from declared dependencies only;
        // keep plan order stable for downstream result ordering.
        graph.nodes.sort_by_key(|n| n.priority);
        debug!(subtasks = graph.len(), "plan assembled");
        graph
    }
}

fn phase_description(mode: ModeId, analysis: &TaskAnalysis) -> String {
    let phase = match mode {
        ModeId::Architect => "Design the structure and interfaces for",
        ModeId::Code => "Implement",
        ModeId::Debug => "Diagnose and fix defects in",
        ModeId::Ask => "Research and explain the requirements of",
        ModeId::Orchestrator => "Coordinate the overall delivery of",
    };
    format!("{phase}: {} ({})", analysis.description, analysis.suggested_approach)
}
