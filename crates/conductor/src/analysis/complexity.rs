//! Heuristic complexity scoring over raw task descriptions.
//!
//! The score is a weighted sum of independent factor detectors on top of a
//! base complexity, scaled by description length and clamped to `[0, 10]`.
//! Required modes come from a separate keyword scan and are deliberately
//! decoupled from the numeric score: a low-complexity task can still name
//! a specific mode, and a high score alone never adds modes.
//!
//! | weight | factor |
//! |--------|------------------------------------------|
//! | 3.5    | security-sensitive                       |
//! | 2.5    | cross-domain, legacy code                |
//! | 2.0    | multi-step, integration, performance     |
//! | 1.5    | file complexity, external dependencies   |

use crate::modes::{DEFAULT_MODE, ModeId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Scores at or above this require orchestration into subtasks.
pub const ORCHESTRATION_THRESHOLD: f64 = 5.0;

/// Ceiling applied to short descriptions that match the simple-task
/// lexicon. Keeps "quick fix to the auth module" out of orchestration even
/// though heavy factors (security) may fire on it.
const SIMPLE_COMPLEXITY_CAP: f64 = 2.5;

const BASE_COMPLEXITY: f64 = 1.0;
const SIMPLE_BASE_COMPLEXITY: f64 = 0.5;

/// Phrases that mark a description as a simple task.
const SIMPLE_LEXICON: [&str; 6] = ["fix typo", "typo", "minor", "quick", "simple", "small change"];

/// Distinct domain vocabularies; two or more hit domains is cross-domain.
const DOMAIN_GROUPS: [&[&str]; 5] = [
    &["frontend", "ui", "ux", "css", "component"],
    &["backend", "server", "endpoint", "service"],
    &["database", "sql", "schema", "query"],
    &["deploy", "docker", "kubernetes", "infrastructure", "pipeline"],
    &["auth", "encryption", "permission", "credential"],
];

// ── Factors ────────────────────────────────────────────────────────

/// The eight independent complexity signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// Sequencing markers: conjunctions, ordinals, numbered or bulleted
    /// lists.
    MultiStep,
    /// Vocabulary from two or more distinct technical domains.
    CrossDomain,
    /// "Multiple files" phrasing.
    FileComplexity,
    /// Integration, API or webhook vocabulary. Suppressed for simple
    /// descriptions.
    IntegrationRequired,
    /// Optimization, latency or throughput vocabulary.
    PerformanceCritical,
    /// Authentication, tokens or encryption vocabulary. Highest weight.
    SecuritySensitive,
    /// Refactoring, migration or modernization vocabulary.
    LegacyCode,
    /// Library, package or dependency vocabulary. Suppressed for simple
    /// descriptions.
    ExternalDependencies,
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FactorKind::MultiStep => "multi_step",
            FactorKind::CrossDomain => "cross_domain",
            FactorKind::FileComplexity => "file_complexity",
            FactorKind::IntegrationRequired => "integration_required",
            FactorKind::PerformanceCritical => "performance_critical",
            FactorKind::SecuritySensitive => "security_sensitive",
            FactorKind::LegacyCode => "legacy_code",
            FactorKind::ExternalDependencies => "external_dependencies",
        };
        f.write_str(s)
    }
}

/// One detected signal with its contribution to the total score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityFactor {
    /// Which detector fired.
    pub kind: FactorKind,
    /// Fixed contribution before length scaling.
    pub weight: f64,
    /// What the detector saw.
    pub note: String,
}

/// Full analysis of one task description. Derived purely from the text;
/// discarded when the orchestration request finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnalysis {
    /// The description that was analyzed.
    pub description: String,
    /// Overall score in `[0, 10]`.
    pub complexity: f64,
    /// Detected factors, in detector order.
    pub factors: Vec<ComplexityFactor>,
    /// Modes the task calls for, from the keyword scan. Never empty.
    pub required_modes: Vec<ModeId>,
    /// Whether the score crossed [`ORCHESTRATION_THRESHOLD`].
    pub requires_orchestration: bool,
    /// Suggested decomposition size, in `[1, 10]`.
    pub estimated_subtask_count: usize,
    /// Human-readable synthesis of the analysis.
    pub suggested_approach: String,
}

// ── Scorer ─────────────────────────────────────────────────────────

struct Detector {
    kind: FactorKind,
    weight: f64,
    pattern: Regex,
    note: &'static str,
    /// Whether the simple-task lexicon suppresses this detector.
    suppressed_when_simple: bool,
}

/// Stateless analyzer; compile once, score many.
pub struct ComplexityScorer {
    detectors: Vec<Detector>,
    numbered_item: Regex,
    bullet_item: Regex,
    mode_keywords: Vec<(ModeId, &'static [&'static str])>,
}

impl ComplexityScorer {
    /// Build the scorer with its fixed detector and keyword tables.
    pub fn new() -> Self {
        let detector = |kind, weight, pattern: &str, note, suppressed_when_simple| Detector {
            kind,
            weight,
            pattern: Regex::new(pattern).expect("static complexity pattern"),
            note,
            suppressed_when_simple,
        };
        Self {
            detectors: vec![
                detector(
                    FactorKind::MultiStep,
                    2.0,
                    r"(?im)\b(and|then|after|first|second|third|finally)\b|^\s*\d+[.)]\s|^\s*[-*]\s",
                    "sequencing or list markers",
                    false,
                ),
                detector(
                    FactorKind::FileComplexity,
                    1.5,
                    r"(?i)\b(multiple|several|many|across)\b[^.!?]*\bfiles?\b",
                    "spans multiple files",
                    false,
                ),
                detector(
                    FactorKind::IntegrationRequired,
                    2.0,
                    r"(?i)\b(integrat\w*|api|webhook|third[- ]party|external service)\b",
                    "integration points involved",
                    true,
                ),
                detector(
                    FactorKind::SecuritySensitive,
                    3.5,
                    r"(?i)\b(auth\w*|jwt|oauth|encrypt\w*|password|credential\w*|permission\w*|token\w*)\b",
                    "touches security-sensitive surface",
                    false,
                ),
                detector(
                    FactorKind::LegacyCode,
                    2.5,
                    r"(?i)\b(refactor\w*|migrat\w*|moderniz\w*|legacy|deprecat\w*)\b",
                    "reworks existing code",
                    false,
                ),
                detector(
                    FactorKind::PerformanceCritical,
                    2.0,
                    r"(?i)\b(optimi\w*|performance|latency|throughput|bottleneck|slow)\b",
                    "performance constraints",
                    false,
                ),
                detector(
                    FactorKind::ExternalDependencies,
                    1.5,
                    r"(?i)\b(librar(y|ies)|packages?|dependenc\w*|crates?|sdk)\b",
                    "pulls in external dependencies",
                    true,
                ),
            ],
            numbered_item: Regex::new(r"(?m)^\s*\d+[.)]\s").expect("static complexity pattern"),
            bullet_item: Regex::new(r"(?m)^\s*[-*]\s").expect("static complexity pattern"),
            mode_keywords: vec![
                (
                    ModeId::Architect,
                    &["design", "architecture", "architect", "structure", "system", "plan"][..],
                ),
                (
                    ModeId::Code,
                    &["implement", "build", "create", "write", "add", "develop", "code"][..],
                ),
                (
                    ModeId::Debug,
                    &["fix", "bug", "debug", "error", "issue", "crash", "broken"][..],
                ),
                (
                    ModeId::Ask,
                    &["explain", "describe", "understand", "what", "how", "why"][..],
                ),
                (
                    ModeId::Orchestrator,
                    &["entire", "comprehensive", "complete", "multiple", "end-to-end", "overall"][..],
                ),
            ],
        }
    }

    /// Analyze a task description. Never errors; empty or whitespace-only
    /// input yields a zero-complexity analysis.
    pub fn analyze(&self, description: &str) -> TaskAnalysis {
        let trimmed = description.trim();
        if trimmed.is_empty() {
            return TaskAnalysis {
                description: String::new(),
                complexity: 0.0,
                factors: Vec::new(),
                required_modes: vec![DEFAULT_MODE],
                requires_orchestration: false,
                estimated_subtask_count: 1,
                suggested_approach: "Nothing to do.".to_string(),
            };
        }

        let lower = trimmed.to_lowercase();
        let simple = SIMPLE_LEXICON.iter().any(|phrase| lower.contains(phrase));
        let base = if simple { SIMPLE_BASE_COMPLEXITY } else { BASE_COMPLEXITY };

        let mut factors: Vec<ComplexityFactor> = Vec::new();
        for det in &self.detectors {
            if det.suppressed_when_simple && simple {
                continue;
            }
            if det.pattern.is_match(trimmed) {
                factors.push(ComplexityFactor {
                    kind: det.kind,
                    weight: det.weight,
                    note: det.note.to_string(),
                });
            }
        }
        if let Some(factor) = self.cross_domain(&lower) {
            factors.push(factor);
        }

        let factor_sum: f64 = factors.iter().map(|f| f.weight).sum();
        let mut complexity = (base + factor_sum * length_multiplier(trimmed.len())).clamp(0.0, 10.0);
        if simple && trimmed.len() < 100 {
            complexity = complexity.min(SIMPLE_COMPLEXITY_CAP);
        }

        let required_modes = self.required_modes(&lower);
        let requires_orchestration = complexity >= ORCHESTRATION_THRESHOLD;
        let estimated_subtask_count = self.subtask_count(trimmed, complexity);
        let suggested_approach = suggest_approach(
            requires_orchestration,
            estimated_subtask_count,
            &required_modes,
            &factors,
        );

        debug!(
            complexity,
            factors = factors.len(),
            orchestrate = requires_orchestration,
            "task analyzed"
        );

        TaskAnalysis {
            description: trimmed.to_string(),
            complexity,
            factors,
            required_modes,
            requires_orchestration,
            estimated_subtask_count,
            suggested_approach,
        }
    }

    fn cross_domain(&self, lower: &str) -> Option<ComplexityFactor> {
        let hit: Vec<usize> = DOMAIN_GROUPS
            .iter()
            .enumerate()
            .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(i, _)| i)
            .collect();
        (hit.len() >= 2).then(|| ComplexityFactor {
            kind: FactorKind::CrossDomain,
            weight: 2.5,
            note: format!("spans {} technical domains", hit.len()),
        })
    }

    /// Keyword scan governing `required_modes`, independent of the score.
    /// Scan order fixes the output order; no hit defaults to `code`.
    fn required_modes(&self, lower: &str) -> Vec<ModeId> {
        let modes: Vec<ModeId> = self
            .mode_keywords
            .iter()
            .filter(|(_, keywords)| {
                keywords
                    .iter()
                    .any(|k| lower.split(|c: char| !c.is_alphanumeric() && c != '-').any(|w| w == *k))
            })
            .map(|(mode, _)| *mode)
            .collect();
        if modes.is_empty() { vec![DEFAULT_MODE] } else { modes }
    }

    /// `ceil(complexity / 2)`, raised to any explicit step or bullet
    /// count in the text, clamped to `[1, 10]`.
    fn subtask_count(&self, text: &str, complexity: f64) -> usize {
        let from_score = (complexity / 2.0).ceil() as usize;
        let numbered = self.numbered_item.find_iter(text).count();
        let bulleted = self.bullet_item.find_iter(text).count();
        from_score.max(numbered).max(bulleted).clamp(1, 10)
    }
}

impl Default for ComplexityScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn length_multiplier(len: usize) -> f64 {
    match len {
        0..100 => 1.0,
        100..300 => 1.1,
        300..500 => 1.2,
        _ => 1.3,
    }
}

fn suggest_approach(
    orchestrate: bool,
    count: usize,
    modes: &[ModeId],
    factors: &[ComplexityFactor],
) -> String {
    let mode_list = modes
        .iter()
        .map(ModeId::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if !orchestrate {
        return format!("Handle directly in {mode_list} mode.");
    }
    let drivers = if factors.is_empty() {
        "overall scope".to_string()
    } else {
        factors
            .iter()
            .map(|f| f.kind.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Decompose into {count} subtask(s) across modes [{mode_list}]; key drivers: {drivers}."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> ComplexityScorer {
        ComplexityScorer::new()
    }

    #[test]
    fn empty_input_yields_zero_without_error() {
        for input in ["", "   ", "\n\t"] {
            let analysis = scorer().analyze(input);
            assert_eq!(analysis.complexity, 0.0);
            assert!(analysis.factors.is_empty());
            assert!(!analysis.requires_orchestration);
            assert_eq!(analysis.estimated_subtask_count, 1);
            assert_eq!(analysis.required_modes, vec![ModeId::Code]);
        }
    }

    #[test]
    fn fix_typo_is_simple_and_single() {
        let analysis = scorer().analyze("Fix typo in README.md");
        assert!(analysis.complexity < 3.0, "got {}", analysis.complexity);
        assert!(!analysis.requires_orchestration);
        assert_eq!(analysis.estimated_subtask_count, 1);
        assert_eq!(analysis.required_modes, vec![ModeId::Debug]);
    }

    #[test]
    fn auth_system_is_orchestrated_across_modes() {
        let analysis = scorer().analyze(
            "Implement a complete user authentication system with JWT, OAuth, \
             and role-based permissions across multiple files",
        );
        assert!(analysis.complexity > 7.0, "got {}", analysis.complexity);
        assert!(analysis.requires_orchestration);
        for mode in [ModeId::Architect, ModeId::Code, ModeId::Orchestrator] {
            assert!(
                analysis.required_modes.contains(&mode),
                "missing {mode}: {:?}",
                analysis.required_modes
            );
        }
        let kinds: Vec<FactorKind> = analysis.factors.iter().map(|f| f.kind).collect();
        assert!(kinds.contains(&FactorKind::SecuritySensitive));
        assert!(kinds.contains(&FactorKind::FileComplexity));
        assert!(kinds.contains(&FactorKind::MultiStep));
    }

    #[test]
    fn simple_short_tasks_never_orchestrate() {
        // Heavy factors fire, but the simple lexicon caps short tasks.
        for input in [
            "Quick fix to the auth token check",
            "Minor tweak to the encryption padding",
            "Fix typo in OAuth error message",
        ] {
            assert!(input.len() < 100);
            let analysis = scorer().analyze(input);
            assert!(analysis.complexity < 3.0, "{input}: {}", analysis.complexity);
            assert!(!analysis.requires_orchestration, "{input}");
        }
    }

    #[test]
    fn simple_lexicon_suppresses_integration_and_dependency_factors() {
        let analysis = scorer().analyze("Quick update of the api client library");
        let kinds: Vec<FactorKind> = analysis.factors.iter().map(|f| f.kind).collect();
        assert!(!kinds.contains(&FactorKind::IntegrationRequired));
        assert!(!kinds.contains(&FactorKind::ExternalDependencies));
    }

    #[test]
    fn cross_domain_needs_two_distinct_domains() {
        let one = scorer().analyze("restyle the frontend component spacing");
        assert!(!one.factors.iter().any(|f| f.kind == FactorKind::CrossDomain));

        let two = scorer().analyze("wire the frontend component to the backend endpoint");
        assert!(two.factors.iter().any(|f| f.kind == FactorKind::CrossDomain));
    }

    #[test]
    fn explicit_step_lists_raise_subtask_count() {
        let analysis = scorer().analyze(
            "Ship the importer:\n1. parse the feed\n2. validate rows\n3. write to storage\n4. report stats",
        );
        assert!(analysis.estimated_subtask_count >= 4);
    }

    #[test]
    fn subtask_count_tracks_score_for_plain_text() {
        let analysis = scorer().analyze(
            "Refactor the legacy billing service and migrate its database schema \
             to the new backend, optimizing query latency throughout",
        );
        assert_eq!(
            analysis.estimated_subtask_count,
            (analysis.complexity / 2.0).ceil() as usize
        );
        assert!(analysis.requires_orchestration);
    }

    #[test]
    fn length_multiplier_steps() {
        assert_eq!(length_multiplier(50), 1.0);
        assert_eq!(length_multiplier(100), 1.1);
        assert_eq!(length_multiplier(299), 1.1);
        assert_eq!(length_multiplier(300), 1.2);
        assert_eq!(length_multiplier(700), 1.3);
    }

    #[test]
    fn required_modes_default_to_code() {
        let analysis = scorer().analyze("polish the onboarding copy");
        assert_eq!(analysis.required_modes, vec![ModeId::Code]);
    }

    #[test]
    fn approach_mentions_decomposition_when_orchestrated() {
        let analysis = scorer().analyze(
            "Design and implement a comprehensive integration layer across multiple files, \
             migrating the legacy webhook handlers and optimizing database throughput",
        );
        assert!(analysis.requires_orchestration);
        assert!(analysis.suggested_approach.contains("Decompose"));
    }

    #[test]
    fn score_is_always_within_bounds() {
        let long = "Design, implement, refactor and optimize the entire authentication, \
                    database, frontend and deployment stack across multiple files with \
                    third-party api integrations and new library dependencies. "
            .repeat(5);
        let analysis = scorer().analyze(&long);
        assert!(analysis.complexity <= 10.0);
        assert!(analysis.complexity >= 0.0);
        assert_eq!(analysis.estimated_subtask_count, 5); // ceil(10 / 2)
    }
}
