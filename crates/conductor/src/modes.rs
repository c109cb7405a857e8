//! Execution modes: the fixed registry of personas a subtask can run under,
//! and the selector that routes free-form text to the best-matching mode.
//!
//! The mode set is closed — `code`, `architect`, `debug`, `ask`, and
//! `orchestrator` — and each mode carries a static role description plus an
//! allowed-capability tag set. The registry is an explicitly constructed,
//! immutable value passed into the components that need mode metadata;
//! there is no ambient global instance.
//!
//! Selection is heuristic and total: [`ModeSelector::select`] never fails
//! for arbitrary text, and ties break toward the default mode (`code`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// The default mode used for tie-breaks, unmatched text, and fallback when
/// a caller holds an unknown mode name.
pub const DEFAULT_MODE: ModeId = ModeId::Code;

// ── Mode ids ───────────────────────────────────────────────────────

/// Identifier for one of the five execution modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeId {
    /// Writes and edits code.
    Code,
    /// Designs systems and module boundaries.
    Architect,
    /// Diagnoses and fixes failures.
    Debug,
    /// Answers questions and explains.
    Ask,
    /// Coordinates multi-part work.
    Orchestrator,
}

impl ModeId {
    /// All modes, in the fixed order used for deterministic scans.
    pub const ALL: [ModeId; 5] = [
        ModeId::Code,
        ModeId::Architect,
        ModeId::Debug,
        ModeId::Ask,
        ModeId::Orchestrator,
    ];

    /// The mode's wire/display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeId::Code => "code",
            ModeId::Architect => "architect",
            ModeId::Debug => "debug",
            ModeId::Ask => "ask",
            ModeId::Orchestrator => "orchestrator",
        }
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code" => Ok(ModeId::Code),
            "architect" => Ok(ModeId::Architect),
            "debug" => Ok(ModeId::Debug),
            "ask" => Ok(ModeId::Ask),
            "orchestrator" => Ok(ModeId::Orchestrator),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

// ── Registry ───────────────────────────────────────────────────────

/// Static metadata for one mode: role description and capability tags.
#[derive(Debug, Clone, Serialize)]
pub struct ModeDefinition {
    /// The mode this definition describes.
    pub id: ModeId,
    /// One-line role description.
    pub role: &'static str,
    /// Allowed-capability tag set.
    pub capabilities: &'static [&'static str],
}

/// Immutable registry of mode definitions.
///
/// [`ModeRegistry::standard`] holds all five modes. A narrowed registry
/// (via [`ModeRegistry::new`]) is valid: looking up a missing mode returns
/// `None`, which executors surface as a per-subtask failure rather than a
/// fatal error.
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    defs: Vec<ModeDefinition>,
}

impl ModeRegistry {
    /// Build a registry from an explicit definition list.
    pub fn new(defs: Vec<ModeDefinition>) -> Self {
        Self { defs }
    }

    /// The full standard registry covering all five modes.
    pub fn standard() -> Self {
        Self::new(vec![
            ModeDefinition {
                id: ModeId::Code,
                role: "Implements features, writes and edits source code",
                capabilities: &["read", "edit", "command"],
            },
            ModeDefinition {
                id: ModeId::Architect,
                role: "Designs system structure, module boundaries, and data flow",
                capabilities: &["read", "plan"],
            },
            ModeDefinition {
                id: ModeId::Debug,
                role: "Diagnoses failures, reproduces bugs, and applies fixes",
                capabilities: &["read", "edit", "command", "inspect"],
            },
            ModeDefinition {
                id: ModeId::Ask,
                role: "Answers questions and explains code and decisions",
                capabilities: &["read"],
            },
            ModeDefinition {
                id: ModeId::Orchestrator,
                role: "Coordinates multi-part work across other modes",
                capabilities: &["plan", "delegate"],
            },
        ])
    }

    /// Look up a mode's definition. `None` for modes absent from this
    /// registry — a recoverable condition, not an error.
    pub fn get(&self, id: ModeId) -> Option<&ModeDefinition> {
        self.defs.iter().find(|d| d.id == id)
    }

    /// Resolve a mode name, falling back to [`DEFAULT_MODE`] when the name
    /// is unknown.
    pub fn resolve_or_default(&self, name: &str) -> ModeId {
        name.parse().unwrap_or(DEFAULT_MODE)
    }

    /// Whether the registry contains the given mode.
    pub fn contains(&self, id: ModeId) -> bool {
        self.get(id).is_some()
    }

    /// All definitions in this registry.
    pub fn definitions(&self) -> &[ModeDefinition] {
        &self.defs
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Selector ───────────────────────────────────────────────────────

/// Per-mode keyword lists used for scoring. Longer keywords are stronger
/// signals, so a hit contributes the keyword's length.
const MODE_KEYWORDS: [(ModeId, &[&str]); 5] = [
    (
        ModeId::Code,
        &[
            "implement",
            "write",
            "create",
            "add",
            "build",
            "function",
            "method",
            "endpoint",
            "refactor",
            "code",
        ],
    ),
    (
        ModeId::Architect,
        &[
            "design",
            "architecture",
            "structure",
            "schema",
            "blueprint",
            "organize",
            "system design",
            "data model",
        ],
    ),
    (
        ModeId::Debug,
        &[
            "debug",
            "fix",
            "bug",
            "error",
            "crash",
            "broken",
            "failing",
            "troubleshoot",
            "diagnose",
            "regression",
        ],
    ),
    (
        ModeId::Ask,
        &[
            "explain",
            "describe",
            "clarify",
            "understand",
            "question",
            "documentation",
            "what is",
            "how does",
        ],
    ),
    (
        ModeId::Orchestrator,
        &[
            "coordinate",
            "multiple",
            "entire",
            "comprehensive",
            "end-to-end",
            "across",
            "overall",
        ],
    ),
];

/// One pattern rule: regex over the raw text, target mode, fixed bonus.
struct PatternRule {
    pattern: Regex,
    mode: ModeId,
    bonus: f64,
}

/// Routes a subtask description to the best-matching mode.
///
/// Scores accumulate from (a) keyword hits weighted by keyword length and
/// (b) a pattern-rule table matched against the raw text. The highest
/// aggregate score wins; ties break toward [`DEFAULT_MODE`].
pub struct ModeSelector {
    rules: Vec<PatternRule>,
}

impl ModeSelector {
    /// Build a selector with the standard pattern-rule table. Patterns are
    /// compiled once here, never per call.
    pub fn new() -> Self {
        let rule = |pattern: &str, mode: ModeId, bonus: f64| PatternRule {
            // Table patterns are static and known-valid; a bad edit fails
            // the selector tests immediately.
            pattern: Regex::new(pattern).expect("static mode pattern"),
            mode,
            bonus,
        };
        Self {
            rules: vec![
                rule(r"(?i)\bfix(es|ed)?\b.*\b(bug|error|issue|crash|failure)", ModeId::Debug, 10.0),
                rule(r"(?i)\b(design|architect)\w*\b.*\b(system|api|schema|module|service)", ModeId::Architect, 10.0),
                rule(r"(?i)^\s*(what|how|why|when|where|who)\b", ModeId::Ask, 8.0),
                rule(r"(?i)\b(implement|add|write|create)\b.*\b(function|feature|endpoint|test|handler)", ModeId::Code, 8.0),
                rule(r"(?i)\b(entire|whole|complete)\b.*\b(system|codebase|project|pipeline)", ModeId::Orchestrator, 8.0),
            ],
        }
    }

    /// Pick the single best-matching mode for a description. Total for
    /// arbitrary text: always returns a valid mode id.
    pub fn select(&self, description: &str) -> ModeId {
        let lower = description.to_lowercase();

        let mut best = DEFAULT_MODE;
        let mut best_score = self.score_mode(DEFAULT_MODE, description, &lower);

        for mode in ModeId::ALL {
            if mode == DEFAULT_MODE {
                continue;
            }
            let score = self.score_mode(mode, description, &lower);
            // Strictly greater: equal scores keep the default.
            if score > best_score {
                best = mode;
                best_score = score;
            }
        }

        trace!(mode = %best, score = best_score, "mode selected");
        best
    }

    fn score_mode(&self, mode: ModeId, raw: &str, lower: &str) -> f64 {
        let mut score = 0.0;

        if let Some((_, keywords)) = MODE_KEYWORDS.iter().find(|(m, _)| *m == mode) {
            for kw in *keywords {
                if lower.contains(kw) {
                    score += kw.len() as f64;
                }
            }
        }

        for rule in &self.rules {
            if rule.mode == mode && rule.pattern.is_match(raw) {
                score += rule.bonus;
            }
        }

        score
    }
}

impl Default for ModeSelector {
    fn default() -> Self {
        Self::new()
    }
}
