//! Priority scoring for informational items, per execution mode.
//!
//! Each mode carries a fixed profile mapping information kinds to base
//! weights — `debug` cares about error reports, `architect` about design
//! decisions — which is then shaded by four weighted sub-factors: recency,
//! relevance, specificity, and actionability. The result is a `[0, 1]`
//! score suitable for driving [`ContextBudgetStore`](super::store::ContextBudgetStore)
//! admission priorities.

use crate::modes::ModeId;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sub-factor weights. Fixed; they sum to 1.
const W_RECENCY: f64 = 0.3;
const W_RELEVANCE: f64 = 0.4;
const W_SPECIFICITY: f64 = 0.2;
const W_ACTIONABILITY: f64 = 0.1;

/// Recency buckets by age: <1h, <24h, <1wk, older.
const RECENCY_FRESH: f64 = 1.0;
const RECENCY_TODAY: f64 = 0.8;
const RECENCY_THIS_WEEK: f64 = 0.6;
const RECENCY_STALE: f64 = 0.3;
/// Items without a timestamp.
const RECENCY_UNKNOWN: f64 = 0.5;

// ── Information items ──────────────────────────────────────────────

/// The kind of information an item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoKind {
    /// Implementation specifics: APIs, algorithms, data shapes.
    TechnicalDetail,
    /// A file that was created, edited, or deleted.
    FileChange,
    /// A recorded design or architecture decision.
    DesignDecision,
    /// An error report, stack trace, or failure description.
    ErrorInfo,
    /// A stated requirement or constraint.
    Requirement,
    /// Free-form discussion or commentary.
    Discussion,
}

impl fmt::Display for InfoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InfoKind::TechnicalDetail => "technical_detail",
            InfoKind::FileChange => "file_change",
            InfoKind::DesignDecision => "design_decision",
            InfoKind::ErrorInfo => "error_info",
            InfoKind::Requirement => "requirement",
            InfoKind::Discussion => "discussion",
        };
        f.write_str(s)
    }
}

/// One informational item to be ranked.
#[derive(Debug, Clone)]
pub struct InfoItem {
    /// What kind of information this is.
    pub kind: InfoKind,
    /// The content itself.
    pub content: String,
    /// When the information was produced, if known.
    pub timestamp: Option<DateTime<Utc>>,
}

impl InfoItem {
    /// Convenience constructor for an untimestamped item.
    pub fn new(kind: InfoKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Attach a timestamp.
    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }
}

// ── Per-mode data tables ───────────────────────────────────────────

/// Base priority per (mode, kind). Read-only after initialization; kept as
/// a data table rather than branching code so it can be tested and tuned
/// independently of the scoring algorithm.
fn base_priority(mode: ModeId, kind: InfoKind) -> f64 {
    use InfoKind::*;
    match mode {
        ModeId::Code => match kind {
            TechnicalDetail => 0.9,
            FileChange => 0.9,
            ErrorInfo => 0.6,
            Requirement => 0.6,
            DesignDecision => 0.5,
            Discussion => 0.3,
        },
        ModeId::Architect => match kind {
            DesignDecision => 1.0,
            Requirement => 0.9,
            TechnicalDetail => 0.5,
            Discussion => 0.5,
            ErrorInfo => 0.4,
            FileChange => 0.3,
        },
        ModeId::Debug => match kind {
            ErrorInfo => 1.0,
            TechnicalDetail => 0.8,
            FileChange => 0.7,
            Requirement => 0.4,
            DesignDecision => 0.4,
            Discussion => 0.2,
        },
        ModeId::Ask => match kind {
            Discussion => 0.8,
            DesignDecision => 0.7,
            Requirement => 0.7,
            TechnicalDetail => 0.6,
            ErrorInfo => 0.4,
            FileChange => 0.3,
        },
        ModeId::Orchestrator => match kind {
            Requirement => 0.9,
            DesignDecision => 0.8,
            Discussion => 0.6,
            TechnicalDetail => 0.5,
            ErrorInfo => 0.5,
            FileChange => 0.4,
        },
    }
}

/// Keywords whose presence makes content relevant to a mode.
fn relevance_keywords(mode: ModeId) -> &'static [&'static str] {
    match mode {
        ModeId::Code => &["function", "implement", "code", "api", "type", "test", "refactor"],
        ModeId::Architect => &["design", "architecture", "structure", "pattern", "interface", "boundary"],
        ModeId::Debug => &["error", "fail", "crash", "stack", "trace", "bug", "reproduce", "regression"],
        ModeId::Ask => &["because", "explain", "reason", "documented", "means", "overview"],
        ModeId::Orchestrator => &["depends", "subtask", "sequence", "coordinate", "plan", "milestone"],
    }
}

/// Verbs that make content actionable for a mode.
fn actionable_verbs(mode: ModeId) -> &'static [&'static str] {
    match mode {
        ModeId::Code => &["add", "change", "update", "implement", "remove", "rename"],
        ModeId::Architect => &["split", "merge", "extract", "define", "restructure"],
        ModeId::Debug => &["check", "verify", "reproduce", "revert", "patch", "inspect"],
        ModeId::Ask => &["compare", "summarize", "describe", "list"],
        ModeId::Orchestrator => &["schedule", "order", "assign", "block", "unblock"],
    }
}

// ── Ranker ─────────────────────────────────────────────────────────

/// Computes `[0, 1]` priorities for informational items given a target mode.
pub struct PriorityRanker {
    numerals: Regex,
    file_like: Regex,
    identifier_like: Regex,
}

impl PriorityRanker {
    /// Build a ranker. Patterns compile once here.
    pub fn new() -> Self {
        Self {
            numerals: Regex::new(r"\d").expect("static ranker pattern"),
            file_like: Regex::new(r"\b[\w./-]+\.(rs|toml|md|json|yaml|yml|py|js|ts|txt|lock)\b")
                .expect("static ranker pattern"),
            identifier_like: Regex::new(r"\b\w+(::\w+|_\w+|\(\))")
                .expect("static ranker pattern"),
        }
    }

    /// Score one item for a mode. Clamped to `[0, 1]`.
    ///
    /// `score = base(mode, kind) × (0.3·recency + 0.4·relevance +
    /// 0.2·specificity + 0.1·actionability)`.
    pub fn score(&self, item: &InfoItem, mode: ModeId) -> f64 {
        let base = base_priority(mode, item.kind);
        let blended = W_RECENCY * Self::recency(item.timestamp)
            + W_RELEVANCE * self.relevance(&item.content, mode)
            + W_SPECIFICITY * self.specificity(&item.content)
            + W_ACTIONABILITY * self.actionability(&item.content, mode);
        (base * blended).clamp(0.0, 1.0)
    }

    /// Sort items by score for the mode, highest first. Stable, so
    /// equal-scoring items keep their input order.
    pub fn rank(&self, mut items: Vec<InfoItem>, mode: ModeId) -> Vec<(InfoItem, f64)> {
        let mut scored: Vec<(InfoItem, f64)> = items
            .drain(..)
            .map(|item| {
                let s = self.score(&item, mode);
                (item, s)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    fn recency(timestamp: Option<DateTime<Utc>>) -> f64 {
        let Some(ts) = timestamp else {
            return RECENCY_UNKNOWN;
        };
        let age = Utc::now().signed_duration_since(ts);
        if age.num_hours() < 1 {
            RECENCY_FRESH
        } else if age.num_hours() < 24 {
            RECENCY_TODAY
        } else if age.num_days() < 7 {
            RECENCY_THIS_WEEK
        } else {
            RECENCY_STALE
        }
    }

    fn relevance(&self, content: &str, mode: ModeId) -> f64 {
        let lower = content.to_lowercase();
        let hits = relevance_keywords(mode)
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();
        (hits as f64 * 0.25).min(1.0)
    }

    fn specificity(&self, content: &str) -> f64 {
        let mut score: f64 = 0.2;
        if self.numerals.is_match(content) {
            score += 0.3;
        }
        if self.file_like.is_match(content) {
            score += 0.3;
        }
        if self.identifier_like.is_match(content) {
            score += 0.2;
        }
        score.min(1.0)
    }

    fn actionability(&self, content: &str, mode: ModeId) -> f64 {
        let lower = content.to_lowercase();
        let hits = actionable_verbs(mode)
            .iter()
            .filter(|verb| lower.contains(*verb))
            .count();
        (hits as f64 * 0.3).min(1.0)
    }
}

impl Default for PriorityRanker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(kind: InfoKind, content: &str) -> InfoItem {
        InfoItem::new(kind, content)
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let ranker = PriorityRanker::new();
        let loaded = item(
            InfoKind::ErrorInfo,
            "error: crash in parser.rs line 42, reproduce with check_input() then verify and patch",
        )
        .with_timestamp(Utc::now());
        for mode in ModeId::ALL {
            let s = ranker.score(&loaded, mode);
            assert!((0.0..=1.0).contains(&s), "{mode}: {s}");
        }
    }

    #[test]
    fn debug_prefers_errors_architect_prefers_decisions() {
        let ranker = PriorityRanker::new();
        // Identical content and (absent) timestamps: only the kind differs.
        let error = item(InfoKind::ErrorInfo, "the same words in both");
        let decision = item(InfoKind::DesignDecision, "the same words in both");

        assert!(ranker.score(&error, ModeId::Debug) > ranker.score(&decision, ModeId::Debug));
        assert!(
            ranker.score(&decision, ModeId::Architect) > ranker.score(&error, ModeId::Architect)
        );
    }

    #[test]
    fn fresh_items_outrank_stale_ones() {
        let ranker = PriorityRanker::new();
        let fresh = item(InfoKind::TechnicalDetail, "cache layout notes")
            .with_timestamp(Utc::now());
        let stale = item(InfoKind::TechnicalDetail, "cache layout notes")
            .with_timestamp(Utc::now() - Duration::days(30));
        assert!(ranker.score(&fresh, ModeId::Code) > ranker.score(&stale, ModeId::Code));
    }

    #[test]
    fn missing_timestamp_sits_between_fresh_and_stale() {
        assert!(PriorityRanker::recency(None) < RECENCY_FRESH);
        assert!(PriorityRanker::recency(None) > RECENCY_STALE);
    }

    #[test]
    fn specificity_rewards_numbers_files_and_identifiers() {
        let ranker = PriorityRanker::new();
        let vague = ranker.specificity("something happened somewhere");
        let precise =
            ranker.specificity("parse_header() in src/http.rs returns 404 on line 17");
        assert!(precise > vague);
    }

    #[test]
    fn relevance_counts_mode_keywords_and_caps() {
        let ranker = PriorityRanker::new();
        let hit_all = "error fail crash stack trace bug reproduce regression";
        assert!((ranker.relevance(hit_all, ModeId::Debug) - 1.0).abs() < f64::EPSILON);
        assert!(ranker.relevance("nothing matches here", ModeId::Debug) < 0.01);
    }

    #[test]
    fn rank_sorts_descending() {
        let ranker = PriorityRanker::new();
        let items = vec![
            item(InfoKind::Discussion, "idle chatter"),
            item(InfoKind::ErrorInfo, "error: stack trace from crash in io.rs"),
            item(InfoKind::FileChange, "updated src/main.rs"),
        ];
        let ranked = ranker.rank(items, ModeId::Debug);
        assert_eq!(ranked.len(), 3);
        for pair in ranked.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        assert_eq!(ranked[0].0.kind, InfoKind::ErrorInfo);
    }
}
