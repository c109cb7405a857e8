//! Token-budgeted context management: estimation, the priority-ranked
//! budget store, information ranking, and content compression.
//!
//! Every piece of text shown to an execution step passes through this
//! module. The context window is treated as a finite budget: items are
//! costed by a [`TokenEstimator`], admitted into a
//! [`ContextBudgetStore`](store::ContextBudgetStore) under a hard ceiling,
//! ranked by a [`PriorityRanker`](ranker::PriorityRanker), and squeezed by a
//! [`ContentCompressor`](compressor::ContentCompressor) when over budget.

pub mod compressor;
pub mod ranker;
pub mod store;

use serde_json::Value;

/// Default characters per token. Approximate by design — most tokenizers
/// average 3-4 chars per token for English; budget math here uses 4.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

// ── Estimation ─────────────────────────────────────────────────────

/// Deterministic, approximate cost function for text and structured values.
///
/// A single-function seam: budget logic never counts characters itself, so a
/// real tokenizer can be substituted without touching store or compressor
/// code. Implementations must be deterministic — the same input always
/// yields the same estimate.
pub trait TokenEstimator: Send + Sync {
    /// Estimated token cost of a plain string.
    fn estimate_str(&self, text: &str) -> usize;

    /// Estimated token cost of a structured value. Strings are costed
    /// directly; everything else is costed by its serialized form.
    fn estimate(&self, value: &Value) -> usize {
        match value {
            Value::String(s) => self.estimate_str(s),
            other => self.estimate_str(&other.to_string()),
        }
    }
}

/// Length-based estimator: `ceil(chars / chars_per_token)`.
#[derive(Debug, Clone)]
pub struct CharTokenEstimator {
    chars_per_token: f64,
}

impl CharTokenEstimator {
    /// Build an estimator with a custom chars-per-token ratio.
    pub fn new(chars_per_token: f64) -> Self {
        Self { chars_per_token }
    }
}

impl Default for CharTokenEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharTokenEstimator {
    fn estimate_str(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.chars().count() as f64 / self.chars_per_token).ceil() as usize
    }
}

// ── Usage reporting ────────────────────────────────────────────────

/// Snapshot of budget consumption at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextUsage {
    /// Tokens currently admitted.
    pub current: usize,
    /// The hard ceiling.
    pub max: usize,
    /// `current / max`, as a percentage.
    pub percentage: f64,
}

impl ContextUsage {
    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: {} / {} tokens ({:.0}%)",
            self.current, self.max, self.percentage
        )
    }
}
