//! Content compression: reduce a value's token footprint when it is over
//! budget, without any model call.
//!
//! Strings are compressed by sentence ranking — score every sentence by
//! keyword presence (security/auth terms weigh triple), numerals, and
//! technical-token patterns, then greedily keep the highest-scoring
//! sentences until a character target derived from the token ceiling is
//! met. Selection is importance order; original sentence order is not
//! preserved. Arrays of prioritized records drop their lowest-priority
//! entries; nested objects recurse with a capped per-key sub-budget.
//!
//! A named strategy pipeline (`deduplicate`, `extract_key_points`,
//! `summarize`) runs afterward if the result is still over the ceiling,
//! in listed order, stopping as soon as the ceiling is satisfied.

use crate::context::{CharTokenEstimator, DEFAULT_CHARS_PER_TOKEN, TokenEstimator};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Sentences shorter than this (in chars) are penalized as low-content.
const SHORT_SENTENCE_CHARS: usize = 20;
/// Score multiplier for short sentences.
const SHORT_SENTENCE_PENALTY: f64 = 0.5;
/// Multiplier for security/auth keyword hits.
const SECURITY_WEIGHT: f64 = 3.0;
/// Floor for per-key sub-budgets when recursing into objects.
const MIN_SUB_BUDGET: usize = 8;

/// Generally important keywords; one point per hit.
const IMPORTANT_KEYWORDS: &[&str] = &[
    "must", "should", "required", "error", "fail", "fix", "warning", "critical", "important",
    "note", "breaking", "deprecated",
];

/// Security/auth terms; three points per hit.
const SECURITY_KEYWORDS: &[&str] = &[
    "security", "auth", "authentication", "authorization", "password", "token", "encryption",
    "vulnerability", "permission",
];

/// A named compression strategy for the post-pass pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Drop sentences that repeat earlier sentences verbatim.
    Deduplicate,
    /// Keep only sentences containing designated key-point keywords.
    ExtractKeyPoints,
    /// Re-run sentence-ranking summarization.
    Summarize,
}

/// Compressor configuration.
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Characters per token for the character-budget conversion.
    pub chars_per_token: f64,
    /// Keywords that mark a sentence as a key point for
    /// [`CompressionStrategy::ExtractKeyPoints`].
    pub key_point_keywords: Vec<String>,
    /// Pipeline applied, in order, when the first pass leaves a string over
    /// budget.
    pub strategies: Vec<CompressionStrategy>,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            key_point_keywords: IMPORTANT_KEYWORDS.iter().map(|s| (*s).to_string()).collect(),
            strategies: vec![
                CompressionStrategy::Deduplicate,
                CompressionStrategy::ExtractKeyPoints,
                CompressionStrategy::Summarize,
            ],
        }
    }
}

/// Reduces values to fit a token ceiling.
pub struct ContentCompressor {
    config: CompressorConfig,
    estimator: CharTokenEstimator,
    numerals: Regex,
    technical: Regex,
}

impl ContentCompressor {
    /// Build a compressor with the given configuration.
    pub fn new(config: CompressorConfig) -> Self {
        let estimator = CharTokenEstimator::new(config.chars_per_token);
        Self {
            config,
            estimator,
            numerals: Regex::new(r"\d").expect("static compressor pattern"),
            technical: Regex::new(r"\b\w+(::\w+|_\w+|\(\)|\.\w{2,4}\b)")
                .expect("static compressor pattern"),
        }
    }

    /// Compress a value to fit `max_tokens`. Values already under the
    /// ceiling are returned unchanged.
    pub fn compress(&self, value: &Value, max_tokens: usize) -> Value {
        if self.estimator.estimate(value) <= max_tokens {
            return value.clone();
        }

        let reduced = match value {
            Value::String(s) => Value::String(self.compress_text(s, max_tokens)),
            Value::Array(items) if Self::is_prioritized(items) => {
                self.drop_low_priority(items, max_tokens)
            }
            Value::Array(items) => {
                let per_item = (max_tokens / items.len().max(1)).max(MIN_SUB_BUDGET);
                Value::Array(items.iter().map(|v| self.compress(v, per_item)).collect())
            }
            Value::Object(map) => {
                let per_key = (max_tokens / map.len().max(1)).max(MIN_SUB_BUDGET);
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), self.compress(v, per_key)))
                        .collect(),
                )
            }
            other => other.clone(),
        };

        // Strategy pipeline: strings that are still over budget get the
        // named passes, in order, stopping once the ceiling is satisfied.
        if let Value::String(s) = &reduced
            && self.estimator.estimate_str(s) > max_tokens
        {
            return Value::String(self.apply_strategies(s, max_tokens));
        }

        reduced
    }

    /// Compress a plain string to fit `max_tokens`. A string already under
    /// the ceiling is returned unchanged.
    pub fn compress_text(&self, text: &str, max_tokens: usize) -> String {
        if self.estimator.estimate_str(text) <= max_tokens {
            return text.to_string();
        }

        let target_chars = (max_tokens as f64 * self.config.chars_per_token) as usize;
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return String::new();
        }

        let mut scored: Vec<(usize, f64, &str)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| (i, self.score_sentence(s), *s))
            .collect();
        // Highest score first; input position breaks ties so scoring stays
        // deterministic.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let mut kept: Vec<&str> = Vec::new();
        let mut total = 0usize;
        for (_, _, sentence) in &scored {
            if total >= target_chars {
                break;
            }
            kept.push(sentence);
            total += sentence.chars().count() + 1;
        }

        let result = kept.join(" ");
        debug!(
            original_chars = text.chars().count(),
            kept_chars = result.chars().count(),
            sentences_kept = kept.len(),
            sentences_total = sentences.len(),
            "compressed text"
        );
        result
    }

    fn apply_strategies(&self, text: &str, max_tokens: usize) -> String {
        let mut current = text.to_string();
        for strategy in &self.config.strategies {
            if self.estimator.estimate_str(&current) <= max_tokens {
                break;
            }
            current = match strategy {
                CompressionStrategy::Deduplicate => deduplicate_sentences(&current),
                CompressionStrategy::ExtractKeyPoints => {
                    self.extract_key_points(&current)
                }
                CompressionStrategy::Summarize => self.compress_text(&current, max_tokens),
            };
        }
        current
    }

    /// Keep only sentences containing a designated key-point keyword.
    fn extract_key_points(&self, text: &str) -> String {
        let kept: Vec<&str> = split_sentences(text)
            .into_iter()
            .filter(|s| {
                let lower = s.to_lowercase();
                self.config
                    .key_point_keywords
                    .iter()
                    .any(|kw| lower.contains(kw.as_str()))
            })
            .collect();
        kept.join(" ")
    }

    fn score_sentence(&self, sentence: &str) -> f64 {
        let lower = sentence.to_lowercase();
        let mut score = 0.0;

        for kw in IMPORTANT_KEYWORDS {
            if lower.contains(kw) {
                score += 1.0;
            }
        }
        for kw in SECURITY_KEYWORDS {
            if lower.contains(kw) {
                score += SECURITY_WEIGHT;
            }
        }
        if self.numerals.is_match(sentence) {
            score += 0.5;
        }
        if self.technical.is_match(sentence) {
            score += 0.5;
        }
        if sentence.chars().count() < SHORT_SENTENCE_CHARS {
            score *= SHORT_SENTENCE_PENALTY;
        }
        score
    }

    /// An array is "prioritized" when every element is an object carrying a
    /// numeric `priority` field.
    fn is_prioritized(items: &[Value]) -> bool {
        !items.is_empty()
            && items.iter().all(|v| {
                v.as_object()
                    .and_then(|o| o.get("priority"))
                    .map(|p| p.is_number())
                    .unwrap_or(false)
            })
    }

    /// Drop lowest-priority records until the array fits the budget,
    /// preserving the original order of survivors.
    fn drop_low_priority(&self, items: &[Value], max_tokens: usize) -> Value {
        let mut keep: Vec<bool> = vec![true; items.len()];
        let mut total: usize = items.iter().map(|v| self.estimator.estimate(v)).sum();

        while total > max_tokens {
            let victim = items
                .iter()
                .enumerate()
                .filter(|(i, _)| keep[*i])
                .min_by(|(_, a), (_, b)| {
                    let pa = priority_of(a);
                    let pb = priority_of(b);
                    pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i);
            match victim {
                Some(i) => {
                    keep[i] = false;
                    total -= self.estimator.estimate(&items[i]);
                }
                None => break,
            }
        }

        Value::Array(
            items
                .iter()
                .enumerate()
                .filter(|(i, _)| keep[*i])
                .map(|(_, v)| v.clone())
                .collect(),
        )
    }
}

impl Default for ContentCompressor {
    fn default() -> Self {
        Self::new(CompressorConfig::default())
    }
}

fn priority_of(value: &Value) -> f64 {
    value
        .as_object()
        .and_then(|o| o.get("priority"))
        .and_then(|p| p.as_f64())
        .unwrap_or(0.0)
}

/// Split text into sentences on `.`, `!`, `?` followed by whitespace, and
/// on newlines. Empty fragments are dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_terminator = false;

    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            let fragment = text[start..idx].trim();
            if !fragment.is_empty() {
                sentences.push(fragment);
            }
            start = idx + ch.len_utf8();
            prev_terminator = false;
        } else if prev_terminator && ch.is_whitespace() {
            let fragment = text[start..idx].trim();
            if !fragment.is_empty() {
                sentences.push(fragment);
            }
            start = idx;
            prev_terminator = false;
        } else {
            prev_terminator = matches!(ch, '.' | '!' | '?');
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Drop sentences that repeat an earlier sentence verbatim (case- and
/// whitespace-insensitive).
fn deduplicate_sentences(text: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    let kept: Vec<&str> = split_sentences(text)
        .into_iter()
        .filter(|s| seen.insert(s.trim().to_lowercase()))
        .collect();
    kept.join(" ")
}
