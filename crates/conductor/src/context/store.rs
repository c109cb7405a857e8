//! Fixed-capacity, priority-ranked key/value store of context snippets.
//!
//! Each item carries an estimated token cost; the store enforces a hard
//! token ceiling by evicting lowest-priority, then-oldest items on
//! admission. [`ContextBudgetStore::snapshot`] answers "what should the
//! model see right now": items ordered most-important-first, a guarantee
//! downstream prompt assembly depends on.
//!
//! The store is single-owner: `put`/`remove` mutate synchronously, and
//! eviction depends on atomically reading-then-writing total usage, so
//! concurrent writers must serialize around one instance.

use crate::context::{CharTokenEstimator, ContextUsage, TokenEstimator};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One admitted context snippet.
#[derive(Debug, Clone)]
pub struct ContextItem {
    /// Key, unique within one store instance.
    pub key: String,
    /// The stored value.
    pub value: Value,
    /// Estimated token cost at admission time.
    pub tokens: usize,
    /// Priority; higher survives longer and sorts earlier in snapshots.
    pub priority: i32,
    /// Wall-clock insertion time.
    pub inserted_at: DateTime<Utc>,
    /// Monotonic admission sequence. Wall clocks can collide within a
    /// process; ordering guarantees key off this.
    seq: u64,
}

/// Token-budgeted context store.
pub struct ContextBudgetStore {
    items: HashMap<String, ContextItem>,
    max_tokens: usize,
    current_tokens: usize,
    next_seq: u64,
    estimator: Arc<dyn TokenEstimator>,
}

impl ContextBudgetStore {
    /// Create a store with the given token ceiling and the default
    /// length-based estimator.
    pub fn new(max_tokens: usize) -> Self {
        Self::with_estimator(max_tokens, Arc::new(CharTokenEstimator::default()))
    }

    /// Create a store with a custom estimator (e.g. a real tokenizer).
    pub fn with_estimator(max_tokens: usize, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            items: HashMap::new(),
            max_tokens,
            current_tokens: 0,
            next_seq: 0,
            estimator,
        }
    }

    /// Admit a value under `key`, evicting lower-priority items if needed.
    ///
    /// An item whose own cost exceeds the total capacity is rejected as a
    /// no-op — never a partially-evicting write. Callers that care must
    /// check [`contains`](Self::contains) or [`usage`](Self::usage).
    /// Replacing an existing key accounts for the net change and refreshes
    /// priority and insertion time.
    pub fn put(&mut self, key: impl Into<String>, value: Value, priority: i32) {
        let key = key.into();
        let cost = self.estimator.estimate(&value);

        if cost > self.max_tokens {
            warn!(
                key = %key,
                cost,
                max = self.max_tokens,
                "context item exceeds total capacity, rejected"
            );
            return;
        }

        let replaced = self.items.get(&key).map(|item| item.tokens).unwrap_or(0);

        // Evict until the net admission fits. Terminates: once only the
        // replaced key remains, needed == cost <= max_tokens.
        while self.current_tokens - replaced + cost > self.max_tokens {
            let victim = self
                .items
                .values()
                .filter(|item| item.key != key)
                .min_by_key(|item| (item.priority, item.seq))
                .map(|item| item.key.clone());
            match victim {
                Some(victim_key) => {
                    if let Some(evicted) = self.items.remove(&victim_key) {
                        self.current_tokens -= evicted.tokens;
                        debug!(
                            key = %evicted.key,
                            tokens = evicted.tokens,
                            priority = evicted.priority,
                            "evicted context item"
                        );
                    }
                }
                None => break,
            }
        }

        if let Some(old) = self.items.remove(&key) {
            self.current_tokens -= old.tokens;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.current_tokens += cost;
        self.items.insert(
            key.clone(),
            ContextItem {
                key,
                value,
                tokens: cost,
                priority,
                inserted_at: Utc::now(),
                seq,
            },
        );
    }

    /// Get an item by key.
    pub fn get(&self, key: &str) -> Option<&ContextItem> {
        self.items.get(key)
    }

    /// Remove an item, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<ContextItem> {
        let removed = self.items.remove(key);
        if let Some(ref item) = removed {
            self.current_tokens -= item.tokens;
        }
        removed
    }

    /// Whether the store holds the key.
    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Number of admitted items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.items.clear();
        self.current_tokens = 0;
    }

    /// All items, ordered by descending priority, then by descending
    /// recency for equal priorities. This ordering is a hard guarantee:
    /// prompt assembly reads "most important first".
    pub fn snapshot(&self) -> Vec<&ContextItem> {
        let mut items: Vec<&ContextItem> = self.items.values().collect();
        items.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        items
    }

    /// Current budget consumption, consistent with the sum of admitted
    /// items' costs.
    pub fn usage(&self) -> ContextUsage {
        let percentage = if self.max_tokens > 0 {
            self.current_tokens as f64 / self.max_tokens as f64 * 100.0
        } else {
            0.0
        };
        ContextUsage {
            current: self.current_tokens,
            max: self.max_tokens,
            percentage,
        }
    }
}

impl std::fmt::Debug for ContextBudgetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBudgetStore")
            .field("items", &self.items.len())
            .field("current_tokens", &self.current_tokens)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(chars: usize) -> Value {
        Value::String("x".repeat(chars))
    }

    #[test]
    fn put_and_get() {
        let mut store = ContextBudgetStore::new(100);
        store.put("finding", json!("the cache misses on cold start"), 5);
        assert!(store.contains("finding"));
        assert_eq!(store.len(), 1);
        let item = store.get("finding").unwrap();
        assert_eq!(item.priority, 5);
        assert!(item.tokens > 0);
    }

    #[test]
    fn oversized_item_is_rejected_as_noop() {
        let mut store = ContextBudgetStore::new(10);
        // 100 chars ≈ 25 tokens, over a 10-token ceiling.
        store.put("huge", text(100), 100);
        assert!(!store.contains("huge"));
        assert_eq!(store.usage().current, 0);
    }

    #[test]
    fn usage_never_exceeds_max() {
        let mut store = ContextBudgetStore::new(50);
        for i in 0..40 {
            store.put(format!("k{i}"), text(40), i);
            assert!(store.usage().current <= 50, "over budget after k{i}");
        }
    }

    #[test]
    fn eviction_removes_lowest_priority_first() {
        let mut store = ContextBudgetStore::new(30);
        store.put("low", text(40), 1); // 10 tokens
        store.put("high", text(40), 9); // 10 tokens
        store.put("mid", text(40), 5); // 10 tokens — store is now full
        store.put("new", text(40), 7); // must evict "low"

        assert!(!store.contains("low"));
        assert!(store.contains("high"));
        assert!(store.contains("mid"));
        assert!(store.contains("new"));
    }

    #[test]
    fn eviction_ties_break_toward_oldest() {
        let mut store = ContextBudgetStore::new(30);
        store.put("older", text(40), 3);
        store.put("newer", text(40), 3);
        store.put("top", text(40), 8);
        store.put("incoming", text(40), 5);

        assert!(!store.contains("older"));
        assert!(store.contains("newer"));
    }

    #[test]
    fn replacing_a_key_accounts_for_net_change() {
        let mut store = ContextBudgetStore::new(20);
        store.put("a", text(40), 5); // 10 tokens
        store.put("b", text(40), 9); // 10 tokens — full
        // Replace "a" with a same-size value: no eviction needed.
        store.put("a", text(40), 6);
        assert!(store.contains("a"));
        assert!(store.contains("b"));
        assert_eq!(store.usage().current, 20);
        assert_eq!(store.get("a").unwrap().priority, 6);
    }

    #[test]
    fn remove_frees_budget() {
        let mut store = ContextBudgetStore::new(20);
        store.put("a", text(40), 5);
        assert_eq!(store.usage().current, 10);
        let removed = store.remove("a").unwrap();
        assert_eq!(removed.tokens, 10);
        assert_eq!(store.usage().current, 0);
        assert!(store.remove("a").is_none());
    }

    #[test]
    fn snapshot_orders_by_priority_then_recency() {
        let mut store = ContextBudgetStore::new(1000);
        store.put("p3_old", text(8), 3);
        store.put("p5", text(8), 5);
        store.put("p3_new", text(8), 3);
        store.put("p9", text(8), 9);

        let keys: Vec<&str> = store.snapshot().iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["p9", "p5", "p3_new", "p3_old"]);
    }

    #[test]
    fn snapshot_is_non_increasing_for_arbitrary_sequences() {
        let mut store = ContextBudgetStore::new(200);
        for i in 0..30 {
            store.put(format!("k{i}"), text(16), (i * 7 % 11) as i32);
        }
        let snap = store.snapshot();
        for pair in snap.windows(2) {
            assert!(pair[0].priority >= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                assert!(pair[0].seq > pair[1].seq);
            }
        }
    }

    #[test]
    fn usage_percentage_reflects_consumption() {
        let mut store = ContextBudgetStore::new(100);
        store.put("half", text(200), 1); // 50 tokens
        let usage = store.usage();
        assert_eq!(usage.current, 50);
        assert_eq!(usage.max, 100);
        assert!((usage.percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clear_resets_everything() {
        let mut store = ContextBudgetStore::new(100);
        store.put("a", text(8), 1);
        store.put("b", text(8), 2);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.usage().current, 0);
    }
}
