//! Concurrent Action Score Table.
//!
//! Tracks the cumulative sentiment of every named action reported by
//! clients. Each action (e.g. `"open_menu"`, `"checkout"`) maps to a signed
//! integer score that starts at `0` and moves by a weighted step on every
//! feedback event.
//!
//! ## Weighting rule
//!
//! The step size depends on the score *before* the event is applied:
//!
//! ```text
//! weight = 2   if score > 5 or score < -5
//! weight = 1   otherwise
//! ```
//!
//! Positive feedback adds the weight, negative feedback subtracts it. The
//! comparison is strict, so a score of exactly `5` or `-5` still moves by
//! `1`. There is no smoothing: a score oscillating around the threshold
//! flips between weight 1 and weight 2 on every crossing.
//!
//! ## Concurrency
//!
//! The whole table sits behind a single [`parking_lot::RwLock`]. The
//! read-modify-write in [`KnowledgeStore::apply_feedback`] runs under the
//! write guard, [`KnowledgeStore::snapshot`] copies under the read guard and
//! [`KnowledgeStore::restore`] swaps the map under the write guard, so none
//! of them can observe a partially applied effect of another.
//!
//! # Example
//!
//! ```rust
//! use aura_memory::KnowledgeStore;
//! use aura_types::Sign;
//!
//! let store = KnowledgeStore::new();
//! for _ in 0..6 {
//!     store.apply_feedback("a", Sign::Positive);
//! }
//! assert_eq!(store.score("a"), 6);
//!
//! // Pre-event score 6 is above the threshold, so the step doubles.
//! assert_eq!(store.apply_feedback("a", Sign::Positive), 8);
//! ```

use std::collections::{BTreeMap, HashMap};

use aura_types::{AuraError, Sign};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

/// Absolute score above which feedback is weighted double.
pub const WEIGHT_THRESHOLD: i64 = 5;

/// Point-in-time copy of the score table, ordered by action.
pub type Scores = BTreeMap<String, i64>;

// ─────────────────────────────────────────────────────────────────────────────
// KnowledgeStore
// ─────────────────────────────────────────────────────────────────────────────

/// Thread-safe action → score table.
///
/// Share it between connections and the checkpoint scheduler as an
/// `Arc<KnowledgeStore>`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    scores: RwLock<HashMap<String, i64>>,
}

impl KnowledgeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Step size for an event arriving while the action sits at `score`.
    pub fn weight_for(score: i64) -> i64 {
        if score > WEIGHT_THRESHOLD || score < -WEIGHT_THRESHOLD {
            2
        } else {
            1
        }
    }

    /// Apply one feedback event to `action` and return its new score.
    ///
    /// Unseen actions start at `0`. Any string is accepted as an action,
    /// including the empty string.
    pub fn apply_feedback(&self, action: &str, sign: Sign) -> i64 {
        let mut scores = self.scores.write();
        let entry = scores.entry(action.to_string()).or_insert(0);
        let weight = Self::weight_for(*entry);
        *entry = sign.apply(*entry, weight);
        let score = *entry;
        drop(scores);

        debug!(action, ?sign, weight, score, "knowledge updated");
        score
    }

    /// Current score of `action`, `0` if it has never received feedback.
    pub fn score(&self, action: &str) -> i64 {
        self.scores.read().get(action).copied().unwrap_or(0)
    }

    /// Consistent copy of the whole table.
    pub fn snapshot(&self) -> Scores {
        let scores = self.scores.read();
        scores.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Replace the whole table with the JSON object `data`.
    ///
    /// Every value must be an integer that fits in an `i64`. Returns the
    /// number of restored entries.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Decode`] if `data` is not an object or any value
    /// is not an integer. The existing table is left untouched in that case.
    pub fn restore(&self, data: &Value) -> Result<usize, AuraError> {
        let Value::Object(map) = data else {
            return Err(AuraError::Decode(format!(
                "snapshot must be a JSON object, found {}",
                json_kind(data)
            )));
        };

        let mut restored = HashMap::with_capacity(map.len());
        for (action, value) in map {
            let score = value.as_i64().ok_or_else(|| {
                AuraError::Decode(format!(
                    "score for action {action:?} must be an integer, found {value}"
                ))
            })?;
            restored.insert(action.clone(), score);
        }

        let count = restored.len();
        *self.scores.write() = restored;
        Ok(count)
    }

    /// Number of distinct actions in the table.
    pub fn len(&self) -> usize {
        self.scores.read().len()
    }

    /// `true` if no action has received feedback yet.
    pub fn is_empty(&self) -> bool {
        self.scores.read().is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn unseen_action_scores_zero() {
        let store = KnowledgeStore::new();
        assert_eq!(store.score("never_seen"), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn weight_is_one_inside_threshold_inclusive() {
        for s in -5..=5 {
            assert_eq!(KnowledgeStore::weight_for(s), 1, "score {s}");
        }
    }

    #[test]
    fn weight_is_two_outside_threshold() {
        for s in [6, 7, 100, -6, -7, -100] {
            assert_eq!(KnowledgeStore::weight_for(s), 2, "score {s}");
        }
    }

    #[test]
    fn positive_run_doubles_after_passing_five() {
        let store = KnowledgeStore::new();
        let progression: Vec<i64> = (0..8)
            .map(|_| store.apply_feedback("a", Sign::Positive))
            .collect();
        assert_eq!(progression, vec![1, 2, 3, 4, 5, 6, 8, 10]);
    }

    #[test]
    fn negative_run_doubles_after_passing_minus_five() {
        let store = KnowledgeStore::new();
        let progression: Vec<i64> = (0..7)
            .map(|_| store.apply_feedback("b", Sign::Negative))
            .collect();
        assert_eq!(progression, vec![-1, -2, -3, -4, -5, -6, -8]);
    }

    #[test]
    fn weight_uses_pre_event_score_when_crossing_back() {
        let store = KnowledgeStore::new();
        store.restore(&json!({ "a": 6 })).unwrap();

        // 6 is above the threshold, so the negative step is 2.
        assert_eq!(store.apply_feedback("a", Sign::Negative), 4);
        // 4 is inside, so the positive step is 1.
        assert_eq!(store.apply_feedback("a", Sign::Positive), 5);
        assert_eq!(store.apply_feedback("a", Sign::Positive), 6);
        assert_eq!(store.apply_feedback("a", Sign::Positive), 8);
    }

    #[test]
    fn updates_are_order_dependent() {
        let a = KnowledgeStore::new();
        a.restore(&json!({ "x": 5 })).unwrap();
        a.apply_feedback("x", Sign::Positive); // 5 -> 6
        a.apply_feedback("x", Sign::Negative); // 6 -> 4

        let b = KnowledgeStore::new();
        b.restore(&json!({ "x": 5 })).unwrap();
        b.apply_feedback("x", Sign::Negative); // 5 -> 4
        b.apply_feedback("x", Sign::Positive); // 4 -> 5

        assert_eq!(a.score("x"), 4);
        assert_eq!(b.score("x"), 5);
    }

    #[test]
    fn actions_are_case_sensitive_and_independent() {
        let store = KnowledgeStore::new();
        store.apply_feedback("Open", Sign::Positive);
        store.apply_feedback("open", Sign::Negative);
        assert_eq!(store.score("Open"), 1);
        assert_eq!(store.score("open"), -1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn empty_action_is_accepted() {
        let store = KnowledgeStore::new();
        assert_eq!(store.apply_feedback("", Sign::Positive), 1);
        assert_eq!(store.snapshot().get(""), Some(&1));
    }

    #[test]
    fn snapshot_of_empty_store_is_empty() {
        let store = KnowledgeStore::new();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_live_table() {
        let store = KnowledgeStore::new();
        store.apply_feedback("a", Sign::Positive);
        let snap = store.snapshot();
        store.apply_feedback("a", Sign::Positive);
        assert_eq!(snap["a"], 1);
        assert_eq!(store.score("a"), 2);
    }

    #[test]
    fn restore_of_snapshot_round_trips() {
        let store = KnowledgeStore::new();
        for _ in 0..9 {
            store.apply_feedback("a", Sign::Positive);
        }
        store.apply_feedback("b", Sign::Negative);
        store.apply_feedback("", Sign::Positive);

        let before = store.snapshot();
        let value = serde_json::to_value(&before).unwrap();
        assert_eq!(store.restore(&value).unwrap(), 3);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn restore_replaces_table_wholesale() {
        let store = KnowledgeStore::new();
        store.apply_feedback("stale", Sign::Positive);
        store.restore(&json!({ "fresh": -3 })).unwrap();
        assert_eq!(store.score("stale"), 0);
        assert_eq!(store.score("fresh"), -3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn restore_rejects_non_object() {
        let store = KnowledgeStore::new();
        let err = store.restore(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, AuraError::Decode(_)));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn restore_rejects_non_integer_score_without_mutating() {
        let store = KnowledgeStore::new();
        store.apply_feedback("keep", Sign::Positive);

        for bad in [json!({ "a": 1, "b": "two" }), json!({ "a": 1.5 }), json!({ "a": null })] {
            let err = store.restore(&bad).unwrap_err();
            assert!(matches!(err, AuraError::Decode(_)), "{bad}");
        }
        assert_eq!(store.snapshot(), Scores::from([("keep".to_string(), 1)]));
    }

    #[test]
    fn concurrent_positive_updates_match_sequential_result() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let store = Arc::new(KnowledgeStore::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        store.apply_feedback("a", Sign::Positive);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let sequential = KnowledgeStore::new();
        for _ in 0..THREADS * PER_THREAD {
            sequential.apply_feedback("a", Sign::Positive);
        }
        assert_eq!(store.score("a"), sequential.score("a"));
    }

    #[test]
    fn snapshot_never_observes_torn_state() {
        const UPDATES: usize = 64;

        // Every value the score can legitimately take after k of the N
        // updates have completed.
        let mut reachable = vec![0i64];
        let mut s = 0i64;
        for _ in 0..UPDATES {
            s = Sign::Positive.apply(s, KnowledgeStore::weight_for(s));
            reachable.push(s);
        }

        let store = Arc::new(KnowledgeStore::new());
        let writers: Vec<_> = (0..UPDATES)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.apply_feedback("a", Sign::Positive);
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..200)
                    .map(|_| store.snapshot().get("a").copied().unwrap_or(0))
                    .collect::<Vec<_>>()
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        for observed in reader.join().unwrap() {
            assert!(reachable.contains(&observed), "torn read: {observed}");
        }
        assert_eq!(store.score("a"), *reachable.last().unwrap());
    }
}
