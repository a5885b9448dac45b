//! Request-scoped rule memoization
//!
//! A rule instance can appear in several branches of one decision tree and be
//! reused across fields of the same request. The cache guarantees that a
//! given (predicate identity, fingerprint) pair is evaluated at most once per
//! request, even when combinator fan-out races two branches onto the same
//! key. The cache lives and dies with one [`EvaluationContext`]; it is never
//! shared across requests, so no eviction policy is needed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use blake3::Hasher;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::trace;

use crate::context::EvaluationContext;
use crate::decision::Decision;
use crate::rule::Rule;
use crate::types::FieldArgs;

/// Cache key: predicate identity plus a content fingerprint of the parent
/// identity and argument values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    rule: String,
    fingerprint: [u8; 32],
}

impl CacheKey {
    fn new(rule: &str, parent: Option<&Value>, args: &FieldArgs) -> Self {
        Self {
            rule: rule.to_string(),
            fingerprint: fingerprint(parent, args),
        }
    }
}

/// Per-request rule evaluation cache
pub struct RuleCache {
    entries: DashMap<CacheKey, Arc<OnceCell<Decision>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RuleCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the memoized decision for (rule, parent, args), evaluating the
    /// predicate on first use.
    ///
    /// Concurrent callers racing on the same key are serialized through a
    /// per-key cell: exactly one of them runs the predicate, the rest await
    /// its result.
    pub async fn get_or_evaluate(
        &self,
        rule: &Arc<dyn Rule>,
        parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        let key = CacheKey::new(rule.name(), parent, args);

        // Do not hold the map guard across an await point
        let cell = {
            let entry = self
                .entries
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new()));
            entry.value().clone()
        };

        if let Some(decision) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(rule = rule.name(), "rule cache hit");
            return decision.clone();
        }

        // Only the caller that wins the init race runs the predicate; the
        // rest await its result and count as hits
        let mut evaluated = false;
        let decision = cell
            .get_or_init(|| {
                evaluated = true;
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(rule = rule.name(), "rule cache miss, evaluating");
                async { rule.check(parent, args, ctx).await }
            })
            .await;
        if !evaluated {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(rule = rule.name(), "rule cache hit after in-flight evaluation");
        }

        decision.clone()
    }

    /// Snapshot of cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Content fingerprint of the parent object's identity and the argument
/// values.
///
/// Referentially stable: the same parent instance and structurally equal
/// arguments always produce the same fingerprint. When the parent carries an
/// `_id` field that identity alone is hashed, otherwise the whole value is
/// hashed canonically.
fn fingerprint(parent: Option<&Value>, args: &FieldArgs) -> [u8; 32] {
    let mut hasher = Hasher::new();

    match parent {
        None => {
            hasher.update(b"root");
        }
        Some(value) => match value.get("_id").and_then(Value::as_str) {
            Some(id) => {
                hasher.update(b"id:");
                hasher.update(id.as_bytes());
            }
            None => {
                hasher.update(b"val:");
                hash_value(&mut hasher, value);
            }
        },
    }

    // Sort argument keys for a canonical digest
    let mut keys: Vec<_> = args.keys().collect();
    keys.sort();
    for key in keys {
        hasher.update(b"arg:");
        hasher.update(key.as_bytes());
        hash_value(&mut hasher, &args[key]);
    }

    *hasher.finalize().as_bytes()
}

/// Hash a JSON value with sorted object keys, so structural equality implies
/// digest equality
fn hash_value(hasher: &mut Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(b"\0n");
        }
        Value::Bool(b) => {
            hasher.update(if *b { b"\0t" } else { b"\0f" });
        }
        Value::Number(n) => {
            hasher.update(b"\0#");
            hasher.update(n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update(b"\0s");
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(b"\0[");
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update(b"\0{");
            hasher.update(&(map.len() as u64).to_le_bytes());
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update(&(key.len() as u64).to_le_bytes());
                hasher.update(key.as_bytes());
                hash_value(hasher, &map[key]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::testing::CountingRule;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        EvaluationContext::anonymous(Arc::new(InMemoryStore::new()))
    }

    fn args(value: Value) -> FieldArgs {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => panic!("args fixture must be an object"),
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_memoized() {
        let ctx = ctx();
        let counting = Arc::new(CountingRule::new("r", Decision::Allowed));
        let rule: Arc<dyn Rule> = counting.clone();
        let args = FieldArgs::new();

        let first = ctx.cache().get_or_evaluate(&rule, None, &args, &ctx).await;
        let second = ctx.cache().get_or_evaluate(&rule, None, &args, &ctx).await;

        assert_eq!(first, Decision::Allowed);
        assert_eq!(second, Decision::Allowed);
        assert_eq!(counting.count(), 1);

        let stats = ctx.cache().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_distinct_args_are_distinct_keys() {
        let ctx = ctx();
        let rule: Arc<dyn Rule> = Arc::new(CountingRule::new("r", Decision::Denied));

        let a = args(json!({ "event": "one" }));
        let b = args(json!({ "event": "two" }));

        ctx.cache().get_or_evaluate(&rule, None, &a, &ctx).await;
        ctx.cache().get_or_evaluate(&rule, None, &b, &ctx).await;

        assert_eq!(ctx.cache().stats().entries, 2);
        assert_eq!(ctx.cache().stats().misses, 2);
    }

    #[tokio::test]
    async fn test_fingerprint_ignores_key_order() {
        let a = args(json!({ "user": "u", "event": "e" }));
        let mut b = FieldArgs::new();
        b.insert("event".to_string(), json!("e"));
        b.insert("user".to_string(), json!("u"));

        assert_eq!(fingerprint(None, &a), fingerprint(None, &b));
    }

    #[tokio::test]
    async fn test_parent_identity_drives_fingerprint() {
        let args = FieldArgs::new();
        let parent_a = json!({ "_id": "a", "title": "x" });
        let parent_a_retitled = json!({ "_id": "a", "title": "y" });
        let parent_b = json!({ "_id": "b", "title": "x" });

        // Identity wins over content when present
        assert_eq!(
            fingerprint(Some(&parent_a), &args),
            fingerprint(Some(&parent_a_retitled), &args)
        );
        assert_ne!(
            fingerprint(Some(&parent_a), &args),
            fingerprint(Some(&parent_b), &args)
        );
    }

    /// Constant rule that yields before resolving, so concurrent callers
    /// genuinely wait on an in-flight evaluation
    struct SlowRule;

    #[async_trait::async_trait]
    impl Rule for SlowRule {
        fn name(&self) -> &str {
            "slow"
        }

        async fn check(
            &self,
            _parent: Option<&Value>,
            _args: &FieldArgs,
            _ctx: &EvaluationContext,
        ) -> Decision {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Decision::Allowed
        }
    }

    #[tokio::test]
    async fn test_waiters_on_inflight_evaluation_count_as_hits() {
        let ctx = ctx();
        let rule: Arc<dyn Rule> = Arc::new(SlowRule);
        let args = FieldArgs::new();

        futures::future::join_all(
            (0..16).map(|_| ctx.cache().get_or_evaluate(&rule, None, &args, &ctx)),
        )
        .await;

        let stats = ctx.cache().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 15);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_concurrent_fanout_evaluates_once() {
        let ctx = ctx();
        let counting = Arc::new(CountingRule::new("fanout", Decision::Allowed));
        let rule: Arc<dyn Rule> = counting.clone();
        let args = FieldArgs::new();

        let evaluations = futures::future::join_all(
            (0..16).map(|_| ctx.cache().get_or_evaluate(&rule, None, &args, &ctx)),
        )
        .await;

        assert!(evaluations.iter().all(Decision::is_allowed));
        assert_eq!(counting.count(), 1);
    }
}
