//! Atomic asynchronous predicates

use async_trait::async_trait;
use serde_json::Value;

use crate::context::EvaluationContext;
use crate::decision::Decision;
use crate::types::FieldArgs;

/// An atomic asynchronous predicate over (parent object, field arguments,
/// caller context).
///
/// Rules must be side-effect free: they may read from the persistence
/// collaborator but never mutate shared state. That makes it safe for
/// combinators to discard in-flight rule evaluations once a decisive sibling
/// result is available.
///
/// A rule's [`name`](Rule::name) is its predicate identity. It must be stable
/// for the process lifetime because it participates in the request-scoped
/// cache key: two rule instances with the same name are treated as the same
/// predicate.
#[async_trait]
pub trait Rule: Send + Sync {
    /// Stable predicate identity, used as a cache key component
    fn name(&self) -> &str;

    /// Evaluate the predicate.
    ///
    /// `parent` is the object instance that produced the field being
    /// authorized; it is absent for root-level operations. A missing
    /// document or a caller without the required relationship is `Denied`;
    /// `Errored` is reserved for malformed input.
    async fn check(
        &self,
        parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision;
}
