//! Decision trees: rules composed with And/Or/Not
//!
//! Authorization policy is data, not control flow: a [`DecisionNode`] tree is
//! assembled once at startup and walked by the evaluator for every field.
//! Combinator children are evaluated concurrently; the first decisive result
//! wins and outstanding siblings are dropped.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::warn;

use crate::context::EvaluationContext;
use crate::decision::Decision;
use crate::rule::Rule;
use crate::types::FieldArgs;

/// A node in an authorization decision tree.
///
/// `And`/`Or` hold an ordered sequence of children; order only affects
/// short-circuit efficiency, never the outcome. `Allow`/`Deny` are policy
/// terminals, used for example as an explicit grant layered over an
/// inherited map.
#[derive(Clone)]
pub enum DecisionNode {
    /// Always allowed
    Allow,

    /// Always denied
    Deny,

    /// Atomic predicate
    Rule(Arc<dyn Rule>),

    /// Allowed only if every child allows
    And(Vec<DecisionNode>),

    /// Allowed as soon as any child allows
    Or(Vec<DecisionNode>),

    /// Inverts Allowed and Denied; Errored passes through
    Not(Box<DecisionNode>),
}

/// Wrap a rule into a leaf node
pub fn rule(r: impl Rule + 'static) -> DecisionNode {
    DecisionNode::Rule(Arc::new(r))
}

/// Conjunction of child nodes
pub fn and(children: impl IntoIterator<Item = DecisionNode>) -> DecisionNode {
    DecisionNode::And(children.into_iter().collect())
}

/// Disjunction of child nodes
pub fn or(children: impl IntoIterator<Item = DecisionNode>) -> DecisionNode {
    DecisionNode::Or(children.into_iter().collect())
}

/// Negation of a child node
pub fn not(child: DecisionNode) -> DecisionNode {
    DecisionNode::Not(Box::new(child))
}

impl DecisionNode {
    /// Evaluate this node for one field resolution.
    ///
    /// Rule leaves go through the request's rule cache, so a predicate that
    /// appears in several branches of the tree runs at most once. `And`/`Or`
    /// children are dispatched together; once a decisive result arrives the
    /// remaining child futures are dropped, which is safe because rules are
    /// side-effect free.
    pub fn evaluate<'a>(
        &'a self,
        parent: Option<&'a Value>,
        args: &'a FieldArgs,
        ctx: &'a EvaluationContext,
    ) -> BoxFuture<'a, Decision> {
        Box::pin(async move {
            match self {
                DecisionNode::Allow => Decision::Allowed,

                DecisionNode::Deny => Decision::Denied,

                DecisionNode::Rule(rule) => {
                    ctx.cache().get_or_evaluate(rule, parent, args, ctx).await
                }

                DecisionNode::And(children) => {
                    let mut pending: FuturesUnordered<_> = children
                        .iter()
                        .map(|child| child.evaluate(parent, args, ctx))
                        .collect();

                    while let Some(decision) = pending.next().await {
                        if !decision.is_allowed() {
                            // Denied or Errored: drop the remaining children
                            return decision;
                        }
                    }
                    Decision::Allowed
                }

                DecisionNode::Or(children) => {
                    let mut pending: FuturesUnordered<_> = children
                        .iter()
                        .map(|child| child.evaluate(parent, args, ctx))
                        .collect();

                    while let Some(decision) = pending.next().await {
                        match decision {
                            Decision::Allowed => return Decision::Allowed,
                            Decision::Denied => {}
                            Decision::Errored { reason } => {
                                // An errored branch counts as non-allow; it is
                                // never promoted past an Or, so one malformed
                                // branch cannot block a deliberately
                                // unreachable combination.
                                warn!(reason = %reason, "or-branch errored, treated as non-allow");
                            }
                        }
                    }
                    Decision::Denied
                }

                DecisionNode::Not(child) => match child.evaluate(parent, args, ctx).await {
                    Decision::Allowed => Decision::Denied,
                    Decision::Denied => Decision::Allowed,
                    errored @ Decision::Errored { .. } => errored,
                },
            }
        })
    }
}

impl fmt::Debug for DecisionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionNode::Allow => write!(f, "Allow"),
            DecisionNode::Deny => write!(f, "Deny"),
            DecisionNode::Rule(rule) => write!(f, "Rule({})", rule.name()),
            DecisionNode::And(children) => f.debug_tuple("And").field(children).finish(),
            DecisionNode::Or(children) => f.debug_tuple("Or").field(children).finish(),
            DecisionNode::Not(child) => f.debug_tuple("Not").field(child).finish(),
        }
    }
}

impl PartialEq for DecisionNode {
    /// Structural equality; rule leaves compare by predicate identity
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DecisionNode::Allow, DecisionNode::Allow) => true,
            (DecisionNode::Deny, DecisionNode::Deny) => true,
            (DecisionNode::Rule(a), DecisionNode::Rule(b)) => a.name() == b.name(),
            (DecisionNode::And(a), DecisionNode::And(b)) => a == b,
            (DecisionNode::Or(a), DecisionNode::Or(b)) => a == b,
            (DecisionNode::Not(a), DecisionNode::Not(b)) => a == b,
            _ => false,
        }
    }
}
