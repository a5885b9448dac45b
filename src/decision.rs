//! Terminal outcome of evaluating a decision node

use serde::{Deserialize, Serialize};

/// The result of evaluating a [`DecisionNode`](crate::node::DecisionNode).
///
/// `Errored` means a predicate could not be evaluated because its input was
/// malformed (for example, a referenced identifier does not parse). It
/// short-circuits composition the same way `Denied` does, but is surfaced
/// distinctly so callers can tell "not permitted" from "bad request".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// The caller may resolve the field
    Allowed,

    /// Policy says no. Expected and common, not an anomaly.
    Denied,

    /// The predicate could not be evaluated
    Errored { reason: String },
}

impl Decision {
    /// Create an errored decision
    pub fn errored(reason: impl Into<String>) -> Self {
        Decision::Errored {
            reason: reason.into(),
        }
    }

    /// Build a decision from a boolean predicate outcome
    pub fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Decision::Errored { .. })
    }
}

impl From<crate::error::ShieldError> for Decision {
    /// Rule-level failures become `Errored`, never `Denied`
    fn from(err: crate::error::ShieldError) -> Self {
        Decision::errored(err.to_string())
    }
}
