//! Permission maps: (type, field) → decision node, with a fallback
//!
//! Maps are built once from literal entries at process start and never
//! mutated at runtime.

use std::collections::HashMap;
use std::fmt;

use crate::node::DecisionNode;

/// Lookup key for a permission map entry. Operations are addressed the same
/// way as fields, under their operation type (for example
/// `("Mutation", "promote")`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub type_name: String,
    pub field: String,
}

impl FieldKey {
    pub fn new(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field)
    }
}

/// Immutable mapping from (type, field) to a decision node, plus an optional
/// fallback node applied when no entry exists.
///
/// Role override layers carry no fallback; the shield's DEFAULTS map must
/// carry one, which [`Shield::new`](crate::engine::Shield::new) validates at
/// startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionMap {
    entries: HashMap<FieldKey, DecisionNode>,
    fallback: Option<DecisionNode>,
}

impl PermissionMap {
    /// Start building a map from literal entries
    pub fn builder() -> PermissionMapBuilder {
        PermissionMapBuilder::default()
    }

    /// An empty map with no fallback
    pub fn empty() -> Self {
        Self::default()
    }

    /// The node mapped for exactly this (type, field), ignoring the fallback
    pub fn get(&self, type_name: &str, field: &str) -> Option<&DecisionNode> {
        // Borrowed lookup would need a two-str key type; maps are resolved
        // once per field so the allocation is acceptable
        self.entries.get(&FieldKey::new(type_name, field))
    }

    /// Resolve a (type, field) pair to its node, or to this map's fallback
    pub fn resolve(&self, type_name: &str, field: &str) -> Option<&DecisionNode> {
        self.get(type_name, field).or(self.fallback.as_ref())
    }

    /// This map's fallback node, if any
    pub fn fallback(&self) -> Option<&DecisionNode> {
        self.fallback.as_ref()
    }

    /// Iterate all literal entries
    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &DecisionNode)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`PermissionMap`]
#[derive(Debug, Default)]
pub struct PermissionMapBuilder {
    entries: HashMap<FieldKey, DecisionNode>,
    fallback: Option<DecisionNode>,
}

impl PermissionMapBuilder {
    /// Bind a (type, field) pair to a decision node. Later bindings for the
    /// same key replace earlier ones.
    pub fn field(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        node: DecisionNode,
    ) -> Self {
        self.entries.insert(FieldKey::new(type_name, field), node);
        self
    }

    /// Set the fallback node for unmapped fields
    pub fn fallback(mut self, node: DecisionNode) -> Self {
        self.fallback = Some(node);
        self
    }

    pub fn build(self) -> PermissionMap {
        PermissionMap {
            entries: self.entries,
            fallback: self.fallback,
        }
    }
}
