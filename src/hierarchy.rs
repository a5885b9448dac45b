//! Role hierarchy resolution
//!
//! Per-role override maps are layered lowest to highest privilege. A role's
//! effective node for a (type, field) key is the Or-fold of every override
//! for that key at or below the role's level, so a higher role is never less
//! permissive than a role beneath it. The hierarchy is additive-only: a
//! `Deny` override inside the fold is a no-op unless it is the only branch.
//!
//! Resolution runs once at shield construction; the effective maps are
//! immutable and shared read-only across all requests afterwards.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, ShieldError};
use crate::node::DecisionNode;
use crate::permissions::{PermissionMap, PermissionMapBuilder};
use crate::types::Role;

/// Ordered per-role override maps, lowest privilege first.
///
/// Roles without a layer inherit the fold of the layers beneath them
/// unchanged. The flat (non-hierarchical) shield is the degenerate case of an
/// empty table: every role then resolves against the shared DEFAULTS map.
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    layers: Vec<(Role, PermissionMap)>,
}

impl RoleTable {
    /// Build a table from override layers ordered lowest to highest
    pub fn new(layers: Vec<(Role, PermissionMap)>) -> Self {
        Self { layers }
    }

    /// A table with no overrides
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve the table into one effective permission map per role.
    ///
    /// # Errors
    ///
    /// Returns [`ShieldError::Configuration`] if the layers are not strictly
    /// ascending in privilege or an override layer defines its own fallback
    /// (fallbacks belong to the DEFAULTS map alone).
    pub fn resolve(&self) -> Result<HashMap<Role, PermissionMap>> {
        self.validate()?;

        let mut effective = HashMap::new();
        // Fold of all layers at or below the role currently being resolved
        let mut accumulated: HashMap<crate::permissions::FieldKey, DecisionNode> = HashMap::new();
        let mut layers = self.layers.iter().peekable();

        for role in Role::ALL {
            while let Some((layer_role, map)) = layers.peek() {
                if *layer_role > role {
                    break;
                }
                for (key, node) in map.iter() {
                    let merged = match accumulated.get(key) {
                        Some(inherited) => or_merge(inherited.clone(), node.clone()),
                        None => node.clone(),
                    };
                    accumulated.insert(key.clone(), merged);
                }
                layers.next();
            }

            let map = accumulated
                .iter()
                .fold(PermissionMap::builder(), |builder: PermissionMapBuilder, (key, node)| {
                    builder.field(key.type_name.clone(), key.field.clone(), node.clone())
                })
                .build();

            debug!(role = %role, entries = map.len(), "resolved effective permission map");
            effective.insert(role, map);
        }

        Ok(effective)
    }

    fn validate(&self) -> Result<()> {
        for window in self.layers.windows(2) {
            if window[0].0 >= window[1].0 {
                return Err(ShieldError::Configuration(format!(
                    "role layers must be strictly ascending: {} listed before {}",
                    window[0].0, window[1].0
                )));
            }
        }
        for (role, map) in &self.layers {
            if map.fallback().is_some() {
                return Err(ShieldError::Configuration(format!(
                    "override layer for {} must not define a fallback",
                    role
                )));
            }
        }
        Ok(())
    }
}

/// Union an inherited node with a role-level override.
///
/// The fold flattens nested `Or`s and elides constant branches whose outcome
/// the disjunction already subsumes: an `Allow` branch collapses the whole
/// fold, `Deny` branches disappear unless nothing else remains. Outcomes are
/// unchanged because `Or` is associative and commutative in outcome.
pub(crate) fn or_merge(inherited: DecisionNode, override_node: DecisionNode) -> DecisionNode {
    let mut flat = Vec::new();
    flatten_or(inherited, &mut flat);
    flatten_or(override_node, &mut flat);

    if flat.iter().any(|b| matches!(b, DecisionNode::Allow)) {
        return DecisionNode::Allow;
    }

    // Repeated layers contribute structurally equal branches; keep one
    let mut branches: Vec<DecisionNode> = Vec::new();
    for branch in flat {
        if !branches.contains(&branch) {
            branches.push(branch);
        }
    }

    branches.retain(|b| !matches!(b, DecisionNode::Deny));

    match branches.len() {
        // A Deny-only entry stays Deny
        0 => DecisionNode::Deny,
        1 => branches.remove(0),
        _ => DecisionNode::Or(branches),
    }
}

fn flatten_or(node: DecisionNode, out: &mut Vec<DecisionNode>) {
    match node {
        DecisionNode::Or(children) => {
            for child in children {
                flatten_or(child, out);
            }
        }
        other => out.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{and, or, rule};
    use crate::rule::testing::CountingRule;
    use crate::Decision;

    fn leaf(name: &str) -> DecisionNode {
        rule(CountingRule::new(name, Decision::Allowed))
    }

    #[test]
    fn test_or_merge_unions_branches() {
        let merged = or_merge(leaf("a"), leaf("b"));
        assert_eq!(merged, or([leaf("a"), leaf("b")]));
    }

    #[test]
    fn test_or_merge_flattens_nested_or() {
        let merged = or_merge(or([leaf("a"), leaf("b")]), leaf("c"));
        assert_eq!(merged, or([leaf("a"), leaf("b"), leaf("c")]));
    }

    #[test]
    fn test_deny_override_cannot_revoke() {
        // Explicit deny alone does not revoke an inherited allow
        assert_eq!(or_merge(leaf("a"), DecisionNode::Deny), leaf("a"));
        assert_eq!(
            or_merge(DecisionNode::Deny, DecisionNode::Deny),
            DecisionNode::Deny
        );
    }

    #[test]
    fn test_identical_branches_collapse() {
        assert_eq!(or_merge(leaf("a"), leaf("a")), leaf("a"));
        assert_eq!(
            or_merge(or([leaf("a"), leaf("b")]), leaf("a")),
            or([leaf("a"), leaf("b")])
        );
    }

    #[test]
    fn test_allow_collapses_fold() {
        assert_eq!(or_merge(leaf("a"), DecisionNode::Allow), DecisionNode::Allow);
    }

    #[test]
    fn test_and_branches_stay_opaque() {
        let guarded = and([leaf("a"), leaf("b")]);
        let merged = or_merge(guarded.clone(), leaf("c"));
        assert_eq!(merged, or([guarded, leaf("c")]));
    }

    #[test]
    fn test_resolve_layers_accumulate_upwards() {
        let table = RoleTable::new(vec![
            (
                Role::Premium,
                PermissionMap::builder()
                    .field("Mutation", "subscribe", leaf("premium_subscribe"))
                    .build(),
            ),
            (
                Role::Administrator,
                PermissionMap::builder()
                    .field("Mutation", "subscribe", leaf("admin_subscribe"))
                    .field("Mutation", "setRole", DecisionNode::Allow)
                    .build(),
            ),
        ]);

        let effective = table.resolve().unwrap();

        // Below the first layer: nothing mapped
        assert!(effective[&Role::Free].is_empty());

        // Premium sees only its own layer
        assert_eq!(
            effective[&Role::Premium].get("Mutation", "subscribe"),
            Some(&leaf("premium_subscribe"))
        );
        assert_eq!(effective[&Role::Premium].get("Mutation", "setRole"), None);

        // Moderator has no layer of its own but inherits premium's
        assert_eq!(
            effective[&Role::Moderator].get("Mutation", "subscribe"),
            Some(&leaf("premium_subscribe"))
        );

        // Administrator unions premium's node with its own override
        assert_eq!(
            effective[&Role::Administrator].get("Mutation", "subscribe"),
            Some(&or([leaf("premium_subscribe"), leaf("admin_subscribe")]))
        );
        assert_eq!(
            effective[&Role::Administrator].get("Mutation", "setRole"),
            Some(&DecisionNode::Allow)
        );
    }

    #[test]
    fn test_out_of_order_layers_rejected() {
        let table = RoleTable::new(vec![
            (Role::Moderator, PermissionMap::empty()),
            (Role::Premium, PermissionMap::empty()),
        ]);
        assert!(matches!(
            table.resolve(),
            Err(ShieldError::Configuration(_))
        ));
    }

    #[test]
    fn test_duplicate_layers_rejected() {
        let table = RoleTable::new(vec![
            (Role::Premium, PermissionMap::empty()),
            (Role::Premium, PermissionMap::empty()),
        ]);
        assert!(matches!(
            table.resolve(),
            Err(ShieldError::Configuration(_))
        ));
    }

    #[test]
    fn test_layer_with_fallback_rejected() {
        let table = RoleTable::new(vec![(
            Role::Premium,
            PermissionMap::builder().fallback(DecisionNode::Deny).build(),
        )]);
        assert!(matches!(
            table.resolve(),
            Err(ShieldError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_table_resolves_empty_maps() {
        let effective = RoleTable::empty().resolve().unwrap();
        assert_eq!(effective.len(), Role::ALL.len());
        assert!(effective.values().all(PermissionMap::is_empty));
    }

    mod simplification_props {
        use super::*;
        use proptest::prelude::*;

        fn constant_tree() -> impl Strategy<Value = DecisionNode> {
            let leaf = prop_oneof![Just(DecisionNode::Allow), Just(DecisionNode::Deny)];
            leaf.prop_recursive(3, 16, 4, |inner| {
                prop::collection::vec(inner, 0..4).prop_map(DecisionNode::Or)
            })
        }

        fn outcome(node: &DecisionNode) -> bool {
            match node {
                DecisionNode::Allow => true,
                DecisionNode::Deny => false,
                DecisionNode::Or(children) => children.iter().any(outcome),
                other => panic!("constant tree cannot contain {:?}", other),
            }
        }

        proptest! {
            #[test]
            fn test_or_merge_preserves_outcome(a in constant_tree(), b in constant_tree()) {
                let merged = or_merge(a.clone(), b.clone());
                prop_assert_eq!(outcome(&merged), outcome(&a) || outcome(&b));
            }
        }
    }
}
