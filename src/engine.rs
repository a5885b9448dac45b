//! The shield: per-field authorization orchestration
//!
//! The external query-execution engine calls [`Shield::authorize`] once per
//! field per request. Duplicate calls are idempotent thanks to the
//! request-scoped rule cache. `Denied` and `Errored` both mean "do not
//! resolve this field"; they are surfaced distinctly so the caller can shape
//! the failure.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::context::EvaluationContext;
use crate::decision::Decision;
use crate::error::{Result, ShieldError};
use crate::hierarchy::RoleTable;
use crate::node::DecisionNode;
use crate::permissions::PermissionMap;
use crate::types::{FieldArgs, Role};

/// Shield configuration
#[derive(Debug, Clone)]
pub struct ShieldConfig {
    /// Process-wide fallback applied when neither an effective role map nor
    /// the DEFAULTS map covers a field. `None` requires the DEFAULTS map to
    /// carry its own fallback.
    pub fallback: Option<DecisionNode>,

    /// Log every decision at info level instead of debug
    pub debug: bool,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            fallback: Some(DecisionNode::Deny),
            debug: false,
        }
    }
}

/// Field-level authorization engine.
///
/// Built once at process start from static configuration: the role override
/// table is resolved into one effective permission map per role, the DEFAULTS
/// map serves anonymous callers and unmapped fields, and everything is
/// immutable and freely shared across concurrent requests afterwards.
pub struct Shield {
    /// Effective permission map per role, resolved from the override table
    effective: HashMap<Role, PermissionMap>,

    /// Shared defaults: the logged-out map, and the fallback layer for
    /// fields no role layer maps
    defaults: PermissionMap,

    /// Terminal fallback, guaranteed present after construction
    fallback: DecisionNode,

    debug: bool,
}

impl Shield {
    /// Resolve the role hierarchy and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ShieldError::Configuration`] if the role table is malformed
    /// or no fallback is configured anywhere. Configuration problems are
    /// fatal here, never deferred to request time.
    pub fn new(table: RoleTable, defaults: PermissionMap, config: ShieldConfig) -> Result<Self> {
        let fallback = defaults
            .fallback()
            .cloned()
            .or(config.fallback)
            .ok_or_else(|| {
                ShieldError::Configuration(
                    "no fallback configured: defaults map and shield config both lack one"
                        .to_string(),
                )
            })?;

        let effective = table.resolve()?;

        info!(
            roles = effective.len(),
            defaults = defaults.len(),
            "shield initialized"
        );

        Ok(Self {
            effective,
            defaults,
            fallback,
            debug: config.debug,
        })
    }

    /// Decide whether the caller may resolve `type_name.field`.
    ///
    /// Selects the effective permission map for the caller's role (anonymous
    /// callers resolve against the DEFAULTS map), resolves the bound decision
    /// node with fallback substitution, and evaluates it against the
    /// request's rule cache.
    pub async fn authorize(
        &self,
        type_name: &str,
        field: &str,
        parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        let role = ctx.caller().map(|caller| caller.role);
        let node = self.resolve_node(type_name, field, role);

        let decision = node.evaluate(parent, args, ctx).await;

        if self.debug {
            info!(
                type_name,
                field,
                role = ?role,
                decision = ?decision,
                "authorization decision"
            );
        } else {
            debug!(
                type_name,
                field,
                role = ?role,
                decision = ?decision,
                "authorization decision"
            );
        }

        decision
    }

    /// Resolution chain: effective role map entry, then DEFAULTS entry, then
    /// DEFAULTS fallback, then the shield fallback
    fn resolve_node(&self, type_name: &str, field: &str, role: Option<Role>) -> &DecisionNode {
        if let Some(role) = role {
            if let Some(node) = self
                .effective
                .get(&role)
                .and_then(|map| map.get(type_name, field))
            {
                return node;
            }
        }

        self.defaults
            .resolve(type_name, field)
            .unwrap_or(&self.fallback)
    }
}
