//! Per-request evaluation context

use std::sync::Arc;

use crate::cache::RuleCache;
use crate::store::DocumentStore;
use crate::types::Caller;

/// Per-request bundle: caller identity, persistence handle, and the
/// request-scoped rule cache.
///
/// Created once per incoming request and dropped when the request completes.
/// The cache is exclusively owned by this request; the permission maps it is
/// evaluated against are process-wide and read-only.
pub struct EvaluationContext {
    caller: Option<Caller>,
    store: Arc<dyn DocumentStore>,
    cache: RuleCache,
}

impl EvaluationContext {
    /// Context for an authenticated caller
    pub fn new(caller: Caller, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            caller: Some(caller),
            store,
            cache: RuleCache::new(),
        }
    }

    /// Context for an anonymous (logged-out) caller
    pub fn anonymous(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            caller: None,
            store,
            cache: RuleCache::new(),
        }
    }

    /// The caller, if authenticated
    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    /// Read-only persistence collaborator
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// This request's rule cache
    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }
}
