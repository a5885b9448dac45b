//! # gql-shield
//!
//! Field-level authorization engine for graph-shaped query APIs.
//!
//! Every incoming request resolves a tree of typed objects and fields. Before
//! a field resolver runs, the engine decides Allow/Deny from the caller
//! identity and role, the field's parent object, and the operation arguments.
//!
//! ## Features
//!
//! - **Declarative rule trees**: atomic async predicates composed with
//!   And/Or/Not into an inspectable [`DecisionNode`] tree
//! - **Short-circuit, concurrent evaluation**: combinator children are
//!   dispatched together and losers are discarded as soon as a decisive
//!   result arrives
//! - **Request-scoped memoization**: a rule is evaluated at most once per
//!   (predicate, parent, arguments) key within one request
//! - **Additive role inheritance**: per-role override maps are resolved once
//!   at startup into effective permission maps, higher roles never less
//!   permissive than lower ones
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gql_shield::{
//!     DecisionNode, EvaluationContext, PermissionMap, RoleTable, Shield,
//!     ShieldConfig, store::InMemoryStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let defaults = PermissionMap::builder()
//!         .field("Event", "title", DecisionNode::Allow)
//!         .fallback(DecisionNode::Deny)
//!         .build();
//!
//!     let shield = Shield::new(RoleTable::empty(), defaults, ShieldConfig::default())?;
//!
//!     let store = Arc::new(InMemoryStore::new());
//!     let ctx = EvaluationContext::anonymous(store);
//!     let decision = shield
//!         .authorize("Event", "title", None, &Default::default(), &ctx)
//!         .await;
//!
//!     assert!(decision.is_allowed());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod decision;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod node;
pub mod permissions;
pub mod platform;
pub mod rule;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheStats, RuleCache};
pub use context::EvaluationContext;
pub use decision::Decision;
pub use engine::{Shield, ShieldConfig};
pub use error::{Result, ShieldError};
pub use hierarchy::RoleTable;
pub use node::DecisionNode;
pub use permissions::{FieldKey, PermissionMap};
pub use rule::Rule;
pub use store::DocumentStore;
pub use types::{Caller, DocId, FieldArgs, Role};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
