//! Event-platform authorization policy
//!
//! The concrete rule set and permission configuration for the event platform
//! API: users, categories, events, invitations, and message-board posts.
//! [`rules`] defines the atomic predicates; [`permissions`] composes them
//! into the DEFAULTS map and the per-role override layers.

pub mod permissions;
pub mod rules;

pub use permissions::{defaults, flat_shield, role_table, shield};
pub use rules::Reference;
