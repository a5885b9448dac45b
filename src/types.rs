//! Core authorization types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ShieldError;

/// Caller roles, ordered from least to most privileged.
///
/// The ordering is what the role hierarchy resolver folds over: a role's
/// effective permissions are the union of every layer at or below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Free,
    Premium,
    Moderator,
    Administrator,
}

impl Role {
    /// All roles, lowest privilege first
    pub const ALL: [Role; 4] = [
        Role::Free,
        Role::Premium,
        Role::Moderator,
        Role::Administrator,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Free => "FREE",
            Role::Premium => "PREMIUM",
            Role::Moderator => "MODERATOR",
            Role::Administrator => "ADMINISTRATOR",
        };
        write!(f, "{}", name)
    }
}

/// Document identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub Uuid);

impl DocId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocId {
    type Err = ShieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(DocId)
            .map_err(|_| ShieldError::MalformedReference(s.to_string()))
    }
}

/// Authenticated caller identity supplied by the session collaborator.
///
/// The engine never authenticates credentials; it only reads identity and
/// role out of the per-request context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// The caller's user document id
    pub id: DocId,

    /// The caller's role
    pub role: Role,
}

impl Caller {
    pub fn new(id: DocId, role: Role) -> Self {
        Self { id, role }
    }
}

/// Declared arguments of the field or operation being authorized
pub type FieldArgs = HashMap<String, serde_json::Value>;
