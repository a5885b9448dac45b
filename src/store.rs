//! Persistence collaborator interface
//!
//! Rules issue read-only existence and membership queries against the
//! document store. "Not found" is `None` and maps to a `Denied` outcome in
//! the rules, never to an internal error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::{DocId, Role};

/// User document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: DocId,
    pub username: String,
    pub name: String,
    pub surname: String,
    pub role: Role,
}

/// Event document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDoc {
    #[serde(rename = "_id")]
    pub id: DocId,
    pub title: String,
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<DocId>,
    pub attendants: Vec<DocId>,
    pub managers: Vec<DocId>,
    #[serde(default)]
    pub requests: Vec<DocId>,
    #[serde(default)]
    pub categories: Vec<DocId>,
}

/// Message-board post document; `posted_at` references the event whose board
/// carries the post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDoc {
    #[serde(rename = "_id")]
    pub id: DocId,
    pub content: String,
    pub author: DocId,
    #[serde(rename = "postedAt")]
    pub posted_at: DocId,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub locked: bool,
}

/// Invitation document; `to` references the event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationDoc {
    #[serde(rename = "_id")]
    pub id: DocId,
    pub from: DocId,
    pub invited: DocId,
    pub to: DocId,
}

/// Category document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDoc {
    #[serde(rename = "_id")]
    pub id: DocId,
    pub name: String,
    #[serde(default)]
    pub moderators: Vec<DocId>,
}

/// Read-only document store interface used by rule predicates
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Look up a user by id
    async fn user(&self, id: &DocId) -> Result<Option<UserDoc>>;

    /// Look up an event by id
    async fn event(&self, id: &DocId) -> Result<Option<EventDoc>>;

    /// Look up a post by id
    async fn post(&self, id: &DocId) -> Result<Option<PostDoc>>;

    /// Look up an invitation by id
    async fn invitation(&self, id: &DocId) -> Result<Option<InvitationDoc>>;

    /// Look up a category by id
    async fn category(&self, id: &DocId) -> Result<Option<CategoryDoc>>;

    /// Membership probe: the invitation, if any, inviting `user` to `event`
    async fn invitation_for(&self, user: &DocId, event: &DocId)
        -> Result<Option<InvitationDoc>>;
}

/// In-memory document store for tests and embedding
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<DocId, UserDoc>>,
    events: RwLock<HashMap<DocId, EventDoc>>,
    posts: RwLock<HashMap<DocId, PostDoc>>,
    invitations: RwLock<HashMap<DocId, InvitationDoc>>,
    categories: RwLock<HashMap<DocId, CategoryDoc>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in an `Arc` for sharing with evaluation contexts
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn insert_user(&self, user: UserDoc) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn insert_event(&self, event: EventDoc) {
        self.events.write().await.insert(event.id, event);
    }

    pub async fn insert_post(&self, post: PostDoc) {
        self.posts.write().await.insert(post.id, post);
    }

    pub async fn insert_invitation(&self, invitation: InvitationDoc) {
        self.invitations.write().await.insert(invitation.id, invitation);
    }

    pub async fn insert_category(&self, category: CategoryDoc) {
        self.categories.write().await.insert(category.id, category);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn user(&self, id: &DocId) -> Result<Option<UserDoc>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn event(&self, id: &DocId) -> Result<Option<EventDoc>> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn post(&self, id: &DocId) -> Result<Option<PostDoc>> {
        Ok(self.posts.read().await.get(id).cloned())
    }

    async fn invitation(&self, id: &DocId) -> Result<Option<InvitationDoc>> {
        Ok(self.invitations.read().await.get(id).cloned())
    }

    async fn category(&self, id: &DocId) -> Result<Option<CategoryDoc>> {
        Ok(self.categories.read().await.get(id).cloned())
    }

    async fn invitation_for(
        &self,
        user: &DocId,
        event: &DocId,
    ) -> Result<Option<InvitationDoc>> {
        let invitations = self.invitations.read().await;
        Ok(invitations
            .values()
            .find(|inv| inv.invited == *user && inv.to == *event)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(owner: DocId) -> EventDoc {
        EventDoc {
            id: DocId::new(),
            title: "launch party".to_string(),
            private: false,
            owner: Some(owner),
            attendants: vec![owner],
            managers: vec![owner],
            requests: vec![],
            categories: vec![],
        }
    }

    #[tokio::test]
    async fn test_lookup_roundtrip() {
        let store = InMemoryStore::new();
        let owner = DocId::new();
        let event = sample_event(owner);
        let id = event.id;

        store.insert_event(event.clone()).await;

        assert_eq!(store.event(&id).await.unwrap(), Some(event));
        assert_eq!(store.event(&DocId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invitation_probe() {
        let store = InMemoryStore::new();
        let (host, guest, outsider) = (DocId::new(), DocId::new(), DocId::new());
        let event = sample_event(host);
        let event_id = event.id;
        store.insert_event(event).await;

        store
            .insert_invitation(InvitationDoc {
                id: DocId::new(),
                from: host,
                invited: guest,
                to: event_id,
            })
            .await;

        assert!(store
            .invitation_for(&guest, &event_id)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .invitation_for(&outsider, &event_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_event_doc_serde_shape() {
        let event = sample_event(DocId::new());
        let value = serde_json::to_value(&event).unwrap();

        // Parent objects arrive as JSON with a mongo-style `_id` field
        assert!(value.get("_id").is_some());
        let back: EventDoc = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
