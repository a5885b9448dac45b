//! End-to-end authorization scenarios against the event-platform shield

use std::sync::{Arc, Once};

use serde_json::json;

use gql_shield::platform;
use gql_shield::store::{EventDoc, InMemoryStore, InvitationDoc, PostDoc, UserDoc};
use gql_shield::{Caller, Decision, DocId, EvaluationContext, FieldArgs, Role, Shield};

struct Platform {
    shield: Shield,
    store: Arc<InMemoryStore>,
    owner: DocId,
    attendant: DocId,
    outsider: DocId,
    private_event: EventDoc,
    public_event: EventDoc,
}

static TRACING: Once = Once::new();

/// Surface engine tracing in test output; filter with RUST_LOG
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

async fn platform() -> Platform {
    init_tracing();
    let store = InMemoryStore::shared();
    let owner = DocId::new();
    let attendant = DocId::new();
    let outsider = DocId::new();

    let private_event = EventDoc {
        id: DocId::new(),
        title: "board meeting".to_string(),
        private: true,
        owner: Some(owner),
        attendants: vec![owner, attendant],
        managers: vec![owner],
        requests: vec![],
        categories: vec![],
    };
    let public_event = EventDoc {
        id: DocId::new(),
        title: "open mic".to_string(),
        private: false,
        owner: Some(owner),
        attendants: vec![owner],
        managers: vec![owner],
        requests: vec![],
        categories: vec![],
    };
    store.insert_event(private_event.clone()).await;
    store.insert_event(public_event.clone()).await;

    Platform {
        shield: platform::shield().expect("platform shield must build"),
        store,
        owner,
        attendant,
        outsider,
        private_event,
        public_event,
    }
}

fn ctx(p: &Platform, user: DocId, role: Role) -> EvaluationContext {
    EvaluationContext::new(Caller::new(user, role), p.store.clone())
}

fn anon(p: &Platform) -> EvaluationContext {
    EvaluationContext::anonymous(p.store.clone())
}

fn event_args(event: &EventDoc) -> FieldArgs {
    let mut args = FieldArgs::new();
    args.insert("event".to_string(), json!(event.id.to_string()));
    args
}

fn kick_args(event: &EventDoc, user: DocId) -> FieldArgs {
    let mut args = event_args(event);
    args.insert("user".to_string(), json!(user.to_string()));
    args
}

#[tokio::test]
async fn anonymous_sees_public_but_not_private_events() {
    let p = platform().await;
    let ctx = anon(&p);
    let args = FieldArgs::new();

    let public = serde_json::to_value(&p.public_event).unwrap();
    assert!(p
        .shield
        .authorize("Event", "title", Some(&public), &args, &ctx)
        .await
        .is_allowed());

    let private = serde_json::to_value(&p.private_event).unwrap();
    assert!(p
        .shield
        .authorize("Event", "title", Some(&private), &args, &ctx)
        .await
        .is_denied());
}

#[tokio::test]
async fn invitation_opens_a_private_event() {
    let p = platform().await;
    p.store
        .insert_invitation(InvitationDoc {
            id: DocId::new(),
            from: p.owner,
            invited: p.outsider,
            to: p.private_event.id,
        })
        .await;

    let parent = serde_json::to_value(&p.private_event).unwrap();
    let args = FieldArgs::new();

    let invited = ctx(&p, p.outsider, Role::Free);
    assert!(p
        .shield
        .authorize("Event", "title", Some(&parent), &args, &invited)
        .await
        .is_allowed());

    let stranger = ctx(&p, DocId::new(), Role::Free);
    assert!(p
        .shield
        .authorize("Event", "title", Some(&parent), &args, &stranger)
        .await
        .is_denied());
}

#[tokio::test]
async fn only_the_owner_promotes() {
    let p = platform().await;
    let args = kick_args(&p.private_event, p.attendant);

    let owner = ctx(&p, p.owner, Role::Free);
    assert!(p
        .shield
        .authorize("Mutation", "promote", None, &args, &owner)
        .await
        .is_allowed());

    let attendant = ctx(&p, p.attendant, Role::Free);
    assert!(p
        .shield
        .authorize("Mutation", "promote", None, &args, &attendant)
        .await
        .is_denied());
}

#[tokio::test]
async fn kick_covers_managers_and_self_but_never_the_owner() {
    let p = platform().await;

    // A manager removes an attendant
    let owner = ctx(&p, p.owner, Role::Free);
    assert!(p
        .shield
        .authorize(
            "Mutation",
            "kick",
            None,
            &kick_args(&p.private_event, p.attendant),
            &owner,
        )
        .await
        .is_allowed());

    // An attendant leaves on their own
    let attendant = ctx(&p, p.attendant, Role::Free);
    assert!(p
        .shield
        .authorize(
            "Mutation",
            "kick",
            None,
            &kick_args(&p.private_event, p.attendant),
            &attendant,
        )
        .await
        .is_allowed());

    // The owner cannot remove themselves from their own event
    assert!(p
        .shield
        .authorize(
            "Mutation",
            "kick",
            None,
            &kick_args(&p.private_event, p.owner),
            &owner,
        )
        .await
        .is_denied());

    // An outsider removes nobody
    let outsider = ctx(&p, p.outsider, Role::Free);
    assert!(p
        .shield
        .authorize(
            "Mutation",
            "kick",
            None,
            &kick_args(&p.private_event, p.attendant),
            &outsider,
        )
        .await
        .is_denied());
}

#[tokio::test]
async fn demote_excludes_the_owner_themselves() {
    let p = platform().await;
    let owner = ctx(&p, p.owner, Role::Free);

    assert!(p
        .shield
        .authorize(
            "Mutation",
            "demote",
            None,
            &kick_args(&p.private_event, p.attendant),
            &owner,
        )
        .await
        .is_allowed());
    assert!(p
        .shield
        .authorize(
            "Mutation",
            "demote",
            None,
            &kick_args(&p.private_event, p.owner),
            &owner,
        )
        .await
        .is_denied());
}

#[tokio::test]
async fn subscription_requires_a_paid_tier() {
    let p = platform().await;
    let args = FieldArgs::new();

    for (role, expected_allowed) in [
        (Role::Free, false),
        (Role::Premium, true),
        (Role::Moderator, true),
        (Role::Administrator, true),
    ] {
        let ctx = ctx(&p, DocId::new(), role);
        let decision = p
            .shield
            .authorize("Mutation", "subscribe", None, &args, &ctx)
            .await;
        assert_eq!(
            decision.is_allowed(),
            expected_allowed,
            "subscribe as {:?}",
            role
        );
    }
}

#[tokio::test]
async fn private_event_creation_is_a_premium_grant() {
    let p = platform().await;
    let mut args = FieldArgs::new();
    args.insert(
        "event".to_string(),
        json!({ "title": "secret show", "private": true }),
    );

    let free = ctx(&p, DocId::new(), Role::Free);
    assert!(p
        .shield
        .authorize("Mutation", "createEvent", None, &args, &free)
        .await
        .is_denied());

    let premium = ctx(&p, DocId::new(), Role::Premium);
    assert!(p
        .shield
        .authorize("Mutation", "createEvent", None, &args, &premium)
        .await
        .is_allowed());

    // Public creation only needs a login
    let mut public_args = FieldArgs::new();
    public_args.insert(
        "event".to_string(),
        json!({ "title": "open show", "private": false }),
    );
    assert!(p
        .shield
        .authorize("Mutation", "createEvent", None, &public_args, &free)
        .await
        .is_allowed());
}

#[tokio::test]
async fn administration_is_reserved_for_administrators() {
    let p = platform().await;
    let target = UserDoc {
        id: DocId::new(),
        username: "target".to_string(),
        name: "Tar".to_string(),
        surname: "Get".to_string(),
        role: Role::Free,
    };
    p.store.insert_user(target.clone()).await;

    let mut args = FieldArgs::new();
    args.insert("user".to_string(), json!(target.id.to_string()));

    for role in [Role::Free, Role::Premium, Role::Moderator] {
        let ctx = ctx(&p, DocId::new(), role);
        assert!(
            p.shield
                .authorize("Mutation", "setRole", None, &args, &ctx)
                .await
                .is_denied(),
            "setRole as {:?}",
            role
        );
    }

    let admin = ctx(&p, DocId::new(), Role::Administrator);
    assert!(p
        .shield
        .authorize("Mutation", "setRole", None, &args, &admin)
        .await
        .is_allowed());
}

#[tokio::test]
async fn administrators_delete_only_locked_posts() {
    let p = platform().await;
    let locked = PostDoc {
        id: DocId::new(),
        content: "spam".to_string(),
        author: p.attendant,
        posted_at: p.private_event.id,
        flagged: true,
        locked: true,
    };
    let unlocked = PostDoc {
        id: DocId::new(),
        content: "fine".to_string(),
        author: p.attendant,
        posted_at: p.private_event.id,
        flagged: false,
        locked: false,
    };
    p.store.insert_post(locked.clone()).await;
    p.store.insert_post(unlocked.clone()).await;

    let admin = ctx(&p, DocId::new(), Role::Administrator);

    let mut args = FieldArgs::new();
    args.insert("post".to_string(), json!(locked.id.to_string()));
    assert!(p
        .shield
        .authorize("Mutation", "deletePost", None, &args, &admin)
        .await
        .is_allowed());

    args.insert("post".to_string(), json!(unlocked.id.to_string()));
    assert!(p
        .shield
        .authorize("Mutation", "deletePost", None, &args, &admin)
        .await
        .is_denied());
}

#[tokio::test]
async fn unmapped_fields_fall_back_to_deny() {
    let p = platform().await;
    let admin = ctx(&p, DocId::new(), Role::Administrator);

    assert!(p
        .shield
        .authorize("Query", "no_such_field", None, &FieldArgs::new(), &admin)
        .await
        .is_denied());
}

#[tokio::test]
async fn repeated_authorization_is_idempotent_within_a_request() {
    let p = platform().await;
    let ctx = ctx(&p, p.attendant, Role::Free);
    let parent = serde_json::to_value(&p.private_event).unwrap();
    let args = FieldArgs::new();

    let first = p
        .shield
        .authorize("Event", "title", Some(&parent), &args, &ctx)
        .await;
    let second = p
        .shield
        .authorize("Event", "title", Some(&parent), &args, &ctx)
        .await;

    assert_eq!(first, Decision::Allowed);
    assert_eq!(first, second);
    // The second pass is answered from the rule cache
    assert!(ctx.cache().stats().hits > 0);
}

#[tokio::test]
async fn flat_and_hierarchy_shields_agree() {
    let p = platform().await;
    let flat = platform::flat_shield().expect("flat shield must build");
    let parent = serde_json::to_value(&p.private_event).unwrap();
    let args = FieldArgs::new();

    for role in [Role::Free, Role::Premium, Role::Moderator, Role::Administrator] {
        for user in [p.owner, p.attendant, p.outsider] {
            let hier_ctx = ctx(&p, user, role);
            let flat_ctx = ctx(&p, user, role);

            let a = p
                .shield
                .authorize("Event", "title", Some(&parent), &args, &hier_ctx)
                .await;
            let b = flat
                .authorize("Event", "title", Some(&parent), &args, &flat_ctx)
                .await;
            assert_eq!(a, b, "Event.title for {:?}", role);

            let hier_ctx = ctx(&p, user, role);
            let flat_ctx = ctx(&p, user, role);
            let a = p
                .shield
                .authorize("Mutation", "subscribe", None, &args, &hier_ctx)
                .await;
            let b = flat
                .authorize("Mutation", "subscribe", None, &args, &flat_ctx)
                .await;
            assert_eq!(a, b, "Mutation.subscribe for {:?}", role);
        }
    }
}

#[tokio::test]
async fn flat_shield_review_requires_a_flagged_post() {
    let p = platform().await;
    let flat = platform::flat_shield().expect("flat shield must build");

    let flagged = PostDoc {
        id: DocId::new(),
        content: "reported".to_string(),
        author: p.attendant,
        posted_at: p.private_event.id,
        flagged: true,
        locked: false,
    };
    let unflagged = PostDoc {
        id: DocId::new(),
        content: "ordinary".to_string(),
        author: p.attendant,
        posted_at: p.private_event.id,
        flagged: false,
        locked: false,
    };
    p.store.insert_post(flagged.clone()).await;
    p.store.insert_post(unflagged.clone()).await;

    let post_args = |post: &PostDoc| {
        let mut args = FieldArgs::new();
        args.insert("post".to_string(), json!(post.id.to_string()));
        args
    };

    // A manager reviews flagged posts on their own event
    let manager = ctx(&p, p.owner, Role::Free);
    assert!(flat
        .authorize("Mutation", "review", None, &post_args(&flagged), &manager)
        .await
        .is_allowed());
    assert!(flat
        .authorize("Mutation", "review", None, &post_args(&unflagged), &manager)
        .await
        .is_denied());

    // Administrators review any flagged post
    let admin = ctx(&p, DocId::new(), Role::Administrator);
    assert!(flat
        .authorize("Mutation", "review", None, &post_args(&flagged), &admin)
        .await
        .is_allowed());

    // A plain attendant has no review standing
    let attendant = ctx(&p, p.attendant, Role::Free);
    assert!(flat
        .authorize("Mutation", "review", None, &post_args(&flagged), &attendant)
        .await
        .is_denied());
}

#[tokio::test]
async fn malformed_reference_surfaces_as_errored() {
    let p = platform().await;
    let owner = ctx(&p, p.owner, Role::Free);

    let mut args = FieldArgs::new();
    args.insert("event".to_string(), json!("not-a-uuid"));
    args.insert("user".to_string(), json!(p.attendant.to_string()));

    let decision = p
        .shield
        .authorize("Mutation", "promote", None, &args, &owner)
        .await;
    assert!(decision.is_errored());
}
