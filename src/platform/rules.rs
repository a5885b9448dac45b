//! Atomic predicates over the event-platform schema
//!
//! Each constructor returns a [`DecisionNode`] leaf ready for composition.
//! Rules resolve their target event from an `Event` parent or argument
//! directly, from an `Invitation` via its `to` field, and from a `Post` via
//! the event whose board carries it.
//!
//! Outcome conventions: an anonymous caller and a missing document are
//! `Denied`; an identifier that does not parse or an argument of the wrong
//! shape is `Errored`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::context::EvaluationContext;
use crate::decision::Decision;
use crate::node::{self, DecisionNode};
use crate::rule::Rule;
use crate::store::{CategoryDoc, EventDoc, InvitationDoc, PostDoc, UserDoc};
use crate::types::{Caller, DocId, FieldArgs, Role};

/// Which object a rule inspects: the parent that produced the field, or the
/// operation arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Parent,
    Arg,
}

impl Reference {
    fn key(self) -> &'static str {
        match self {
            Reference::Parent => "parent",
            Reference::Arg => "arg",
        }
    }
}

/// Caller-to-event relationships
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Attends,
    InvitedTo,
    Manages,
    Moderates,
    Owns,
    Requests,
}

impl Relation {
    fn key(self) -> &'static str {
        match self {
            Relation::Attends => "attends",
            Relation::InvitedTo => "is_invited_to",
            Relation::Manages => "manages",
            Relation::Moderates => "moderates",
            Relation::Owns => "owns",
            Relation::Requests => "requests",
        }
    }

    async fn holds(
        self,
        caller: DocId,
        event: &EventDoc,
        ctx: &EvaluationContext,
    ) -> Result<bool, Decision> {
        match self {
            Relation::Attends => Ok(event.attendants.contains(&caller)),
            Relation::Manages => Ok(event.managers.contains(&caller)),
            Relation::Owns => Ok(event.owner == Some(caller)),
            Relation::Requests => Ok(event.requests.contains(&caller)),
            Relation::InvitedTo => {
                let invitation = ctx
                    .store()
                    .invitation_for(&caller, &event.id)
                    .await
                    .map_err(Decision::from)?;
                Ok(invitation.is_some())
            }
            Relation::Moderates => {
                for category_id in &event.categories {
                    let category = ctx
                        .store()
                        .category(category_id)
                        .await
                        .map_err(Decision::from)?;
                    if let Some(category) = category {
                        if category.moderators.contains(&caller) {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parent and argument decoding

/// Typed view of a parent object, decoded from the resolver's JSON value
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParentDoc {
    Invitation(InvitationDoc),
    Post(PostDoc),
    Event(EventDoc),
    User(UserDoc),
    Category(CategoryDoc),
}

fn decode_parent(parent: Option<&Value>) -> Result<ParentDoc, Decision> {
    let value = parent.ok_or_else(|| Decision::errored("rule requires a parent object"))?;
    serde_json::from_value(value.clone())
        .map_err(|_| Decision::errored("unrecognized parent object shape"))
}

fn parse_id(raw: &str) -> Result<DocId, Decision> {
    raw.parse().map_err(Decision::from)
}

fn arg_str<'a>(args: &'a FieldArgs, key: &str) -> Result<&'a str, Decision> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Decision::errored(format!("missing or non-string argument `{}`", key)))
}

fn arg_id(args: &FieldArgs, key: &str) -> Result<DocId, Decision> {
    parse_id(arg_str(args, key)?)
}

fn caller(ctx: &EvaluationContext) -> Result<&Caller, Decision> {
    // Anonymous callers hold no relationship to anything
    ctx.caller().ok_or(Decision::Denied)
}

async fn fetch_event(ctx: &EvaluationContext, id: &DocId) -> Result<EventDoc, Decision> {
    match ctx.store().event(id).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err(Decision::Denied),
        Err(err) => Err(Decision::from(err)),
    }
}

async fn fetch_post(ctx: &EvaluationContext, id: &DocId) -> Result<PostDoc, Decision> {
    match ctx.store().post(id).await {
        Ok(Some(post)) => Ok(post),
        Ok(None) => Err(Decision::Denied),
        Err(err) => Err(Decision::from(err)),
    }
}

/// Resolve the event an operation's arguments point at: an `event` id or
/// inline payload, an `invitation`, or a `post`
async fn event_of_args(args: &FieldArgs, ctx: &EvaluationContext) -> Result<EventDoc, Decision> {
    if let Some(value) = args.get("event") {
        return match value {
            Value::String(raw) => fetch_event(ctx, &parse_id(raw)?).await,
            Value::Object(payload) => {
                let raw = payload
                    .get("_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Decision::errored("event payload has no _id"))?;
                fetch_event(ctx, &parse_id(raw)?).await
            }
            _ => Err(Decision::errored("event argument has unexpected shape")),
        };
    }

    if let Some(value) = args.get("invitation") {
        let raw = value
            .as_str()
            .ok_or_else(|| Decision::errored("invitation argument must be an id"))?;
        let invitation = match ctx.store().invitation(&parse_id(raw)?).await {
            Ok(Some(invitation)) => invitation,
            Ok(None) => return Err(Decision::Denied),
            Err(err) => return Err(Decision::from(err)),
        };
        return fetch_event(ctx, &invitation.to).await;
    }

    if let Some(value) = args.get("post") {
        let raw = value
            .as_str()
            .ok_or_else(|| Decision::errored("post argument must be an id"))?;
        let post = fetch_post(ctx, &parse_id(raw)?).await?;
        return fetch_event(ctx, &post.posted_at).await;
    }

    Err(Decision::errored("no event reference in arguments"))
}

/// Resolve the event a parent object belongs to
async fn event_of_parent(
    parent: &ParentDoc,
    ctx: &EvaluationContext,
) -> Result<EventDoc, Decision> {
    match parent {
        ParentDoc::Event(event) => Ok(event.clone()),
        ParentDoc::Invitation(invitation) => fetch_event(ctx, &invitation.to).await,
        ParentDoc::Post(post) => fetch_event(ctx, &post.posted_at).await,
        _ => Err(Decision::errored("parent does not reference an event")),
    }
}

// ---------------------------------------------------------------------------
// Rule implementations

struct IsLoggedIn;

#[async_trait]
impl Rule for IsLoggedIn {
    fn name(&self) -> &str {
        "is_logged_in"
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        _args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        Decision::from_bool(ctx.caller().is_some())
    }
}

struct IsCaller {
    reference: Reference,
    name: String,
}

#[async_trait]
impl Rule for IsCaller {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(
        &self,
        parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        self.run(parent, args, ctx).await.unwrap_or_else(|d| d)
    }
}

impl IsCaller {
    async fn run(
        &self,
        parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Result<Decision, Decision> {
        let caller = caller(ctx)?;
        let subject = match self.reference {
            Reference::Parent => match decode_parent(parent)? {
                ParentDoc::User(user) => user.id,
                _ => return Err(Decision::errored("is_caller requires a User parent")),
            },
            Reference::Arg => arg_id(args, "user")?,
        };
        Ok(Decision::from_bool(subject == caller.id))
    }
}

struct CallerHasRole {
    role: Role,
    name: String,
}

#[async_trait]
impl Rule for CallerHasRole {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        _args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        match ctx.caller() {
            Some(caller) => Decision::from_bool(caller.role == self.role),
            None => Decision::Denied,
        }
    }
}

struct ArgHasRole {
    role: Role,
    name: String,
}

#[async_trait]
impl Rule for ArgHasRole {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        self.run(args, ctx).await.unwrap_or_else(|d| d)
    }
}

impl ArgHasRole {
    async fn run(&self, args: &FieldArgs, ctx: &EvaluationContext) -> Result<Decision, Decision> {
        let id = arg_id(args, "user")?;
        match ctx.store().user(&id).await {
            Ok(Some(user)) => Ok(Decision::from_bool(user.role == self.role)),
            Ok(None) => Ok(Decision::Denied),
            Err(err) => Err(Decision::from(err)),
        }
    }
}

/// Caller-to-event relationship, resolved from the parent or the arguments
struct CallerRelated {
    relation: Relation,
    reference: Reference,
    name: String,
}

impl CallerRelated {
    fn new(relation: Relation, reference: Reference) -> Self {
        Self {
            relation,
            reference,
            name: format!("caller_{}_{}", relation.key(), reference.key()),
        }
    }

    async fn run(
        &self,
        parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Result<Decision, Decision> {
        let caller = caller(ctx)?.id;

        let holds = match self.reference {
            Reference::Parent => {
                let doc = decode_parent(parent)?;
                match (&doc, self.relation) {
                    // An invitation parent answers invitation membership
                    // directly, without a store probe
                    (ParentDoc::Invitation(invitation), Relation::InvitedTo) => {
                        invitation.invited == caller
                    }
                    // A category parent carries its own moderator list
                    (ParentDoc::Category(category), Relation::Moderates) => {
                        category.moderators.contains(&caller)
                    }
                    _ => {
                        let event = event_of_parent(&doc, ctx).await?;
                        self.relation.holds(caller, &event, ctx).await?
                    }
                }
            }
            Reference::Arg => {
                let event = event_of_args(args, ctx).await?;
                self.relation.holds(caller, &event, ctx).await?
            }
        };

        Ok(Decision::from_bool(holds))
    }
}

#[async_trait]
impl Rule for CallerRelated {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(
        &self,
        parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        self.run(parent, args, ctx).await.unwrap_or_else(|d| d)
    }
}

struct ParentIsPrivate;

#[async_trait]
impl Rule for ParentIsPrivate {
    fn name(&self) -> &str {
        "parent_is_private"
    }

    async fn check(
        &self,
        parent: Option<&Value>,
        _args: &FieldArgs,
        _ctx: &EvaluationContext,
    ) -> Decision {
        match decode_parent(parent) {
            Ok(ParentDoc::Event(event)) => Decision::from_bool(event.private),
            Ok(_) => Decision::errored("parent_is_private requires an Event parent"),
            Err(decision) => decision,
        }
    }
}

struct ParentIsLocked;

#[async_trait]
impl Rule for ParentIsLocked {
    fn name(&self) -> &str {
        "parent_is_locked"
    }

    async fn check(
        &self,
        parent: Option<&Value>,
        _args: &FieldArgs,
        _ctx: &EvaluationContext,
    ) -> Decision {
        match decode_parent(parent) {
            Ok(ParentDoc::Post(post)) => Decision::from_bool(post.locked),
            Ok(_) => Decision::errored("parent_is_locked requires a Post parent"),
            Err(decision) => decision,
        }
    }
}

struct ArgIsPrivate;

#[async_trait]
impl Rule for ArgIsPrivate {
    fn name(&self) -> &str {
        "arg_is_private"
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        self.run(args, ctx).await.unwrap_or_else(|d| d)
    }
}

impl ArgIsPrivate {
    async fn run(&self, args: &FieldArgs, ctx: &EvaluationContext) -> Result<Decision, Decision> {
        // Inline payloads (createEvent, editEvent) carry the flag directly;
        // otherwise fall back to the stored event
        if let Some(Value::Object(payload)) = args.get("event") {
            if let Some(private) = payload.get("private").and_then(Value::as_bool) {
                return Ok(Decision::from_bool(private));
            }
        }
        let event = event_of_args(args, ctx).await?;
        Ok(Decision::from_bool(event.private))
    }
}

struct ArgIsLocked;

#[async_trait]
impl Rule for ArgIsLocked {
    fn name(&self) -> &str {
        "arg_is_locked"
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        match self.post(args, ctx).await {
            Ok(post) => Decision::from_bool(post.locked),
            Err(decision) => decision,
        }
    }
}

impl ArgIsLocked {
    async fn post(&self, args: &FieldArgs, ctx: &EvaluationContext) -> Result<PostDoc, Decision> {
        fetch_post(ctx, &arg_id(args, "post")?).await
    }
}

struct ArgIsFlagged;

#[async_trait]
impl Rule for ArgIsFlagged {
    fn name(&self) -> &str {
        "arg_is_flagged"
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        let post = match arg_id(args, "post") {
            Ok(id) => fetch_post(ctx, &id).await,
            Err(decision) => Err(decision),
        };
        match post {
            Ok(post) => Decision::from_bool(post.flagged),
            Err(decision) => decision,
        }
    }
}

struct ArgOwnerDefined;

#[async_trait]
impl Rule for ArgOwnerDefined {
    fn name(&self) -> &str {
        "arg_owner_defined"
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        args: &FieldArgs,
        _ctx: &EvaluationContext,
    ) -> Decision {
        match args.get("event") {
            Some(Value::Object(payload)) => {
                let defined = payload.get("owner").map(|v| !v.is_null()).unwrap_or(false);
                Decision::from_bool(defined)
            }
            Some(_) => Decision::Denied,
            None => Decision::errored("missing `event` argument"),
        }
    }
}

struct ArgEventHasOwner;

#[async_trait]
impl Rule for ArgEventHasOwner {
    fn name(&self) -> &str {
        "arg_event_has_owner"
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        match event_of_args(args, ctx).await {
            Ok(event) => Decision::from_bool(event.owner.is_some()),
            Err(decision) => decision,
        }
    }
}

/// The `user` argument has requested to attend the `event` argument
struct ArgRequestsArg;

#[async_trait]
impl Rule for ArgRequestsArg {
    fn name(&self) -> &str {
        "arg_requests_arg"
    }

    async fn check(
        &self,
        _parent: Option<&Value>,
        args: &FieldArgs,
        ctx: &EvaluationContext,
    ) -> Decision {
        self.run(args, ctx).await.unwrap_or_else(|d| d)
    }
}

impl ArgRequestsArg {
    async fn run(&self, args: &FieldArgs, ctx: &EvaluationContext) -> Result<Decision, Decision> {
        let user = arg_id(args, "user")?;
        let event = event_of_args(args, ctx).await?;
        Ok(Decision::from_bool(event.requests.contains(&user)))
    }
}

// ---------------------------------------------------------------------------
// Node constructors

/// The caller is authenticated
pub fn is_logged_in() -> DecisionNode {
    node::rule(IsLoggedIn)
}

/// The caller is the referenced user (the `User` parent, or the `user`
/// argument)
pub fn is_caller(reference: Reference) -> DecisionNode {
    node::rule(IsCaller {
        reference,
        name: format!("is_caller_{}", reference.key()),
    })
}

/// The caller holds exactly this role
pub fn caller_has_role(role: Role) -> DecisionNode {
    node::rule(CallerHasRole {
        role,
        name: format!("caller_has_role_{}", role.to_string().to_lowercase()),
    })
}

/// The `user` argument's stored document holds exactly this role
pub fn arg_has_role(role: Role) -> DecisionNode {
    node::rule(ArgHasRole {
        role,
        name: format!("arg_has_role_{}", role.to_string().to_lowercase()),
    })
}

pub fn caller_attends_parent() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Attends, Reference::Parent))
}

pub fn caller_is_invited_to_parent() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::InvitedTo, Reference::Parent))
}

pub fn caller_manages_parent() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Manages, Reference::Parent))
}

pub fn caller_moderates_parent() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Moderates, Reference::Parent))
}

pub fn caller_owns_parent() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Owns, Reference::Parent))
}

pub fn caller_attends_arg() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Attends, Reference::Arg))
}

pub fn caller_is_invited_to_arg() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::InvitedTo, Reference::Arg))
}

pub fn caller_manages_arg() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Manages, Reference::Arg))
}

pub fn caller_moderates_arg() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Moderates, Reference::Arg))
}

pub fn caller_owns_arg() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Owns, Reference::Arg))
}

pub fn caller_requests_arg() -> DecisionNode {
    node::rule(CallerRelated::new(Relation::Requests, Reference::Arg))
}

/// The parent event is private
pub fn parent_is_private() -> DecisionNode {
    node::rule(ParentIsPrivate)
}

/// The parent post is locked
pub fn parent_is_locked() -> DecisionNode {
    node::rule(ParentIsLocked)
}

/// The event argument (inline payload or stored document) is private
pub fn arg_is_private() -> DecisionNode {
    node::rule(ArgIsPrivate)
}

/// The post argument is locked
pub fn arg_is_locked() -> DecisionNode {
    node::rule(ArgIsLocked)
}

/// The post argument is flagged
pub fn arg_is_flagged() -> DecisionNode {
    node::rule(ArgIsFlagged)
}

/// The event payload argument defines an owner
pub fn arg_owner_defined() -> DecisionNode {
    node::rule(ArgOwnerDefined)
}

/// The stored event referenced by the arguments has an owner
pub fn arg_event_has_owner() -> DecisionNode {
    node::rule(ArgEventHasOwner)
}

/// The user argument has requested to attend the event argument
pub fn arg_requests_arg() -> DecisionNode {
    node::rule(ArgRequestsArg)
}
