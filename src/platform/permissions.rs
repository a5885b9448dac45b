//! Permission configuration for the event platform
//!
//! Two variants are provided. [`shield`] is the canonical role-hierarchy
//! configuration: a shared DEFAULTS map (which also serves logged-out
//! callers) plus additive override layers for PREMIUM, MODERATOR and
//! ADMINISTRATOR (FREE adds nothing on top of the defaults). [`flat_shield`]
//! is the non-hierarchical rendition of the same policy, with role checks
//! expressed as rules inside a single map; it is the degenerate case of an
//! empty role table.

use crate::engine::{Shield, ShieldConfig};
use crate::error::Result;
use crate::hierarchy::RoleTable;
use crate::node::{and, not, or, DecisionNode};
use crate::permissions::PermissionMap;
use crate::types::Role;

use super::rules;
use super::rules::Reference;

/// Invitation fields are visible to the invitee and to event management
fn invited_or_manager() -> DecisionNode {
    or([
        rules::caller_is_invited_to_parent(),
        rules::caller_manages_parent(),
    ])
}

/// Public events are visible to everyone; private ones to invitees and
/// attendants
fn public_or_invited_or_attending() -> DecisionNode {
    or([
        not(rules::parent_is_private()),
        rules::caller_is_invited_to_parent(),
        rules::caller_attends_parent(),
    ])
}

/// Attendants read the board unless the post is locked; management reads
/// regardless
fn attendant_unless_locked() -> DecisionNode {
    and([
        rules::caller_attends_parent(),
        or([
            not(rules::parent_is_locked()),
            rules::caller_manages_parent(),
        ]),
    ])
}

/// Shared editEvent guard: management may edit, and so may anyone while the
/// event is unowned
fn manages_or_unowned() -> DecisionNode {
    or([
        rules::caller_manages_arg(),
        not(rules::arg_owner_defined()),
        not(rules::arg_event_has_owner()),
    ])
}

/// The DEFAULTS map: logged-out permissions, and the fallback layer for
/// every role
pub fn defaults() -> PermissionMap {
    PermissionMap::builder()
        // User
        .field("User", "_id", DecisionNode::Allow)
        .field("User", "name", rules::is_logged_in())
        .field("User", "surname", rules::is_logged_in())
        .field("User", "username", rules::is_logged_in())
        .field("User", "role", rules::is_logged_in())
        .field("User", "moderates", rules::is_logged_in())
        .field("User", "attends", rules::is_caller(Reference::Parent))
        .field("User", "requests", rules::is_caller(Reference::Parent))
        .field("User", "authored", rules::is_caller(Reference::Parent))
        .field("User", "subscribes", rules::is_caller(Reference::Parent))
        .field("User", "invitations", rules::is_caller(Reference::Parent))
        .field("User", "invites", rules::is_caller(Reference::Parent))
        // Category
        .field("Category", "_id", DecisionNode::Allow)
        .field("Category", "name", DecisionNode::Allow)
        .field("Category", "events", DecisionNode::Allow)
        .field("Category", "moderators", rules::is_logged_in())
        .field("Category", "subscribers", rules::caller_moderates_parent())
        // Invitation
        .field("Invitation", "_id", invited_or_manager())
        .field("Invitation", "from", invited_or_manager())
        .field("Invitation", "invited", invited_or_manager())
        .field("Invitation", "to", invited_or_manager())
        // Event
        .field("Event", "_id", public_or_invited_or_attending())
        .field("Event", "title", public_or_invited_or_attending())
        .field("Event", "time", public_or_invited_or_attending())
        .field("Event", "description", public_or_invited_or_attending())
        .field("Event", "location", public_or_invited_or_attending())
        .field("Event", "owner", public_or_invited_or_attending())
        .field("Event", "private", public_or_invited_or_attending())
        .field("Event", "attendants", public_or_invited_or_attending())
        .field("Event", "managers", public_or_invited_or_attending())
        .field("Event", "requests", rules::caller_manages_parent())
        .field("Event", "invited", rules::caller_manages_parent())
        .field(
            "Event",
            "messageBoard",
            or([
                rules::caller_attends_parent(),
                rules::caller_moderates_parent(),
            ]),
        )
        // Post
        .field(
            "Post",
            "_id",
            or([attendant_unless_locked(), rules::caller_moderates_parent()]),
        )
        .field(
            "Post",
            "content",
            or([attendant_unless_locked(), rules::caller_moderates_parent()]),
        )
        .field(
            "Post",
            "author",
            or([attendant_unless_locked(), rules::caller_moderates_parent()]),
        )
        .field(
            "Post",
            "postedAt",
            or([attendant_unless_locked(), rules::caller_moderates_parent()]),
        )
        .field(
            "Post",
            "flagged",
            or([
                rules::caller_manages_parent(),
                rules::caller_moderates_parent(),
            ]),
        )
        .field(
            "Post",
            "locked",
            or([
                rules::caller_manages_parent(),
                rules::caller_moderates_parent(),
            ]),
        )
        // Query
        .field("Query", "users", rules::is_logged_in())
        .field("Query", "usersByUsername", rules::is_logged_in())
        .field("Query", "events", DecisionNode::Allow)
        // Mutation: categories are admin territory, denied by default
        .field("Mutation", "createCategory", DecisionNode::Deny)
        .field("Mutation", "editCategory", DecisionNode::Deny)
        .field("Mutation", "deleteCategory", DecisionNode::Deny)
        .field("Mutation", "assignModerator", DecisionNode::Deny)
        .field("Mutation", "removeModerator", DecisionNode::Deny)
        // Mutation: users
        .field("Mutation", "createUser", DecisionNode::Allow)
        .field("Mutation", "login", DecisionNode::Allow)
        .field("Mutation", "editUser", rules::is_caller(Reference::Arg))
        .field("Mutation", "setRole", DecisionNode::Deny)
        .field("Mutation", "deleteUser", DecisionNode::Deny)
        .field("Mutation", "subscribe", DecisionNode::Deny)
        .field("Mutation", "unsubscribe", DecisionNode::Allow)
        // Mutation: events
        .field(
            "Mutation",
            "createEvent",
            and([rules::is_logged_in(), not(rules::arg_is_private())]),
        )
        .field(
            "Mutation",
            "editEvent",
            and([manages_or_unowned(), not(rules::arg_is_private())]),
        )
        .field("Mutation", "addCategories", rules::caller_manages_arg())
        .field(
            "Mutation",
            "removeCategories",
            or([rules::caller_manages_arg(), rules::caller_moderates_arg()]),
        )
        .field("Mutation", "deleteEvent", rules::caller_owns_arg())
        // Mutation: event management
        .field(
            "Mutation",
            "addAttendant",
            or([
                and([rules::caller_manages_arg(), rules::arg_requests_arg()]),
                and([
                    rules::is_caller(Reference::Arg),
                    rules::caller_is_invited_to_arg(),
                ]),
            ]),
        )
        .field(
            "Mutation",
            "kick",
            and([
                not(and([
                    rules::caller_owns_arg(),
                    rules::is_caller(Reference::Arg),
                ])),
                or([
                    rules::is_caller(Reference::Arg),
                    rules::caller_manages_arg(),
                ]),
            ]),
        )
        .field("Mutation", "promote", rules::caller_owns_arg())
        .field(
            "Mutation",
            "demote",
            and([
                rules::caller_owns_arg(),
                not(rules::is_caller(Reference::Arg)),
            ]),
        )
        // Mutation: invitations
        .field("Mutation", "createInvitation", rules::is_logged_in())
        .field("Mutation", "editInvitation", DecisionNode::Allow)
        .field(
            "Mutation",
            "deleteInvitation",
            or([
                rules::caller_is_invited_to_arg(),
                rules::caller_manages_arg(),
            ]),
        )
        // Mutation: requests
        .field("Mutation", "request", not(rules::arg_is_private()))
        .field(
            "Mutation",
            "removeRequest",
            or([rules::caller_requests_arg(), rules::caller_manages_arg()]),
        )
        // Mutation: posts
        .field(
            "Mutation",
            "createPost",
            and([rules::is_logged_in(), rules::caller_attends_arg()]),
        )
        .field("Mutation", "editPost", DecisionNode::Allow)
        .field("Mutation", "deletePost", DecisionNode::Deny)
        .field(
            "Mutation",
            "flagPost",
            or([rules::caller_attends_arg(), rules::caller_moderates_arg()]),
        )
        .field("Mutation", "clearPost", rules::caller_moderates_arg())
        .fallback(DecisionNode::Deny)
        .build()
}

/// PREMIUM overrides: paid accounts may subscribe and create or edit
/// private events
fn premium() -> PermissionMap {
    PermissionMap::builder()
        .field("Mutation", "subscribe", DecisionNode::Allow)
        .field("Mutation", "createEvent", DecisionNode::Allow)
        .field("Mutation", "editEvent", manages_or_unowned())
        .build()
}

/// MODERATOR overrides: the same grants the paid tier gets
fn moderator() -> PermissionMap {
    PermissionMap::builder()
        .field("Mutation", "subscribe", DecisionNode::Allow)
        .field("Mutation", "createEvent", DecisionNode::Allow)
        .field("Mutation", "editEvent", manages_or_unowned())
        .build()
}

/// ADMINISTRATOR overrides: category administration, user administration,
/// and unrestricted reads of moderation surfaces
fn administrator() -> PermissionMap {
    PermissionMap::builder()
        .field("Category", "subscribers", DecisionNode::Allow)
        .field("Event", "messageBoard", DecisionNode::Allow)
        .field("Post", "_id", DecisionNode::Allow)
        .field("Post", "content", DecisionNode::Allow)
        .field("Post", "author", DecisionNode::Allow)
        .field("Post", "postedAt", DecisionNode::Allow)
        .field("Post", "flagged", DecisionNode::Allow)
        .field("Post", "locked", DecisionNode::Allow)
        .field("Mutation", "createCategory", DecisionNode::Allow)
        .field("Mutation", "editCategory", DecisionNode::Allow)
        .field("Mutation", "deleteCategory", DecisionNode::Allow)
        .field(
            "Mutation",
            "assignModerator",
            rules::arg_has_role(Role::Moderator),
        )
        .field("Mutation", "removeModerator", DecisionNode::Allow)
        .field("Mutation", "setRole", DecisionNode::Allow)
        .field("Mutation", "deleteUser", DecisionNode::Allow)
        .field("Mutation", "subscribe", DecisionNode::Allow)
        .field("Mutation", "createEvent", DecisionNode::Allow)
        .field("Mutation", "editEvent", manages_or_unowned())
        .field("Mutation", "removeCategories", DecisionNode::Allow)
        .field("Mutation", "editPost", DecisionNode::Allow)
        .field("Mutation", "deletePost", rules::arg_is_locked())
        .field("Mutation", "flagPost", DecisionNode::Allow)
        .field("Mutation", "clearPost", DecisionNode::Allow)
        .build()
}

/// The ordered role hierarchy. FREE carries no overrides of its own; its
/// effective permissions are exactly the defaults.
pub fn role_table() -> RoleTable {
    RoleTable::new(vec![
        (Role::Premium, premium()),
        (Role::Moderator, moderator()),
        (Role::Administrator, administrator()),
    ])
}

/// The canonical hierarchy shield
pub fn shield() -> Result<Shield> {
    Shield::new(role_table(), defaults(), ShieldConfig::default())
}

/// The flat shield: one map for every role, with role checks expressed as
/// rules. Kept as the degenerate depth-0 rendition of the same policy.
pub fn flat_shield() -> Result<Shield> {
    Shield::new(RoleTable::empty(), flat_map(), ShieldConfig::default())
}

fn not_free() -> DecisionNode {
    or([
        rules::caller_has_role(Role::Premium),
        rules::caller_has_role(Role::Moderator),
        rules::caller_has_role(Role::Administrator),
    ])
}

fn flat_map() -> PermissionMap {
    let admin = rules::caller_has_role(Role::Administrator);

    PermissionMap::builder()
        // User
        .field("User", "_id", DecisionNode::Allow)
        .field("User", "name", rules::is_logged_in())
        .field("User", "surname", rules::is_logged_in())
        .field("User", "username", rules::is_logged_in())
        .field("User", "role", rules::is_logged_in())
        .field("User", "moderates", rules::is_logged_in())
        .field("User", "attends", rules::is_caller(Reference::Parent))
        .field("User", "requests", rules::is_caller(Reference::Parent))
        .field("User", "authored", rules::is_caller(Reference::Parent))
        .field("User", "subscribes", rules::is_caller(Reference::Parent))
        .field("User", "invitations", rules::is_caller(Reference::Parent))
        .field("User", "invites", rules::is_caller(Reference::Parent))
        // Category
        .field("Category", "_id", DecisionNode::Allow)
        .field("Category", "name", DecisionNode::Allow)
        .field("Category", "events", DecisionNode::Allow)
        .field("Category", "moderators", rules::is_logged_in())
        .field(
            "Category",
            "subscribers",
            or([rules::caller_moderates_parent(), admin.clone()]),
        )
        // Invitation
        .field("Invitation", "_id", invited_or_manager())
        .field("Invitation", "from", invited_or_manager())
        .field("Invitation", "invited", invited_or_manager())
        .field("Invitation", "to", invited_or_manager())
        // Event
        .field("Event", "_id", public_or_invited_or_attending())
        .field("Event", "title", public_or_invited_or_attending())
        .field("Event", "time", public_or_invited_or_attending())
        .field("Event", "description", public_or_invited_or_attending())
        .field("Event", "location", public_or_invited_or_attending())
        .field("Event", "owner", public_or_invited_or_attending())
        .field("Event", "private", public_or_invited_or_attending())
        .field("Event", "attendants", public_or_invited_or_attending())
        .field("Event", "managers", public_or_invited_or_attending())
        .field("Event", "requests", rules::caller_manages_parent())
        .field("Event", "invited", rules::caller_manages_parent())
        .field(
            "Event",
            "messageBoard",
            or([
                rules::caller_attends_parent(),
                rules::caller_moderates_parent(),
                admin.clone(),
            ]),
        )
        // Post
        .field(
            "Post",
            "_id",
            or([
                attendant_unless_locked(),
                rules::caller_moderates_parent(),
                admin.clone(),
            ]),
        )
        .field(
            "Post",
            "content",
            or([
                attendant_unless_locked(),
                rules::caller_moderates_parent(),
                admin.clone(),
            ]),
        )
        .field(
            "Post",
            "author",
            or([
                attendant_unless_locked(),
                rules::caller_moderates_parent(),
                admin.clone(),
            ]),
        )
        .field(
            "Post",
            "postedAt",
            or([
                attendant_unless_locked(),
                rules::caller_moderates_parent(),
                admin.clone(),
            ]),
        )
        .field(
            "Post",
            "flagged",
            or([
                rules::caller_manages_parent(),
                rules::caller_moderates_parent(),
                admin.clone(),
            ]),
        )
        .field(
            "Post",
            "locked",
            or([
                rules::caller_manages_parent(),
                rules::caller_moderates_parent(),
                admin.clone(),
            ]),
        )
        // Query
        .field("Query", "users", rules::is_logged_in())
        .field("Query", "usersByUsername", rules::is_logged_in())
        .field("Query", "events", DecisionNode::Allow)
        // Mutation: categories
        .field("Mutation", "createCategory", admin.clone())
        .field("Mutation", "editCategory", admin.clone())
        .field("Mutation", "deleteCategory", admin.clone())
        .field(
            "Mutation",
            "assignModerator",
            and([admin.clone(), rules::arg_has_role(Role::Moderator)]),
        )
        .field("Mutation", "removeModerator", admin.clone())
        // Mutation: users
        .field("Mutation", "createUser", DecisionNode::Allow)
        .field("Mutation", "login", DecisionNode::Allow)
        .field("Mutation", "editUser", rules::is_caller(Reference::Arg))
        .field("Mutation", "setRole", admin.clone())
        .field("Mutation", "deleteUser", admin.clone())
        .field("Mutation", "subscribe", not_free())
        .field("Mutation", "unsubscribe", DecisionNode::Allow)
        // Mutation: events
        .field(
            "Mutation",
            "createEvent",
            or([
                and([rules::is_logged_in(), not(rules::arg_is_private())]),
                not_free(),
            ]),
        )
        .field(
            "Mutation",
            "editEvent",
            and([
                manages_or_unowned(),
                or([not(rules::arg_is_private()), not_free()]),
            ]),
        )
        .field("Mutation", "addCategories", rules::caller_manages_arg())
        .field(
            "Mutation",
            "removeCategories",
            or([
                rules::caller_manages_arg(),
                rules::caller_moderates_arg(),
                admin.clone(),
            ]),
        )
        .field("Mutation", "deleteEvent", rules::caller_owns_arg())
        // Mutation: event management
        .field(
            "Mutation",
            "addAttendant",
            or([
                and([rules::caller_manages_arg(), rules::arg_requests_arg()]),
                and([
                    rules::is_caller(Reference::Arg),
                    rules::caller_is_invited_to_arg(),
                ]),
            ]),
        )
        .field(
            "Mutation",
            "kick",
            and([
                not(and([
                    rules::caller_owns_arg(),
                    rules::is_caller(Reference::Arg),
                ])),
                or([
                    rules::is_caller(Reference::Arg),
                    rules::caller_manages_arg(),
                ]),
            ]),
        )
        .field("Mutation", "promote", rules::caller_owns_arg())
        .field(
            "Mutation",
            "demote",
            and([
                rules::caller_owns_arg(),
                not(rules::is_caller(Reference::Arg)),
            ]),
        )
        // Mutation: invitations
        .field(
            "Mutation",
            "invite",
            or([rules::caller_manages_arg(), rules::caller_owns_arg()]),
        )
        .field(
            "Mutation",
            "declineInvitation",
            or([
                rules::caller_is_invited_to_arg(),
                rules::caller_manages_arg(),
                rules::caller_owns_arg(),
            ]),
        )
        .field(
            "Mutation",
            "acceptInvitation",
            rules::caller_is_invited_to_arg(),
        )
        // Mutation: requests
        .field("Mutation", "request", not(rules::arg_is_private()))
        .field(
            "Mutation",
            "declineRequest",
            or([rules::caller_requests_arg(), rules::caller_manages_arg()]),
        )
        .field(
            "Mutation",
            "acceptRequest",
            and([
                rules::is_logged_in(),
                not(rules::arg_is_private()),
                rules::caller_manages_arg(),
            ]),
        )
        // Mutation: posts
        .field(
            "Mutation",
            "createPost",
            and([rules::is_logged_in(), rules::caller_attends_arg()]),
        )
        .field(
            "Mutation",
            "deletePost",
            and([admin.clone(), rules::arg_is_locked()]),
        )
        .field(
            "Mutation",
            "flagPost",
            or([
                rules::caller_attends_arg(),
                rules::caller_moderates_arg(),
                admin.clone(),
            ]),
        )
        .field(
            "Mutation",
            "review",
            and([
                or([
                    rules::caller_moderates_arg(),
                    admin.clone(),
                    rules::caller_manages_arg(),
                ]),
                rules::arg_is_flagged(),
            ]),
        )
        .field("Mutation", "unlockPost", admin)
        .fallback(DecisionNode::Deny)
        .build()
}
