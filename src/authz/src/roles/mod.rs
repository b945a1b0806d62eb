//! Role hierarchies
//!
//! Role inheritance comes from an ordered role list declared per resource
//! type; role scope propagates from a resource to the resources linked to it
//! through `parent_resource`. The inheritance step runs in Rust as the native
//! predicate `role_inherits`. The rest is plain policy, loaded as the
//! [`ROLES_PRELUDE`] when roles are enabled.
//!
//! A policy using the prelude declares:
//!
//! ```text
//! role_order(_: Org, ["OWNER", "MEMBER"]);
//! actor_role(user: User, role, org: Org) := ...;
//! role_allow("MEMBER", "read", _: Repo);
//! parent_resource(repo: Repo, org: Org) := repo.org_id = org.id;
//! allow(actor, action, resource) := role_allows(actor, action, resource);
//! ```

pub mod resolver;

pub use resolver::{inherited_roles, parse_order, CacheStats, RoleResolver, ROLE_INHERITS};

/// Source name the prelude is loaded under
pub const ROLES_SOURCE_NAME: &str = "<roles>";

/// Rules connecting role orders, role grants and resource scoping
pub const ROLES_PRELUDE: &str = r#"
# A role on a resource applies to the resource itself ...
resource_role_applies_to(resource, resource);
# ... and to everything that declares it as a parent.
resource_role_applies_to(resource, role_resource) :=
    parent_resource(resource, parent),
    resource_role_applies_to(parent, role_resource);

inherits_role(role, inherited, role_resource) :=
    role_order(role_resource, order),
    role_inherits(order, role, inherited);

has_role(actor, role, role_resource) :=
    actor_role(actor, role, role_resource);
has_role(actor, role, role_resource) :=
    actor_role(actor, granted, role_resource),
    inherits_role(granted, role, role_resource);

role_allows(actor, action, resource) :=
    resource_role_applies_to(resource, role_resource),
    has_role(actor, role, role_resource),
    role_allow(role, action, resource);
"#;
