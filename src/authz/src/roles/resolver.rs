//! Role inheritance over declared role orders
//!
//! A role order is a list of role names, most privileged first. Every role
//! inherits all roles listed after it:
//!
//! ```rust
//! use warden_authz::roles::inherited_roles;
//!
//! let order = ["OWNER", "EDITOR", "VIEWER"].map(String::from);
//! assert_eq!(inherited_roles(&order, "OWNER"), ["EDITOR", "VIEWER"]);
//! assert!(inherited_roles(&order, "VIEWER").is_empty());
//! assert!(inherited_roles(&order, "GUEST").is_empty());
//! ```

use crate::error::{PolarError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;
use warden_core::{NativePredicate, Term};

/// Name the resolver is installed under in every engine
pub const ROLE_INHERITS: &str = "role_inherits";

/// Roles listed strictly after `role` in `order`
///
/// A role missing from the order inherits nothing.
pub fn inherited_roles<'a>(order: &'a [String], role: &str) -> &'a [String] {
    match order.iter().position(|name| name == role) {
        Some(index) => &order[index + 1..],
        None => &[],
    }
}

/// Validate a role order term: a list of strings
pub fn parse_order(order: &Term) -> Result<Vec<String>> {
    let Term::List(items) = order else {
        return Err(PolarError::InvalidRoleOrder(format!(
            "expected a list of role names, got `{}`",
            order
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Term::String(name) => Ok(name.clone()),
            other => Err(PolarError::InvalidRoleOrder(format!(
                "role names must be strings, got `{}` in `{}`",
                other, order
            ))),
        })
        .collect()
}

/// Name of a role argument: a string, or a dictionary with a string `name`
fn role_name(role: &Term) -> Option<&str> {
    match role {
        Term::String(name) => Some(name),
        Term::Dictionary(fields) => match fields.get("name") {
            Some(Term::String(name)) => Some(name),
            _ => None,
        },
        _ => None,
    }
}

/// Cache key for inheritance lookups
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CacheKey {
    /// Rendered role order; list-of-string terms render canonically
    order: String,
    role: String,
}

/// Role resolver with a cache of resolved inheritance sets
///
/// Cheap to clone; clones share the cache.
#[derive(Debug, Clone)]
pub struct RoleResolver {
    cache: Arc<DashMap<CacheKey, Arc<Vec<String>>>>,
    max_cache_size: usize,
}

impl RoleResolver {
    /// Default max cache size: 10,000 entries
    pub fn new() -> Self {
        Self::with_max_cache_size(10_000)
    }

    pub fn with_max_cache_size(max_cache_size: usize) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            max_cache_size,
        }
    }

    /// Roles `role` inherits under `order`
    ///
    /// Fails with `InvalidRoleOrder` when `order` is not a list of strings.
    /// A role that is not a name (or a dictionary with a `name`) inherits
    /// nothing.
    pub fn inherits(&self, order: &Term, role: &Term) -> Result<Arc<Vec<String>>> {
        let Some(role) = role_name(role) else {
            // Still reject a malformed order.
            parse_order(order)?;
            return Ok(Arc::new(Vec::new()));
        };

        let key = CacheKey {
            order: order.to_string(),
            role: role.to_string(),
        };
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(&cached));
        }

        let parsed = parse_order(order)?;
        let inherited = Arc::new(inherited_roles(&parsed, role).to_vec());
        trace!(role, inherited = ?inherited, "Resolved role inheritance");

        if self.cache.len() < self.max_cache_size {
            self.cache.insert(key, Arc::clone(&inherited));
        }
        Ok(inherited)
    }

    /// Native predicate `role_inherits(order, role, inherited)`
    ///
    /// Enumerates each inherited role name as a separate solution.
    pub fn native(&self) -> NativePredicate {
        let resolver = self.clone();
        Arc::new(move |args: &[Term]| -> warden_core::Result<Vec<Term>> {
            let [order, role] = args else {
                return Err(PolarError::Runtime(format!(
                    "{} expects (order, role, inherited), got {} inputs",
                    ROLE_INHERITS,
                    args.len()
                ))
                .into());
            };
            let inherited = resolver.inherits(order, role)?;
            Ok(inherited.iter().cloned().map(Term::String).collect())
        })
    }

    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            max_size: self.max_cache_size,
        }
    }
}

impl Default for RoleResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current cache size
    pub size: usize,
    /// Maximum cache size
    pub max_size: usize,
}
