//! # Warden Authorization
//!
//! Host binding and query execution for the Warden policy engine. The
//! application registers its types, loads policy source, and asks questions:
//!
//! ```rust
//! use warden_authz::{HostValue, Warden};
//!
//! # fn main() -> warden_authz::Result<()> {
//! let warden = Warden::new();
//! warden.load_str(
//!     r#"allow(actor, "read", doc) := doc.owner = actor;
//!        ?= allow("alice", "read", {owner: "alice"});"#,
//!     Some("docs.polar"),
//! )?;
//!
//! let mut query = warden.query(r#"allow("alice", action, {owner: "alice"})"#)?;
//! assert!(query.has_next()?);
//! assert_eq!(query.next()?.get("action"), Some(&HostValue::from("read")));
//! assert!(!query.has_next()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`value`] and [`host`]: host values, shared instances and the per-query
//!   handle table that marshals them to engine terms
//! - [`registry`]: class names, type identity and constructors
//! - [`loader`]: the file load queue
//! - [`query`]: lazy result cursors
//! - [`roles`]: role-order inheritance and the role prelude
//! - [`config`]: TOML configuration

pub mod config;
pub mod convert;
pub mod error;
pub mod host;
pub mod loader;
pub mod query;
pub mod registry;
pub mod roles;
pub mod value;
pub mod warden;

// Re-export commonly used types
pub use config::WardenConfig;
pub use convert::{host_to_json, json_to_host};
pub use error::{PolarError, Result};
pub use host::Host;
pub use loader::{LoadQueue, Source};
pub use query::{BindingSet, Query, QueryResults};
pub use registry::{ClassEntry, ClassRegistry, ClassTable, Constructor, TypeDescriptor};
pub use roles::RoleResolver;
pub use value::{serde_field, HostValue, Instance, PolarObject};
pub use warden::Warden;

pub use warden_core;
