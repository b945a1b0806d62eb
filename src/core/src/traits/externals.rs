//! Host callbacks consulted during evaluation
//!
//! The engine never fabricates host objects and never inspects them. Whenever
//! a goal needs something only the host knows (building an instance from a
//! `Class{...}` literal, reading a field of an instance, checking an instance
//! against a class specializer) it calls back through [`Externals`].

use crate::error::{EngineError, Result};
use crate::types::{Dictionary, InstanceId, Term};

/// Host-side operations the engine relies on
pub trait Externals {
    /// Construct an instance of `class` from `fields` and return its handle term
    fn make_instance(&mut self, class: &str, fields: &Dictionary) -> Result<Term>;

    /// Read `field` from the instance; `None` when the instance has no such field
    fn lookup(&mut self, instance: InstanceId, field: &str) -> Result<Option<Term>>;

    /// Whether the instance is of the class registered under `class`
    fn isa(&mut self, instance: InstanceId, class: &str) -> Result<bool>;
}

/// Externals for engines running without a host
///
/// Instance construction and lookups fail; class checks are always false.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExternals;

impl Externals for NoExternals {
    fn make_instance(&mut self, class: &str, _fields: &Dictionary) -> Result<Term> {
        Err(EngineError::runtime(format!(
            "cannot construct `{}` without a host",
            class
        )))
    }

    fn lookup(&mut self, instance: InstanceId, field: &str) -> Result<Option<Term>> {
        Err(EngineError::runtime(format!(
            "cannot look up `{}` on {} without a host",
            field, instance
        )))
    }

    fn isa(&mut self, _instance: InstanceId, _class: &str) -> Result<bool> {
        Ok(false)
    }
}
