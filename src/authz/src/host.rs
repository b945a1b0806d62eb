//! Evaluation context and term marshaling
//!
//! A [`Host`] owns the handle table for one query: which engine handle stands
//! for which application object. Every query gets its own clone of the root
//! context, so handles assigned while one query runs are never visible to
//! another.

use crate::error::{PolarError, Result};
use crate::registry::ClassTable;
use crate::value::{HostValue, Instance};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use warden_core::{Dictionary, Engine, EngineError, Externals, InstanceId, Term};

#[derive(Clone)]
pub struct Host {
    engine: Arc<Engine>,
    classes: ClassTable,
    instances: HashMap<InstanceId, Instance>,
    /// Object address to handle, so the same object always gets the same handle
    handles: HashMap<usize, InstanceId>,
}

impl Host {
    pub fn new(engine: Arc<Engine>, classes: ClassTable) -> Self {
        Self {
            engine,
            classes,
            instances: HashMap::new(),
            handles: HashMap::new(),
        }
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub(crate) fn set_classes(&mut self, classes: ClassTable) {
        self.classes = classes;
    }

    /// Handle for `instance`, assigning a fresh one on first sight
    pub fn cache_instance(&mut self, instance: Instance) -> InstanceId {
        if let Some(id) = self.handles.get(&instance.address()) {
            return *id;
        }
        let id = self.engine.new_instance_id();
        debug!(handle = %id, type_name = instance.type_name(), "Assigned instance handle");
        self.handles.insert(instance.address(), id);
        self.instances.insert(id, instance);
        id
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Convert a host value into an engine term
    pub fn to_term(&mut self, value: &HostValue) -> Term {
        match value {
            HostValue::Null => Term::Null,
            HostValue::Boolean(b) => Term::Boolean(*b),
            HostValue::Integer(i) => Term::Integer(*i),
            HostValue::Float(x) => Term::Float(*x),
            HostValue::String(s) => Term::String(s.clone()),
            HostValue::List(items) => Term::List(items.iter().map(|v| self.to_term(v)).collect()),
            HostValue::Map(fields) => Term::Dictionary(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.to_term(v)))
                    .collect(),
            ),
            HostValue::Instance(instance) => {
                Term::ExternalInstance(self.cache_instance(instance.clone()))
            }
            HostValue::Variable(name) => Term::var(name.as_str()),
        }
    }

    /// Convert an engine term back into a host value
    ///
    /// Handles must belong to this context; the engine never fabricates
    /// objects of its own.
    pub fn from_term(&self, term: &Term) -> Result<HostValue> {
        Ok(match term {
            Term::Null => HostValue::Null,
            Term::Boolean(b) => HostValue::Boolean(*b),
            Term::Integer(i) => HostValue::Integer(*i),
            Term::Float(x) => HostValue::Float(*x),
            Term::String(s) => HostValue::String(s.clone()),
            Term::List(items) => HostValue::List(
                items
                    .iter()
                    .map(|t| self.from_term(t))
                    .collect::<Result<_>>()?,
            ),
            Term::Dictionary(fields) => HostValue::Map(self.fields_from_terms(fields)?),
            Term::ExternalInstance(id) => HostValue::Instance(
                self.instance(*id)
                    .cloned()
                    .ok_or_else(|| PolarError::Marshal(format!("unknown instance handle {}", id)))?,
            ),
            Term::Variable(sym) => HostValue::Variable(sym.0.clone()),
            other => {
                return Err(PolarError::Marshal(format!(
                    "`{}` has no host representation",
                    other
                )))
            }
        })
    }

    fn fields_from_terms(&self, fields: &Dictionary) -> Result<BTreeMap<String, HostValue>> {
        fields
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.from_term(v)?)))
            .collect()
    }
}

impl Externals for Host {
    fn make_instance(&mut self, class: &str, fields: &Dictionary) -> warden_core::Result<Term> {
        let fields = self.fields_from_terms(fields)?;
        let instance = self.classes.construct(class, fields)?;
        debug!(class, "Constructed instance from literal");
        Ok(Term::ExternalInstance(self.cache_instance(instance)))
    }

    fn lookup(&mut self, id: InstanceId, field: &str) -> warden_core::Result<Option<Term>> {
        let instance = self
            .instance(id)
            .cloned()
            .ok_or_else(|| EngineError::from(unknown_handle(id)))?;
        Ok(instance.get_field(field).map(|value| self.to_term(&value)))
    }

    fn isa(&mut self, id: InstanceId, class: &str) -> warden_core::Result<bool> {
        let instance = self
            .instance(id)
            .ok_or_else(|| EngineError::from(unknown_handle(id)))?;
        Ok(self.classes.isa(instance, class))
    }
}

fn unknown_handle(id: InstanceId) -> PolarError {
    PolarError::Marshal(format!("unknown instance handle {}", id))
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("classes", &self.classes.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}
