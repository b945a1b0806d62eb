//! Class registry
//!
//! Maps the class names policies use (`x: Organization`, `Organization{...}`)
//! to host types and optional constructors. The table is copy-on-write: each
//! query captures the [`ClassTable`] current at its creation, and later
//! registrations never reach an already-open query.

use crate::error::{PolarError, Result};
use crate::value::{HostValue, Instance, PolarObject};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds an instance from the fields of a `Class{field: value}` literal
pub type Constructor =
    Arc<dyn Fn(BTreeMap<String, HostValue>) -> Result<Instance> + Send + Sync>;

/// Identity of a host type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeDescriptor {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// Registration entry
#[derive(Clone)]
pub struct ClassEntry {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub constructor: Option<Constructor>,
}

impl fmt::Debug for ClassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassEntry")
            .field("name", &self.name)
            .field("type", &self.descriptor.name)
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

/// Immutable snapshot of the registered classes
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: Arc<HashMap<String, ClassEntry>>,
}

impl ClassTable {
    pub fn get(&self, name: &str) -> Option<&ClassEntry> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Build a new instance of `name` through its registered constructor
    pub fn construct(&self, name: &str, fields: BTreeMap<String, HostValue>) -> Result<Instance> {
        let constructor = self
            .get(name)
            .and_then(|entry| entry.constructor.as_ref())
            .ok_or_else(|| PolarError::UnknownConstructor(name.to_string()))?;
        constructor(fields)
    }

    /// Whether `instance` is of the type registered as `name`
    ///
    /// Unregistered names match nothing.
    pub fn isa(&self, instance: &Instance, name: &str) -> bool {
        self.get(name)
            .is_some_and(|entry| entry.descriptor.id == instance.type_id())
    }
}

/// Registered classes of one engine instance
#[derive(Debug, Default)]
pub struct ClassRegistry {
    table: RwLock<ClassTable>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a host type
    ///
    /// Re-registering a name with the type it already has replaces the
    /// entry (and its constructor). Binding it to a different type fails.
    pub fn register(
        &self,
        name: &str,
        descriptor: TypeDescriptor,
        constructor: Option<Constructor>,
    ) -> Result<()> {
        let mut table = self.table.write();
        if let Some(existing) = table.get(name) {
            if existing.descriptor.id != descriptor.id {
                return Err(PolarError::DuplicateRegistration {
                    name: name.to_string(),
                    existing: existing.descriptor.name.to_string(),
                });
            }
        }

        let mut classes = (*table.classes).clone();
        let rebound = classes
            .insert(
                name.to_string(),
                ClassEntry {
                    name: name.to_string(),
                    descriptor,
                    constructor,
                },
            )
            .is_some();
        table.classes = Arc::new(classes);
        debug!(class = name, type_name = descriptor.name, rebound, "Registered class");
        Ok(())
    }

    /// Register `T` under `name` without a constructor
    pub fn register_type<T: PolarObject>(&self, name: &str) -> Result<()> {
        self.register(name, TypeDescriptor::of::<T>(), None)
    }

    /// Register `T` under `name` with a constructor for `Name{...}` literals
    pub fn register_type_with_constructor<T, F>(&self, name: &str, build: F) -> Result<()>
    where
        T: PolarObject,
        F: Fn(BTreeMap<String, HostValue>) -> Result<T> + Send + Sync + 'static,
    {
        let constructor: Constructor =
            Arc::new(move |fields: BTreeMap<String, HostValue>| build(fields).map(Instance::new));
        self.register(name, TypeDescriptor::of::<T>(), Some(constructor))
    }

    pub fn snapshot(&self) -> ClassTable {
        self.table.read().clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().get(name).is_some()
    }
}
