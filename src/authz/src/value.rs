//! Host-side values
//!
//! [`HostValue`] is what applications hand to and receive from the binding
//! layer. Application objects enter as [`Instance`]s: shared references the
//! engine only ever sees as opaque handles.

use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Application object exposed to policies
///
/// `get_field` backs `value.field` lookups and dictionary specializers in
/// rule heads. Returning `None` makes the lookup fail (the goal is false)
/// rather than raise.
pub trait PolarObject: Any + Send + Sync + fmt::Debug {
    fn get_field(&self, name: &str) -> Option<HostValue>;
}

/// Field lookup through `serde`, for types that already derive `Serialize`
///
/// ```rust
/// use serde::Serialize;
/// use warden_authz::{serde_field, HostValue, PolarObject};
///
/// #[derive(Debug, Serialize)]
/// struct User {
///     name: String,
/// }
///
/// impl PolarObject for User {
///     fn get_field(&self, name: &str) -> Option<HostValue> {
///         serde_field(self, name)
///     }
/// }
///
/// let user = User { name: "alice".into() };
/// assert_eq!(user.get_field("name"), Some(HostValue::from("alice")));
/// ```
pub fn serde_field<T: Serialize>(value: &T, name: &str) -> Option<HostValue> {
    match serde_json::to_value(value).ok()? {
        serde_json::Value::Object(mut fields) => fields.remove(name).map(HostValue::from),
        _ => None,
    }
}

/// Shared reference to an application object
///
/// Cloning shares the object. Two instances are equal only when they refer to
/// the same allocation.
#[derive(Clone)]
pub struct Instance {
    object: Arc<dyn PolarObject>,
    any: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Instance {
    pub fn new<T: PolarObject>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an object the application already shares
    pub fn from_arc<T: PolarObject>(value: Arc<T>) -> Self {
        Self {
            object: value.clone(),
            any: value,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<HostValue> {
        self.object.get_field(name)
    }

    pub fn downcast_ref<T: PolarObject>(&self) -> Option<&T> {
        self.any.downcast_ref::<T>()
    }

    /// Recover the shared object as its concrete type
    pub fn downcast<T: PolarObject>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Address of the shared allocation; stable for the object's lifetime
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.any) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.address() == other.address()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.object)
    }
}

/// Value crossing the host/engine boundary
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<HostValue>),
    Map(BTreeMap<String, HostValue>),
    Instance(Instance),
    /// Query variable; also what an unbound result variable comes back as
    Variable(String),
}

impl HostValue {
    pub fn var(name: impl Into<String>) -> Self {
        HostValue::Variable(name.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            HostValue::Instance(instance) => Some(instance),
            _ => None,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("nil"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Integer(i) => write!(f, "{}", i),
            HostValue::Float(x) => write!(f, "{:?}", x),
            HostValue::String(s) => write!(f, "{:?}", s),
            HostValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            HostValue::Map(fields) => {
                f.write_str("{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            HostValue::Instance(instance) => write!(f, "{:?}", instance),
            HostValue::Variable(name) => f.write_str(name),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Integer(i)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        HostValue::Integer(i.into())
    }
}

impl From<f64> for HostValue {
    fn from(x: f64) -> Self {
        HostValue::Float(x)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<Instance> for HostValue {
    fn from(instance: Instance) -> Self {
        HostValue::Instance(instance)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<BTreeMap<String, T>> for HostValue {
    fn from(fields: BTreeMap<String, T>) -> Self {
        HostValue::Map(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}
