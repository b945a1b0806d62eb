//! # Warden Core
//!
//! Rule engine behind the Warden authorization layer: policy source is parsed
//! into [`Rule`]s, stored in a knowledge base, and goals are solved by a
//! backtracking resolver that yields one binding set at a time. Host objects
//! stay on the host side; the engine sees them as opaque [`InstanceId`]
//! handles and calls back through [`Externals`] when it needs to inspect one.

pub mod engine;
pub mod error;
pub mod kb;
pub mod parser;
pub mod traits;
pub mod types;
mod vm;

// Re-export commonly used types
pub use engine::{Engine, EngineQuery};
pub use error::{EngineError, Result};
pub use kb::{KnowledgeBase, NativePredicate};
pub use traits::{Externals, NoExternals};
pub use types::{Call, Dictionary, InstanceId, Operation, Operator, Parameter, Rule, Symbol, Term};
pub use vm::Bindings;
