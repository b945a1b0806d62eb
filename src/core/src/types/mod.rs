//! Term and rule types shared by the parser, knowledge base and solver

pub mod term;
pub mod rule;

pub use term::{Call, Dictionary, InstanceId, Operation, Operator, Symbol, Term};
pub use rule::{Parameter, Rule};
