//! Term representation used by the rule engine
//!
//! Every value the engine reasons about is a [`Term`]: primitives, lists,
//! dictionaries, opaque handles to host objects, variables, predicate calls
//! and operator expressions. Policy source is parsed into terms, queries are
//! terms, and result bindings map variable names to terms.

use std::collections::BTreeMap;
use std::fmt;

/// Ordered mapping from field name to term
pub type Dictionary = BTreeMap<String, Term>;

/// Engine-assigned identity of a host object
///
/// Handles are plain indices; the host keeps the association between an id
/// and the object it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}", self.0)
    }
}

/// Variable name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub String);

impl Symbol {
    /// Create a symbol from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name of the symbol
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The anonymous variable `_`, fresh at every occurrence
    pub fn is_wildcard(&self) -> bool {
        self.0 == "_"
    }

    /// Capitalised symbols in specializer position name classes
    pub fn is_class_name(&self) -> bool {
        self.0.chars().next().is_some_and(char::is_uppercase)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Predicate application, e.g. `allow(actor, "read", doc)`
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Predicate name
    pub name: String,
    /// Arguments in declaration order
    pub args: Vec<Term>,
}

/// Operators appearing in rule bodies and queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Not,
    Unify,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    In,
    /// Field lookup; the second argument is the field name as a string term
    Dot,
}

impl Operator {
    fn symbol(self) -> &'static str {
        match self {
            Operator::And => ",",
            Operator::Or => "|",
            Operator::Not => "!",
            Operator::Unify => "=",
            Operator::Eq => "==",
            Operator::Neq => "!=",
            Operator::Lt => "<",
            Operator::Leq => "<=",
            Operator::Gt => ">",
            Operator::Geq => ">=",
            Operator::In => "in",
            Operator::Dot => ".",
        }
    }
}

/// Operator applied to its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: Operator,
    pub args: Vec<Term>,
}

/// The engine's tagged-union value representation
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Term>),
    Dictionary(Dictionary),
    /// Opaque handle to a host object
    ExternalInstance(InstanceId),
    /// `Class{field: value}` literal; the host builds the instance when evaluated
    InstanceLiteral { class: String, fields: Dictionary },
    Variable(Symbol),
    Call(Call),
    Expression(Operation),
}

impl Term {
    /// Variable term
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(Symbol::new(name))
    }

    /// Predicate application term
    pub fn call(name: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Call(Call {
            name: name.into(),
            args,
        })
    }

    /// Operator expression term
    pub fn op(operator: Operator, args: Vec<Term>) -> Self {
        Term::Expression(Operation { operator, args })
    }

    /// Field lookup `base.field`
    pub fn dot(base: Term, field: impl Into<String>) -> Self {
        Term::op(Operator::Dot, vec![base, Term::String(field.into())])
    }

    /// Whether the term is an unbound-looking variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Name of the built-in class a primitive belongs to
    pub fn builtin_class(&self) -> Option<&'static str> {
        match self {
            Term::Boolean(_) => Some("Boolean"),
            Term::Integer(_) => Some("Integer"),
            Term::Float(_) => Some("Float"),
            Term::String(_) => Some("String"),
            Term::List(_) => Some("List"),
            Term::Dictionary(_) => Some("Dictionary"),
            _ => None,
        }
    }

    /// Rebuild the term with every variable passed through `rename`
    pub fn rename_variables(&self, rename: &mut dyn FnMut(&Symbol) -> Symbol) -> Term {
        match self {
            Term::Variable(sym) => Term::Variable(rename(sym)),
            Term::List(items) => Term::List(items.iter().map(|t| t.rename_variables(rename)).collect()),
            Term::Dictionary(fields) => Term::Dictionary(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.rename_variables(rename)))
                    .collect(),
            ),
            Term::InstanceLiteral { class, fields } => Term::InstanceLiteral {
                class: class.clone(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.rename_variables(rename)))
                    .collect(),
            },
            Term::Call(call) => Term::Call(Call {
                name: call.name.clone(),
                args: call.args.iter().map(|t| t.rename_variables(rename)).collect(),
            }),
            Term::Expression(op) => Term::Expression(Operation {
                operator: op.operator,
                args: op.args.iter().map(|t| t.rename_variables(rename)).collect(),
            }),
            other => other.clone(),
        }
    }

    /// Collect the distinct variables of the term in first-occurrence order
    pub fn variables(&self, out: &mut Vec<Symbol>) {
        match self {
            Term::Variable(sym) => {
                if !out.contains(sym) {
                    out.push(sym.clone());
                }
            }
            Term::List(items) => items.iter().for_each(|t| t.variables(out)),
            Term::Dictionary(fields) | Term::InstanceLiteral { fields, .. } => {
                fields.values().for_each(|t| t.variables(out))
            }
            Term::Call(call) => call.args.iter().for_each(|t| t.variables(out)),
            Term::Expression(op) => op.args.iter().for_each(|t| t.variables(out)),
            _ => {}
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Term], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &Dictionary) -> fmt::Result {
    f.write_str("{")?;
    for (i, (k, v)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", k, v)?;
    }
    f.write_str("}")
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Null => f.write_str("nil"),
            Term::Boolean(b) => write!(f, "{}", b),
            Term::Integer(i) => write!(f, "{}", i),
            Term::Float(x) => write!(f, "{:?}", x),
            Term::String(s) => write!(f, "{:?}", s),
            Term::List(items) => {
                f.write_str("[")?;
                write_joined(f, items, ", ")?;
                f.write_str("]")
            }
            Term::Dictionary(fields) => write_fields(f, fields),
            Term::ExternalInstance(id) => write!(f, "{}", id),
            Term::InstanceLiteral { class, fields } => {
                f.write_str(class)?;
                write_fields(f, fields)
            }
            Term::Variable(sym) => write!(f, "{}", sym),
            Term::Call(call) => {
                write!(f, "{}(", call.name)?;
                write_joined(f, &call.args, ", ")?;
                f.write_str(")")
            }
            Term::Expression(op) => match op.operator {
                Operator::Not => {
                    f.write_str("!(")?;
                    write_joined(f, &op.args, ", ")?;
                    f.write_str(")")
                }
                Operator::Dot => match op.args.as_slice() {
                    [base, Term::String(field)] => write!(f, "{}.{}", base, field),
                    _ => write_joined(f, &op.args, "."),
                },
                Operator::And => {
                    f.write_str("(")?;
                    write_joined(f, &op.args, ", ")?;
                    f.write_str(")")
                }
                Operator::Or => {
                    f.write_str("(")?;
                    write_joined(f, &op.args, " | ")?;
                    f.write_str(")")
                }
                other => write_joined(f, &op.args, &format!(" {} ", other.symbol())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_policy_syntax() {
        let term = Term::call(
            "allow",
            vec![
                Term::var("actor"),
                Term::String("read".to_string()),
                Term::List(vec![Term::Integer(1), Term::Float(2.5)]),
            ],
        );
        assert_eq!(term.to_string(), r#"allow(actor, "read", [1, 2.5])"#);

        let lookup = Term::dot(Term::var("user"), "name");
        assert_eq!(lookup.to_string(), "user.name");
    }

    #[test]
    fn test_variables_in_first_occurrence_order() {
        let term = Term::op(
            Operator::And,
            vec![
                Term::call("f", vec![Term::var("b"), Term::var("a")]),
                Term::call("g", vec![Term::var("a")]),
            ],
        );
        let mut vars = Vec::new();
        term.variables(&mut vars);
        assert_eq!(vars, vec![Symbol::new("b"), Symbol::new("a")]);
    }

    #[test]
    fn test_class_name_detection() {
        assert!(Symbol::new("Organization").is_class_name());
        assert!(!Symbol::new("organization").is_class_name());
        assert!(!Symbol::new("_").is_class_name());
        assert!(Symbol::new("_").is_wildcard());
    }
}
