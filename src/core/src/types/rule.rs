//! Rule definitions

use super::term::Term;

/// One rule parameter: a head term plus an optional specializer
///
/// `f(x: Organization)` has the parameter `x` specialized on the class
/// `Organization`; `f(x: {id: 1})` specializes on a dictionary pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub term: Term,
    pub specializer: Option<Term>,
}

impl Parameter {
    pub fn new(term: Term) -> Self {
        Self {
            term,
            specializer: None,
        }
    }

    pub fn with_specializer(mut self, specializer: Term) -> Self {
        self.specializer = Some(specializer);
        self
    }
}

/// A rule `name(params) := body;`, or a fact when the body is `true`
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Term,
}

impl Rule {
    /// Create a fact (rule with an always-true body)
    pub fn fact(name: impl Into<String>, params: Vec<Parameter>) -> Self {
        Self {
            name: name.into(),
            params,
            body: Term::Boolean(true),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}
