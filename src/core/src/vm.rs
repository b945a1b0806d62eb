//! Backtracking solver
//!
//! A goal stack plus a stack of choice points. Each choice point remembers
//! the goal stack and the binding-trail height at the moment it was created
//! and the alternatives still to try. Failing a goal pops back to the most
//! recent choice point with an untried alternative. Solutions are produced
//! one at a time; the machine resumes by backtracking into the last choice.

use crate::error::{EngineError, Result};
use crate::kb::KnowledgeBase;
use crate::traits::Externals;
use crate::types::{Call, Dictionary, Operator, Rule, Symbol, Term};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

/// Variable bindings of one solution, keyed by query variable name
pub type Bindings = BTreeMap<String, Term>;

#[derive(Debug, Clone)]
enum Goal {
    Query(Term),
    Unify(Term, Term),
    /// Value must match the specializer (class name, dictionary pattern or term)
    Isa(Term, Term),
}

#[derive(Debug)]
struct Choice {
    /// Untried alternatives; the next one is at the end
    alternatives: Vec<Vec<Goal>>,
    goals: Vec<Goal>,
    trail_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// A solution was returned; resume by backtracking
    Yielded,
    Done,
}

#[derive(Debug)]
pub(crate) struct Machine {
    kb: Arc<KnowledgeBase>,
    goals: Vec<Goal>,
    choices: Vec<Choice>,
    bindings: HashMap<Symbol, Term>,
    trail: Vec<Symbol>,
    query_vars: Vec<Symbol>,
    counter: u64,
    state: State,
}

impl Machine {
    pub(crate) fn new(kb: Arc<KnowledgeBase>, goal: Term) -> Self {
        let mut vars = Vec::new();
        goal.variables(&mut vars);
        let query_vars = vars
            .into_iter()
            .filter(|sym| !sym.as_str().starts_with('_') && !kb.is_constant(sym.as_str()))
            .collect();
        Self {
            kb,
            goals: vec![Goal::Query(goal)],
            choices: Vec::new(),
            bindings: HashMap::new(),
            trail: Vec::new(),
            query_vars,
            counter: 0,
            state: State::Running,
        }
    }

    /// Advance to the next solution; `None` once every alternative is exhausted
    pub(crate) fn next_result(&mut self, ext: &mut dyn Externals) -> Result<Option<Bindings>> {
        match self.state {
            State::Done => return Ok(None),
            State::Yielded => {
                if !self.backtrack() {
                    self.state = State::Done;
                    return Ok(None);
                }
                self.state = State::Running;
            }
            State::Running => {}
        }

        loop {
            let Some(goal) = self.goals.pop() else {
                self.state = State::Yielded;
                return Ok(Some(self.solution()));
            };
            trace!(?goal, "step");
            let succeeded = match self.step(goal, ext) {
                Ok(succeeded) => succeeded,
                Err(err) => {
                    self.state = State::Done;
                    return Err(err);
                }
            };
            if !succeeded && !self.backtrack() {
                self.state = State::Done;
                return Ok(None);
            }
        }
    }

    fn solution(&self) -> Bindings {
        self.query_vars
            .iter()
            .map(|sym| (sym.0.clone(), self.walk(&Term::Variable(sym.clone()))))
            .collect()
    }

    fn step(&mut self, goal: Goal, ext: &mut dyn Externals) -> Result<bool> {
        match goal {
            Goal::Query(term) => self.query(term, ext),
            Goal::Unify(left, right) => {
                let (Some(left), Some(right)) =
                    (self.evaluate(&left, ext)?, self.evaluate(&right, ext)?)
                else {
                    return Ok(false);
                };
                Ok(self.unify(&left, &right))
            }
            Goal::Isa(value, specializer) => self.isa(value, specializer, ext),
        }
    }

    fn query(&mut self, term: Term, ext: &mut dyn Externals) -> Result<bool> {
        let term = match term {
            Term::Variable(_) => self.deref(&term),
            other => other,
        };
        match term {
            Term::Boolean(b) => Ok(b),
            Term::Call(call) => self.call(call, ext),
            Term::Expression(op) => {
                let mut args = op.args;
                match op.operator {
                    Operator::And => {
                        self.push_goals(args.into_iter().map(Goal::Query).collect());
                        Ok(true)
                    }
                    Operator::Or => {
                        let alternatives = args.into_iter().map(|a| vec![Goal::Query(a)]).collect();
                        Ok(self.choose(alternatives))
                    }
                    Operator::Not => {
                        let negated = args
                            .pop()
                            .ok_or_else(|| EngineError::runtime("`!` requires a goal"))?;
                        self.negate(negated, ext)
                    }
                    Operator::Dot => match self.evaluate(&Term::op(Operator::Dot, args), ext)? {
                        Some(value) => self.query(value, ext),
                        None => Ok(false),
                    },
                    operator => {
                        let (left, right) = binary(operator, args)?;
                        match operator {
                            Operator::Unify => self.step(Goal::Unify(left, right), ext),
                            Operator::In => self.member(left, right, ext),
                            _ => self.compare(operator, left, right, ext),
                        }
                    }
                }
            }
            Term::Variable(sym) => Err(EngineError::UnboundVariable(sym.0)),
            other => Err(EngineError::runtime(format!(
                "cannot evaluate `{}` as a goal",
                other
            ))),
        }
    }

    fn call(&mut self, call: Call, ext: &mut dyn Externals) -> Result<bool> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            match self.evaluate(arg, ext)? {
                Some(arg) => args.push(arg),
                None => return Ok(false),
            }
        }

        if let Some(native) = self.kb.native(&call.name) {
            let Some((output, inputs)) = args.split_last() else {
                return Err(EngineError::runtime(format!(
                    "native predicate `{}` requires an output argument",
                    call.name
                )));
            };
            let inputs: Vec<Term> = inputs.iter().map(|t| self.walk(t)).collect();
            let values = native(&inputs)?;
            let alternatives = values
                .into_iter()
                .map(|value| vec![Goal::Unify(output.clone(), value)])
                .collect();
            return Ok(self.choose(alternatives));
        }

        let rules = self.kb.rules_for(&call.name, args.len());
        let mut alternatives = Vec::with_capacity(rules.len());
        for rule in rules {
            let renamed = self.rename_rule(&rule);
            let mut goals = Vec::with_capacity(renamed.params.len() * 2 + 1);
            for (param, arg) in renamed.params.into_iter().zip(args.iter()) {
                goals.push(Goal::Unify(param.term, arg.clone()));
                if let Some(specializer) = param.specializer {
                    goals.push(Goal::Isa(arg.clone(), specializer));
                }
            }
            goals.push(Goal::Query(renamed.body));
            alternatives.push(goals);
        }
        Ok(self.choose(alternatives))
    }

    /// Copy of `rule` with fresh variable names; constants keep their names
    fn rename_rule(&mut self, rule: &Rule) -> Rule {
        self.counter += 1;
        let suffix = self.counter;
        let kb = Arc::clone(&self.kb);
        let mut fresh = 0u64;
        let mut rename = |sym: &Symbol| {
            if sym.is_wildcard() {
                fresh += 1;
                Symbol(format!("_wild_{}_{}", suffix, fresh))
            } else if kb.is_constant(sym.as_str()) {
                sym.clone()
            } else {
                Symbol(format!("_{}_{}", sym.0, suffix))
            }
        };
        Rule {
            name: rule.name.clone(),
            params: rule
                .params
                .iter()
                .map(|p| crate::types::Parameter {
                    term: p.term.rename_variables(&mut rename),
                    specializer: p.specializer.as_ref().map(|s| match s {
                        // Class names are not variables.
                        Term::Variable(class) if class.is_class_name() => s.clone(),
                        other => other.rename_variables(&mut rename),
                    }),
                })
                .collect(),
            body: rule.body.rename_variables(&mut rename),
        }
    }

    fn negate(&mut self, goal: Term, ext: &mut dyn Externals) -> Result<bool> {
        let mut inner = Machine {
            kb: Arc::clone(&self.kb),
            goals: vec![Goal::Query(goal)],
            choices: Vec::new(),
            bindings: self.bindings.clone(),
            trail: Vec::new(),
            query_vars: Vec::new(),
            counter: self.counter,
            state: State::Running,
        };
        let found = inner.next_result(ext)?.is_some();
        self.counter = inner.counter;
        Ok(!found)
    }

    fn member(&mut self, item: Term, collection: Term, ext: &mut dyn Externals) -> Result<bool> {
        let Some(collection) = self.evaluate(&collection, ext)? else {
            return Ok(false);
        };
        match self.deref(&collection) {
            Term::List(items) => {
                let alternatives = items
                    .into_iter()
                    .map(|candidate| vec![Goal::Unify(item.clone(), candidate)])
                    .collect();
                Ok(self.choose(alternatives))
            }
            Term::Variable(sym) => Err(EngineError::UnboundVariable(sym.0)),
            other => Err(EngineError::runtime(format!(
                "cannot use `in` on non-list `{}`",
                other
            ))),
        }
    }

    fn compare(
        &mut self,
        operator: Operator,
        left: Term,
        right: Term,
        ext: &mut dyn Externals,
    ) -> Result<bool> {
        let (Some(left), Some(right)) = (self.evaluate(&left, ext)?, self.evaluate(&right, ext)?)
        else {
            return Ok(false);
        };
        let left = self.walk(&left);
        let right = self.walk(&right);
        for side in [&left, &right] {
            if let Term::Variable(sym) = side {
                return Err(EngineError::UnboundVariable(sym.0.clone()));
            }
        }

        match operator {
            Operator::Eq => return Ok(terms_equal(&left, &right)),
            Operator::Neq => return Ok(!terms_equal(&left, &right)),
            _ => {}
        }

        let ordering = match (&left, &right) {
            (Term::Integer(a), Term::Integer(b)) => Some(a.cmp(b)),
            (Term::Integer(a), Term::Float(b)) => (*a as f64).partial_cmp(b),
            (Term::Float(a), Term::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Term::Float(a), Term::Float(b)) => a.partial_cmp(b),
            (Term::String(a), Term::String(b)) => Some(a.cmp(b)),
            _ => {
                return Err(EngineError::runtime(format!(
                    "cannot compare `{}` with `{}`",
                    left, right
                )))
            }
        };
        let Some(ordering) = ordering else {
            return Ok(false);
        };
        match operator {
            Operator::Lt => Ok(ordering == Ordering::Less),
            Operator::Leq => Ok(ordering != Ordering::Greater),
            Operator::Gt => Ok(ordering == Ordering::Greater),
            Operator::Geq => Ok(ordering != Ordering::Less),
            other => Err(EngineError::runtime(format!(
                "{:?} is not a comparison",
                other
            ))),
        }
    }

    fn isa(&mut self, value: Term, specializer: Term, ext: &mut dyn Externals) -> Result<bool> {
        let Some(value) = self.evaluate(&value, ext)? else {
            return Ok(false);
        };
        let value = self.deref(&value);

        match specializer {
            Term::Variable(class) if class.is_class_name() => match value {
                Term::ExternalInstance(id) => ext.isa(id, class.as_str()),
                Term::Variable(sym) => Err(EngineError::UnboundVariable(sym.0)),
                other => Ok(other.builtin_class() == Some(class.as_str())),
            },
            Term::Dictionary(pattern) => self.matches_fields(value, pattern, ext),
            other => {
                let Some(other) = self.evaluate(&other, ext)? else {
                    return Ok(false);
                };
                Ok(self.unify(&value, &other))
            }
        }
    }

    /// Every field of `pattern` must exist on `value` and unify with it
    fn matches_fields(
        &mut self,
        value: Term,
        pattern: Dictionary,
        ext: &mut dyn Externals,
    ) -> Result<bool> {
        for (field, expected) in pattern {
            let actual = match &value {
                Term::Dictionary(fields) => fields.get(&field).cloned(),
                Term::ExternalInstance(id) => ext.lookup(*id, &field)?,
                _ => return Ok(false),
            };
            let Some(actual) = actual else {
                return Ok(false);
            };
            let Some(expected) = self.evaluate(&expected, ext)? else {
                return Ok(false);
            };
            if !self.unify(&actual, &expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resolve field lookups and build instance literals inside `term`
    ///
    /// `None` means a lookup found no such field, which fails the goal.
    fn evaluate(&mut self, term: &Term, ext: &mut dyn Externals) -> Result<Option<Term>> {
        match term {
            Term::Expression(op) if op.operator == Operator::Dot => {
                let [base, Term::String(field)] = op.args.as_slice() else {
                    return Err(EngineError::runtime(format!("malformed lookup `{}`", term)));
                };
                let Some(base) = self.evaluate(base, ext)? else {
                    return Ok(None);
                };
                match self.deref(&base) {
                    Term::Dictionary(fields) => Ok(fields.get(field).cloned()),
                    Term::ExternalInstance(id) => ext.lookup(id, field),
                    Term::Variable(sym) => Err(EngineError::UnboundVariable(sym.0)),
                    other => Err(EngineError::runtime(format!(
                        "cannot look up `{}` on `{}`",
                        field, other
                    ))),
                }
            }
            Term::InstanceLiteral { class, fields } => {
                let mut resolved = Dictionary::new();
                for (name, value) in fields {
                    let Some(value) = self.evaluate(value, ext)? else {
                        return Ok(None);
                    };
                    resolved.insert(name.clone(), self.walk(&value));
                }
                ext.make_instance(class, &resolved).map(Some)
            }
            Term::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    match self.evaluate(item, ext)? {
                        Some(item) => resolved.push(item),
                        None => return Ok(None),
                    }
                }
                Ok(Some(Term::List(resolved)))
            }
            Term::Dictionary(fields) => {
                let mut resolved = Dictionary::new();
                for (name, value) in fields {
                    match self.evaluate(value, ext)? {
                        Some(value) => {
                            resolved.insert(name.clone(), value);
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some(Term::Dictionary(resolved)))
            }
            other => Ok(Some(other.clone())),
        }
    }

    fn choose(&mut self, mut alternatives: Vec<Vec<Goal>>) -> bool {
        if alternatives.is_empty() {
            return false;
        }
        let first = alternatives.remove(0);
        if !alternatives.is_empty() {
            alternatives.reverse();
            self.choices.push(Choice {
                alternatives,
                goals: self.goals.clone(),
                trail_len: self.trail.len(),
            });
        }
        self.push_goals(first);
        true
    }

    fn push_goals(&mut self, goals: Vec<Goal>) {
        self.goals.extend(goals.into_iter().rev());
    }

    fn backtrack(&mut self) -> bool {
        while let Some(mut choice) = self.choices.pop() {
            self.undo(choice.trail_len);
            let Some(next) = choice.alternatives.pop() else {
                continue;
            };
            if choice.alternatives.is_empty() {
                self.goals = choice.goals;
            } else {
                self.goals = choice.goals.clone();
                self.choices.push(choice);
            }
            self.push_goals(next);
            return true;
        }
        false
    }

    fn bind(&mut self, var: Symbol, value: Term) {
        self.trail.push(var.clone());
        self.bindings.insert(var, value);
    }

    fn undo(&mut self, trail_len: usize) {
        while self.trail.len() > trail_len {
            if let Some(var) = self.trail.pop() {
                self.bindings.remove(&var);
            }
        }
    }

    /// Follow variable bindings (and constants) to the first non-variable
    fn deref(&self, term: &Term) -> Term {
        let mut current = term;
        loop {
            let Term::Variable(sym) = current else {
                return current.clone();
            };
            if let Some(bound) = self.bindings.get(sym) {
                current = bound;
            } else if let Some(constant) = self.kb.constant(sym.as_str()) {
                return constant.clone();
            } else {
                return current.clone();
            }
        }
    }

    /// Deep deref: substitute bindings everywhere inside `term`
    fn walk(&self, term: &Term) -> Term {
        match self.deref(term) {
            Term::List(items) => Term::List(items.iter().map(|t| self.walk(t)).collect()),
            Term::Dictionary(fields) => Term::Dictionary(
                fields.iter().map(|(k, v)| (k.clone(), self.walk(v))).collect(),
            ),
            Term::Call(call) => Term::Call(Call {
                name: call.name,
                args: call.args.iter().map(|t| self.walk(t)).collect(),
            }),
            other => other,
        }
    }

    /// Whether `var` appears inside `term` once bindings are followed
    fn occurs(&self, var: &Symbol, term: &Term) -> bool {
        match self.deref(term) {
            Term::Variable(sym) => &sym == var,
            Term::List(items) => items.iter().any(|t| self.occurs(var, t)),
            Term::Dictionary(fields) => fields.values().any(|t| self.occurs(var, t)),
            Term::Call(call) => call.args.iter().any(|t| self.occurs(var, t)),
            Term::Expression(op) => op.args.iter().any(|t| self.occurs(var, t)),
            _ => false,
        }
    }

    fn unify(&mut self, left: &Term, right: &Term) -> bool {
        let left = self.deref(left);
        let right = self.deref(right);
        match (left, right) {
            (Term::Variable(a), Term::Variable(b)) if a == b => true,
            (Term::Variable(var), value) | (value, Term::Variable(var)) => {
                // A variable never binds to a term containing itself.
                if self.occurs(&var, &value) {
                    return false;
                }
                self.bind(var, value);
                true
            }
            (Term::List(a), Term::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| self.unify(x, y))
            }
            (Term::Dictionary(a), Term::Dictionary(b)) => {
                a.len() == b.len()
                    && a.keys().eq(b.keys())
                    && a.values().zip(b.values()).all(|(x, y)| self.unify(x, y))
            }
            (Term::Call(a), Term::Call(b)) => {
                a.name == b.name
                    && a.args.len() == b.args.len()
                    && a.args.iter().zip(b.args.iter()).all(|(x, y)| self.unify(x, y))
            }
            (a, b) => terms_equal(&a, &b),
        }
    }
}

fn binary(operator: Operator, args: Vec<Term>) -> Result<(Term, Term)> {
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(left), Some(right), None) => Ok((left, right)),
        _ => Err(EngineError::runtime(format!(
            "operator {:?} takes exactly two operands",
            operator
        ))),
    }
}

/// Structural equality with integers and floats compared numerically
fn terms_equal(left: &Term, right: &Term) -> bool {
    match (left, right) {
        (Term::Integer(a), Term::Float(b)) | (Term::Float(b), Term::Integer(a)) => {
            (*a as f64) == *b
        }
        (Term::List(a), Term::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| terms_equal(x, y))
        }
        (Term::Dictionary(a), Term::Dictionary(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && terms_equal(va, vb))
        }
        (a, b) => a == b,
    }
}
