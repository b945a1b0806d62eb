//! Knowledge base: loaded rules, registered constants and native predicates
//!
//! The engine keeps the knowledge base behind an `Arc` and swaps in a
//! modified copy on every mutation, so a running query keeps reading the
//! snapshot it started with.

use crate::error::Result;
use crate::types::{Rule, Term};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Native predicate implemented in Rust
///
/// Called as `name(in_1, ..., in_n, out)`: receives the fully resolved input
/// arguments and returns every value `out` may take, in order. Each returned
/// value becomes one alternative solution.
pub type NativePredicate = Arc<dyn Fn(&[Term]) -> Result<Vec<Term>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct KnowledgeBase {
    rules: HashMap<String, Vec<Arc<Rule>>>,
    constants: HashMap<String, Term>,
    natives: HashMap<String, NativePredicate>,
    sources: Vec<String>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules
            .entry(rule.name.clone())
            .or_default()
            .push(Arc::new(rule));
    }

    /// Rules named `name` with the given arity, in declaration order
    pub fn rules_for(&self, name: &str, arity: usize) -> Vec<Arc<Rule>> {
        self.rules
            .get(name)
            .map(|rules| {
                rules
                    .iter()
                    .filter(|rule| rule.arity() == arity)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
        self.sources.clear();
    }

    pub fn record_source(&mut self, name: impl Into<String>) {
        self.sources.push(name.into());
    }

    /// Names of the sources loaded so far, in load order
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn register_constant(&mut self, name: impl Into<String>, value: Term) {
        self.constants.insert(name.into(), value);
    }

    pub fn constant(&self, name: &str) -> Option<&Term> {
        self.constants.get(name)
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    pub fn register_native(&mut self, name: impl Into<String>, native: NativePredicate) {
        self.natives.insert(name.into(), native);
    }

    pub fn native(&self, name: &str) -> Option<NativePredicate> {
        self.natives.get(name).cloned()
    }
}

impl fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut natives: Vec<&String> = self.natives.keys().collect();
        natives.sort();
        f.debug_struct("KnowledgeBase")
            .field("rules", &self.rule_count())
            .field("constants", &self.constants)
            .field("natives", &natives)
            .field("sources", &self.sources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Parameter;

    #[test]
    fn test_rules_filtered_by_arity_in_declaration_order() {
        let mut kb = KnowledgeBase::new();
        kb.add_rule(Rule::fact("f", vec![Parameter::new(Term::Integer(2))]));
        kb.add_rule(Rule::fact(
            "f",
            vec![Parameter::new(Term::Integer(1)), Parameter::new(Term::Integer(1))],
        ));
        kb.add_rule(Rule::fact("f", vec![Parameter::new(Term::Integer(1))]));

        let unary = kb.rules_for("f", 1);
        assert_eq!(unary.len(), 2);
        assert_eq!(unary[0].params[0].term, Term::Integer(2));
        assert_eq!(unary[1].params[0].term, Term::Integer(1));
        assert!(kb.rules_for("g", 1).is_empty());
        assert_eq!(kb.rule_count(), 3);
    }

    #[test]
    fn test_clear_keeps_constants_and_natives() {
        let mut kb = KnowledgeBase::new();
        kb.add_rule(Rule::fact("f", vec![]));
        kb.register_constant("limit", Term::Integer(10));
        kb.register_native(
            "echo",
            Arc::new(|args: &[Term]| -> Result<Vec<Term>> { Ok(args.to_vec()) }),
        );
        kb.record_source("a.polar");

        kb.clear_rules();
        assert_eq!(kb.rule_count(), 0);
        assert!(kb.sources().is_empty());
        assert_eq!(kb.constant("limit"), Some(&Term::Integer(10)));
        assert!(kb.native("echo").is_some());
    }
}
