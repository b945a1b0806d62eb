//! End-to-end resolution tests for the rule engine

use proptest::prelude::*;
use std::collections::HashMap;
use warden_core::{
    Bindings, Dictionary, Engine, EngineError, Externals, InstanceId, NoExternals, Result, Term,
};

/// Minimal host: instances are dictionaries tagged with their class
#[derive(Default)]
struct DictHost {
    instances: HashMap<InstanceId, (String, Dictionary)>,
    next: u64,
}

impl Externals for DictHost {
    fn make_instance(&mut self, class: &str, fields: &Dictionary) -> Result<Term> {
        self.next += 1;
        let id = InstanceId(self.next);
        self.instances
            .insert(id, (class.to_string(), fields.clone()));
        Ok(Term::ExternalInstance(id))
    }

    fn lookup(&mut self, instance: InstanceId, field: &str) -> Result<Option<Term>> {
        let (_, fields) = self
            .instances
            .get(&instance)
            .ok_or_else(|| EngineError::runtime(format!("unknown instance {}", instance)))?;
        Ok(fields.get(field).cloned())
    }

    fn isa(&mut self, instance: InstanceId, class: &str) -> Result<bool> {
        Ok(self
            .instances
            .get(&instance)
            .is_some_and(|(name, _)| name == class))
    }
}

fn results_with(engine: &Engine, query: &str, host: &mut dyn Externals) -> Vec<Bindings> {
    let mut query = engine.new_query(query).unwrap();
    let mut results = Vec::new();
    while let Some(bindings) = query.next_result(host).unwrap() {
        results.push(bindings);
    }
    results
}

fn results(engine: &Engine, query: &str) -> Vec<Bindings> {
    results_with(engine, query, &mut DictHost::default())
}

fn qeval(engine: &Engine, query: &str) -> bool {
    results(engine, query).len() == 1
}

fn qnull(engine: &Engine, query: &str) -> bool {
    results(engine, query).is_empty()
}

fn qvar(engine: &Engine, query: &str, var: &str) -> Vec<Term> {
    results(engine, query)
        .into_iter()
        .map(|bindings| bindings[var].clone())
        .collect()
}

fn loaded(src: &str) -> Engine {
    let engine = Engine::new();
    engine.load_str(src, "test.polar").unwrap();
    engine
}

fn ints(values: &[i64]) -> Vec<Term> {
    values.iter().copied().map(Term::Integer).collect()
}

fn s(value: &str) -> Term {
    Term::String(value.to_string())
}

#[test]
fn test_functions() {
    let engine = loaded("f(1); f(2); g(1); g(2); h(2); k(x) := f(x), h(x), g(x);");
    assert!(qnull(&engine, "k(1)"));
    assert!(qeval(&engine, "k(2)"));
    assert!(qnull(&engine, "k(3)"));
    assert_eq!(qvar(&engine, "k(a)", "a"), ints(&[2]));
}

#[test]
fn test_jealous() {
    let engine = loaded(
        r#"loves("vincent", "mia");
           loves("marcellus", "mia");
           jealous(a, b) := loves(a, c), loves(b, c);"#,
    );
    let pairs: Vec<(Term, Term)> = results(&engine, "jealous(who, of)")
        .into_iter()
        .map(|b| (b["who"].clone(), b["of"].clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (s("vincent"), s("vincent")),
            (s("vincent"), s("marcellus")),
            (s("marcellus"), s("vincent")),
            (s("marcellus"), s("marcellus")),
        ]
    );
}

#[test]
fn test_nested_rule() {
    let engine = loaded("f(x) := g(x); g(x) := h(x); h(2); g(x) := j(x); j(4);");
    assert!(qeval(&engine, "f(2)"));
    assert!(qnull(&engine, "f(3)"));
    assert!(qeval(&engine, "f(4)"));
}

#[test]
fn test_results_follow_declaration_order() {
    let engine = loaded("bar(2, 1); bar(1, 1); bar(1, 2); bar(2, 2);");
    let pairs: Vec<(Term, Term)> = results(&engine, "bar(a, b)")
        .into_iter()
        .map(|b| (b["a"].clone(), b["b"].clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Term::Integer(2), Term::Integer(1)),
            (Term::Integer(1), Term::Integer(1)),
            (Term::Integer(1), Term::Integer(2)),
            (Term::Integer(2), Term::Integer(2)),
        ]
    );
}

#[test]
fn test_no_applicable_rules() {
    let engine = Engine::new();
    assert!(qnull(&engine, "f()"));
    engine.load_str("f(x);", "test.polar").unwrap();
    assert!(qnull(&engine, "f()"));
}

#[test]
fn test_ait_kaci_34() {
    let engine = loaded(
        r#"a() := b(x), c(x);
           b(x) := e(x);
           c(1);
           e(x) := f(x);
           e(x) := g(x);
           f(2);
           g(1);"#,
    );
    assert!(qeval(&engine, "a()"));
}

#[test]
fn test_not() {
    let engine = loaded("odd(1); even(2);");
    assert!(qnull(&engine, "!odd(1)"));
    assert!(qeval(&engine, "!even(1)"));
    assert!(qeval(&engine, "!odd(2)"));
    assert!(qnull(&engine, "!even(2)"));

    engine
        .load_str(
            "f(x) := !a(x); a(1); b(2); g(x) := !(a(x) | b(x)), x = 3;",
            "more.polar",
        )
        .unwrap();
    assert!(qnull(&engine, "f(1)"));
    assert!(qeval(&engine, "f(2)"));
    assert!(qnull(&engine, "g(1)"));
    assert!(qnull(&engine, "g(2)"));
    assert!(qeval(&engine, "g(3)"));
}

#[test]
fn test_retries() {
    let engine = loaded("f(1); f(2); g(1); g(2); h(2); k(x) := f(x), h(x), g(x); k(3);");
    assert!(qnull(&engine, "k(1)"));
    assert_eq!(qvar(&engine, "k(a)", "a"), ints(&[2, 3]));
}

#[test]
fn test_or() {
    let engine = loaded("f(x) := a(x) | b(x); a(1); b(3);");
    assert_eq!(qvar(&engine, "f(x)", "x"), ints(&[1, 3]));
    assert!(qnull(&engine, "f(2)"));

    engine
        .load_str("g(x) := a(x) | b(x) | c(x); c(5);", "more.polar")
        .unwrap();
    assert_eq!(qvar(&engine, "g(x)", "x"), ints(&[1, 3, 5]));
}

#[test]
fn test_unify_and() {
    let engine = loaded("f(x, y) := a(x), y = 2; a(1); a(3);");
    assert_eq!(qvar(&engine, "f(x, y)", "x"), ints(&[1, 3]));
    assert_eq!(qvar(&engine, "f(x, y)", "y"), ints(&[2, 2]));
}

#[test]
fn test_bindings_through_rules() {
    let engine = loaded("f(x) := x = y, g(y); g(y) := y = 1;");
    assert_eq!(qvar(&engine, "f(x)", "x"), ints(&[1]));
}

#[test]
fn test_dictionary_lookup() {
    let engine = Engine::new();
    assert!(qeval(&engine, "{x: 1}.x = 1"));
    assert_eq!(qvar(&engine, "{x: 1} = d, d.x = result", "result"), ints(&[1]));
    // Missing fields fail the goal instead of raising.
    assert!(qnull(&engine, "{x: 1}.y = 1"));
}

#[test]
fn test_instance_lookup() {
    let engine = Engine::new();
    assert!(qeval(&engine, "Widget{x: 1}.x = 1"));
    assert!(qnull(&engine, "Widget{x: 1}.x = 2"));
}

#[test]
fn test_dict_head() {
    let engine = loaded("f({x: 1});");
    assert!(qeval(&engine, "f({x: 1})"));
    assert!(qeval(&engine, "f({x: 1, y: 2})"));
    assert!(qnull(&engine, "f(1)"));
    assert!(qnull(&engine, "f({})"));
    assert!(qnull(&engine, "f({x: 2})"));
    assert!(qnull(&engine, "f({y: 1})"));

    assert!(qeval(&engine, "f(a{x: 1})"));
    assert!(qnull(&engine, "f(a{})"));
    assert!(qnull(&engine, "f(a{x: {}})"));
    assert!(qeval(&engine, "f(a{y: 2, x: 1})"));
}

#[test]
fn test_non_instance_specializers() {
    let engine = loaded("f(x: 1) := x = 1;");
    assert!(qeval(&engine, "f(1)"));
    assert!(qnull(&engine, "f(2)"));

    engine
        .load_str("g(x: 1, y: [x]) := y = [1];", "g.polar")
        .unwrap();
    assert!(qeval(&engine, "g(1, [1])"));
    assert!(qnull(&engine, "g(1, [2])"));

    engine
        .load_str("h(x: {y: y}, x.y) := y = 1;", "h.polar")
        .unwrap();
    assert!(qeval(&engine, "h({y: 1}, 1)"));
    assert!(qnull(&engine, "h({y: 1}, 2)"));
}

#[test]
fn test_class_specializers() {
    let engine = loaded(
        r#"kind(_: Integer, "int");
           kind(_: String, "string");
           kind(_: Widget, "widget");"#,
    );
    assert_eq!(qvar(&engine, "kind(1, k)", "k"), vec![s("int")]);
    assert_eq!(qvar(&engine, r#"kind("a", k)"#, "k"), vec![s("string")]);
    assert_eq!(qvar(&engine, "kind(Widget{}, k)", "k"), vec![s("widget")]);
    assert!(qnull(&engine, "kind(Gadget{}, k)"));
}

#[test]
fn test_membership_and_comparison() {
    let engine = loaded("small(x) := x in [1, 2, 3, 4], x < 3;");
    assert_eq!(qvar(&engine, "small(x)", "x"), ints(&[1, 2]));
    assert!(qeval(&engine, "2 == 2.0"));
    assert!(qeval(&engine, r#""a" < "b""#));
    assert!(qeval(&engine, "1 != 2"));
}

#[test]
fn test_comparing_unbound_variables_raises() {
    let engine = Engine::new();
    let mut query = engine.new_query("x > 1").unwrap();
    let err = query.next_result(&mut NoExternals).unwrap_err();
    assert!(matches!(err, EngineError::UnboundVariable(name) if name == "x"));
}

#[test]
fn test_constants_are_prebound() {
    let engine = loaded("within_limit(x) := x <= LIMIT;");
    engine.register_constant("LIMIT", Term::Integer(10));
    assert!(qeval(&engine, "within_limit(3)"));
    assert!(qnull(&engine, "within_limit(11)"));
    // Constants never appear as result bindings.
    assert!(results(&engine, "LIMIT = x")[0].get("LIMIT").is_none());
}

#[test]
fn test_native_predicates_enumerate_outputs() {
    let engine = loaded("digit(d) := digits(10, d);");
    engine.register_native(
        "digits",
        std::sync::Arc::new(|args: &[Term]| -> Result<Vec<Term>> {
            match args {
                [Term::Integer(n)] => Ok((0..*n).map(Term::Integer).collect()),
                _ => Err(EngineError::runtime("digits expects an integer")),
            }
        }),
    );
    assert_eq!(qvar(&engine, "digit(d)", "d").len(), 10);
    assert!(qeval(&engine, "digit(7)"));
    assert!(qnull(&engine, "digit(12)"));
}

#[test]
fn test_wildcards_are_independent() {
    let engine = loaded("pair(_, _);");
    assert!(qeval(&engine, "pair(1, 2)"));
}

proptest! {
    #[test]
    fn solutions_follow_fact_order(values in proptest::collection::vec(-100i64..100, 1..8)) {
        let src: String = values.iter().map(|v| format!("foo({});", v)).collect();
        let engine = loaded(&src);
        prop_assert_eq!(qvar(&engine, "foo(a)", "a"), ints(&values));
    }
}
