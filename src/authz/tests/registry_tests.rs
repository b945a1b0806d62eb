//! Class and constant registration as seen from policies

mod common;

use common::{build_widget, collect_var, Org, Repo, Widget};
use warden_authz::{HostValue, Instance, PolarError, Warden};

#[test]
fn test_same_name_different_type_is_rejected() {
    let warden = Warden::new();
    warden.register_class::<Org>("Org").unwrap();

    let err = warden.register_class::<Repo>("Org").unwrap_err();
    match err {
        PolarError::DuplicateRegistration { name, existing } => {
            assert_eq!(name, "Org");
            assert!(existing.ends_with("Org"));
        }
        other => panic!("expected DuplicateRegistration, got {:?}", other),
    }
}

#[test]
fn test_same_type_rebinds_and_aliases() {
    let warden = Warden::new();
    warden.register_class::<Org>("Org").unwrap();
    warden.register_class::<Org>("Org").unwrap();
    warden.register_class::<Org>("Organization").unwrap();

    warden
        .load_str(
            "is_org(_: Org); is_organization(_: Organization);",
            Some("orgs.polar"),
        )
        .unwrap();
    let org = Instance::new(Org { name: "acme".into() });
    assert!(warden
        .query_rule("is_org", vec![org.clone().into()])
        .unwrap()
        .has_next()
        .unwrap());
    assert!(warden
        .query_rule("is_organization", vec![org.into()])
        .unwrap()
        .has_next()
        .unwrap());
}

#[test]
fn test_specializer_rejects_other_types() {
    let warden = Warden::new();
    warden.register_class::<Org>("Org").unwrap();
    warden.register_class::<Widget>("Widget").unwrap();
    warden.load_str("is_org(_: Org);", Some("orgs.polar")).unwrap();

    let widget = Instance::new(Widget { id: 1 });
    let mut query = warden.query_rule("is_org", vec![widget.into()]).unwrap();
    assert!(!query.has_next().unwrap());

    // Plain values never match a class specializer.
    let mut query = warden.query_rule("is_org", vec!["acme".into()]).unwrap();
    assert!(!query.has_next().unwrap());
}

#[test]
fn test_constructor_builds_instance_literal() {
    let warden = Warden::new();
    warden
        .register_class_with_constructor::<Widget, _>("Widget", build_widget)
        .unwrap();

    let mut query = warden.query("w = Widget{id: 7}, w.id = 7").unwrap();
    assert!(query.has_next().unwrap());
    let bindings = query.next().unwrap();
    let widget = bindings.get("w").and_then(HostValue::as_instance).unwrap();
    assert_eq!(widget.downcast_ref::<Widget>().unwrap().id, 7);
}

#[test]
fn test_constructor_error_surfaces_unchanged() {
    let warden = Warden::new();
    warden
        .register_class_with_constructor::<Widget, _>("Widget", build_widget)
        .unwrap();

    let mut query = warden.query(r#"w = Widget{id: "seven"}"#).unwrap();
    assert!(matches!(query.has_next(), Err(PolarError::Runtime(_))));
    assert!(!query.has_next().unwrap());
}

#[test]
fn test_missing_constructor() {
    let warden = Warden::new();
    warden.register_class::<Org>("Org").unwrap();

    let mut query = warden.query(r#"o = Org{name: "acme"}"#).unwrap();
    match query.has_next() {
        Err(PolarError::UnknownConstructor(class)) => assert_eq!(class, "Org"),
        other => panic!("expected UnknownConstructor, got {:?}", other),
    }

    let mut query = warden.query("g = Gadget{}").unwrap();
    assert!(matches!(
        query.has_next(),
        Err(PolarError::UnknownConstructor(_))
    ));
}

#[test]
fn test_open_query_keeps_class_snapshot() {
    let warden = Warden::new();
    let mut before = warden.query("w = Widget{id: 1}").unwrap();

    warden
        .register_class_with_constructor::<Widget, _>("Widget", build_widget)
        .unwrap();

    assert!(matches!(
        before.has_next(),
        Err(PolarError::UnknownConstructor(_))
    ));
    let mut after = warden.query("w = Widget{id: 1}").unwrap();
    assert!(after.has_next().unwrap());
}

#[test]
fn test_constants() {
    let warden = Warden::new();
    warden
        .load_str("within_limit(x) := x <= LIMIT;", Some("limits.polar"))
        .unwrap();
    let mut before = warden.query("x = LIMIT").unwrap();

    warden.register_constant("LIMIT", 10).unwrap();

    // Opened before registration: LIMIT is just another query variable.
    assert!(before.has_next().unwrap());
    let bindings = before.next().unwrap();
    assert!(matches!(bindings.get("x"), Some(HostValue::Variable(_))));

    assert_eq!(collect_var(&warden, "x = LIMIT", "x"), vec![HostValue::Integer(10)]);
    assert!(warden.query("within_limit(3)").unwrap().has_next().unwrap());
    assert!(!warden.query("within_limit(30)").unwrap().has_next().unwrap());
}

#[test]
fn test_instance_constant() {
    let warden = Warden::new();
    warden.register_class::<Org>("Org").unwrap();
    let acme = Instance::new(Org { name: "acme".into() });
    warden.register_constant("ACME", acme.clone()).unwrap();

    let values = collect_var(&warden, "x = ACME, x.name = \"acme\"", "x");
    assert_eq!(values.len(), 1);
    assert!(values[0].as_instance().unwrap().ptr_eq(&acme));
}

#[test]
fn test_variable_constant_rejected() {
    let warden = Warden::new();
    assert!(matches!(
        warden.register_constant("X", HostValue::var("y")),
        Err(PolarError::Marshal(_))
    ));
}
