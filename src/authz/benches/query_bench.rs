//! Query benchmarks
//!
//! Measures a role-based permission check end to end (query creation, role
//! inheritance through the native resolver, result marshaling) as the number
//! of role grants grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use warden_authz::{HostValue, Warden, WardenConfig};

const POLICY: &str = r#"
role_order(_, ["OWNER", "EDITOR", "VIEWER"]);
actor_role(actor, role, org) := grant in org.grants, grant.user = actor, role = grant.role;
role_allow("VIEWER", "read", _);
role_allow("EDITOR", "write", _);
allow(actor, action, resource) := role_allows(actor, action, resource);
"#;

fn org_with_grants(count: usize) -> HostValue {
    let grants: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            json!({
                "user": format!("user-{}", i),
                "role": if i % 3 == 0 { "OWNER" } else { "VIEWER" },
            })
        })
        .collect();
    json!({ "name": "acme", "grants": grants }).into()
}

fn warden() -> Warden {
    let config = WardenConfig {
        enable_roles: true,
        ..WardenConfig::default()
    };
    let warden = Warden::with_config(config).unwrap();
    warden.load_str(POLICY, Some("bench.polar")).unwrap();
    warden
}

fn bench_is_allowed(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_allowed");
    let warden = warden();

    for grant_count in [10, 100, 1000].iter() {
        let org = org_with_grants(*grant_count);
        group.bench_with_input(
            BenchmarkId::new("grants", grant_count),
            grant_count,
            |b, _| {
                b.iter(|| {
                    warden
                        .is_allowed(black_box("user-0"), black_box("write"), org.clone())
                        .unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_enumerate_actions(c: &mut Criterion) {
    let warden = warden();
    let org = org_with_grants(10);

    c.bench_function("enumerate_actions", |b| {
        b.iter(|| {
            let query = warden
                .query_rule(
                    "allow",
                    vec!["user-0".into(), HostValue::var("action"), org.clone()],
                )
                .unwrap();
            query.results().count()
        })
    });
}

criterion_group!(benches, bench_is_allowed, bench_enumerate_actions);
criterion_main!(benches);
