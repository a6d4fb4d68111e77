use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};
use std::hint::black_box;
use trie_enforcer::{
    AuthorizationContext, Permissions, Policy, PolicyEnforcer, PolicyEntry, ResourceKey,
    TrieBasedPolicyEnforcer,
};

/// One entry per feature: the owner may read everything, each feature has its
/// own reader and its own hidden `secret` property.
fn build_feature_policy(feature_count: usize) -> Policy {
    let mut policy = Policy::new("bench:thing").entry(
        PolicyEntry::new("owner")
            .subject("owner")
            .grant(ResourceKey::new("thing", "/"), ["READ", "WRITE"]),
    );

    for index in 0..feature_count {
        policy = policy.entry(
            PolicyEntry::new(format!("feature_{index}"))
                .subject(format!("reader_{index}"))
                .grant(
                    ResourceKey::new("thing", &format!("/features/f{index}")),
                    ["READ"],
                )
                .revoke(
                    ResourceKey::new("thing", &format!("/features/f{index}/properties/secret")),
                    ["READ"],
                ),
        );
    }

    policy
}

fn build_feature_document(feature_count: usize) -> Map<String, Value> {
    let features: Map<String, Value> = (0..feature_count)
        .map(|index| {
            (
                format!("f{index}"),
                json!({ "properties": { "value": index, "secret": "s", "unit": "C" } }),
            )
        })
        .collect();
    let mut document = Map::new();
    document.insert("features".to_string(), Value::Object(features));
    document
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("trie_enforcer_new");

    for &feature_count in &[1usize, 16, 64, 256] {
        let policy = build_feature_policy(feature_count);
        group.bench_with_input(
            BenchmarkId::new("features", feature_count),
            &policy,
            |b, policy| {
                b.iter(|| black_box(TrieBasedPolicyEnforcer::new(policy)));
            },
        );
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let read = Permissions::new(["READ"]);
    let reader = AuthorizationContext::new(["reader_0"]);
    let deep_key = ResourceKey::new("thing", "/features/f0/properties/value/unit");
    let root = ResourceKey::new("thing", "/");
    let mut group = c.benchmark_group("trie_enforcer_queries");

    for &feature_count in &[1usize, 16, 64, 256] {
        let enforcer = TrieBasedPolicyEnforcer::new(&build_feature_policy(feature_count));
        let document = build_feature_document(feature_count);

        group.bench_with_input(
            BenchmarkId::new("unrestricted_fallback", feature_count),
            &enforcer,
            |b, enforcer| {
                b.iter(|| {
                    black_box(enforcer.has_unrestricted_permissions(&deep_key, &reader, &read))
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("partial_root", feature_count),
            &enforcer,
            |b, enforcer| {
                b.iter(|| black_box(enforcer.has_partial_permissions(&root, &reader, &read)));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("json_view", feature_count),
            &(enforcer, document),
            |b, (enforcer, document)| {
                b.iter(|| black_box(enforcer.build_json_view(&root, document, &reader, &read)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_construction, bench_queries);
criterion_main!(benches);
