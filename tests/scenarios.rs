use serde_json::json;
use std::collections::BTreeSet;
use trie_enforcer::*;
use uuid::Uuid;

fn thing(pointer: &str) -> ResourceKey {
    ResourceKey::new("thing", pointer)
}

fn subject() -> String {
    format!("issuer:{}", Uuid::new_v4())
}

fn read() -> Permissions {
    Permissions::new(["READ"])
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("trie_enforcer=trace")
        .try_init();
}

#[test]
fn grant_then_revoke_subresource() {
    let s = subject();
    let policy = Policy::new("ns:scenario-a").entry(
        PolicyEntry::new("owner")
            .subject(s.as_str())
            .grant(thing("/"), ["READ", "WRITE"])
            .revoke(thing("/attributes"), ["READ", "WRITE"])
            .grant(thing("/attributes/location"), ["READ"]),
    );
    let enforcer = TrieBasedPolicyEnforcer::new(&policy);
    let context = AuthorizationContext::new([s.as_str()]);

    assert!(!enforcer.has_unrestricted_permissions(&thing("/"), &context, &read()));

    let document = json!({
        "thingId": "ns:lamp",
        "attributes": {
            "location": { "latitude": 44.673856, "longitude": 8.261719 },
            "manufacturer": "ACME"
        },
        "features": { "x": { "properties": { "on": false } } }
    });
    let view = enforcer.build_json_view(
        &thing("/"),
        document.as_object().unwrap(),
        &context,
        &read(),
    );
    assert_eq!(
        view,
        json!({
            "thingId": "ns:lamp",
            "attributes": {
                "location": { "latitude": 44.673856, "longitude": 8.261719 }
            },
            "features": { "x": { "properties": { "on": false } } }
        })
    );

    // WRITE stays revoked below /attributes.
    let write = Permissions::new(["WRITE"]);
    assert!(!enforcer.has_partial_permissions(&thing("/attributes/location"), &context, &write));
    assert!(enforcer.has_unrestricted_permissions(&thing("/features"), &context, &write));
}

#[test]
fn partial_permission_via_descendant() {
    let s = subject();
    let policy = Policy::new("ns:scenario-b").entry(
        PolicyEntry::new("feature-reader")
            .subject(s.as_str())
            .grant(thing("/features/foo"), ["READ"]),
    );
    let enforcer = TrieBasedPolicyEnforcer::new(&policy);
    let context = AuthorizationContext::new([s.as_str()]);

    assert!(enforcer.has_partial_permissions(&thing("/features"), &context, &read()));
    assert!(!enforcer.has_unrestricted_permissions(&thing("/features"), &context, &read()));
    assert!(enforcer.has_unrestricted_permissions(&thing("/features/foo"), &context, &read()));
    assert!(enforcer.has_unrestricted_permissions(
        &thing("/features/foo/properties/temperature"),
        &context,
        &read()
    ));
    assert!(!enforcer.has_partial_permissions(&thing("/features/bar"), &context, &read()));
}

#[test]
fn unknown_resource_type_yields_empty_view() {
    let s = subject();
    let policy = Policy::new("ns:scenario-c").entry(
        PolicyEntry::new("owner")
            .subject(s.as_str())
            .grant(thing("/"), ["READ", "WRITE"]),
    );
    let enforcer = TrieBasedPolicyEnforcer::new(&policy);
    let context = AuthorizationContext::new([s.as_str()]);
    let document = json!({ "subject": "hello", "payload": { "value": 1 } });

    let view = enforcer.build_json_view(
        &ResourceKey::new("message", "/"),
        document.as_object().unwrap(),
        &context,
        &read(),
    );
    assert_eq!(view, json!({}));
}

#[test]
fn effected_subject_ids_split_grants_and_revokes() {
    let policy = Policy::new("ns:scenario-d")
        .entry(
            PolicyEntry::new("granted")
                .subject("A")
                .grant(thing("/x"), ["READ"]),
        )
        .entry(
            PolicyEntry::new("revoked")
                .subject("B")
                .revoke(thing("/x"), ["READ"]),
        );
    let enforcer = TrieBasedPolicyEnforcer::new(&policy);

    let effected = enforcer.effected_subject_ids(&thing("/x"), &read());
    assert_eq!(effected.granted, set(&["A"]));
    assert_eq!(effected.revoked, set(&["B"]));

    // Below /x the same subjects are affected through inheritance.
    let below = enforcer.effected_subject_ids(&thing("/x/y/z"), &read());
    assert_eq!(below, effected);
}

#[test]
fn subjects_can_combine_their_grants() {
    let policy = Policy::new("ns:groups")
        .entry(
            PolicyEntry::new("readers")
                .subject("group:readers")
                .grant(thing("/"), ["READ"]),
        )
        .entry(
            PolicyEntry::new("writers")
                .subject("group:writers")
                .grant(thing("/"), ["WRITE"]),
        );
    let enforcer = TrieBasedPolicyEnforcer::new(&policy);
    let read_write = Permissions::new(["READ", "WRITE"]);

    let both = AuthorizationContext::new(["group:readers", "group:writers"]);
    assert!(enforcer.has_unrestricted_permissions(&thing("/"), &both, &read_write));

    let readers = AuthorizationContext::new(["group:readers"]);
    assert!(!enforcer.has_unrestricted_permissions(&thing("/"), &readers, &read_write));

    // Neither group alone holds both permissions.
    assert!(enforcer
        .subject_ids_with_unrestricted_permission(&thing("/"), &read_write)
        .is_empty());
}

#[test]
fn policy_document_drives_enforcement() {
    init_tracing();
    let policy = Policy::from_json(
        r#"{
            "policyId": "org.example:sensor",
            "entries": {
                "owner": {
                    "subjects": { "issuer:owner": { "type": "user" } },
                    "resources": {
                        "thing:/": { "grant": ["READ", "WRITE"], "revoke": [] },
                        "policy:/": { "grant": ["READ", "WRITE"], "revoke": [] }
                    }
                },
                "guest": {
                    "subjects": { "issuer:guest": { "type": "user" } },
                    "resources": {
                        "thing:/features/temperature": { "grant": ["READ"], "revoke": [] },
                        "thing:/features/temperature/properties/calibration": {
                            "grant": [], "revoke": ["READ"]
                        }
                    }
                }
            }
        }"#,
    )
    .unwrap();
    let enforcer = TrieBasedPolicyEnforcer::new(&policy);
    let guest = AuthorizationContext::new(["issuer:guest"]);
    let owner = AuthorizationContext::new(["issuer:owner"]);

    assert!(enforcer.has_partial_permissions(&thing("/"), &guest, &read()));
    assert!(!enforcer.has_unrestricted_permissions(
        &thing("/features/temperature"),
        &guest,
        &read()
    ));
    assert!(enforcer.has_unrestricted_permissions(
        &thing("/features/temperature/properties/value"),
        &guest,
        &read()
    ));
    assert!(enforcer.has_unrestricted_permissions(
        &ResourceKey::new("policy", "/entries"),
        &owner,
        &Permissions::new(["WRITE"])
    ));

    let document = json!({
        "features": {
            "temperature": { "properties": { "value": 21.5, "calibration": { "offset": 0.3 } } },
            "humidity": { "properties": { "value": 40 } }
        }
    });
    let guest_view = enforcer.build_json_view(
        &thing("/"),
        document.as_object().unwrap(),
        &guest,
        &read(),
    );
    assert_eq!(
        guest_view,
        json!({ "features": { "temperature": { "properties": { "value": 21.5 } } } })
    );

    let owner_view = enforcer.build_json_view(
        &thing("/"),
        document.as_object().unwrap(),
        &owner,
        &read(),
    );
    assert_eq!(owner_view, document);
}

#[test]
fn explained_denial_names_the_aggregating_node() {
    init_tracing();
    let s = subject();
    let policy = Policy::new("ns:explain").entry(
        PolicyEntry::new("owner")
            .subject(s.as_str())
            .grant(thing("/"), ["READ"])
            .revoke(thing("/attributes/secret"), ["READ"]),
    );
    let enforcer = TrieBasedPolicyEnforcer::new(&policy);
    let context = AuthorizationContext::new([s.as_str()]);

    let evaluation =
        enforcer.evaluate_access(&thing("/attributes"), &context, &read(), Coverage::Unrestricted);
    let error = evaluation
        .to_result(|reason| format!("forbidden: {reason}"))
        .unwrap_err();
    assert_eq!(
        error,
        "forbidden: Revoke at weight 1 overrides grant at weight -1"
    );
    assert!(evaluation
        .display_trace()
        .contains("bottom-up-revoke @ /thing/attributes (exact)"));
}
