//! Loads a policy document, then shows what a guest may read of a thing and why.
//!
//! Run with `RUST_LOG=trie_enforcer=trace` to see the enforcer's events.

use serde_json::json;
use trie_enforcer::*;

const POLICY: &str = r#"{
    "policyId": "org.example:greenhouse",
    "entries": {
        "owner": {
            "subjects": { "issuer:owner": { "type": "user" } },
            "resources": {
                "thing:/": { "grant": ["READ", "WRITE"], "revoke": [] }
            }
        },
        "guest": {
            "subjects": { "issuer:guest": { "type": "user" } },
            "resources": {
                "thing:/features/climate": { "grant": ["READ"], "revoke": [] },
                "thing:/features/climate/properties/calibration": { "grant": [], "revoke": ["READ"] }
            }
        }
    }
}"#;

fn main() -> Result<(), PolicyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let policy = Policy::from_json(POLICY)?;
    let enforcer = TrieBasedPolicyEnforcer::new(&policy);

    let thing = json!({
        "thingId": "org.example:greenhouse-1",
        "attributes": { "location": "north wing" },
        "features": {
            "climate": {
                "properties": {
                    "temperature": 23.1,
                    "humidity": 61,
                    "calibration": { "offset": -0.4 }
                }
            },
            "irrigation": { "properties": { "valve": "closed" } }
        }
    });
    let fields = thing
        .as_object()
        .ok_or_else(|| PolicyError::invalid_document("thing is not an object"))?;

    let guest = AuthorizationContext::new(["issuer:guest"]);
    let read = Permissions::new(["READ"]);
    let root = ResourceKey::new("thing", "/");

    let view = enforcer.build_json_view(&root, fields, &guest, &read);
    println!("Guest view:\n{}", serde_json::to_string_pretty(&view)?);

    for key in [
        root.clone(),
        "thing:/features/climate".parse()?,
        "thing:/features/climate/properties/temperature".parse()?,
    ] {
        for coverage in [Coverage::Partial, Coverage::Unrestricted] {
            let evaluation = enforcer.evaluate_access(&key, &guest, &read, coverage);
            println!("\n{key} ({coverage}):\n{}", evaluation.display_trace());
        }
    }

    let readers = enforcer.subject_ids_with_partial_permission(&root, &read);
    println!("\nSubjects that can read part of the thing: {readers:?}");

    Ok(())
}
