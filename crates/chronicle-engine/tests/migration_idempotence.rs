use chronicle_engine::{deep_merge_defaults, migrate_settings, SETTINGS_VERSION};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};

#[test]
fn full_chain_from_v0_is_idempotent() {
    let legacy = json!({
        "trackerConfig": {
            "stats": {"health": true, "arousal": true},
            "statusFields": ["physicalState", "mentalState"]
        },
        "lockedItems": ["stats.health", "characters.Mira.relationship.trust"]
    });
    let once = migrate_settings(&legacy);
    let twice = migrate_settings(&once);
    assert_eq!(once, twice);
    assert_eq!(once["settingsVersion"], json!(SETTINGS_VERSION));
}

#[test]
fn partial_prior_upgrade_is_completed() {
    // A restored envelope already carrying the v1 shape at version 0.
    let restored = json!({
        "settingsVersion": 0,
        "trackerConfig": {
            "stats": [{"id": "health", "label": "Health", "enabled": true}],
            "statusFields": ["physicalState"]
        },
        "lockedItems": ["stats.health"]
    });
    let migrated = migrate_settings(&restored);
    assert_eq!(migrated["settingsVersion"], json!(SETTINGS_VERSION));
    assert_eq!(
        migrated["trackerConfig"]["stats"],
        json!([{"id": "health", "label": "Health", "enabled": true}])
    );
    assert_eq!(
        migrated["trackerConfig"]["statusFields"][0],
        json!({"name": "physicalState", "description": ""})
    );
    assert_eq!(migrated["lockedItems"]["stats"], json!({"health": true}));
}

fn arbitrary_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (0..1000i64).prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    /// Merging an empty target produces exactly the defaults.
    #[test]
    fn defaults_completeness_empty_target(defaults in arbitrary_value()) {
        let mut target = json!({});
        deep_merge_defaults(&mut target, &defaults);
        if defaults.is_object() {
            prop_assert_eq!(target, defaults);
        } else {
            prop_assert_eq!(target, json!({}));
        }
    }

    /// The merge never drops or replaces a key present in the partial
    /// input.
    #[test]
    fn defaults_merge_preserves_existing(
        partial in arbitrary_value(),
        defaults in arbitrary_value(),
    ) {
        let mut merged = partial.clone();
        deep_merge_defaults(&mut merged, &defaults);
        prop_assert!(preserves(&partial, &merged));
    }

    /// Migration is idempotent for arbitrary envelopes, valid or not.
    #[test]
    fn migration_idempotent_on_arbitrary_input(envelope in arbitrary_value()) {
        let once = migrate_settings(&envelope);
        let twice = migrate_settings(&once);
        prop_assert_eq!(once, twice);
    }
}

/// Every leaf of `original` is still present and unchanged in `merged`,
/// except objects which may have gained keys.
fn preserves(original: &Value, merged: &Value) -> bool {
    match (original, merged) {
        (Value::Object(before), Value::Object(after)) => before.iter().all(|(key, value)| {
            after
                .get(key)
                .is_some_and(|after_value| preserves(value, after_value))
        }),
        (before, after) => before == after,
    }
}
