use chronicle_document::{apply_locks, remove_locks, FieldPath, LockRegistry, Section};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};

fn sample_document(stats: &[(String, i32)], items: &[String]) -> Value {
    json!({
        "version": 2,
        "stats": stats
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect::<serde_json::Map<String, Value>>(),
        "inventory": {
            "onPerson": items.iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
            "stored": {},
            "assets": []
        },
        "characters": [
            {"name": "Mira", "relationship": {"trust": 40}}
        ]
    })
}

#[test]
fn empty_registry_annotates_nothing() {
    let doc = sample_document(&[("health".to_string(), 80)], &["Sword".to_string()]);
    assert_eq!(apply_locks(&doc, &LockRegistry::new()), doc);
}

#[test]
fn set_then_clear_restores_registry() {
    let mut registry = LockRegistry::new();
    let path: FieldPath = "onPerson[0]".parse().unwrap();
    registry.set_lock(Section::Inventory, &path, true);
    assert!(registry.is_locked(Section::Inventory, &path));
    registry.set_lock(Section::Inventory, &path, false);
    assert!(!registry.is_locked(Section::Inventory, &path));
    assert!(registry.is_empty());
}

proptest! {
    #[test]
    fn annotation_roundtrip_is_identity(
        stats in proptest::collection::vec(("[a-z][a-z0-9_]{0,8}", 0..100i32), 0..6),
        items in proptest::collection::vec("[A-Z][a-z]{0,8}", 0..4),
        lock_stats in proptest::collection::vec(any::<bool>(), 6),
        lock_character in any::<bool>(),
    ) {
        let stats: Vec<(String, i32)> = stats;
        let doc = sample_document(&stats, &items);

        let mut registry = LockRegistry::new();
        for ((name, _), lock) in stats.iter().zip(lock_stats.iter()) {
            if *lock {
                registry.set_item_lock(Section::Stats, name, true).unwrap();
            }
        }
        if lock_character {
            registry
                .set_item_lock(Section::Characters, "Mira.relationship.trust", true)
                .unwrap();
        }

        let annotated = apply_locks(&doc, &registry);
        prop_assert_eq!(remove_locks(&annotated), doc);
    }

    #[test]
    fn locked_leaves_carry_markers(
        value in 0..100i32,
    ) {
        let doc = sample_document(&[("health".to_string(), value)], &[]);
        let mut registry = LockRegistry::new();
        registry.set_item_lock(Section::Stats, "health", true).unwrap();

        let annotated = apply_locks(&doc, &registry);
        prop_assert_eq!(
            &annotated["stats"]["health"],
            &json!({"value": value, "locked": true})
        );
    }
}
