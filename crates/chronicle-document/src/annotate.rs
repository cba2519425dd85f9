//! Lock annotation for the generator boundary
//!
//! Before a document is shown to the generator, every locked field is
//! annotated with a machine-readable marker the generator is instructed to
//! preserve literally: primitive leaves become `{"value": .., "locked": true}`,
//! object leaves get `"locked": true` merged in, and a fully locked section
//! (or array) annotates every current child individually rather than
//! marking the parent alone.
//!
//! [`remove_locks`] is the exact inverse: it deletes `locked` keys *and*
//! unwraps the primitive wrapper, so stripping an annotated document yields
//! the original back.

use serde_json::Value;

use crate::locks::{LockNode, LockRegistry};
use crate::matcher;
use crate::path::{PathSegment, Section};

/// Annotate a serialized document with lock markers
///
/// Dangling lock paths (naming fields the document does not currently
/// have) annotate nothing. A non-object document is returned unchanged.
#[must_use]
pub fn apply_locks(document: &Value, registry: &LockRegistry) -> Value {
    let mut annotated = document.clone();
    let Some(object) = annotated.as_object_mut() else {
        return annotated;
    };
    for section in Section::ALL {
        let Some(node) = registry.section_node(section) else {
            continue;
        };
        let Some(key) =
            matcher::resolve_key(object.keys().map(String::as_str), section.as_str())
                .map(str::to_string)
        else {
            continue;
        };
        if let Some(value) = object.get_mut(&key) {
            if node.is_locked() {
                lock_children(value);
            } else {
                annotate_node(value, node);
            }
        }
    }
    annotated
}

/// Strip every lock marker from a document
///
/// Deletes `locked` keys from objects and unwraps
/// `{"value": .., "locked": ..}` wrappers back to the bare value, so
/// `remove_locks(apply_locks(doc, reg)) == doc` for lock-free inputs.
#[must_use]
pub fn remove_locks(document: &Value) -> Value {
    match document {
        Value::Object(map) => {
            if is_wrapper(map) {
                return remove_locks(&map["value"]);
            }
            Value::Object(
                map.iter()
                    .filter(|(key, _)| key.as_str() != "locked")
                    .map(|(key, value)| (key.clone(), remove_locks(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(remove_locks).collect()),
        other => other.clone(),
    }
}

fn is_wrapper(map: &serde_json::Map<String, Value>) -> bool {
    map.len() == 2 && map.contains_key("locked") && map.contains_key("value")
}

/// Mark one value as locked: wrap primitives, tag objects, recurse arrays
fn mark_locked(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.insert("locked".to_string(), Value::Bool(true));
        }
        Value::Array(items) => {
            for item in items {
                mark_locked(item);
            }
        }
        primitive => {
            let inner = primitive.take();
            *primitive = serde_json::json!({"value": inner, "locked": true});
        }
    }
}

/// A fully locked section annotates every current child individually
fn lock_children(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                mark_locked(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                mark_locked(item);
            }
        }
        primitive => mark_locked(primitive),
    }
}

fn annotate_node(value: &mut Value, node: &LockNode) {
    for (lock_key, child) in node.children() {
        let Ok(segment) = lock_key.parse::<PathSegment>() else {
            continue;
        };
        match value {
            Value::Object(map) => annotate_object_child(map, &segment, child),
            Value::Array(items) => annotate_array_child(items, &segment, child),
            _ => {}
        }
    }
}

fn annotate_object_child(
    map: &mut serde_json::Map<String, Value>,
    segment: &PathSegment,
    node: &LockNode,
) {
    let Some(concrete) =
        matcher::resolve_key(map.keys().map(String::as_str), segment.name()).map(str::to_string)
    else {
        return;
    };
    let Some(target) = map.get_mut(&concrete) else {
        return;
    };
    let target = match segment.index() {
        Some(i) => match target.as_array_mut().and_then(|items| items.get_mut(i)) {
            Some(element) => element,
            None => return,
        },
        None => target,
    };
    if node.is_locked() {
        mark_locked(target);
    } else {
        annotate_node(target, node);
    }
}

/// Array nodes are keyed by entity name (characters); match on `name`
fn annotate_array_child(items: &mut [Value], segment: &PathSegment, node: &LockNode) {
    for item in items.iter_mut() {
        let matches = item
            .as_object()
            .and_then(|o| matcher::resolve_value(o, "name"))
            .and_then(Value::as_str)
            .is_some_and(|name| matcher::keys_match(name, segment.name()));
        if matches {
            if node.is_locked() {
                mark_locked(item);
            } else {
                annotate_node(item, node);
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FieldPath;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry_with(section: Section, path: &str) -> LockRegistry {
        let mut registry = LockRegistry::new();
        registry
            .set_item_lock(section, path, true)
            .expect("valid path");
        registry
    }

    #[test]
    fn primitive_leaf_is_wrapped() {
        let doc = json!({"stats": {"health": 80, "stamina": 55}});
        let annotated = apply_locks(&doc, &registry_with(Section::Stats, "health"));
        assert_eq!(
            annotated,
            json!({"stats": {
                "health": {"value": 80, "locked": true},
                "stamina": 55
            }})
        );
    }

    #[test]
    fn leaf_lock_survives_key_drift() {
        let doc = json!({"status": {"fields": {"physical_state": "tired"}}});
        let annotated = apply_locks(&doc, &registry_with(Section::Status, "fields.physicalState"));
        assert_eq!(
            annotated["status"]["fields"]["physical_state"],
            json!({"value": "tired", "locked": true})
        );
    }

    #[test]
    fn section_lock_annotates_each_child() {
        let mut registry = LockRegistry::new();
        registry.set_lock(Section::Stats, &FieldPath::root(), true);
        let doc = json!({"stats": {"health": 80, "stamina": 55}});
        let annotated = apply_locks(&doc, &registry);
        assert_eq!(
            annotated,
            json!({"stats": {
                "health": {"value": 80, "locked": true},
                "stamina": {"value": 55, "locked": true}
            }})
        );
    }

    #[test]
    fn locked_array_annotates_per_element() {
        let doc = json!({"inventory": {"onPerson": [{"name": "Sword"}, "rope"]}});
        let annotated = apply_locks(&doc, &registry_with(Section::Inventory, "onPerson"));
        assert_eq!(
            annotated["inventory"]["onPerson"],
            json!([
                {"name": "Sword", "locked": true},
                {"value": "rope", "locked": true}
            ])
        );
    }

    #[test]
    fn indexed_lock_marks_single_element() {
        let doc = json!({"quests": {"optional": [{"name": "A"}, {"name": "B"}]}});
        let annotated = apply_locks(&doc, &registry_with(Section::Quests, "optional[1]"));
        assert_eq!(
            annotated["quests"]["optional"],
            json!([{"name": "A"}, {"name": "B", "locked": true}])
        );
    }

    #[test]
    fn character_lock_matches_by_name() {
        let doc = json!({"characters": [
            {"name": "Mira", "relationship": {"trust": 40}},
            {"name": "Old Marta", "relationship": {"trust": 10}}
        ]});
        let annotated = apply_locks(
            &doc,
            &registry_with(Section::Characters, "old_marta.relationship.trust"),
        );
        assert_eq!(
            annotated["characters"][1]["relationship"]["trust"],
            json!({"value": 10, "locked": true})
        );
        assert_eq!(annotated["characters"][0], doc["characters"][0]);
    }

    #[test]
    fn dangling_lock_annotates_nothing() {
        let doc = json!({"stats": {"health": 80}});
        let annotated = apply_locks(&doc, &registry_with(Section::Stats, "no_such_stat"));
        assert_eq!(annotated, doc);
    }

    #[test]
    fn remove_unwraps_and_strips() {
        let annotated = json!({
            "stats": {"health": {"value": 80, "locked": true}},
            "characters": [{"name": "Mira", "locked": true}]
        });
        assert_eq!(
            remove_locks(&annotated),
            json!({
                "stats": {"health": 80},
                "characters": [{"name": "Mira"}]
            })
        );
    }

    #[test]
    fn roundtrip_is_identity() {
        let doc = json!({
            "stats": {"health": 80, "stamina": 55},
            "inventory": {"onPerson": [{"name": "Sword"}], "stored": {}, "assets": []},
            "characters": [{"name": "Mira", "relationship": {"trust": 40}}]
        });
        let mut registry = LockRegistry::new();
        registry.set_item_lock(Section::Stats, "health", true).unwrap();
        registry.set_item_lock(Section::Inventory, "onPerson[0]", true).unwrap();
        registry
            .set_item_lock(Section::Characters, "Mira.relationship.trust", true)
            .unwrap();
        assert_eq!(remove_locks(&apply_locks(&doc, &registry)), doc);
    }
}
