//! Tolerant decoding at the persistence and generator boundaries
//!
//! All duck typing lives here, in one place: raw `serde_json::Value`
//! envelopes come in, a typed [`TrackerDocument`] comes out. Section keys
//! and field names are resolved through the drift-tolerant matcher, wrong
//! types reset only the offending subtree to its documented default, and
//! every such repair is logged and flips the `dirty` flag so the caller
//! re-persists the healed form.
//!
//! Input is expected to be free of lock annotations; strip with
//! [`crate::annotate::remove_locks`] first when decoding a generator
//! response.

use serde_json::Value;

use crate::document::{
    Character, Inventory, Item, JsonMap, Quest, Quests, Skill, Status, TrackerDocument,
};
use crate::matcher;

/// A decoded document plus whether any subtree had to be repaired
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The typed document
    pub document: TrackerDocument,
    /// True when some subtree was reset or skipped and the healed form
    /// should be re-persisted
    pub dirty: bool,
}

/// Errors from boundary decoding
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The payload is not a JSON object at the top level
    #[error("document payload is not a JSON object")]
    NotAnObject,
}

/// Decode a raw document envelope into typed form
///
/// # Errors
/// Returns [`DocumentError::NotAnObject`] when the payload is not an
/// object; every lesser problem degrades to a per-subtree default instead.
pub fn decode_document(value: &Value) -> Result<Decoded, DocumentError> {
    let object = value.as_object().ok_or(DocumentError::NotAnObject)?;
    let mut dirty = false;

    let mut document = TrackerDocument::default();
    document.version = field(object, "version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);

    document.stats = decode_stats(field(object, "stats"), &mut dirty);
    document.status = decode_status(field(object, "status"), &mut dirty);
    document.attributes = decode_attributes(field(object, "attributes"), &mut dirty);
    document.skills = decode_skills(field(object, "skills"), &mut dirty);
    document.inventory = decode_inventory(field(object, "inventory"), &mut dirty);
    document.characters = decode_characters(field(object, "characters"), &mut dirty);
    document.quests = decode_quests(field(object, "quests"), &mut dirty);

    Ok(Decoded { document, dirty })
}

fn field<'a>(object: &'a JsonMap, name: &str) -> Option<&'a Value> {
    matcher::resolve_value(object, name)
}

/// Numbers may arrive as JSON numbers or as numeric strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Primitive-to-string coercion for free-form status fields
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decode_stats(value: Option<&Value>, dirty: &mut bool) -> indexmap::IndexMap<String, f64> {
    let mut out = indexmap::IndexMap::new();
    let Some(value) = value else { return out };
    let Some(map) = value.as_object() else {
        tracing::warn!(section = "stats", "expected an object, resetting");
        *dirty = true;
        return out;
    };
    for (key, entry) in map {
        match as_number(entry) {
            Some(n) => {
                out.insert(key.clone(), n);
            }
            None => {
                tracing::warn!(section = "stats", stat = %key, "non-numeric value skipped");
                *dirty = true;
            }
        }
    }
    out
}

fn decode_attributes(value: Option<&Value>, dirty: &mut bool) -> indexmap::IndexMap<String, i64> {
    let mut out = indexmap::IndexMap::new();
    let Some(value) = value else { return out };
    let Some(map) = value.as_object() else {
        tracing::warn!(section = "attributes", "expected an object, resetting");
        *dirty = true;
        return out;
    };
    for (key, entry) in map {
        match as_integer(entry) {
            Some(n) => {
                out.insert(key.clone(), n);
            }
            None => {
                tracing::warn!(section = "attributes", attribute = %key, "non-integer value skipped");
                *dirty = true;
            }
        }
    }
    out
}

fn decode_status(value: Option<&Value>, dirty: &mut bool) -> Status {
    let mut status = Status::default();
    let Some(value) = value else { return status };
    let Some(map) = value.as_object() else {
        tracing::warn!(section = "status", "expected an object, resetting");
        *dirty = true;
        return status;
    };
    let mood_key = matcher::resolve_key(map.keys().map(String::as_str), "mood");
    let fields_key = matcher::resolve_key(map.keys().map(String::as_str), "fields");
    for (key, entry) in map {
        if Some(key.as_str()) == mood_key {
            match as_text(entry) {
                Some(mood) => status.mood = mood,
                None => {
                    tracing::warn!(section = "status", "non-string mood reset");
                    *dirty = true;
                }
            }
        } else if Some(key.as_str()) == fields_key {
            decode_status_fields(entry, &mut status, dirty);
        } else {
            // A generator sometimes flattens status fields to the root;
            // fold them back into the field map.
            match as_text(entry) {
                Some(text) => {
                    status.fields.insert(key.clone(), text);
                }
                None => {
                    tracing::warn!(section = "status", field = %key, "unusable status field skipped");
                    *dirty = true;
                }
            }
        }
    }
    status
}

fn decode_status_fields(value: &Value, status: &mut Status, dirty: &mut bool) {
    let Some(map) = value.as_object() else {
        tracing::warn!(section = "status", "fields is not an object, resetting");
        *dirty = true;
        return;
    };
    for (key, entry) in map {
        match as_text(entry) {
            Some(text) => {
                status.fields.insert(key.clone(), text);
            }
            None => {
                tracing::warn!(section = "status", field = %key, "unusable status field skipped");
                *dirty = true;
            }
        }
    }
}

fn decode_skills(
    value: Option<&Value>,
    dirty: &mut bool,
) -> indexmap::IndexMap<String, Vec<Skill>> {
    let mut out = indexmap::IndexMap::new();
    let Some(value) = value else { return out };
    let Some(map) = value.as_object() else {
        tracing::warn!(section = "skills", "expected an object, resetting");
        *dirty = true;
        return out;
    };
    for (category, entries) in map {
        let Some(items) = entries.as_array() else {
            tracing::warn!(section = "skills", category = %category, "non-list category skipped");
            *dirty = true;
            continue;
        };
        let mut skills = Vec::with_capacity(items.len());
        for entry in items {
            match decode_skill(entry) {
                Some(skill) => skills.push(skill),
                None => {
                    tracing::warn!(section = "skills", category = %category, "unusable skill entry skipped");
                    *dirty = true;
                }
            }
        }
        out.insert(category.clone(), skills);
    }
    out
}

fn decode_skill(value: &Value) -> Option<Skill> {
    match value {
        Value::String(name) => Some(Skill::named(name.clone())),
        Value::Object(map) => {
            let name = matcher::resolve_value(map, "name")?.as_str()?.to_string();
            let description = matcher::resolve_value(map, "description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(Skill { name, description })
        }
        _ => None,
    }
}

fn decode_inventory(value: Option<&Value>, dirty: &mut bool) -> Inventory {
    let mut inventory = Inventory::default();
    let Some(value) = value else { return inventory };
    match value {
        Value::Object(map) => {
            if let Some(entries) = matcher::resolve_value(map, "onPerson") {
                inventory.on_person = decode_items(entries, "onPerson", dirty);
            }
            if let Some(entries) = matcher::resolve_value(map, "assets") {
                inventory.assets = decode_items(entries, "assets", dirty);
            }
            if let Some(stored) = matcher::resolve_value(map, "stored") {
                match stored.as_object() {
                    Some(locations) => {
                        for (location, entries) in locations {
                            inventory
                                .stored
                                .insert(location.clone(), decode_items(entries, location, dirty));
                        }
                    }
                    None => {
                        // Historical corruption: `stored` persisted as an
                        // array. Reset just this subtree.
                        tracing::warn!(section = "inventory", "stored is not a map, resetting");
                        *dirty = true;
                    }
                }
            }
        }
        Value::Array(_) => {
            // A flat list is taken as the carried items.
            tracing::warn!(section = "inventory", "flat list folded into onPerson");
            inventory.on_person = decode_items(value, "onPerson", dirty);
            *dirty = true;
        }
        _ => {
            tracing::warn!(section = "inventory", "expected an object, resetting");
            *dirty = true;
        }
    }
    inventory
}

fn decode_items(value: &Value, slot: &str, dirty: &mut bool) -> Vec<Item> {
    let Some(entries) = value.as_array() else {
        tracing::warn!(section = "inventory", slot = %slot, "expected a list, resetting");
        *dirty = true;
        return Vec::new();
    };
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        match decode_item(entry) {
            Some(item) => items.push(item),
            None => {
                tracing::warn!(section = "inventory", slot = %slot, "unusable item skipped");
                *dirty = true;
            }
        }
    }
    items
}

fn decode_item(value: &Value) -> Option<Item> {
    match value {
        Value::String(name) if !name.trim().is_empty() => Some(Item::named(name.trim())),
        Value::Object(map) => {
            let name = matcher::resolve_value(map, "name")?.as_str()?.to_string();
            let description = matcher::resolve_value(map, "description")
                .and_then(Value::as_str)
                .map(str::to_string);
            let grants_skill = matcher::resolve_value(map, "grantsSkill")
                .and_then(Value::as_str)
                .map(str::to_string);
            let quantity = matcher::resolve_value(map, "quantity").and_then(Value::as_u64);
            Some(Item {
                name,
                description,
                grants_skill,
                quantity,
            })
        }
        _ => None,
    }
}

fn decode_characters(value: Option<&Value>, dirty: &mut bool) -> Vec<Character> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(entries) = value.as_array() else {
        tracing::warn!(section = "characters", "expected a list, resetting");
        *dirty = true;
        return Vec::new();
    };
    let mut characters = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(map) = entry.as_object() else {
            tracing::warn!(section = "characters", "non-object entry skipped");
            *dirty = true;
            continue;
        };
        characters.push(decode_character(map, dirty));
    }
    characters
}

fn decode_character(map: &JsonMap, dirty: &mut bool) -> Character {
    let keys = || map.keys().map(String::as_str);
    let name_key = matcher::resolve_key(keys(), "name");
    let details_key = matcher::resolve_key(keys(), "details");
    let relationship_key = matcher::resolve_key(keys(), "relationship");
    let thoughts_key = matcher::resolve_key(keys(), "thoughts");

    let mut character = Character::default();
    for (key, entry) in map {
        let key_str = Some(key.as_str());
        if key_str == name_key {
            match entry.as_str() {
                Some(name) => character.name = name.to_string(),
                None => {
                    tracing::warn!(section = "characters", "non-string character name reset");
                    *dirty = true;
                }
            }
        } else if key_str == details_key {
            character.details = sub_object(entry, "details", dirty);
        } else if key_str == relationship_key {
            character.relationship = sub_object(entry, "relationship", dirty);
        } else if key_str == thoughts_key {
            character.thoughts = sub_object(entry, "thoughts", dirty);
        } else {
            character.extra.insert(key.clone(), entry.clone());
        }
    }
    character
}

fn sub_object(value: &Value, field: &str, dirty: &mut bool) -> JsonMap {
    match value.as_object() {
        Some(map) => map.clone(),
        None => {
            tracing::warn!(section = "characters", field = %field, "non-object subtree reset");
            *dirty = true;
            JsonMap::new()
        }
    }
}

fn decode_quests(value: Option<&Value>, dirty: &mut bool) -> Quests {
    let mut quests = Quests::default();
    let Some(value) = value else { return quests };
    let Some(map) = value.as_object() else {
        tracing::warn!(section = "quests", "expected an object, resetting");
        *dirty = true;
        return quests;
    };
    if let Some(main) = matcher::resolve_value(map, "main") {
        quests.main = decode_quest(main, dirty);
    }
    if let Some(optional) = matcher::resolve_value(map, "optional") {
        match optional.as_array() {
            Some(entries) => {
                quests.optional = entries
                    .iter()
                    .filter_map(|entry| decode_quest(entry, dirty))
                    .collect();
            }
            None => {
                tracing::warn!(section = "quests", "optional is not a list, resetting");
                *dirty = true;
            }
        }
    }
    quests
}

/// `null`, the empty string, and the literal `"None"` all mean "no quest"
fn decode_quest(value: &Value, dirty: &mut bool) -> Option<Quest> {
    match value {
        Value::Null => None,
        Value::String(name) => {
            let trimmed = name.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(Quest::named(trimmed))
            }
        }
        Value::Object(map) => {
            let name = matcher::resolve_value(map, "name")?.as_str()?.trim().to_string();
            if name.is_empty() || name.eq_ignore_ascii_case("none") {
                return None;
            }
            let description = matcher::resolve_value(map, "description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(Quest { name, description })
        }
        _ => {
            tracing::warn!(section = "quests", "unusable quest entry skipped");
            *dirty = true;
            None
        }
    }
}
