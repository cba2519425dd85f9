//! Settings schema migration
//!
//! Two independent passes, always in this order: a structural deep-merge
//! against the default envelope (no required key can be missing afterward,
//! no existing customization is discarded), then a sequential chain of
//! numbered, idempotent structural migrations.
//!
//! Every step is guarded both by the stored version and by shape
//! inspection, because a restored envelope may already carry the new shape
//! at an old version number. A step whose expected prior shape is simply
//! absent is skipped; a step that finds an envelope it cannot interpret
//! aborts the chain and the caller falls back to the deep-merged envelope
//! alone.

use chronicle_document::{matcher, FieldPath, LockRegistry, Section};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::settings::{DEFAULT_ENVELOPE, SETTINGS_VERSION};

/// Bring a persisted settings envelope up to the current shape
///
/// Never fails: on any migration step error the deep-merged envelope is
/// returned unchanged (original version number preserved, so a later load
/// retries the chain).
#[must_use]
pub fn migrate_settings(value: &Value) -> Value {
    let stored_version = read_version(value);
    let mut merged = value.clone();
    deep_merge_defaults(&mut merged, &DEFAULT_ENVELOPE);
    // The defaults carry the current version number; the envelope keeps
    // its stored one until the chain has actually run.
    if let Some(object) = merged.as_object_mut() {
        object.insert(
            "settingsVersion".to_string(),
            Value::Number(stored_version.into()),
        );
    }

    match run_chain(merged.clone(), stored_version) {
        Ok(migrated) => migrated,
        Err(err) => {
            tracing::warn!(error = %err, "migration chain failed, using deep-merged settings only");
            merged
        }
    }
}

/// Deep-merge pass: fill every key missing from `target` with a clone of
/// the default, recursing where both sides are plain objects
///
/// Primitives and arrays already present in the target are never
/// overwritten.
pub fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Value::Object(target_map), Value::Object(default_map)) = (target, defaults) else {
        return;
    };
    for (key, default_value) in default_map {
        match target_map.get_mut(key) {
            None => {
                target_map.insert(key.clone(), default_value.clone());
            }
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
        }
    }
}

fn run_chain(mut value: Value, stored_version: u32) -> Result<Value, EngineError> {
    let mut current = stored_version;

    if current < 1 {
        migrate_stat_entries(&mut value)?;
        current = 1;
        tracing::info!(version = current, "settings migrated: stat entries");
    }
    if current < 2 {
        migrate_status_field_records(&mut value)?;
        current = 2;
        tracing::info!(version = current, "settings migrated: status field records");
    }
    if current < SETTINGS_VERSION {
        migrate_lock_tree(&mut value)?;
        current = SETTINGS_VERSION;
        tracing::info!(version = current, "settings migrated: lock tree");
    }

    if let Some(object) = value.as_object_mut() {
        object.insert(
            "settingsVersion".to_string(),
            Value::Number(current.into()),
        );
    }
    Ok(value)
}

fn read_version(value: &Value) -> u32 {
    value
        .as_object()
        .and_then(|o| matcher::resolve_value(o, "settingsVersion"))
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

fn tracker_config_mut(value: &mut Value) -> Option<&mut Map<String, Value>> {
    let object = value.as_object_mut()?;
    let key = matcher::resolve_key(object.keys().map(String::as_str), "trackerConfig")?
        .to_string();
    object.get_mut(&key)?.as_object_mut()
}

/// v1: `trackerConfig.stats` as a flat statId → bool map becomes a list of
/// typed entries
fn migrate_stat_entries(value: &mut Value) -> Result<(), EngineError> {
    let Some(config) = tracker_config_mut(value) else {
        tracing::warn!(step = 1, "no trackerConfig, step skipped");
        return Ok(());
    };
    let stats_key =
        matcher::resolve_key(config.keys().map(String::as_str), "stats").map(str::to_string);
    let Some(stats) = stats_key.and_then(|k| config.get_mut(&k)) else {
        tracing::warn!(step = 1, "no stats entry, step skipped");
        return Ok(());
    };

    match stats {
        // Target shape already present.
        Value::Array(_) => Ok(()),
        Value::Object(flags) => {
            let entries: Vec<Value> = flags
                .iter()
                .map(|(id, enabled)| {
                    serde_json::json!({
                        "id": id,
                        "label": id,
                        "enabled": enabled.as_bool().unwrap_or(true),
                    })
                })
                .collect();
            *stats = Value::Array(entries);
            Ok(())
        }
        other => Err(EngineError::StructuralMismatch {
            step: 1,
            name: "stat_entries",
            detail: format!("stats is {}", type_name(other)),
        }),
    }
}

/// v2: `trackerConfig.statusFields` plain strings become
/// `{name, description}` records
fn migrate_status_field_records(value: &mut Value) -> Result<(), EngineError> {
    let Some(config) = tracker_config_mut(value) else {
        tracing::warn!(step = 2, "no trackerConfig, step skipped");
        return Ok(());
    };
    let fields_key = matcher::resolve_key(config.keys().map(String::as_str), "statusFields")
        .map(str::to_string);
    let Some(fields) = fields_key.and_then(|k| config.get_mut(&k)) else {
        tracing::warn!(step = 2, "no statusFields entry, step skipped");
        return Ok(());
    };

    let Value::Array(entries) = fields else {
        return Err(EngineError::StructuralMismatch {
            step: 2,
            name: "status_field_records",
            detail: format!("statusFields is {}", type_name(fields)),
        });
    };
    for entry in entries.iter_mut() {
        if let Value::String(name) = entry {
            *entry = serde_json::json!({"name": name, "description": ""});
        }
    }
    Ok(())
}

/// v3: `lockedItems` as a flat array of dotted path strings becomes the
/// nested lock tree
fn migrate_lock_tree(value: &mut Value) -> Result<(), EngineError> {
    let Some(object) = value.as_object_mut() else {
        return Ok(());
    };
    let Some(key) = matcher::resolve_key(object.keys().map(String::as_str), "lockedItems")
        .map(str::to_string)
    else {
        tracing::warn!(step = 3, "no lockedItems entry, step skipped");
        return Ok(());
    };
    let new_tree = match object.get_mut(&key) {
        None => return Ok(()),
        // Target shape already present.
        Some(Value::Object(_)) => return Ok(()),
        Some(Value::Array(paths)) => {
            let mut registry = LockRegistry::new();
            for path in paths.iter() {
                let Some(path) = path.as_str() else {
                    tracing::warn!(step = 3, "non-string lock path dropped");
                    continue;
                };
                let (section_name, rest) = split_section(path);
                let Some(section) = Section::resolve(section_name) else {
                    tracing::warn!(step = 3, path = %path, "unknown section in lock path dropped");
                    continue;
                };
                match rest.parse::<FieldPath>() {
                    Ok(parsed) => registry.set_lock(section, &parsed, true),
                    Err(err) => {
                        tracing::warn!(step = 3, path = %path, error = %err, "unparseable lock path dropped");
                    }
                }
            }
            serde_json::to_value(&registry).unwrap_or_else(|_| Value::Object(Map::new()))
        }
        Some(other) => {
            return Err(EngineError::StructuralMismatch {
                step: 3,
                name: "lock_tree",
                detail: format!("lockedItems is {}", type_name(other)),
            })
        }
    };
    object.insert(key, new_tree);
    Ok(())
}

fn split_section(path: &str) -> (&str, &str) {
    path.split_once('.').unwrap_or((path, ""))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
