//! Adapter for historical tracker payload shapes
//!
//! Older sessions persisted trackers in looser forms: free-text
//! comma-joined item lists, flat stat dictionaries without the `stats`
//! wrapper, a bare string where `quests.main` now holds a record. This
//! adapter converts any of those into a current-shape document, driven by
//! the tracker configuration for which stats and attributes exist at all.
//!
//! It runs once per stale session record; the result is treated as a
//! fresh candidate for persistence.

use chronicle_document::{
    decode_document, matcher, Inventory, Item, JsonMap, Skill, TrackerDocument, TRACKER_VERSION,
};
use serde_json::Value;

use crate::settings::TrackerConfig;

/// Convert a legacy payload into a current-shape document
#[must_use]
pub fn adapt_legacy_document(payload: &Value, config: &TrackerConfig) -> TrackerDocument {
    // Everything already in (or close to) the current shape decodes as
    // usual; the legacy-specific handling below overlays the rest.
    let mut document = match decode_document(payload) {
        Ok(decoded) => decoded.document,
        Err(err) => {
            tracing::warn!(error = %err, "legacy payload unusable, starting from defaults");
            TrackerDocument::default()
        }
    };
    let root = payload.as_object();

    document.stats = adapt_stats(root, config);
    document.attributes = adapt_attributes(root, config);
    document.inventory = adapt_inventory(
        root.and_then(|m| matcher::resolve_value(m, "inventory")),
        document.inventory,
    );
    document.skills = adapt_skills(
        root.and_then(|m| matcher::resolve_value(m, "skills")),
        document.skills,
    );
    if document.status.mood.is_empty() {
        if let Some(mood) = root
            .and_then(|m| matcher::resolve_value(m, "mood"))
            .and_then(Value::as_str)
        {
            document.status.mood = mood.to_string();
        }
    }

    document.version = TRACKER_VERSION;
    tracing::info!(version = TRACKER_VERSION, "legacy tracker payload adapted");
    document
}

/// Default for a stat with no configured starting value
///
/// Escalation-style meters start at zero; everything else starts full.
fn hard_stat_default(id: &str) -> f64 {
    let folded = matcher::fold_key(id);
    const ZERO_BASED: [&str; 3] = ["arousal", "lust", "corruption"];
    if ZERO_BASED.iter().any(|p| folded.contains(p)) {
        0.0
    } else {
        100.0
    }
}

fn adapt_stats(
    root: Option<&JsonMap>,
    config: &TrackerConfig,
) -> indexmap::IndexMap<String, f64> {
    let wrapped = root
        .and_then(|m| matcher::resolve_value(m, "stats"))
        .and_then(Value::as_object);
    let mut out = indexmap::IndexMap::new();
    for stat in config.stats.iter().filter(|s| s.enabled) {
        // The value may live under the `stats` wrapper or flat at the root.
        let raw = wrapped
            .and_then(|m| matcher::resolve_value(m, &stat.id))
            .or_else(|| root.and_then(|m| matcher::resolve_value(m, &stat.id)));
        let value = raw.and_then(coerce_number).unwrap_or_else(|| {
            stat.default_value
                .unwrap_or_else(|| hard_stat_default(&stat.id))
        });
        out.insert(stat.id.clone(), value.clamp(0.0, 100.0));
    }
    out
}

fn adapt_attributes(
    root: Option<&JsonMap>,
    config: &TrackerConfig,
) -> indexmap::IndexMap<String, i64> {
    let wrapped = root
        .and_then(|m| matcher::resolve_value(m, "attributes"))
        .and_then(Value::as_object);
    let mut out = indexmap::IndexMap::new();
    for attribute in config.attributes.iter().filter(|a| a.enabled) {
        let raw = wrapped
            .and_then(|m| matcher::resolve_value(m, &attribute.id))
            .or_else(|| root.and_then(|m| matcher::resolve_value(m, &attribute.id)));
        let value = raw
            .and_then(coerce_number)
            .map_or_else(|| attribute.default_value.unwrap_or(10), |n| n as i64);
        out.insert(attribute.id.clone(), value);
    }
    out
}

fn adapt_inventory(raw: Option<&Value>, decoded: Inventory) -> Inventory {
    let Some(raw) = raw else { return decoded };
    match raw {
        Value::String(text) => Inventory {
            on_person: parse_item_list(text),
            ..Inventory::default()
        },
        Value::Object(map) => {
            let mut inventory = decoded;
            if let Some(text) = matcher::resolve_value(map, "onPerson").and_then(Value::as_str) {
                inventory.on_person = parse_item_list(text);
            }
            if let Some(text) = matcher::resolve_value(map, "assets").and_then(Value::as_str) {
                inventory.assets = parse_item_list(text);
            }
            if let Some(stored) = matcher::resolve_value(map, "stored").and_then(Value::as_object) {
                for (location, entries) in stored {
                    if let Some(text) = entries.as_str() {
                        inventory
                            .stored
                            .insert(location.clone(), parse_item_list(text));
                    }
                }
            }
            inventory
        }
        _ => decoded,
    }
}

fn adapt_skills(
    raw: Option<&Value>,
    decoded: indexmap::IndexMap<String, Vec<Skill>>,
) -> indexmap::IndexMap<String, Vec<Skill>> {
    let Some(raw) = raw else { return decoded };
    match raw {
        // A single free-text list becomes the general category.
        Value::String(text) => {
            let mut out = indexmap::IndexMap::new();
            out.insert("general".to_string(), parse_skill_list(text));
            out
        }
        Value::Object(map) => {
            let mut out = decoded;
            for (category, entries) in map {
                if let Some(text) = entries.as_str() {
                    out.insert(category.clone(), parse_skill_list(text));
                }
            }
            out
        }
        _ => decoded,
    }
}

/// Tokenize a free-text comma-joined item list
///
/// Each token may carry a leading `<N>x ` quantity prefix. Tokens that
/// reduce to `"none"` (case-insensitive) or the empty string are dropped.
#[must_use]
pub fn parse_item_list(text: &str) -> Vec<Item> {
    text.split(',')
        .filter_map(|token| {
            let token = token.trim();
            if token.is_empty() || token.eq_ignore_ascii_case("none") {
                return None;
            }
            match split_quantity(token) {
                Some((quantity, name)) => Some(Item::stack(name, quantity)),
                None => Some(Item::named(token)),
            }
        })
        .collect()
}

/// Tokenize a free-text comma-joined skill list
#[must_use]
pub fn parse_skill_list(text: &str) -> Vec<Skill> {
    text.split(',')
        .filter_map(|token| {
            let token = token.trim();
            if token.is_empty() || token.eq_ignore_ascii_case("none") {
                return None;
            }
            Some(Skill::named(token))
        })
        .collect()
}

/// Split a `"3x Rope"`-style quantity prefix off a token
fn split_quantity(token: &str) -> Option<(u64, &str)> {
    let (prefix, rest) = token.split_once(' ')?;
    let digits = prefix
        .strip_suffix('x')
        .or_else(|| prefix.strip_suffix('X'))?;
    let quantity = digits.parse::<u64>().ok()?;
    let name = rest.trim();
    if name.is_empty() {
        return None;
    }
    Some((quantity, name))
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> TrackerConfig {
        TrackerConfig::default()
    }

    #[test]
    fn flat_stat_dictionary_adapts() {
        let payload = json!({"health": 45, "stamina": "80", "mood": "tense"});
        let document = adapt_legacy_document(&payload, &config());
        assert_eq!(document.stats["health"], 45.0);
        assert_eq!(document.stats["stamina"], 80.0);
        assert_eq!(document.status.mood, "tense");
        assert_eq!(document.version, TRACKER_VERSION);
    }

    #[test]
    fn missing_stats_use_configured_then_hard_defaults() {
        let mut cfg = config();
        cfg.stats.push({
            let mut stat = crate::settings::StatConfig::new("corruption", "Corruption");
            stat.default_value = None;
            stat
        });
        cfg.stats[0].default_value = Some(60.0);

        let document = adapt_legacy_document(&json!({}), &cfg);
        assert_eq!(document.stats["health"], 60.0);
        assert_eq!(document.stats["stamina"], 100.0);
        assert_eq!(document.stats["corruption"], 0.0);
    }

    #[test]
    fn stat_values_clamp_to_range() {
        let payload = json!({"stats": {"health": 250, "stamina": -3}});
        let document = adapt_legacy_document(&payload, &config());
        assert_eq!(document.stats["health"], 100.0);
        assert_eq!(document.stats["stamina"], 0.0);
    }

    #[test]
    fn disabled_entries_are_not_tracked() {
        let mut cfg = config();
        cfg.stats[1].enabled = false;
        let document = adapt_legacy_document(&json!({}), &cfg);
        assert!(!document.stats.contains_key("stamina"));
    }

    #[test]
    fn free_text_inventory_tokenizes() {
        let payload = json!({"inventory": "Sword, 3x Rope, none, , 12x Nails"});
        let document = adapt_legacy_document(&payload, &config());
        assert_eq!(
            document.inventory.on_person,
            vec![
                Item::named("Sword"),
                Item::stack("Rope", 3),
                Item::stack("Nails", 12),
            ]
        );
    }

    #[test]
    fn free_text_stored_slots_tokenize() {
        let payload = json!({"inventory": {
            "onPerson": "Knife",
            "stored": {"GarageShed": "Hammer, 2x Plank"}
        }});
        let document = adapt_legacy_document(&payload, &config());
        assert_eq!(document.inventory.on_person, vec![Item::named("Knife")]);
        assert_eq!(
            document.inventory.stored["GarageShed"],
            vec![Item::named("Hammer"), Item::stack("Plank", 2)]
        );
    }

    #[test]
    fn free_text_skills_land_in_general() {
        let payload = json!({"skills": "Lockpicking, none, Haggling"});
        let document = adapt_legacy_document(&payload, &config());
        assert_eq!(
            document.skills["general"],
            vec![Skill::named("Lockpicking"), Skill::named("Haggling")]
        );
    }

    #[test]
    fn legacy_quest_strings_adapt() {
        let payload = json!({"quests": {"main": "Find the Relic", "optional": ["Help the smith", "None"]}});
        let document = adapt_legacy_document(&payload, &config());
        let main = document.quests.main.unwrap();
        assert_eq!(main.name, "Find the Relic");
        assert_eq!(main.description, "");
        assert_eq!(document.quests.optional.len(), 1);
        assert_eq!(document.quests.optional[0].name, "Help the smith");
    }

    #[test]
    fn quantity_prefix_edge_cases() {
        assert_eq!(parse_item_list("10x"), vec![Item::named("10x")]);
        assert_eq!(parse_item_list("x Rope"), vec![Item::named("x Rope")]);
        assert_eq!(parse_item_list("3x  Rope"), vec![Item::stack("Rope", 3)]);
    }

    #[test]
    fn current_shape_passes_through() {
        let payload = json!({
            "stats": {"health": 70},
            "inventory": {"onPerson": [{"name": "Sword"}], "stored": {}, "assets": []},
            "characters": [{"name": "Mira"}]
        });
        let document = adapt_legacy_document(&payload, &config());
        assert_eq!(document.stats["health"], 70.0);
        assert_eq!(document.inventory.on_person, vec![Item::named("Sword")]);
        assert_eq!(document.characters[0].name, "Mira");
    }
}
