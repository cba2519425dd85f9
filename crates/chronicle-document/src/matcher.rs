//! Field-name resolution tolerant of generator casing drift
//!
//! The external generator renames keys freely between generations
//! (`physicalState`, `physical_state`, `Physical State`). Every component
//! that addresses into a document by a configured field name goes through
//! this module, so a lock configured under one casing still matches a
//! response that used another.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid pattern"));

/// Normalize a field name to its snake_case form
///
/// Lowercases, collapses every run of non-alphanumeric characters to a
/// single underscore, and trims leading/trailing underscores.
///
/// # Examples
/// - `"Physical State"` → `"physical_state"`
/// - `"on-person"` → `"on_person"`
/// - `"onPerson[3]"` → `"onperson_3"`
#[must_use]
pub fn normalize_key(name: &str) -> String {
    let lower = name.to_lowercase();
    NON_ALNUM.replace_all(&lower, "_").trim_matches('_').to_string()
}

/// Fold a field name down to lowercase alphanumerics only
///
/// The loosest comparison form: separator and casing drift both vanish,
/// so `physicalState`, `physical_state`, and `physicalstate` all fold to
/// the same string.
#[must_use]
pub fn fold_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Resolve a logical field name to the concrete key present in a target
///
/// Search order is fixed and deterministic; first match wins:
/// 1. a key equal to the name as given,
/// 2. a key whose snake_case form equals the name's snake_case form,
/// 3. a key whose lowercase alphanumeric fold equals the name's fold.
///
/// Absence is `None`, not an error; the caller decides fallback behavior.
pub fn resolve_key<'a, I>(keys: I, name: &str) -> Option<&'a str>
where
    I: Iterator<Item = &'a str> + Clone,
{
    if let Some(found) = keys.clone().find(|k| *k == name) {
        return Some(found);
    }
    let snake = normalize_key(name);
    if let Some(found) = keys.clone().find(|k| normalize_key(k) == snake) {
        return Some(found);
    }
    let folded = fold_key(name);
    keys.clone().find(|k| fold_key(k) == folded)
}

/// Resolve a field inside a JSON object, returning the value
#[must_use]
pub fn resolve_value<'a>(
    object: &'a serde_json::Map<String, serde_json::Value>,
    name: &str,
) -> Option<&'a serde_json::Value> {
    resolve_key(object.keys().map(String::as_str), name).and_then(|k| object.get(k))
}

/// Whether two field names refer to the same field under normalization
#[inline]
#[must_use]
pub fn keys_match(a: &str, b: &str) -> bool {
    a == b || normalize_key(a) == normalize_key(b) || fold_key(a) == fold_key(b)
}
