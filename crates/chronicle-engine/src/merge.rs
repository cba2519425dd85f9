//! Lock-honoring merge of a generated candidate against committed state
//!
//! Given the freshly generated candidate document, the previously
//! committed document, and the lock registry, produce the new committed
//! document field by field. The result always keeps the candidate's
//! overall shape — generator-introduced fields ride along — with locked
//! values substituted in from the committed side, resolved through the
//! drift-tolerant matcher so a rename between generations cannot defeat a
//! lock.
//!
//! A section the candidate omits entirely falls back to the committed
//! section; inside a present section, maps merge as key unions (committed
//! keys the candidate dropped are carried over), lists follow the
//! candidate with locked indices spliced in positionally, and characters
//! are matched by name.

use chronicle_document::{
    decode_document, matcher, remove_locks, Character, FieldPath, Inventory, Item, JsonMap,
    LockNode, LockRegistry, PathSegment, Quests, Section, Skill, Status, TrackerDocument,
};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SkipReason;

/// Result of a merge attempt
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The candidate was merged into a new committed document
    Merged {
        /// The new committed document
        document: TrackerDocument,
        /// True when the candidate needed subtree repairs on the way in
        repaired: bool,
    },
    /// The merge was skipped; locks could not be honored
    Skipped {
        /// Why the merge could not run
        reason: SkipReason,
        /// The candidate, unmodified, as the best available document
        candidate: Value,
    },
}

impl MergeOutcome {
    /// The merged document, when the merge ran
    #[inline]
    #[must_use]
    pub fn document(&self) -> Option<&TrackerDocument> {
        match self {
            MergeOutcome::Merged { document, .. } => Some(document),
            MergeOutcome::Skipped { .. } => None,
        }
    }

    /// Whether the merge ran
    #[inline]
    #[must_use]
    pub fn is_merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged { .. })
    }
}

/// Merge a candidate document against the committed document
///
/// The candidate arrives as the raw (already JSON-repaired) generator
/// value, possibly still carrying lock annotations; they are stripped
/// before decoding. A candidate that is not a JSON object skips the merge
/// and is returned unmodified.
#[must_use]
pub fn merge(
    candidate: &Value,
    committed: &TrackerDocument,
    registry: &LockRegistry,
) -> MergeOutcome {
    let stripped = remove_locks(candidate);
    let Some(raw) = stripped.as_object() else {
        tracing::warn!("merge skipped: candidate is not an object");
        return MergeOutcome::Skipped {
            reason: SkipReason::CandidateUnparseable,
            candidate: candidate.clone(),
        };
    };
    let decoded = match decode_document(&stripped) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!(error = %err, "merge skipped: candidate undecodable");
            return MergeOutcome::Skipped {
                reason: SkipReason::CandidateUnparseable,
                candidate: candidate.clone(),
            };
        }
    };
    let cand = decoded.document;

    let version = if cand.version == 0 {
        committed.version
    } else {
        cand.version
    };

    let stats = if registry.section_locked(Section::Stats) || section(raw, "stats").is_none() {
        committed.stats.clone()
    } else {
        merge_scalar_map(cand.stats, &committed.stats, |key| {
            registry.is_locked(Section::Stats, &leaf(key))
        })
    };

    let attributes =
        if registry.section_locked(Section::Attributes) || section(raw, "attributes").is_none() {
            committed.attributes.clone()
        } else {
            merge_scalar_map(cand.attributes, &committed.attributes, |key| {
                registry.is_locked(Section::Attributes, &leaf(key))
            })
        };

    let status = merge_status(section(raw, "status"), cand.status, &committed.status, registry);
    let skills = merge_skills(section(raw, "skills"), cand.skills, &committed.skills, registry);
    let inventory = merge_inventory(
        section(raw, "inventory"),
        cand.inventory,
        &committed.inventory,
        registry,
    );
    let characters = merge_characters(
        section(raw, "characters"),
        cand.characters,
        &committed.characters,
        registry,
    );
    let quests = merge_quests(section(raw, "quests"), cand.quests, &committed.quests, registry);

    tracing::debug!("candidate merged");
    MergeOutcome::Merged {
        document: TrackerDocument {
            version,
            stats,
            status,
            attributes,
            skills,
            inventory,
            characters,
            quests,
        },
        repaired: decoded.dirty,
    }
}

/// Merge with the committed side still in envelope form
///
/// A committed payload that is not a JSON object also skips the merge:
/// locks cannot be honored against unparseable data.
#[must_use]
pub fn merge_raw(candidate: &Value, committed: &Value, registry: &LockRegistry) -> MergeOutcome {
    match decode_document(&remove_locks(committed)) {
        Ok(decoded) => merge(candidate, &decoded.document, registry),
        Err(err) => {
            tracing::warn!(error = %err, "merge skipped: committed undecodable");
            MergeOutcome::Skipped {
                reason: SkipReason::CommittedUnparseable,
                candidate: candidate.clone(),
            }
        }
    }
}

fn section<'a>(raw: &'a JsonMap, name: &str) -> Option<&'a Value> {
    matcher::resolve_value(raw, name)
}

fn leaf(key: &str) -> FieldPath {
    FieldPath::new(vec![PathSegment::key(key)])
}

fn indexed(key: &str, index: usize) -> FieldPath {
    FieldPath::new(vec![PathSegment::indexed(key, index)])
}

fn committed_value<'a, V>(map: &'a IndexMap<String, V>, key: &str) -> Option<&'a V> {
    matcher::resolve_key(map.keys().map(String::as_str), key).and_then(|k| map.get(k))
}

/// Key-union merge for leaf maps (stats, attributes, status fields)
///
/// Candidate shape first; locked keys take the committed value (falling
/// back to the candidate's when the committed side lacks the key); keys
/// the candidate omitted are carried over from the committed side.
fn merge_scalar_map<V: Clone>(
    candidate: IndexMap<String, V>,
    committed: &IndexMap<String, V>,
    is_locked: impl Fn(&str) -> bool,
) -> IndexMap<String, V> {
    let mut out = IndexMap::new();
    for (key, value) in candidate {
        let merged = if is_locked(&key) {
            committed_value(committed, &key).cloned().unwrap_or(value)
        } else {
            value
        };
        out.insert(key, merged);
    }
    for (key, value) in committed {
        if !out.keys().any(|k| matcher::keys_match(k, key)) {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// Candidate list with locked indices spliced in from the committed list
///
/// Positional, not identity-based: a generator that reorders a list moves
/// values through a locked slot. An index past the candidate's end appends.
fn merge_indexed<T: Clone>(
    candidate: Vec<T>,
    committed: &[T],
    is_locked: impl Fn(usize) -> bool,
) -> Vec<T> {
    let mut out = candidate;
    for (index, element) in committed.iter().enumerate() {
        if is_locked(index) {
            if index < out.len() {
                out[index] = element.clone();
            } else {
                out.push(element.clone());
            }
        }
    }
    out
}

fn merge_status(
    raw: Option<&Value>,
    candidate: Status,
    committed: &Status,
    registry: &LockRegistry,
) -> Status {
    if registry.section_locked(Section::Status) {
        return committed.clone();
    }
    let Some(raw) = raw else {
        return committed.clone();
    };
    let mood_present = raw
        .as_object()
        .is_some_and(|m| matcher::resolve_value(m, "mood").is_some());
    let mood = if !mood_present || registry.is_locked(Section::Status, &leaf("mood")) {
        committed.mood.clone()
    } else {
        candidate.mood
    };
    let fields = merge_scalar_map(candidate.fields, &committed.fields, |key| {
        registry.is_locked(
            Section::Status,
            &FieldPath::new(vec![PathSegment::key("fields"), PathSegment::key(key)]),
        )
    });
    Status { mood, fields }
}

fn merge_skills(
    raw: Option<&Value>,
    candidate: IndexMap<String, Vec<Skill>>,
    committed: &IndexMap<String, Vec<Skill>>,
    registry: &LockRegistry,
) -> IndexMap<String, Vec<Skill>> {
    if registry.section_locked(Section::Skills) {
        return committed.clone();
    }
    if raw.is_none() {
        return committed.clone();
    }
    let mut out = IndexMap::new();
    for (category, list) in candidate {
        let merged = if registry.is_locked(Section::Skills, &leaf(&category)) {
            committed_value(committed, &category).cloned().unwrap_or(list)
        } else {
            let committed_list = committed_value(committed, &category)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            merge_indexed(list, committed_list, |i| {
                registry.is_locked(Section::Skills, &indexed(&category, i))
            })
        };
        out.insert(category, merged);
    }
    for (category, list) in committed {
        if !out.keys().any(|k| matcher::keys_match(k, category)) {
            out.insert(category.clone(), list.clone());
        }
    }
    out
}

fn merge_inventory(
    raw: Option<&Value>,
    candidate: Inventory,
    committed: &Inventory,
    registry: &LockRegistry,
) -> Inventory {
    if registry.section_locked(Section::Inventory) {
        return committed.clone();
    }
    let Some(raw) = raw else {
        return committed.clone();
    };
    let raw_obj = raw.as_object();

    let on_person = merge_slot(raw_obj, "onPerson", candidate.on_person, &committed.on_person, registry);
    let assets = merge_slot(raw_obj, "assets", candidate.assets, &committed.assets, registry);

    let stored_present = raw_obj.is_some_and(|m| matcher::resolve_value(m, "stored").is_some());
    let stored = if !stored_present || registry.is_locked(Section::Inventory, &leaf("stored")) {
        committed.stored.clone()
    } else {
        let mut out = IndexMap::new();
        for (location, list) in candidate.stored {
            let location_path = FieldPath::new(vec![
                PathSegment::key("stored"),
                PathSegment::key(location.as_str()),
            ]);
            let merged = if registry.is_locked(Section::Inventory, &location_path) {
                committed_value(&committed.stored, &location)
                    .cloned()
                    .unwrap_or(list)
            } else {
                let committed_list = committed_value(&committed.stored, &location)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                merge_indexed(list, committed_list, |i| {
                    registry.is_locked(
                        Section::Inventory,
                        &FieldPath::new(vec![
                            PathSegment::key("stored"),
                            PathSegment::indexed(location.as_str(), i),
                        ]),
                    )
                })
            };
            out.insert(location, merged);
        }
        for (location, list) in &committed.stored {
            if !out.keys().any(|k| matcher::keys_match(k, location)) {
                out.insert(location.clone(), list.clone());
            }
        }
        out
    };

    Inventory {
        on_person,
        stored,
        assets,
    }
}

fn merge_slot(
    raw: Option<&JsonMap>,
    name: &str,
    candidate: Vec<Item>,
    committed: &[Item],
    registry: &LockRegistry,
) -> Vec<Item> {
    let present = raw.is_some_and(|m| matcher::resolve_value(m, name).is_some());
    if !present || registry.is_locked(Section::Inventory, &leaf(name)) {
        return committed.to_vec();
    }
    merge_indexed(candidate, committed, |i| {
        registry.is_locked(Section::Inventory, &indexed(name, i))
    })
}

fn merge_quests(
    raw: Option<&Value>,
    candidate: Quests,
    committed: &Quests,
    registry: &LockRegistry,
) -> Quests {
    if registry.section_locked(Section::Quests) {
        return committed.clone();
    }
    let Some(raw) = raw else {
        return committed.clone();
    };
    let raw_obj = raw.as_object();

    let main_present = raw_obj.is_some_and(|m| matcher::resolve_value(m, "main").is_some());
    let main = if !main_present || registry.is_locked(Section::Quests, &leaf("main")) {
        committed.main.clone()
    } else {
        candidate.main
    };

    let optional_present =
        raw_obj.is_some_and(|m| matcher::resolve_value(m, "optional").is_some());
    let optional = if !optional_present || registry.is_locked(Section::Quests, &leaf("optional")) {
        committed.optional.clone()
    } else {
        merge_indexed(candidate.optional, &committed.optional, |i| {
            registry.is_locked(Section::Quests, &indexed("optional", i))
        })
    };

    Quests { main, optional }
}

fn merge_characters(
    raw: Option<&Value>,
    candidate: Vec<Character>,
    committed: &[Character],
    registry: &LockRegistry,
) -> Vec<Character> {
    if registry.section_locked(Section::Characters) {
        return committed.to_vec();
    }
    if raw.is_none() {
        return committed.to_vec();
    }
    let node = registry.section_node(Section::Characters);
    let mut consumed = vec![false; committed.len()];
    let mut out = Vec::with_capacity(candidate.len());

    for (position, mut cand_char) in candidate.into_iter().enumerate() {
        let counterpart_index = find_counterpart(&cand_char, position, committed);
        if let Some(index) = counterpart_index {
            consumed[index] = true;
        }
        let counterpart = counterpart_index.map(|i| &committed[i]);
        let lock_name = counterpart
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(cand_char.name.as_str());
        match node.and_then(|n| n.child(lock_name)) {
            Some(LockNode::Locked) => match counterpart {
                Some(committed_char) => out.push(committed_char.clone()),
                // Dangling lock: nothing committed to restore.
                None => out.push(cand_char),
            },
            Some(branch) => {
                if let Some(committed_char) = counterpart {
                    restore_locked_fields(&mut cand_char, committed_char, branch);
                }
                out.push(cand_char);
            }
            None => out.push(cand_char),
        }
    }

    // A locked character the generator dropped entirely is restored.
    for (index, committed_char) in committed.iter().enumerate() {
        if consumed[index] {
            continue;
        }
        let locked = node
            .and_then(|n| n.child(&committed_char.name))
            .is_some_and(LockNode::is_locked);
        if locked {
            out.push(committed_char.clone());
        }
    }
    out
}

/// Match by name, falling back to position when the candidate is nameless
fn find_counterpart(
    candidate: &Character,
    position: usize,
    committed: &[Character],
) -> Option<usize> {
    if !candidate.name.is_empty() {
        return committed
            .iter()
            .position(|c| matcher::keys_match(&c.name, &candidate.name));
    }
    (position < committed.len()).then_some(position)
}

fn restore_locked_fields(candidate: &mut Character, committed: &Character, node: &LockNode) {
    for (lock_key, child) in node.children() {
        let Ok(segment) = lock_key.parse::<PathSegment>() else {
            continue;
        };
        match child {
            LockNode::Locked => restore_character_field(candidate, committed, &segment),
            LockNode::Branch(_) => {
                let field = segment.name();
                if matcher::keys_match(field, "details") {
                    restore_in_maps(&mut candidate.details, &committed.details, child);
                } else if matcher::keys_match(field, "relationship") {
                    restore_in_maps(&mut candidate.relationship, &committed.relationship, child);
                } else if matcher::keys_match(field, "thoughts") {
                    restore_in_maps(&mut candidate.thoughts, &committed.thoughts, child);
                } else if let Some(committed_sub) =
                    matcher::resolve_value(&committed.extra, field).and_then(Value::as_object)
                {
                    let key = matcher::resolve_key(candidate.extra.keys().map(String::as_str), field)
                        .map(str::to_string)
                        .unwrap_or_else(|| field.to_string());
                    let entry = candidate
                        .extra
                        .entry(key)
                        .or_insert_with(|| Value::Object(JsonMap::new()));
                    if let Some(candidate_sub) = entry.as_object_mut() {
                        restore_in_maps(candidate_sub, committed_sub, child);
                    }
                }
            }
        }
    }
}

/// Restore one locked character field from the committed side
///
/// The committed value is searched first at the character's root, then
/// inside `details`, `relationship`, and `thoughts` in that order; it is
/// written back at the matching spot on the candidate, creating the
/// sub-object when the candidate lacks it. A field the committed side
/// never had is a dangling lock and restores nothing.
fn restore_character_field(candidate: &mut Character, committed: &Character, segment: &PathSegment) {
    let field = segment.name();
    if matcher::keys_match(field, "name") {
        if !committed.name.is_empty() {
            candidate.name = committed.name.clone();
        }
        return;
    }
    if matcher::keys_match(field, "details") {
        candidate.details = committed.details.clone();
        return;
    }
    if matcher::keys_match(field, "relationship") {
        candidate.relationship = committed.relationship.clone();
        return;
    }
    if matcher::keys_match(field, "thoughts") {
        candidate.thoughts = committed.thoughts.clone();
        return;
    }
    if let Some(value) = matcher::resolve_value(&committed.extra, field) {
        insert_resolved(&mut candidate.extra, field, value.clone());
        return;
    }
    if let Some(value) = matcher::resolve_value(&committed.details, field) {
        insert_resolved(&mut candidate.details, field, value.clone());
        return;
    }
    if let Some(value) = matcher::resolve_value(&committed.relationship, field) {
        insert_resolved(&mut candidate.relationship, field, value.clone());
        return;
    }
    if let Some(value) = matcher::resolve_value(&committed.thoughts, field) {
        insert_resolved(&mut candidate.thoughts, field, value.clone());
    }
}

fn restore_in_maps(candidate: &mut JsonMap, committed: &JsonMap, node: &LockNode) {
    for (lock_key, child) in node.children() {
        let Ok(segment) = lock_key.parse::<PathSegment>() else {
            continue;
        };
        let field = segment.name();
        match child {
            LockNode::Locked => match segment.index() {
                None => {
                    if let Some(value) = matcher::resolve_value(committed, field) {
                        insert_resolved(candidate, field, value.clone());
                    }
                }
                Some(index) => {
                    let element = matcher::resolve_value(committed, field)
                        .and_then(Value::as_array)
                        .and_then(|items| items.get(index));
                    if let Some(element) = element {
                        let key = matcher::resolve_key(candidate.keys().map(String::as_str), field)
                            .map(str::to_string)
                            .unwrap_or_else(|| field.to_string());
                        let entry = candidate
                            .entry(key)
                            .or_insert_with(|| Value::Array(Vec::new()));
                        if let Some(items) = entry.as_array_mut() {
                            if index < items.len() {
                                items[index] = element.clone();
                            } else {
                                items.push(element.clone());
                            }
                        }
                    }
                }
            },
            LockNode::Branch(_) => {
                let Some(committed_sub) =
                    matcher::resolve_value(committed, field).and_then(Value::as_object)
                else {
                    continue;
                };
                let key = matcher::resolve_key(candidate.keys().map(String::as_str), field)
                    .map(str::to_string)
                    .unwrap_or_else(|| field.to_string());
                let entry = candidate
                    .entry(key)
                    .or_insert_with(|| Value::Object(JsonMap::new()));
                if let Some(candidate_sub) = entry.as_object_mut() {
                    restore_in_maps(candidate_sub, committed_sub, child);
                }
            }
        }
    }
}

fn insert_resolved(map: &mut JsonMap, field: &str, value: Value) {
    let key = matcher::resolve_key(map.keys().map(String::as_str), field)
        .map(str::to_string)
        .unwrap_or_else(|| field.to_string());
    map.insert(key, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_document::Quest;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn committed() -> TrackerDocument {
        let mut doc = TrackerDocument::default();
        doc.stats.insert("health".to_string(), 80.0);
        doc.stats.insert("stamina".to_string(), 70.0);
        doc.inventory.on_person.push(Item::named("Sword"));
        doc.quests.main = Some(Quest::named("Find the Relic"));
        doc.characters.push(Character {
            name: "Mira".to_string(),
            relationship: json!({"trust": 40}).as_object().unwrap().clone(),
            ..Character::default()
        });
        doc
    }

    fn registry(paths: &[(Section, &str)]) -> LockRegistry {
        let mut registry = LockRegistry::new();
        for (section, path) in paths {
            registry.set_item_lock(*section, path, true).unwrap();
        }
        registry
    }

    #[test]
    fn unlocked_candidate_wins_locked_index_splices() {
        let candidate = json!({
            "stats": {"health": 60},
            "inventory": {"onPerson": [{"name": "Shield"}]}
        });
        let outcome = merge(
            &candidate,
            &committed(),
            &registry(&[(Section::Inventory, "onPerson[0]")]),
        );
        let document = outcome.document().unwrap();
        assert_eq!(document.stats["health"], 60.0);
        assert_eq!(document.inventory.on_person, vec![Item::named("Sword")]);
    }

    #[test]
    fn locked_stat_keeps_committed_value_under_drift() {
        let candidate = json!({"stats": {"Health": 5}});
        let outcome = merge(&candidate, &committed(), &registry(&[(Section::Stats, "health")]));
        let document = outcome.document().unwrap();
        // Candidate shape (its casing) is kept; the value is not.
        assert_eq!(document.stats["Health"], 80.0);
    }

    #[test]
    fn omitted_fields_fall_back_to_committed() {
        let candidate = json!({"stats": {"health": 55}});
        let outcome = merge(&candidate, &committed(), &LockRegistry::new());
        let document = outcome.document().unwrap();
        assert_eq!(document.stats["health"], 55.0);
        assert_eq!(document.stats["stamina"], 70.0);
        // Sections absent from the candidate survive untouched.
        assert_eq!(document.inventory.on_person, vec![Item::named("Sword")]);
        assert_eq!(document.quests.main, Some(Quest::named("Find the Relic")));
    }

    #[test]
    fn whole_section_lock_ignores_candidate() {
        let candidate = json!({
            "stats": {"health": 1, "stamina": 1, "intellect": 99}
        });
        let mut registry = LockRegistry::new();
        registry.set_lock(Section::Stats, &FieldPath::root(), true);
        let outcome = merge(&candidate, &committed(), &registry);
        let document = outcome.document().unwrap();
        assert_eq!(document.stats, committed().stats);
    }

    #[test]
    fn generator_fields_are_adopted_when_unlocked() {
        let candidate = json!({
            "stats": {"health": 60, "focus": 90},
            "status": {"mood": "alert", "fields": {"coverStory": "traveling scribe"}}
        });
        let outcome = merge(&candidate, &committed(), &LockRegistry::new());
        let document = outcome.document().unwrap();
        assert_eq!(document.stats["focus"], 90.0);
        assert_eq!(document.status.mood, "alert");
        assert_eq!(document.status.fields["coverStory"], "traveling scribe");
    }

    #[test]
    fn fully_locked_character_is_replaced_wholesale() {
        let candidate = json!({
            "characters": [{"name": "mira", "relationship": {"trust": 0}, "mood": "hostile"}]
        });
        let outcome = merge(
            &candidate,
            &committed(),
            &registry(&[(Section::Characters, "Mira")]),
        );
        let document = outcome.document().unwrap();
        assert_eq!(document.characters, committed().characters);
    }

    #[test]
    fn character_field_lock_rewrites_only_that_field() {
        let candidate = json!({
            "characters": [{
                "name": "Mira",
                "relationship": {"trust": 0, "fear": 10},
                "details": {"occupation": "guard"}
            }]
        });
        let outcome = merge(
            &candidate,
            &committed(),
            &registry(&[(Section::Characters, "Mira.relationship.trust")]),
        );
        let document = outcome.document().unwrap();
        let mira = &document.characters[0];
        assert_eq!(mira.relationship["trust"], json!(40));
        assert_eq!(mira.relationship["fear"], json!(10));
        assert_eq!(mira.details["occupation"], json!("guard"));
    }

    #[test]
    fn character_leaf_lock_searches_known_sub_objects() {
        let candidate = json!({
            "characters": [{"name": "Mira"}]
        });
        let outcome = merge(
            &candidate,
            &committed(),
            &registry(&[(Section::Characters, "Mira.trust")]),
        );
        let document = outcome.document().unwrap();
        // `trust` lives in the committed relationship sub-object; the
        // candidate lacked the sub-object entirely, so it is created.
        assert_eq!(document.characters[0].relationship["trust"], json!(40));
    }

    #[test]
    fn dropped_locked_character_is_restored() {
        let candidate = json!({"characters": []});
        let outcome = merge(
            &candidate,
            &committed(),
            &registry(&[(Section::Characters, "Mira")]),
        );
        let document = outcome.document().unwrap();
        assert_eq!(document.characters.len(), 1);
        assert_eq!(document.characters[0].name, "Mira");
    }

    #[test]
    fn nameless_candidate_character_matches_by_position() {
        let candidate = json!({
            "characters": [{"relationship": {"trust": 5}}]
        });
        let outcome = merge(
            &candidate,
            &committed(),
            &registry(&[(Section::Characters, "Mira.relationship.trust")]),
        );
        let document = outcome.document().unwrap();
        assert_eq!(document.characters[0].relationship["trust"], json!(40));
    }

    #[test]
    fn locked_main_quest_preserved_even_when_candidate_clears_it() {
        let candidate = json!({"quests": {"main": null, "optional": []}});
        let outcome = merge(&candidate, &committed(), &registry(&[(Section::Quests, "main")]));
        let document = outcome.document().unwrap();
        assert_eq!(document.quests.main, Some(Quest::named("Find the Relic")));
    }

    #[test]
    fn unlocked_main_quest_clears_when_candidate_says_so() {
        let candidate = json!({"quests": {"main": null, "optional": []}});
        let outcome = merge(&candidate, &committed(), &LockRegistry::new());
        let document = outcome.document().unwrap();
        assert_eq!(document.quests.main, None);
    }

    #[test]
    fn merge_is_idempotent_on_identical_candidate() {
        let committed = committed();
        let registry = registry(&[(Section::Stats, "health"), (Section::Characters, "Mira")]);
        let outcome = merge(&committed.to_value(), &committed, &registry);
        assert_eq!(outcome.document().unwrap(), &committed);
    }

    #[test]
    fn annotated_candidate_is_stripped_before_merging() {
        let candidate = json!({
            "stats": {"health": {"value": 60, "locked": true}}
        });
        let outcome = merge(&candidate, &committed(), &LockRegistry::new());
        assert_eq!(outcome.document().unwrap().stats["health"], 60.0);
    }

    #[test]
    fn non_object_candidate_skips_merge() {
        let candidate = json!("garbled");
        let outcome = merge(&candidate, &committed(), &LockRegistry::new());
        assert_eq!(
            outcome,
            MergeOutcome::Skipped {
                reason: SkipReason::CandidateUnparseable,
                candidate: json!("garbled"),
            }
        );
    }

    #[test]
    fn non_object_committed_skips_merge_raw() {
        let outcome = merge_raw(&json!({"stats": {}}), &json!(17), &LockRegistry::new());
        assert!(matches!(
            outcome,
            MergeOutcome::Skipped {
                reason: SkipReason::CommittedUnparseable,
                ..
            }
        ));
    }

    #[test]
    fn candidate_version_tag_is_preserved() {
        let candidate = json!({"version": 7, "stats": {"health": 60}});
        let outcome = merge(&candidate, &committed(), &LockRegistry::new());
        assert_eq!(outcome.document().unwrap().version, 7);

        let untagged = json!({"stats": {"health": 60}});
        let outcome = merge(&untagged, &committed(), &LockRegistry::new());
        assert_eq!(outcome.document().unwrap().version, committed().version);
    }
}
