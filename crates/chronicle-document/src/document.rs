//! The tracker document: canonical role-play state
//!
//! Typed per section, with open maps wherever the external generator is
//! allowed to introduce fields of its own. Unknown keys are never dropped:
//! they ride along in the open maps (`Status::fields`, character
//! sub-objects, `Character::extra`) so a regeneration cycle round-trips
//! them untouched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open JSON object used for generator-shaped sub-trees
pub type JsonMap = serde_json::Map<String, Value>;

/// Current tracker document schema version
pub const TRACKER_VERSION: u32 = 2;

/// The canonical state blob evolved across a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerDocument {
    /// Schema version tag; equals [`TRACKER_VERSION`] after migration
    #[serde(default)]
    pub version: u32,

    /// statId → numeric value (0–100 by convention, not enforced here)
    #[serde(default)]
    pub stats: IndexMap<String, f64>,

    /// Mood plus free-form string fields
    #[serde(default)]
    pub status: Status,

    /// attributeId → integer value
    #[serde(default)]
    pub attributes: IndexMap<String, i64>,

    /// category → ordered skill list
    #[serde(default)]
    pub skills: IndexMap<String, Vec<Skill>>,

    /// Carried, stored, and asset items
    #[serde(default)]
    pub inventory: Inventory,

    /// Named characters with open sub-objects
    #[serde(default)]
    pub characters: Vec<Character>,

    /// Main and optional quests
    #[serde(default)]
    pub quests: Quests,
}

impl Default for TrackerDocument {
    fn default() -> Self {
        Self {
            version: TRACKER_VERSION,
            stats: IndexMap::new(),
            status: Status::default(),
            attributes: IndexMap::new(),
            skills: IndexMap::new(),
            inventory: Inventory::default(),
            characters: Vec::new(),
            quests: Quests::default(),
        }
    }
}

impl TrackerDocument {
    /// Serialize to a JSON value envelope
    ///
    /// Serialization of the typed document cannot fail; the panic branch
    /// is unreachable.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Find a character by (possibly drifted) name
    #[must_use]
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters
            .iter()
            .find(|c| crate::matcher::keys_match(&c.name, name))
    }
}

/// Mood plus a free-form field map
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
    /// Current mood
    #[serde(default)]
    pub mood: String,

    /// fieldName → value; the generator may add fields here freely
    #[serde(default)]
    pub fields: IndexMap<String, String>,
}

/// One learned skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Skill name
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
}

impl Skill {
    /// Skill with an empty description
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }
}

/// Inventory: carried, stored by location, and owned assets
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    /// Items carried on person
    #[serde(default)]
    pub on_person: Vec<Item>,

    /// location → items stored there
    #[serde(default)]
    pub stored: IndexMap<String, Vec<Item>>,

    /// Large possessions (property, vehicles)
    #[serde(default)]
    pub assets: Vec<Item>,
}

/// One inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Item name
    pub name: String,

    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Skill granted while the item is held
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grants_skill: Option<String>,

    /// Stack size, when more than one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
}

impl Item {
    /// Item with only a name
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            grants_skill: None,
            quantity: None,
        }
    }

    /// Item with a name and stack size
    #[inline]
    #[must_use]
    pub fn stack(name: impl Into<String>, quantity: u64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::named(name)
        }
    }
}

/// One tracked character
///
/// `details`, `relationship`, and `thoughts` are open objects: the
/// generator decides what lives inside them. Any other top-level key the
/// generator invents is captured in `extra` and survives round-trips.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Character {
    /// Character name; the merge key between generations
    #[serde(default)]
    pub name: String,

    /// Appearance, occupation, and whatever else the generator records
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub details: JsonMap,

    /// Standing with the player
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub relationship: JsonMap,

    /// Inner monologue fields
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub thoughts: JsonMap,

    /// Generator-introduced top-level fields
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Main quest plus optional side quests
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Quests {
    /// Current main quest, if any
    #[serde(default)]
    pub main: Option<Quest>,

    /// Side quests
    #[serde(default)]
    pub optional: Vec<Quest>,
}

/// One quest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    /// Quest name
    pub name: String,
    /// Quest description
    #[serde(default)]
    pub description: String,
}

impl Quest {
    /// Quest with an empty description
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }
}
