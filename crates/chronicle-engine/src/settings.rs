//! Persisted settings envelope and tracker configuration
//!
//! The settings envelope is read and written wholesale by the host's
//! settings store. Inside it, `trackerConfig` decides which stats,
//! attributes, and sections the tracker follows, and `lockedItems` is the
//! lock registry.

use chronicle_document::{matcher, LockRegistry};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current settings schema version
pub const SETTINGS_VERSION: u32 = 3;

/// The persisted settings envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Settings schema version; equals [`SETTINGS_VERSION`] after migration
    pub settings_version: u32,

    /// Which stats/attributes/sections are tracked, and their defaults
    #[serde(default)]
    pub tracker_config: TrackerConfig,

    /// Fields protected from generator overwrite
    #[serde(default)]
    pub locked_items: LockRegistry,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            settings_version: SETTINGS_VERSION,
            tracker_config: TrackerConfig::default(),
            locked_items: LockRegistry::new(),
        }
    }
}

/// Which parts of the tracker are enabled and how they start out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Tracked stats
    pub stats: Vec<StatConfig>,

    /// Tracked attributes
    pub attributes: Vec<AttributeConfig>,

    /// Named status fields the tracker prompts for
    #[serde(default)]
    pub status_fields: Vec<StatusFieldConfig>,

    /// Coarse per-section enablement
    #[serde(default)]
    pub sections: SectionToggles,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stats: vec![
                StatConfig::new("health", "Health"),
                StatConfig::new("stamina", "Stamina"),
                StatConfig::new("hunger", "Hunger"),
                StatConfig::new("hygiene", "Hygiene"),
            ],
            attributes: vec![
                AttributeConfig::new("strength"),
                AttributeConfig::new("agility"),
                AttributeConfig::new("wits"),
            ],
            status_fields: vec![
                StatusFieldConfig::new("physicalState", "How the body is holding up"),
                StatusFieldConfig::new("mentalState", "Where the mind is at"),
            ],
            sections: SectionToggles::default(),
        }
    }
}

/// One tracked stat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatConfig {
    /// Stable identifier used as the document key
    pub id: String,
    /// Display label
    pub label: String,
    /// Starting value; when absent, a name-pattern default applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<f64>,
    /// Whether the stat is tracked at all
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

impl StatConfig {
    /// Enabled stat with no explicit starting value
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            default_value: None,
            enabled: true,
        }
    }
}

/// One tracked attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeConfig {
    /// Stable identifier used as the document key
    pub id: String,
    /// Starting value; 10 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<i64>,
    /// Whether the attribute is tracked at all
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

impl AttributeConfig {
    /// Enabled attribute with no explicit starting value
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_value: None,
            enabled: true,
        }
    }
}

/// One named status field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusFieldConfig {
    /// Field name used as the document key
    pub name: String,
    /// What the generator is told the field is for
    #[serde(default)]
    pub description: String,
}

impl StatusFieldConfig {
    /// Field with a description
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Coarse per-section enablement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionToggles {
    /// Track inventory
    pub inventory: bool,
    /// Track skills
    pub skills: bool,
    /// Track characters
    pub characters: bool,
    /// Track quests
    pub quests: bool,
}

impl Default for SectionToggles {
    fn default() -> Self {
        Self {
            inventory: true,
            skills: true,
            characters: true,
            quests: true,
        }
    }
}

fn enabled_default() -> bool {
    true
}

/// The default settings envelope, used as the deep-merge baseline
pub(crate) static DEFAULT_ENVELOPE: Lazy<Value> = Lazy::new(|| {
    serde_json::to_value(Settings::default()).unwrap_or(Value::Null)
});

impl Settings {
    /// Decode a migrated settings envelope into typed form
    ///
    /// Wrong-typed subtrees reset to their defaults; the second return
    /// value is true when any such repair happened and the healed envelope
    /// should be re-persisted.
    #[must_use]
    pub fn from_value(value: &Value) -> (Self, bool) {
        let Some(object) = value.as_object() else {
            tracing::warn!("settings envelope is not an object, resetting");
            return (Self::default(), true);
        };
        let mut dirty = false;

        let settings_version = matcher::resolve_value(object, "settingsVersion")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or_else(|| {
                tracing::warn!("settings version missing, assuming 0");
                dirty = true;
                0
            });

        let tracker_config = match matcher::resolve_value(object, "trackerConfig") {
            Some(raw) => match serde_json::from_value(raw.clone()) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(error = %err, "trackerConfig unusable, resetting");
                    dirty = true;
                    TrackerConfig::default()
                }
            },
            None => {
                dirty = true;
                TrackerConfig::default()
            }
        };

        let locked_items = match matcher::resolve_value(object, "lockedItems") {
            Some(raw) => match serde_json::from_value(raw.clone()) {
                Ok(registry) => registry,
                Err(err) => {
                    tracing::warn!(error = %err, "lockedItems unusable, resetting");
                    dirty = true;
                    LockRegistry::new()
                }
            },
            None => LockRegistry::new(),
        };

        (
            Self {
                settings_version,
                tracker_config,
                locked_items,
            },
            dirty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn default_envelope_is_current_version() {
        assert_eq!(DEFAULT_ENVELOPE["settingsVersion"], json!(SETTINGS_VERSION));
        assert!(DEFAULT_ENVELOPE["trackerConfig"]["stats"].is_array());
    }

    #[test]
    fn from_value_roundtrips_defaults() {
        let (settings, dirty) = Settings::from_value(&DEFAULT_ENVELOPE);
        assert!(!dirty);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn corrupt_config_resets_only_that_subtree() {
        let value = json!({
            "settingsVersion": 3,
            "trackerConfig": "not an object",
            "lockedItems": {"stats": {"health": true}}
        });
        let (settings, dirty) = Settings::from_value(&value);
        assert!(dirty);
        assert_eq!(settings.tracker_config, TrackerConfig::default());
        assert!(!settings.locked_items.is_empty());
    }

    #[test]
    fn non_object_envelope_resets_entirely() {
        let (settings, dirty) = Settings::from_value(&json!(42));
        assert!(dirty);
        assert_eq!(settings, Settings::default());
    }
}
