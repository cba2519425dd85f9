//! Session context: settings, committed document, and the generation cycle
//!
//! One [`TrackerSession`] per conversation, owned by the conversation
//! entity. It carries the typed settings and the committed document
//! explicitly — there is no ambient global state — and exposes the
//! operations the host calls at its well-defined points: session load,
//! outbound payload construction, generation completion, direct user
//! edits, and lock toggling.
//!
//! The committed document is only ever replaced by whole-value
//! reassignment after a successful merge, never mutated partially in
//! place. Re-entrancy gating (one generation cycle in flight) is the
//! caller's responsibility.

use chrono::{DateTime, Utc};
use chronicle_document::{
    apply_locks, decode_document, remove_locks, Section, TrackerDocument, TRACKER_VERSION,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chronicle_document::matcher;

use crate::error::EngineError;
use crate::legacy::adapt_legacy_document;
use crate::merge::{merge, MergeOutcome};
use crate::migrate::migrate_settings;
use crate::settings::Settings;

/// The persisted per-session envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Document schema version of the committed data
    pub tracker_version: u32,

    /// The committed document
    pub committed_tracker_data: Value,

    /// The most recent raw generator response, for diagnosis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated_data: Option<Value>,

    /// When the committed data last changed
    pub timestamp: DateTime<Utc>,
}

/// Per-conversation tracker state
#[derive(Debug, Clone)]
pub struct TrackerSession {
    settings: Settings,
    committed: TrackerDocument,
    last_generated: Option<Value>,
    dirty: bool,
    updated_at: DateTime<Utc>,
}

impl TrackerSession {
    /// Fresh session seeded from the configured defaults
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        let committed =
            adapt_legacy_document(&Value::Object(Default::default()), &settings.tracker_config);
        Self {
            settings,
            committed,
            last_generated: None,
            dirty: false,
            updated_at: Utc::now(),
        }
    }

    /// Load a session from persisted envelopes
    ///
    /// Runs the settings migrator first. A missing record yields a fresh
    /// session; a stale record (`trackerVersion` below current) routes the
    /// committed data through the legacy adapter; any subtree repair marks
    /// the session dirty for re-persistence.
    #[must_use]
    pub fn load(settings_value: &Value, record_value: Option<&Value>) -> Self {
        let migrated = migrate_settings(settings_value);
        let (settings, settings_dirty) = Settings::from_value(&migrated);
        let migration_ran = &migrated != settings_value;

        let mut session = match record_value {
            None => Self::new(settings),
            Some(record) => Self::from_record(settings, record),
        };
        session.dirty |= settings_dirty || migration_ran;
        session
    }

    fn from_record(settings: Settings, record: &Value) -> Self {
        let Some(object) = record.as_object() else {
            tracing::warn!("session record is not an object, starting fresh");
            let mut session = Self::new(settings);
            session.dirty = true;
            return session;
        };

        let tracker_version = matcher::resolve_value(object, "trackerVersion")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);
        let committed_raw = matcher::resolve_value(object, "committedTrackerData")
            .cloned()
            .unwrap_or(Value::Null);
        let last_generated =
            matcher::resolve_value(object, "lastGeneratedData").cloned();
        let timestamp = matcher::resolve_value(object, "timestamp")
            .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).ok());

        let (committed, dirty) = if tracker_version < TRACKER_VERSION {
            tracing::info!(
                from = tracker_version,
                to = TRACKER_VERSION,
                "adapting stale tracker data"
            );
            (
                adapt_legacy_document(&remove_locks(&committed_raw), &settings.tracker_config),
                true,
            )
        } else {
            match decode_document(&remove_locks(&committed_raw)) {
                Ok(decoded) => (decoded.document, decoded.dirty),
                Err(err) => {
                    tracing::warn!(error = %err, "committed data unusable, starting fresh");
                    (
                        adapt_legacy_document(
                            &Value::Object(Default::default()),
                            &settings.tracker_config,
                        ),
                        true,
                    )
                }
            }
        };

        Self {
            settings,
            committed,
            last_generated,
            dirty,
            updated_at: timestamp.unwrap_or_else(Utc::now),
        }
    }

    /// Current settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The committed document, the current source of truth
    #[inline]
    #[must_use]
    pub fn committed(&self) -> &TrackerDocument {
        &self.committed
    }

    /// The outbound generator payload: committed document with lock markers
    #[must_use]
    pub fn annotated_payload(&self) -> Value {
        apply_locks(&self.committed.to_value(), &self.settings.locked_items)
    }

    /// Merge a generation result and, on success, commit it
    ///
    /// The committed document is replaced atomically by the merge output;
    /// a skipped merge leaves it untouched.
    pub fn apply_generation(&mut self, candidate: &Value) -> MergeOutcome {
        let outcome = merge(candidate, &self.committed, &self.settings.locked_items);
        if let MergeOutcome::Merged { document, .. } = &outcome {
            self.committed = document.clone();
            self.last_generated = Some(candidate.clone());
            self.touch();
        }
        outcome
    }

    /// Commit a direct user edit immediately
    pub fn apply_user_edit(&mut self, document: TrackerDocument) {
        self.committed = document;
        self.touch();
    }

    /// Toggle a lock; the change persists with the settings envelope
    ///
    /// # Errors
    /// Returns [`EngineError::Path`] when the path string cannot be parsed.
    pub fn set_item_lock(
        &mut self,
        section: Section,
        path: &str,
        locked: bool,
    ) -> Result<(), EngineError> {
        self.settings
            .locked_items
            .set_item_lock(section, path, locked)?;
        self.dirty = true;
        Ok(())
    }

    /// Whether a field is currently locked
    ///
    /// # Errors
    /// Returns [`EngineError::Path`] when the path string cannot be parsed.
    pub fn is_item_locked(&self, section: Section, path: &str) -> Result<bool, EngineError> {
        Ok(self.settings.locked_items.is_item_locked(section, path)?)
    }

    /// The session record envelope for the host's session store
    #[must_use]
    pub fn export_record(&self) -> Value {
        let record = SessionRecord {
            tracker_version: self.committed.version,
            committed_tracker_data: self.committed.to_value(),
            last_generated_data: self.last_generated.clone(),
            timestamp: self.updated_at,
        };
        serde_json::to_value(&record).unwrap_or(Value::Null)
    }

    /// The settings envelope for the host's settings store
    #[must_use]
    pub fn export_settings(&self) -> Value {
        serde_json::to_value(&self.settings).unwrap_or(Value::Null)
    }

    /// Whether state changed in a way that should be re-persisted;
    /// clears the flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Discard all session state back to the configured defaults
    pub fn reset(&mut self) {
        self.committed = adapt_legacy_document(
            &Value::Object(Default::default()),
            &self.settings.tracker_config,
        );
        self.last_generated = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.dirty = true;
    }
}
