//! Chronicle Engine
//!
//! Schema migration, legacy adaptation, and lock-honoring merge for
//! tracker documents.
//!
//! # Core Concepts
//!
//! - [`Settings`] / [`migrate_settings`]: the persisted configuration
//!   envelope and the versioned migration chain that keeps it current
//! - [`adapt_legacy_document`]: one-shot conversion of historical tracker
//!   payload shapes into the current document
//! - [`merge`] / [`MergeOutcome`]: the candidate-vs-committed merge that
//!   honors the lock registry despite generator naming drift
//! - [`TrackerSession`]: the explicit per-conversation context tying the
//!   pieces together
//!
//! # Example
//!
//! ```rust
//! use chronicle_engine::{Settings, TrackerSession};
//! use chronicle_document::Section;
//! use serde_json::json;
//!
//! let mut session = TrackerSession::new(Settings::default());
//! session.set_item_lock(Section::Stats, "health", true).unwrap();
//!
//! let outcome = session.apply_generation(&json!({
//!     "stats": {"health": 10, "stamina": 55}
//! }));
//! assert!(outcome.is_merged());
//! // The locked stat kept its committed value; the rest was adopted.
//! assert_eq!(session.committed().stats["health"], 100.0);
//! assert_eq!(session.committed().stats["stamina"], 55.0);
//! ```

#![warn(unreachable_pub)]

mod error;
mod legacy;
mod merge;
mod migrate;
mod session;
mod settings;

pub use error::{EngineError, SkipReason};
pub use legacy::{adapt_legacy_document, parse_item_list, parse_skill_list};
pub use merge::{merge, merge_raw, MergeOutcome};
pub use migrate::{deep_merge_defaults, migrate_settings};
pub use session::{SessionRecord, TrackerSession};
pub use settings::{
    AttributeConfig, SectionToggles, Settings, StatConfig, StatusFieldConfig, TrackerConfig,
    SETTINGS_VERSION,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
