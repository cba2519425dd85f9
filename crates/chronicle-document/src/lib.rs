//! Chronicle Document
//!
//! The tracker document data model and everything that addresses into it.
//!
//! # Core Concepts
//!
//! - [`TrackerDocument`]: the typed role-play state blob (stats, status,
//!   attributes, skills, inventory, characters, quests)
//! - [`Section`] / [`FieldPath`]: typed hierarchical addressing, string-form
//!   compatible with persisted lock registries
//! - [`matcher`]: field-name resolution tolerant of generator casing drift
//! - [`LockRegistry`]: which fields are protected from generator overwrite
//! - [`apply_locks`] / [`remove_locks`]: lock markers at the generator
//!   boundary
//! - [`decode_document`]: tolerant decoding at the persistence boundary
//!
//! # Example
//!
//! ```rust
//! use chronicle_document::{LockRegistry, Section, TrackerDocument, apply_locks};
//!
//! let mut document = TrackerDocument::default();
//! document.stats.insert("health".to_string(), 80.0);
//!
//! let mut registry = LockRegistry::new();
//! registry.set_item_lock(Section::Stats, "health", true).unwrap();
//!
//! let payload = apply_locks(&document.to_value(), &registry);
//! assert_eq!(payload["stats"]["health"]["locked"], true);
//! ```

#![warn(unreachable_pub)]

mod annotate;
mod decode;
mod document;
mod locks;
pub mod matcher;
mod path;

pub use annotate::{apply_locks, remove_locks};
pub use decode::{decode_document, Decoded, DocumentError};
pub use document::{
    Character, Inventory, Item, JsonMap, Quest, Quests, Skill, Status, TrackerDocument,
    TRACKER_VERSION,
};
pub use locks::{LockNode, LockRegistry};
pub use path::{FieldPath, PathError, PathSegment, Section};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
