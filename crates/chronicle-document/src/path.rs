//! Typed field paths for addressing within a tracker document
//!
//! Provides [`Section`], [`PathSegment`], and [`FieldPath`] for hierarchical
//! addressing of document fields. Paths are validated at construction and
//! round-trip the persisted dotted string form exactly (including synthetic
//! bracket keys such as `optional[2]`), so lock registries written by older
//! releases keep loading unchanged.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::matcher;

/// Top-level document sections a path can address into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Numeric stats (0–100 by convention)
    Stats,
    /// Mood plus free-form status fields
    Status,
    /// Integer attributes
    Attributes,
    /// Skill lists keyed by category
    Skills,
    /// Carried, stored, and asset items
    Inventory,
    /// Named characters with open sub-objects
    Characters,
    /// Main and optional quests
    Quests,
}

impl Section {
    /// All sections, in canonical document order
    pub const ALL: [Section; 7] = [
        Section::Stats,
        Section::Status,
        Section::Attributes,
        Section::Skills,
        Section::Inventory,
        Section::Characters,
        Section::Quests,
    ];

    /// Canonical key used in serialized documents and lock registries
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Stats => "stats",
            Section::Status => "status",
            Section::Attributes => "attributes",
            Section::Skills => "skills",
            Section::Inventory => "inventory",
            Section::Characters => "characters",
            Section::Quests => "quests",
        }
    }

    /// Resolve a possibly drifted section name
    #[must_use]
    pub fn resolve(name: &str) -> Option<Section> {
        Section::ALL
            .into_iter()
            .find(|s| matcher::keys_match(s.as_str(), name))
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::resolve(s).ok_or_else(|| PathError::UnknownSection(s.to_string()))
    }
}

/// One step of a field path: a key with an optional bracket index
///
/// `optional[2]` parses to key `optional`, index `2`; the index addresses
/// an element of the list stored under the key (by position, not identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    key: String,
    index: Option<usize>,
}

impl PathSegment {
    /// Plain key segment
    #[inline]
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            index: None,
        }
    }

    /// Bracket-indexed segment (`key[index]`)
    #[inline]
    #[must_use]
    pub fn indexed(key: impl Into<String>, index: usize) -> Self {
        Self {
            key: key.into(),
            index: Some(index),
        }
    }

    /// Key part of the segment
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.key
    }

    /// Bracket index, if any
    #[inline]
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Whether this segment's string form names the same field as `other`
    #[inline]
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        matcher::keys_match(&self.to_string(), other)
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{i}]", self.key),
            None => f.write_str(&self.key),
        }
    }
}

impl FromStr for PathSegment {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::EmptySegment);
        }
        if let Some(open) = s.rfind('[') {
            let Some(stripped) = s.strip_suffix(']') else {
                return Err(PathError::UnbalancedBracket(s.to_string()));
            };
            let key = &s[..open];
            let digits = &stripped[open + 1..];
            if key.is_empty() {
                return Err(PathError::EmptySegment);
            }
            let index = digits
                .parse::<usize>()
                .map_err(|_| PathError::InvalidIndex(s.to_string()))?;
            return Ok(Self::indexed(key, index));
        }
        if s.ends_with(']') {
            return Err(PathError::UnbalancedBracket(s.to_string()));
        }
        Ok(Self::key(s))
    }
}

/// Section-relative path into a tracker document
///
/// Segments are separated by `.` in the string form. The empty path
/// addresses the section itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// Create from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Empty path (the section root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path addresses the section root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent path, unless already at the root
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Last segment, unless at the root
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Append a segment, returning a new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut next = self.clone();
        next.0.push(segment);
        next
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PathSegment> {
        self.0.iter()
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let segments = s
            .split('.')
            .map(PathSegment::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

/// Errors from path parsing
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Bracket without matching close, or stray close
    #[error("unbalanced bracket in segment: {0}")]
    UnbalancedBracket(String),

    /// Bracket contents are not a valid index
    #[error("invalid index in segment: {0}")]
    InvalidIndex(String),

    /// Name does not resolve to a known section
    #[error("unknown section: {0}")]
    UnknownSection(String),
}
