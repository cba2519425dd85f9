//! Error types for the engine
//!
//! The taxonomy mirrors how failures actually degrade:
//! - structural mismatches skip a migration step and continue,
//! - parse failures skip a merge and hand the best document back,
//! - corrupt persisted state resets only the offending subtree.
//!
//! Nothing here is fatal to the host process.

use chronicle_document::{DocumentError, PathError};

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A migration step found neither its expected prior shape nor the
    /// target shape
    #[error("migration step {step} ({name}): {detail}")]
    StructuralMismatch {
        /// Step number in the chain
        step: u32,
        /// Step name, for log correlation
        name: &'static str,
        /// What was wrong with the envelope
        detail: String,
    },

    /// A payload could not be used as a document
    #[error("parse failure: {0}")]
    ParseFailure(#[from] DocumentError),

    /// A lock path string could not be parsed
    #[error("path error: {0}")]
    Path(#[from] PathError),
}

/// Why a merge was skipped rather than performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The candidate payload is not a JSON object
    CandidateUnparseable,
    /// The committed payload is not a JSON object
    CommittedUnparseable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::CandidateUnparseable => f.write_str("candidate unparseable"),
            SkipReason::CommittedUnparseable => f.write_str("committed unparseable"),
        }
    }
}
