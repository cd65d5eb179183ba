//! Duplicate checkers: one grouping strategy per media family.
//!
//! A checker claims files by extension, accumulates them with `add_file`, and
//! emits its groups once with `get_results`. Checkers are single-consumer;
//! feeding must be serialized by the caller.

pub mod exact;
pub mod image;
pub mod tree;
pub mod video;

pub use exact::ExactMatchChecker;
pub use image::{ImageChecker, ImageGrouper};
pub use tree::{TreeStats, VideoSimilarityTree};
pub use video::VideoChecker;

use crate::core::models::{CheckerKind, DuplicateGroup, FileRecord, VideoFingerprint};
use crate::core::perceptual::PerceptualHash;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerStats {
    /// Files handed to `add_file`.
    pub accepted: usize,
    /// Files that could not be analyzed and take no part in similarity grouping.
    pub unusable: usize,
}

pub trait DuplicateChecker: Send {
    fn kind(&self) -> CheckerKind;

    /// `extension` is lowercase without the leading dot.
    fn is_supported(&self, extension: &str) -> bool;

    /// Never fails from the caller's view; analysis failures are logged and counted.
    fn add_file(&mut self, record: FileRecord);

    fn get_results(&mut self) -> Vec<DuplicateGroup>;

    fn stats(&self) -> CheckerStats;
}

/// Supplies video fingerprints, typically cached by exact hash.
pub trait FingerprintSource: Send + Sync {
    fn fingerprint(&self, record: &FileRecord) -> Result<Arc<VideoFingerprint>, EngineError>;
}

/// Supplies image perceptual hashes.
pub trait PerceptualSource: Send + Sync {
    fn perceptual_hash(&self, record: &FileRecord) -> Result<PerceptualHash, EngineError>;
}
