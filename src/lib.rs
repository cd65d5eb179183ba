//! Duplicate and near-duplicate detection for image and video libraries.
//!
//! Files are routed by extension to one of three checkers: videos are
//! clustered by sampled frame fingerprints, images by perceptual hash, and
//! everything else by exact content hash. [`DuplicateCheckService`] drives a
//! whole run; the checkers and core building blocks can also be used directly.

pub mod checker;
pub mod config;
pub mod core;
pub mod error;
pub mod services;

pub use checker::{CheckerStats, DuplicateChecker, FingerprintSource, PerceptualSource};
pub use config::EngineConfig;
pub use crate::core::models::{
    CheckerKind, DuplicateGroup, DuplicateMember, FileId, FileRecord, MediaKind, SimilarityType,
    VideoFingerprint,
};
pub use crate::core::perceptual::PerceptualHash;
pub use error::{CacheError, ConfigError, DecodeError, EngineError, HashError, Result};
pub use services::{
    CheckPhase, CheckProgress, CheckReport, DuplicateCheckDispatcher, DuplicateCheckService,
    MediaAnalyzer,
};
