// Shared data model for duplicate detection:
// - file records handed in by the caller
// - video fingerprints derived per unique content
// - duplicate groups handed back after a run

use crate::core::perceptual::PerceptualHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Opaque, caller-owned identifier of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for FileId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub path: String,
    /// Empty when not yet computed or unavailable.
    pub exact_hash: String,
    pub size_bytes: u64,
}

impl FileRecord {
    pub fn new(id: impl Into<FileId>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            exact_hash: String::new(),
            size_bytes: 0,
        }
    }

    pub fn with_exact_hash(mut self, exact_hash: impl Into<String>) -> Self {
        self.exact_hash = exact_hash.into();
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn has_exact_hash(&self) -> bool {
        !self.exact_hash.is_empty()
    }

    /// Lowercased extension without the leading dot, or an empty string.
    pub fn extension(&self) -> String {
        Path::new(&self.path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.path)
    }
}

/// Ordered perceptual fingerprint of one video's content.
///
/// `hashes` follows sample timestamps in ascending order. An empty sequence
/// means extraction failed and the fingerprint must not be compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFingerprint {
    pub duration_seconds: f64,
    pub hashes: Vec<PerceptualHash>,
}

impl VideoFingerprint {
    pub fn new(duration_seconds: f64, hashes: Vec<PerceptualHash>) -> Self {
        Self {
            duration_seconds,
            hashes,
        }
    }

    pub fn unusable(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            hashes: Vec::new(),
        }
    }

    pub fn is_usable(&self) -> bool {
        !self.hashes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimilarityType {
    Exact,
    PerceptualHash,
    VideoFeature,
}

/// Which checker produced a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckerKind {
    Video,
    Image,
    Exact,
}

/// Media classification by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Image,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMember {
    pub file_id: FileId,
    pub similarity_type: SimilarityType,
    /// In `[0.0, 1.0]`; 1.0 for exact matches and group representatives.
    pub similarity_rate: f64,
}

impl DuplicateMember {
    pub fn exact(file_id: FileId) -> Self {
        Self {
            file_id,
            similarity_type: SimilarityType::Exact,
            similarity_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub group_name: String,
    pub checker: CheckerKind,
    /// Always at least two members.
    pub members: Vec<DuplicateMember>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, file_id: &FileId) -> bool {
        self.members.iter().any(|member| &member.file_id == file_id)
    }
}
