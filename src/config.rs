use crate::core::hash::{DEFAULT_SAMPLE_BLOCK_SIZE, ExactHashMode};
use crate::core::models::MediaKind;
use crate::core::perceptual::MAX_DISTANCE;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "mpeg", "mpg", "m4v", "3gp",
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff"];

/// Tunables for one duplicate-check run.
///
/// Partial JSON documents are accepted; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max Hamming distance (inclusive) for two images to be grouped.
    pub image_hamming_threshold: u32,
    /// Frames match when their distance is strictly below this.
    pub video_frame_hamming_threshold: u32,
    pub video_frame_similarity_rate: f64,
    pub video_sample_interval_seconds: u32,
    /// Shortest/longest duration ratio below which videos are not compared.
    /// 0 disables the pre-filter.
    pub video_max_duration_diff_ratio: f64,
    pub video_extensions: BTreeSet<String>,
    pub image_extensions: BTreeSet<String>,

    pub exact_hash_mode: ExactHashMode,
    pub sample_block_size: usize,
    /// Anchor frame sampling at the end of each video.
    pub video_backwards: bool,
    pub min_group_size: usize,
    /// Hashing pool size; `None` uses one thread per CPU.
    pub worker_threads: Option<usize>,
    /// Where fingerprints persist between runs; `None` keeps them in memory.
    pub fingerprint_cache_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image_hamming_threshold: 8,
            video_frame_hamming_threshold: 5,
            video_frame_similarity_rate: 0.7,
            video_sample_interval_seconds: 30,
            video_max_duration_diff_ratio: 0.6,
            video_extensions: VIDEO_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            image_extensions: IMAGE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            exact_hash_mode: ExactHashMode::Full,
            sample_block_size: DEFAULT_SAMPLE_BLOCK_SIZE,
            video_backwards: false,
            min_group_size: 2,
            worker_threads: None,
            fingerprint_cache_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// `<user cache dir>/mediadup/fingerprints`, if the platform has one.
    pub fn default_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("mediadup").join("fingerprints"))
    }

    /// Lowercase extension sets, strip leading dots and clamp `min_group_size`.
    pub fn normalized(mut self) -> Self {
        self.video_extensions = normalize_extensions(&self.video_extensions);
        self.image_extensions = normalize_extensions(&self.image_extensions);
        self.min_group_size = self.min_group_size.max(2);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.video_sample_interval_seconds == 0 {
            return Err(invalid("video_sample_interval_seconds", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.video_frame_similarity_rate) {
            return Err(invalid(
                "video_frame_similarity_rate",
                format!("{} is outside [0, 1]", self.video_frame_similarity_rate),
            ));
        }
        if !(0.0..=1.0).contains(&self.video_max_duration_diff_ratio) {
            return Err(invalid(
                "video_max_duration_diff_ratio",
                format!("{} is outside [0, 1]", self.video_max_duration_diff_ratio),
            ));
        }
        if self.image_hamming_threshold > MAX_DISTANCE {
            return Err(invalid(
                "image_hamming_threshold",
                format!("{} exceeds {}", self.image_hamming_threshold, MAX_DISTANCE),
            ));
        }
        if self.video_frame_hamming_threshold > MAX_DISTANCE {
            return Err(invalid(
                "video_frame_hamming_threshold",
                format!("{} exceeds {}", self.video_frame_hamming_threshold, MAX_DISTANCE),
            ));
        }
        if self.sample_block_size == 0 {
            return Err(invalid("sample_block_size", "must be at least 1"));
        }
        if self.worker_threads == Some(0) {
            return Err(invalid("worker_threads", "must be at least 1"));
        }
        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn min_group_size(&self) -> usize {
        self.min_group_size.max(2)
    }

    /// Classify a file extension (with or without a leading dot, any case).
    pub fn classify(&self, extension: &str) -> MediaKind {
        let ext = normalize_extension(extension);
        if self.video_extensions.contains(&ext) {
            MediaKind::Video
        } else if self.image_extensions.contains(&ext) {
            MediaKind::Image
        } else {
            MediaKind::Other
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

pub(crate) fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

pub(crate) fn normalize_extensions(extensions: &BTreeSet<String>) -> BTreeSet<String> {
    extensions
        .iter()
        .map(|ext| normalize_extension(ext))
        .filter(|ext| !ext.is_empty())
        .collect()
}
