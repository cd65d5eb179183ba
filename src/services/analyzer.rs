use crate::checker::{FingerprintSource, PerceptualSource};
use crate::config::EngineConfig;
use crate::core::cache::{FingerprintCache, FingerprintStore, MemoryStore, SledStore};
use crate::core::hash::ContentHasher;
use crate::core::models::{FileRecord, VideoFingerprint};
use crate::core::perceptual::{PerceptualHash, PerceptualService};
use crate::core::video::{FfmpegDecoder, FrameSampler, VideoDecoder};
use crate::error::{EngineError, HashError};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Per-run media analysis: exact hashes, image pHashes and video fingerprints.
///
/// Derived data is memoised by exact hash, so identical content is decoded once
/// per run however many paths point at it. Failures are remembered the same
/// way and are not retried. Safe to share across the hashing pool.
pub struct MediaAnalyzer {
    hasher: ContentHasher,
    perceptual: PerceptualService,
    sampler: FrameSampler,
    fingerprints: FingerprintCache,
    image_hashes: RwLock<HashMap<String, PerceptualHash>>,
    failed_videos: RwLock<HashSet<String>>,
    failed_images: RwLock<HashSet<String>>,
}

impl MediaAnalyzer {
    /// ffmpeg-backed analyzer. Fingerprints persist in `fingerprint_cache_dir`
    /// when one is configured, otherwise only for the lifetime of the analyzer.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let store: Box<dyn FingerprintStore> = match &config.fingerprint_cache_dir {
            Some(dir) => {
                info!("Using fingerprint store at {}", dir.display());
                Box::new(SledStore::open(dir)?)
            }
            None => Box::new(MemoryStore::new()),
        };

        let decoder = FfmpegDecoder::new();
        if !decoder.is_available() {
            warn!("ffmpeg not found on PATH, videos will not be fingerprinted");
        }

        Ok(Self::with_components(config, Box::new(decoder), store))
    }

    pub fn with_components(
        config: &EngineConfig,
        decoder: Box<dyn VideoDecoder>,
        store: Box<dyn FingerprintStore>,
    ) -> Self {
        let hasher = ContentHasher::new()
            .with_mode(config.exact_hash_mode)
            .with_block_size(config.sample_block_size);
        let sampler = FrameSampler::new(decoder, config.video_sample_interval_seconds)
            .with_backwards(config.video_backwards);

        Self {
            hasher,
            perceptual: PerceptualService::new(),
            sampler,
            fingerprints: FingerprintCache::new(store),
            image_hashes: RwLock::new(HashMap::new()),
            failed_videos: RwLock::new(HashSet::new()),
            failed_images: RwLock::new(HashSet::new()),
        }
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    /// The record's exact hash, computing it from disk when missing.
    pub fn resolve_exact_hash(&self, record: &FileRecord) -> Result<String, HashError> {
        if record.has_exact_hash() {
            return Ok(record.exact_hash.clone());
        }
        self.hasher.exact_hash(Path::new(&record.path))
    }

    /// Number of distinct contents fingerprinted or loaded this run.
    pub fn cached_fingerprints(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn cached_image_hashes(&self) -> usize {
        self.image_hashes.read().map(|memo| memo.len()).unwrap_or(0)
    }

    fn compute_fingerprint(&self, record: &FileRecord) -> Result<VideoFingerprint, EngineError> {
        Ok(self.sampler.fingerprint(Path::new(&record.path))?)
    }
}

fn check_not_failed(
    failed: &RwLock<HashSet<String>>,
    record: &FileRecord,
) -> Result<(), EngineError> {
    let known = failed
        .read()
        .map(|failed| failed.contains(&record.exact_hash))
        .unwrap_or(false);
    if known {
        debug!("Skipping {}, its content already failed", record.path);
        return Err(EngineError::PreviouslyFailed {
            path: record.path.clone(),
        });
    }
    Ok(())
}

fn remember_failure(failed: &RwLock<HashSet<String>>, record: &FileRecord) {
    if let Ok(mut failed) = failed.write() {
        failed.insert(record.exact_hash.clone());
    }
}

impl FingerprintSource for MediaAnalyzer {
    fn fingerprint(&self, record: &FileRecord) -> Result<Arc<VideoFingerprint>, EngineError> {
        // Without a content key there is nothing safe to cache under
        if !record.has_exact_hash() {
            return self.compute_fingerprint(record).map(Arc::new);
        }
        check_not_failed(&self.failed_videos, record)?;
        self.fingerprints
            .get_or_compute(&record.exact_hash, || self.compute_fingerprint(record))
            .inspect_err(|_| remember_failure(&self.failed_videos, record))
    }
}

impl PerceptualSource for MediaAnalyzer {
    fn perceptual_hash(&self, record: &FileRecord) -> Result<PerceptualHash, EngineError> {
        let path = Path::new(&record.path);
        if !record.has_exact_hash() {
            return Ok(self.perceptual.hash_path(path)?);
        }

        if let Some(hash) = self
            .image_hashes
            .read()
            .ok()
            .and_then(|memo| memo.get(&record.exact_hash).copied())
        {
            debug!("Reusing perceptual hash for {}", record.path);
            return Ok(hash);
        }

        check_not_failed(&self.failed_images, record)?;
        let hash = match self.perceptual.hash_path(path) {
            Ok(hash) => hash,
            Err(e) => {
                remember_failure(&self.failed_images, record);
                return Err(e.into());
            }
        };
        if let Ok(mut memo) = self.image_hashes.write() {
            return Ok(*memo.entry(record.exact_hash.clone()).or_insert(hash));
        }
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::NoopStore;
    use crate::core::video::tests::FakeDecoder;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn analyzer() -> MediaAnalyzer {
        let config = EngineConfig {
            video_sample_interval_seconds: 10,
            ..EngineConfig::default()
        };
        MediaAnalyzer::with_components(
            &config,
            Box::new(FakeDecoder::with_duration(40.0)),
            Box::new(NoopStore),
        )
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        }))
    }

    #[test]
    fn test_resolve_exact_hash_prefers_precomputed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.bin");
        fs::write(&path, b"payload").unwrap();
        let path = path.to_string_lossy().to_string();

        let analyzer = analyzer();
        let given = FileRecord::new("a", path.clone()).with_exact_hash("given");
        assert_eq!(analyzer.resolve_exact_hash(&given).unwrap(), "given");

        let lazy = FileRecord::new("a", path);
        assert_eq!(
            analyzer.resolve_exact_hash(&lazy).unwrap(),
            analyzer.hasher().exact_hash_bytes(b"payload")
        );

        let missing = FileRecord::new("m", "/nonexistent/file.bin");
        assert!(matches!(
            analyzer.resolve_exact_hash(&missing),
            Err(HashError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_fingerprints_shared_by_content() {
        let analyzer = analyzer();
        let first = FileRecord::new("1", "/videos/a.mp4").with_exact_hash("same");
        let second = FileRecord::new("2", "/videos/copy-of-a.mp4").with_exact_hash("same");

        let a = analyzer.fingerprint(&first).unwrap();
        let b = analyzer.fingerprint(&second).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.hashes.len(), 4);
        assert_eq!(analyzer.cached_fingerprints(), 1);
    }

    #[test]
    fn test_fingerprint_without_exact_hash_bypasses_cache() {
        let analyzer = analyzer();
        let record = FileRecord::new("1", "/videos/a.mp4");
        let fingerprint = analyzer.fingerprint(&record).unwrap();
        assert_eq!(fingerprint.duration_seconds, 40.0);
        assert_eq!(analyzer.cached_fingerprints(), 0);
    }

    #[test]
    fn test_undecodable_video_is_an_error() {
        let config = EngineConfig::default();
        let decoder = FakeDecoder {
            info: None,
            ..FakeDecoder::with_duration(1.0)
        };
        let analyzer =
            MediaAnalyzer::with_components(&config, Box::new(decoder), Box::new(NoopStore));
        let record = FileRecord::new("1", "/videos/broken.mp4").with_exact_hash("h");
        assert!(matches!(
            analyzer.fingerprint(&record),
            Err(EngineError::Decode(_))
        ));
        assert_eq!(analyzer.cached_fingerprints(), 0);
    }

    #[test]
    fn test_failed_content_is_not_decoded_again() {
        let config = EngineConfig::default();
        let decoder = FakeDecoder {
            info: None,
            ..FakeDecoder::with_duration(1.0)
        };
        let analyzer =
            MediaAnalyzer::with_components(&config, Box::new(decoder), Box::new(NoopStore));

        let broken = FileRecord::new("1", "/videos/broken.mp4").with_exact_hash("bad");
        let copy = FileRecord::new("2", "/videos/broken-copy.mp4").with_exact_hash("bad");
        assert!(matches!(
            analyzer.fingerprint(&broken),
            Err(EngineError::Decode(_))
        ));
        assert!(matches!(
            analyzer.fingerprint(&broken),
            Err(EngineError::PreviouslyFailed { .. })
        ));
        assert!(matches!(
            analyzer.fingerprint(&copy),
            Err(EngineError::PreviouslyFailed { path }) if path == "/videos/broken-copy.mp4"
        ));

        let temp_dir = TempDir::new().unwrap();
        let photo = temp_dir.path().join("broken.jpg");
        fs::write(&photo, b"not an image").unwrap();
        let record = FileRecord::new("3", photo.to_string_lossy()).with_exact_hash("bad-image");
        assert!(matches!(
            analyzer.perceptual_hash(&record),
            Err(EngineError::Decode(_))
        ));
        // Repairing the file on disk does not matter within the same run
        gradient(32, 32)
            .save_with_format(&photo, image::ImageFormat::Png)
            .unwrap();
        assert!(matches!(
            analyzer.perceptual_hash(&record),
            Err(EngineError::PreviouslyFailed { .. })
        ));
    }

    #[test]
    fn test_image_hash_memoised_by_content() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.png");
        let second = temp_dir.path().join("b.png");
        gradient(64, 48).save(&first).unwrap();
        fs::copy(&first, &second).unwrap();

        let analyzer = analyzer();
        let a = FileRecord::new("a", first.to_string_lossy()).with_exact_hash("h1");
        let b = FileRecord::new("b", second.to_string_lossy()).with_exact_hash("h1");

        let hash_a = analyzer.perceptual_hash(&a).unwrap();
        let hash_b = analyzer.perceptual_hash(&b).unwrap();
        assert_eq!(hash_a, hash_b);
        assert_eq!(analyzer.cached_image_hashes(), 1);

        let broken = temp_dir.path().join("broken.jpg");
        fs::write(&broken, b"not an image").unwrap();
        let broken = FileRecord::new("c", broken.to_string_lossy()).with_exact_hash("h2");
        assert!(analyzer.perceptual_hash(&broken).is_err());
        assert_eq!(analyzer.cached_image_hashes(), 1);
    }

    #[test]
    fn test_sled_store_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig {
            fingerprint_cache_dir: Some(temp_dir.path().join("fingerprints")),
            ..EngineConfig::default()
        };
        assert!(MediaAnalyzer::new(&config).is_ok());
    }
}
