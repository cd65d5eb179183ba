use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("Unreadable file: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HashError {
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported or corrupt media: {path}: {reason}")]
    UnsupportedOrCorrupt { path: PathBuf, reason: String },
}

impl DecodeError {
    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedOrCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Umbrella error for the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Hash computation error: {0}")]
    Hash(#[from] HashError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Fingerprint cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The same content already failed analysis earlier in this run.
    #[error("Analysis already failed for {path}")]
    PreviouslyFailed { path: String },
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DecodeError::unsupported("/videos/broken.mp4", "no video stream");
        assert_eq!(
            error.to_string(),
            "Unsupported or corrupt media: /videos/broken.mp4: no video stream"
        );

        let error = ConfigError::Invalid {
            field: "video_sample_interval_seconds",
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for video_sample_interval_seconds: must be at least 1"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let hash_error: HashError = io_error.into();
        assert!(matches!(hash_error, HashError::Io(_)));

        let engine_error: EngineError = hash_error.into();
        assert!(matches!(engine_error, EngineError::Hash(_)));

        let engine_error: EngineError = CacheError::Poisoned.into();
        assert!(matches!(engine_error, EngineError::Cache(CacheError::Poisoned)));
    }
}
