use crate::error::DecodeError;
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Side length of the hash grid; 8x8 gives a 64-bit hash.
const HASH_SIZE: u32 = 8;

/// Bit width of a perceptual hash, the largest possible distance.
pub const MAX_DISTANCE: u32 = HASH_SIZE * HASH_SIZE;

#[derive(Debug, Error)]
#[error("Invalid perceptual hash {0:?}: expected up to 16 hex digits")]
pub struct ParseHashError(pub String);

/// A 64-bit perceptual hash compared by Hamming distance.
///
/// Serialized as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PerceptualHash(u64);

impl PerceptualHash {
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Number of differing bits.
    pub fn distance(&self, other: &Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Reporting helper: `1.0 - distance / MAX_DISTANCE`. Grouping decisions
    /// use the raw distance.
    pub fn similarity_rate(&self, other: &Self) -> f64 {
        similarity_rate(self.distance(other))
    }

    fn from_hash_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        let len = bytes.len().min(8);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(u64::from_be_bytes(buf))
    }
}

pub fn similarity_rate(distance: u32) -> f64 {
    1.0 - f64::from(distance.min(MAX_DISTANCE)) / f64::from(MAX_DISTANCE)
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for PerceptualHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.len() > 16 {
            return Err(ParseHashError(s.to_string()));
        }
        u64::from_str_radix(trimmed, 16)
            .map(Self)
            .map_err(|_| ParseHashError(s.to_string()))
    }
}

impl TryFrom<String> for PerceptualHash {
    type Error = ParseHashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PerceptualHash> for String {
    fn from(value: PerceptualHash) -> Self {
        value.to_string()
    }
}

/// Computes DCT-based perceptual hashes for decoded images and frames.
pub struct PerceptualService {
    hasher: Hasher,
}

impl PerceptualService {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(HASH_SIZE, HASH_SIZE)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }

    pub fn hash_image(&self, image: &DynamicImage) -> PerceptualHash {
        let hash = self.hasher.hash_image(image);
        PerceptualHash::from_hash_bytes(hash.as_bytes())
    }

    /// Decode the image at `path` and hash it.
    pub fn hash_path(&self, path: &Path) -> Result<PerceptualHash, DecodeError> {
        let image = image::open(path)
            .map_err(|e| DecodeError::unsupported(path, format!("Failed to decode image: {}", e)))?;
        Ok(self.hash_image(&image))
    }
}

impl Default for PerceptualService {
    fn default() -> Self {
        Self::new()
    }
}
