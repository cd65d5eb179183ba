use crate::error::HashError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Buffer size for streaming hash computation (64KB)
const HASH_BUFFER_SIZE: usize = 64 * 1024;

pub const DEFAULT_SAMPLE_BLOCK_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExactHashMode {
    /// Hash every byte of the file.
    #[default]
    Full,
    /// Hash the file size plus head, middle and tail blocks.
    Sampled,
}

/// Computes content hashes used as ground truth for identical files.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    mode: ExactHashMode,
    block_size: usize,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            mode: ExactHashMode::Full,
            block_size: DEFAULT_SAMPLE_BLOCK_SIZE,
        }
    }

    pub fn with_mode(mut self, mode: ExactHashMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn mode(&self) -> ExactHashMode {
        self.mode
    }

    /// Hash the file at `path` according to the configured mode.
    pub fn exact_hash(&self, path: &Path) -> Result<String, HashError> {
        let result = match self.mode {
            ExactHashMode::Full => self.full_hash(path),
            ExactHashMode::Sampled => self.sampled_hash(path),
        };
        result.map_err(|error| match error {
            HashError::Io(source) => HashError::unreadable(path, source),
            other => other,
        })
    }

    /// Hash an in-memory buffer. Matches `exact_hash` in `Full` mode for a
    /// file with the same bytes.
    pub fn exact_hash_bytes(&self, bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }

    fn full_hash(&self, path: &Path) -> Result<String, HashError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize().to_hex().to_string())
    }

    fn sampled_hash(&self, path: &Path) -> Result<String, HashError> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let block = self.block_size as u64;
        let mut hasher = blake3::Hasher::new();

        // Mix the size in so equal samples of different-length files diverge
        hasher.update(file_size.to_string().as_bytes());

        if file_size <= block * 3 {
            let mut contents = Vec::with_capacity(file_size as usize);
            file.read_to_end(&mut contents)?;
            hasher.update(&contents);
        } else {
            let mut buffer = vec![0u8; self.block_size];

            file.read_exact(&mut buffer)?;
            hasher.update(&buffer);

            file.seek(SeekFrom::Start(file_size / 2 - block / 2))?;
            file.read_exact(&mut buffer)?;
            hasher.update(&buffer);

            file.seek(SeekFrom::End(-(block as i64)))?;
            file.read_exact(&mut buffer)?;
            hasher.update(&buffer);
        }

        Ok(hasher.finalize().to_hex().to_string())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}
