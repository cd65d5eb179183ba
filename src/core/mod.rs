pub mod cache;
pub mod fragment;
pub mod hash;
pub mod models;
pub mod perceptual;
pub mod video;

pub use cache::{FingerprintCache, FingerprintStore, MemoryStore, NoopStore, SledStore};
pub use fragment::max_similarity;
pub use hash::{ContentHasher, ExactHashMode};
pub use models::*;
pub use perceptual::{PerceptualHash, PerceptualService};
pub use video::{FfmpegDecoder, FrameSampler, StreamInfo, VideoDecoder};
