use super::FingerprintSource;
use crate::core::fragment::max_similarity;
use crate::core::models::{FileRecord, VideoFingerprint};
use crate::core::perceptual::PerceptualHash;
use crate::error::EngineError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeState {
    Empty,
    Accumulating,
    Finalized,
}

/// Counters describing how much work grouping did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub videos: usize,
    pub unusable: usize,
    /// Calls into the sliding-window matcher.
    pub fragment_comparisons: usize,
    /// Representatives skipped by the duration pre-filter.
    pub duration_rejects: usize,
}

/// One video inside a similarity group.
#[derive(Debug, Clone)]
pub struct VideoMember {
    pub record: FileRecord,
    pub duration_seconds: Option<f64>,
    /// 1.0 for the representative; otherwise the similarity measured when the
    /// member joined or was displaced.
    pub similarity_rate: f64,
    fingerprint: Option<Arc<VideoFingerprint>>,
}

impl VideoMember {
    fn comparable_hashes(&self) -> Option<&[PerceptualHash]> {
        self.fingerprint
            .as_deref()
            .filter(|fingerprint| fingerprint.is_usable())
            .map(|fingerprint| fingerprint.hashes.as_slice())
    }
}

/// Incremental clustering of videos around their longest member.
///
/// Each group keeps its representative, the longest video, at index 0. A new
/// video is compared against representatives in group creation order and joins
/// the first group it matches.
pub struct VideoSimilarityTree {
    source: Arc<dyn FingerprintSource>,
    frame_similar_distance: u32,
    frame_similarity_rate: f64,
    max_duration_diff_ratio: f64,
    groups: Vec<Vec<VideoMember>>,
    state: TreeState,
    stats: TreeStats,
}

impl VideoSimilarityTree {
    pub fn new(
        source: Arc<dyn FingerprintSource>,
        frame_similar_distance: u32,
        frame_similarity_rate: f64,
        max_duration_diff_ratio: f64,
    ) -> Self {
        Self {
            source,
            frame_similar_distance,
            frame_similarity_rate,
            max_duration_diff_ratio,
            groups: Vec::new(),
            state: TreeState::Empty,
            stats: TreeStats::default(),
        }
    }

    pub fn state(&self) -> TreeState {
        self.state
    }

    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    /// Number of open groups, singletons included.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn add_video(&mut self, record: FileRecord) {
        self.state = TreeState::Accumulating;
        self.stats.videos += 1;

        let fingerprint = match self.source.fingerprint(&record) {
            Ok(fingerprint) => Some(fingerprint),
            Err(e @ EngineError::PreviouslyFailed { .. }) => {
                debug!("{}", e);
                None
            }
            Err(e) => {
                warn!("Cannot fingerprint video {}: {}", record.path, e);
                None
            }
        };

        let member = VideoMember {
            duration_seconds: fingerprint
                .as_ref()
                .map(|fingerprint| fingerprint.duration_seconds)
                .filter(|duration| duration.is_finite() && *duration > 0.0),
            record,
            similarity_rate: 1.0,
            fingerprint,
        };

        if member.comparable_hashes().is_none() {
            debug!("Video {} is unusable for similarity", member.record.path);
            self.stats.unusable += 1;
            self.groups.push(vec![member]);
            return;
        }

        match self.find_group(&member) {
            Some((index, similarity)) => self.join_group(index, similarity, member),
            None => self.groups.push(vec![member]),
        }
    }

    /// Index of the first group whose representative matches, with the score.
    fn find_group(&mut self, candidate: &VideoMember) -> Option<(usize, f64)> {
        let hashes = candidate.comparable_hashes()?;

        for (index, group) in self.groups.iter().enumerate() {
            let Some(representative) = group.first() else {
                continue;
            };
            let Some(rep_hashes) = representative.comparable_hashes() else {
                continue;
            };

            if self.max_duration_diff_ratio > 0.0 {
                if let (Some(d1), Some(d2)) =
                    (candidate.duration_seconds, representative.duration_seconds)
                {
                    let (min_d, max_d) = if d1 < d2 { (d1, d2) } else { (d2, d1) };
                    if max_d > 0.0 && min_d / max_d < self.max_duration_diff_ratio {
                        self.stats.duration_rejects += 1;
                        continue;
                    }
                }
            }

            self.stats.fragment_comparisons += 1;
            let similarity = max_similarity(hashes, rep_hashes, self.frame_similar_distance);
            if similarity >= self.frame_similarity_rate {
                info!(
                    "Matched {} -> group {} (similarity: {:.2}%)",
                    candidate.record.file_name(),
                    representative.record.file_name(),
                    similarity * 100.0
                );
                return Some((index, similarity));
            }
        }
        None
    }

    fn join_group(&mut self, index: usize, similarity: f64, mut member: VideoMember) {
        let group = &mut self.groups[index];

        let longer = match (member.duration_seconds, group[0].duration_seconds) {
            (Some(new), Some(current)) => new > current,
            (Some(_), None) => true,
            _ => false,
        };

        if longer {
            info!(
                "{} replaces {} as group representative",
                member.record.file_name(),
                group[0].record.file_name()
            );
            group[0].similarity_rate = similarity;
            member.similarity_rate = 1.0;
            group.insert(0, member);
        } else {
            member.similarity_rate = similarity;
            group.push(member);
        }
    }

    /// Groups with at least `min_group_size` members, representative first.
    pub fn get_similar_video_groups(&mut self, min_group_size: usize) -> Vec<Vec<VideoMember>> {
        self.state = TreeState::Finalized;
        self.groups
            .iter()
            .filter(|group| group.len() >= min_group_size)
            .cloned()
            .collect()
    }
}
