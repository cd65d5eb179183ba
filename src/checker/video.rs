use super::tree::{TreeStats, VideoSimilarityTree};
use super::{CheckerStats, DuplicateChecker, FingerprintSource};
use crate::config::{EngineConfig, normalize_extensions};
use crate::core::models::{
    CheckerKind, DuplicateGroup, DuplicateMember, FileRecord, SimilarityType,
};
use log::{debug, info};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Video checker: feeds claimed videos into a [`VideoSimilarityTree`] and
/// reports its groups as `video_sim_{i}`.
pub struct VideoChecker {
    extensions: BTreeSet<String>,
    min_group_size: usize,
    tree: VideoSimilarityTree,
    accepted: usize,
}

impl VideoChecker {
    pub fn new(config: &EngineConfig, source: Arc<dyn FingerprintSource>) -> Self {
        Self {
            extensions: normalize_extensions(&config.video_extensions),
            min_group_size: config.min_group_size(),
            tree: VideoSimilarityTree::new(
                source,
                config.video_frame_hamming_threshold,
                config.video_frame_similarity_rate,
                config.video_max_duration_diff_ratio,
            ),
            accepted: 0,
        }
    }

    pub fn tree_stats(&self) -> TreeStats {
        self.tree.stats()
    }
}

impl DuplicateChecker for VideoChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Video
    }

    fn is_supported(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    fn add_file(&mut self, record: FileRecord) {
        debug!("Video check processing {}", record.path);
        self.accepted += 1;
        self.tree.add_video(record);
    }

    fn get_results(&mut self) -> Vec<DuplicateGroup> {
        let groups: Vec<DuplicateGroup> = self
            .tree
            .get_similar_video_groups(self.min_group_size)
            .into_iter()
            .enumerate()
            .map(|(i, group)| DuplicateGroup {
                group_name: format!("video_sim_{i}"),
                checker: CheckerKind::Video,
                members: group
                    .into_iter()
                    .map(|member| DuplicateMember {
                        file_id: member.record.id,
                        similarity_type: SimilarityType::VideoFeature,
                        similarity_rate: member.similarity_rate,
                    })
                    .collect(),
            })
            .collect();

        let stats = self.tree.stats();
        info!(
            "Video check found {} groups ({} comparisons, {} duration rejects)",
            groups.len(),
            stats.fragment_comparisons,
            stats.duration_rejects
        );
        groups
    }

    fn stats(&self) -> CheckerStats {
        CheckerStats {
            accepted: self.accepted,
            unusable: self.tree.stats().unusable,
        }
    }
}
