use super::{CheckerStats, DuplicateChecker, PerceptualSource};
use crate::config::normalize_extensions;
use crate::core::models::{
    CheckerKind, DuplicateGroup, DuplicateMember, FileRecord, SimilarityType,
};
use crate::core::perceptual::{PerceptualHash, similarity_rate};
use crate::error::EngineError;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Greedy single-link grouping of images by exact hash, then pHash distance.
///
/// Output depends only on insertion order: each unvisited image seeds a group
/// and pulls in every later unvisited image that matches the seed.
#[derive(Debug, Clone)]
pub struct ImageGrouper {
    threshold: u32,
    items: Vec<(FileRecord, PerceptualHash)>,
}

impl ImageGrouper {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            items: Vec::new(),
        }
    }

    pub fn add_file(&mut self, record: FileRecord, hash: PerceptualHash) {
        self.items.push((record, hash));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get_results(&self) -> Vec<DuplicateGroup> {
        let mut groups = Vec::new();
        let mut visited = vec![false; self.items.len()];

        for i in 0..self.items.len() {
            if visited[i] {
                continue;
            }
            visited[i] = true;

            let (seed, seed_hash) = &self.items[i];
            let mut members = Vec::new();
            let mut any_exact = false;

            for j in (i + 1)..self.items.len() {
                if visited[j] {
                    continue;
                }
                let (candidate, candidate_hash) = &self.items[j];

                if seed.has_exact_hash() && seed.exact_hash == candidate.exact_hash {
                    visited[j] = true;
                    any_exact = true;
                    members.push(DuplicateMember::exact(candidate.id.clone()));
                    continue;
                }

                let distance = seed_hash.distance(candidate_hash);
                if distance <= self.threshold {
                    visited[j] = true;
                    members.push(DuplicateMember {
                        file_id: candidate.id.clone(),
                        similarity_type: SimilarityType::PerceptualHash,
                        similarity_rate: similarity_rate(distance),
                    });
                }
            }

            if members.is_empty() {
                continue;
            }

            let seed_member = DuplicateMember {
                file_id: seed.id.clone(),
                similarity_type: if any_exact {
                    SimilarityType::Exact
                } else {
                    SimilarityType::PerceptualHash
                },
                similarity_rate: 1.0,
            };
            members.insert(0, seed_member);

            groups.push(DuplicateGroup {
                group_name: format!("img_sim_{}", groups.len() + 1),
                checker: CheckerKind::Image,
                members,
            });
        }

        groups
    }
}

/// Image checker: hashes each claimed image and defers grouping to
/// [`ImageGrouper`]. Images that cannot be decoded are left out.
pub struct ImageChecker {
    extensions: BTreeSet<String>,
    source: Arc<dyn PerceptualSource>,
    grouper: ImageGrouper,
    stats: CheckerStats,
}

impl ImageChecker {
    pub fn new(
        extensions: BTreeSet<String>,
        threshold: u32,
        source: Arc<dyn PerceptualSource>,
    ) -> Self {
        Self {
            extensions: normalize_extensions(&extensions),
            source,
            grouper: ImageGrouper::new(threshold),
            stats: CheckerStats::default(),
        }
    }
}

impl DuplicateChecker for ImageChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Image
    }

    fn is_supported(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    fn add_file(&mut self, record: FileRecord) {
        self.stats.accepted += 1;
        match self.source.perceptual_hash(&record) {
            Ok(hash) => self.grouper.add_file(record, hash),
            Err(e @ EngineError::PreviouslyFailed { .. }) => {
                debug!("{}", e);
                self.stats.unusable += 1;
            }
            Err(e) => {
                warn!("Failed to hash image {}: {}", record.path, e);
                self.stats.unusable += 1;
            }
        }
    }

    fn get_results(&mut self) -> Vec<DuplicateGroup> {
        let groups = self.grouper.get_results();
        info!("Image check found {} duplicate/similar groups", groups.len());
        groups
    }

    fn stats(&self) -> CheckerStats {
        self.stats
    }
}
