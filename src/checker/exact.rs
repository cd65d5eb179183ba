use super::{CheckerStats, DuplicateChecker};
use crate::core::models::{CheckerKind, DuplicateGroup, DuplicateMember, FileId, FileRecord};
use log::{info, warn};
use std::collections::HashMap;

/// Groups files by exact content hash. Claims every extension, so it acts as
/// the fallback for anything the other checkers leave behind.
#[derive(Debug, Default)]
pub struct ExactMatchChecker {
    // Buckets in first-seen order keep output independent of HashMap iteration
    buckets: Vec<(String, Vec<FileId>)>,
    index: HashMap<String, usize>,
    stats: CheckerStats,
}

impl ExactMatchChecker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DuplicateChecker for ExactMatchChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Exact
    }

    fn is_supported(&self, _extension: &str) -> bool {
        true
    }

    fn add_file(&mut self, record: FileRecord) {
        self.stats.accepted += 1;
        if !record.has_exact_hash() {
            warn!("No exact hash for {}, skipping exact matching", record.path);
            self.stats.unusable += 1;
            return;
        }

        match self.index.get(&record.exact_hash) {
            Some(&slot) => self.buckets[slot].1.push(record.id),
            None => {
                self.index.insert(record.exact_hash.clone(), self.buckets.len());
                self.buckets.push((record.exact_hash, vec![record.id]));
            }
        }
    }

    fn get_results(&mut self) -> Vec<DuplicateGroup> {
        let groups: Vec<DuplicateGroup> = self
            .buckets
            .iter()
            .filter(|(_, ids)| ids.len() >= 2)
            .map(|(hash, ids)| DuplicateGroup {
                group_name: hash.clone(),
                checker: CheckerKind::Exact,
                members: ids.iter().cloned().map(DuplicateMember::exact).collect(),
            })
            .collect();

        info!("Exact match check found {} groups", groups.len());
        groups
    }

    fn stats(&self) -> CheckerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::SimilarityType;

    fn record(id: &str, hash: &str) -> FileRecord {
        FileRecord::new(id, format!("/data/{id}.bin")).with_exact_hash(hash)
    }

    #[test]
    fn test_supports_everything() {
        let checker = ExactMatchChecker::new();
        assert!(checker.is_supported("txt"));
        assert!(checker.is_supported(""));
        assert_eq!(checker.kind(), CheckerKind::Exact);
    }

    #[test]
    fn test_groups_by_hash_in_first_seen_order() {
        let mut checker = ExactMatchChecker::new();
        checker.add_file(record("a", "h2"));
        checker.add_file(record("b", "h1"));
        checker.add_file(record("c", "h2"));
        checker.add_file(record("d", "h3"));
        checker.add_file(record("e", "h1"));

        let groups = checker.get_results();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].group_name, "h2");
        assert_eq!(groups[1].group_name, "h1");

        let ids: Vec<&str> = groups[0].members.iter().map(|m| m.file_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        for member in groups.iter().flat_map(|g| &g.members) {
            assert_eq!(member.similarity_type, SimilarityType::Exact);
            assert_eq!(member.similarity_rate, 1.0);
        }
    }

    #[test]
    fn test_empty_hashes_never_group() {
        let mut checker = ExactMatchChecker::new();
        checker.add_file(record("a", ""));
        checker.add_file(record("b", ""));

        assert!(checker.get_results().is_empty());
        assert_eq!(
            checker.stats(),
            CheckerStats {
                accepted: 2,
                unusable: 2
            }
        );
    }

    #[test]
    fn test_single_file_produces_nothing() {
        let mut checker = ExactMatchChecker::new();
        assert!(checker.get_results().is_empty());
        checker.add_file(record("a", "h1"));
        assert!(checker.get_results().is_empty());
    }
}
