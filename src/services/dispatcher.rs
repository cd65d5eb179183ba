use crate::checker::{
    CheckerStats, DuplicateChecker, ExactMatchChecker, ImageChecker, VideoChecker,
};
use crate::config::EngineConfig;
use crate::core::models::{CheckerKind, DuplicateGroup, FileRecord};
use crate::services::analyzer::MediaAnalyzer;
use log::{info, warn};
use std::sync::Arc;

/// Routes each file to the first checker that claims its extension and
/// concatenates every checker's groups at the end.
pub struct DuplicateCheckDispatcher {
    checkers: Vec<Box<dyn DuplicateChecker>>,
    analyzer: Option<Arc<MediaAnalyzer>>,
}

impl DuplicateCheckDispatcher {
    /// Video, image and exact-match checkers, in that order, sharing `analyzer`.
    pub fn new(config: &EngineConfig, analyzer: Arc<MediaAnalyzer>) -> Self {
        let checkers: Vec<Box<dyn DuplicateChecker>> = vec![
            Box::new(VideoChecker::new(config, analyzer.clone())),
            Box::new(ImageChecker::new(
                config.image_extensions.clone(),
                config.image_hamming_threshold,
                analyzer.clone(),
            )),
            Box::new(ExactMatchChecker::new()),
        ];

        Self {
            checkers,
            analyzer: Some(analyzer),
        }
    }

    /// Custom checker chain. Records must arrive with their exact hash already
    /// set since there is no analyzer to compute it.
    pub fn with_checkers(checkers: Vec<Box<dyn DuplicateChecker>>) -> Self {
        Self {
            checkers,
            analyzer: None,
        }
    }

    pub fn add_file(&mut self, mut record: FileRecord) {
        if !record.has_exact_hash() {
            if let Some(analyzer) = &self.analyzer {
                match analyzer.resolve_exact_hash(&record) {
                    Ok(hash) => record.exact_hash = hash,
                    Err(e) => warn!("Failed to compute hash for {}: {}", record.path, e),
                }
            }
        }

        let extension = record.extension();
        if let Some(checker) = self
            .checkers
            .iter_mut()
            .find(|checker| checker.is_supported(&extension))
        {
            checker.add_file(record);
        }
    }

    pub fn get_all_results(&mut self) -> Vec<DuplicateGroup> {
        let mut groups = Vec::new();
        for checker in &mut self.checkers {
            groups.extend(checker.get_results());
        }
        info!("Duplicate check produced {} groups", groups.len());
        groups
    }

    pub fn checker_stats(&self) -> Vec<(CheckerKind, CheckerStats)> {
        self.checkers
            .iter()
            .map(|checker| (checker.kind(), checker.stats()))
            .collect()
    }
}
