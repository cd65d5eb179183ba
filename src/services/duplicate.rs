use crate::checker::{FingerprintSource, PerceptualSource};
use crate::config::EngineConfig;
use crate::core::models::{DuplicateGroup, FileRecord, MediaKind};
use crate::error::EngineError;
use crate::services::analyzer::MediaAnalyzer;
use crate::services::dispatcher::DuplicateCheckDispatcher;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckPhase {
    Hashing,
    Grouping,
    Reporting,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckProgress {
    pub phase: CheckPhase,
    pub files_processed: usize,
    pub total_files: usize,
    pub current_file: String,
}

pub type ProgressCallback = Box<dyn Fn(CheckProgress) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub groups: Vec<DuplicateGroup>,
    pub total_files: usize,
    /// Files fed into the checkers before completion or cancellation.
    pub processed_files: usize,
    /// Files whose hash or media analysis failed.
    pub failed_files: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs a full duplicate check over a population of file records.
///
/// Hashing and decoding fan out over a worker pool; grouping then consumes
/// the records one by one in input order, so results are reproducible.
pub struct DuplicateCheckService {
    config: EngineConfig,
    analyzer: Arc<MediaAnalyzer>,
    cancellation_token: Arc<AtomicBool>,
    progress_callback: Option<ProgressCallback>,
}

impl DuplicateCheckService {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let config = config.normalized();
        config.validate()?;
        let analyzer = Arc::new(MediaAnalyzer::new(&config)?);
        Ok(Self::with_analyzer(config, analyzer))
    }

    pub fn with_analyzer(config: EngineConfig, analyzer: Arc<MediaAnalyzer>) -> Self {
        Self {
            config: config.normalized(),
            analyzer,
            cancellation_token: Arc::new(AtomicBool::new(false)),
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn get_cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancellation_token.clone()
    }

    pub fn cancel(&self) {
        self.cancellation_token.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.load(Ordering::Relaxed)
    }

    pub fn run(&self, records: Vec<FileRecord>) -> Result<CheckReport, EngineError> {
        let started_at = Utc::now();
        let total_files = records.len();
        info!("Starting duplicate check of {} files", total_files);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads())
            .build()?;

        // Phase 1: Hashing - exact hashes plus warm fingerprint/pHash caches
        self.send_progress(CheckPhase::Hashing, 0, total_files, "Computing hashes...");
        let hashed_count = AtomicUsize::new(0);
        let prepared: Vec<(FileRecord, bool)> = pool.install(|| {
            records
                .into_par_iter()
                .map(|record| {
                    if self.is_cancelled() {
                        return (record, false);
                    }
                    let prepared = self.prepare(record);
                    let count = hashed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    self.send_progress(CheckPhase::Hashing, count, total_files, &prepared.0.path);
                    prepared
                })
                .collect()
        });
        let failed_files = prepared.iter().filter(|(_, failed)| *failed).count();

        // Phase 2: Grouping - serialized, in input order
        self.send_progress(CheckPhase::Grouping, 0, total_files, "Grouping files...");
        let mut dispatcher = DuplicateCheckDispatcher::new(&self.config, self.analyzer.clone());
        let mut processed_files = 0;
        let mut cancelled = false;

        for (record, _) in prepared {
            if self.is_cancelled() {
                info!("Duplicate check cancelled after {} files", processed_files);
                cancelled = true;
                break;
            }
            let path = record.path.clone();
            dispatcher.add_file(record);
            processed_files += 1;
            self.send_progress(CheckPhase::Grouping, processed_files, total_files, &path);
        }

        // Phase 3: Reporting
        self.send_progress(
            CheckPhase::Reporting,
            processed_files,
            total_files,
            "Collecting results...",
        );
        let groups = dispatcher.get_all_results();

        self.send_progress(
            CheckPhase::Complete,
            processed_files,
            total_files,
            "Duplicate check complete",
        );

        Ok(CheckReport {
            groups,
            total_files,
            processed_files,
            failed_files,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Resolve the exact hash and pre-compute media features. The flag is
    /// set when any step failed; the record is still grouped afterwards.
    fn prepare(&self, mut record: FileRecord) -> (FileRecord, bool) {
        match self.analyzer.resolve_exact_hash(&record) {
            Ok(hash) => record.exact_hash = hash,
            Err(e) => {
                warn!("Failed to compute hash for {}: {}", record.path, e);
                return (record, true);
            }
        }

        let analysis = match self.config.classify(&record.extension()) {
            MediaKind::Video => self.analyzer.fingerprint(&record).map(|_| ()),
            MediaKind::Image => self.analyzer.perceptual_hash(&record).map(|_| ()),
            MediaKind::Other => Ok(()),
        };
        match analysis {
            Ok(()) => (record, false),
            Err(e @ EngineError::PreviouslyFailed { .. }) => {
                debug!("{}", e);
                (record, true)
            }
            Err(e) => {
                warn!("Failed to analyze {}: {}", record.path, e);
                (record, true)
            }
        }
    }

    fn send_progress(
        &self,
        phase: CheckPhase,
        files_processed: usize,
        total_files: usize,
        current_file: &str,
    ) {
        if let Some(callback) = &self.progress_callback {
            callback(CheckProgress {
                phase,
                files_processed,
                total_files,
                current_file: current_file.to_string(),
            });
        }
    }
}
