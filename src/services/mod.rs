pub mod analyzer;
pub mod dispatcher;
pub mod duplicate;

pub use analyzer::MediaAnalyzer;
pub use dispatcher::DuplicateCheckDispatcher;
pub use duplicate::{
    CheckPhase, CheckProgress, CheckReport, DuplicateCheckService, ProgressCallback,
};
