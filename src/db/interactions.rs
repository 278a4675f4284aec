use std::path::Path;

use crate::models::{ExplanationLogEntry, FeedbackLogEntry, RecommendationLogEntry};

use super::CsvLog;

pub const RECOMMENDATION_LOG_FILE: &str = "ab_log.csv";
pub const EXPLANATION_LOG_FILE: &str = "explanation_log.csv";
pub const FEEDBACK_LOG_FILE: &str = "feedback_log.csv";

/// The three interaction logs, one writer task each
#[derive(Clone)]
pub struct InteractionLogs {
    pub recommendations: CsvLog<RecommendationLogEntry>,
    pub explanations: CsvLog<ExplanationLogEntry>,
    pub feedback: CsvLog<FeedbackLogEntry>,
}

impl InteractionLogs {
    /// Starts the writers for the log files under `log_dir`
    pub fn open(log_dir: &Path) -> Self {
        tracing::info!(log_dir = %log_dir.display(), "Opening interaction logs");

        Self {
            recommendations: CsvLog::spawn(log_dir.join(RECOMMENDATION_LOG_FILE)),
            explanations: CsvLog::spawn(log_dir.join(EXPLANATION_LOG_FILE)),
            feedback: CsvLog::spawn(log_dir.join(FEEDBACK_LOG_FILE)),
        }
    }
}
