// Analysis job data models
use serde::{Deserialize, Serialize};

/// Server-reported job status. Anything the server invents beyond
/// `complete`/`error` is still a live job, so unknown strings map to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Complete,
    Error,
    #[serde(other)]
    Running,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    /// Human-readable label of the current server-side step. Advisory only,
    /// never used for control decisions.
    pub phase: String,
    pub percent: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    #[serde(default)]
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<AnalysisProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisResponse {
    pub analysis_id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisScores {
    pub honesty: f64,
    pub depth: f64,
    pub breadth: f64,
    pub experience: f64,
    pub readiness: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisMetadata {
    pub resume_file_name: String,
    pub github_username: String,
    /// Milliseconds spent server-side, for the "completed in Xs" footer.
    pub processing_time: f64,
}

/// The full computed artifact. Every field is defaulted because a failed run
/// reports only `errors`, and the deep sections stay loose JSON the way the
/// server emits them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisReport {
    pub scores: AnalysisScores,
    pub resume: serde_json::Value,
    pub github: serde_json::Value,
    pub verification: serde_json::Value,
    pub insights: serde_json::Value,
    pub metadata: AnalysisMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}
