// Typed endpoint surface for the analyzer and interview services

use super::client::ApiClient;
use super::error::ApiError;
use crate::models::{
    AnalysisReport, AnalysisStatus, AnswerOutcome, SessionStatus, StartAnalysisResponse,
    StartInterviewResponse,
};
use async_trait::async_trait;
use base64::Engine;
use log::debug;
use serde_json::json;

/// Resume payload attached to an analysis start. Encoded as base64 inside the
/// JSON body.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StartAnalysisRequest {
    pub github_username: String,
    pub github_token: Option<String>,
    pub resume: Option<ResumeFile>,
}

/// Analyzer job endpoints. A trait seam so job tracking can be driven by a
/// scripted fake in tests.
#[async_trait]
pub trait AnalyzerApi: Send + Sync {
    async fn start_analysis(
        &self,
        request: StartAnalysisRequest,
    ) -> Result<StartAnalysisResponse, ApiError>;

    async fn analysis_status(&self, analysis_id: &str) -> Result<AnalysisStatus, ApiError>;

    async fn analysis_report(&self, analysis_id: &str) -> Result<AnalysisReport, ApiError>;
}

/// Interview session endpoints.
#[async_trait]
pub trait InterviewApi: Send + Sync {
    async fn start_interview(
        &self,
        github_username: &str,
        difficulty: &str,
    ) -> Result<StartInterviewResponse, ApiError>;

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ApiError>;

    async fn submit_answer(
        &self,
        session_id: &str,
        answer: &str,
    ) -> Result<AnswerOutcome, ApiError>;

    async fn stop_interview(&self, session_id: &str) -> Result<(), ApiError>;

    async fn interview_summary(&self, session_id: &str) -> Result<serde_json::Value, ApiError>;
}

#[async_trait]
impl AnalyzerApi for ApiClient {
    async fn start_analysis(
        &self,
        request: StartAnalysisRequest,
    ) -> Result<StartAnalysisResponse, ApiError> {
        let mut body = json!({ "githubUsername": request.github_username });

        if let Some(token) = request.github_token {
            body["githubToken"] = json!(token);
        }
        if let Some(resume) = request.resume {
            debug!("Attaching resume {} ({} bytes)", resume.file_name, resume.bytes.len());
            body["resumeFileName"] = json!(resume.file_name);
            body["resumeData"] = json!(base64::engine::general_purpose::STANDARD.encode(&resume.bytes));
        }

        self.post_json("/analyzer/deep-search", body, self.config().start_timeout)
            .await
    }

    async fn analysis_status(&self, analysis_id: &str) -> Result<AnalysisStatus, ApiError> {
        self.get_json(&format!("/analyzer/status/{}", analysis_id)).await
    }

    async fn analysis_report(&self, analysis_id: &str) -> Result<AnalysisReport, ApiError> {
        self.get_json(&format!("/analyzer/report/{}", analysis_id)).await
    }
}

#[async_trait]
impl InterviewApi for ApiClient {
    async fn start_interview(
        &self,
        github_username: &str,
        difficulty: &str,
    ) -> Result<StartInterviewResponse, ApiError> {
        let body = json!({
            "githubUsername": github_username,
            "difficulty": difficulty,
        });
        self.post_json("/interview/start", body, self.config().start_timeout)
            .await
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ApiError> {
        self.get_json(&format!("/interview/status/{}", session_id)).await
    }

    async fn submit_answer(
        &self,
        session_id: &str,
        answer: &str,
    ) -> Result<AnswerOutcome, ApiError> {
        let body = json!({
            "sessionId": session_id,
            "answer": answer,
        });
        self.post_json("/interview/answer", body, self.config().read_timeout)
            .await
    }

    async fn stop_interview(&self, session_id: &str) -> Result<(), ApiError> {
        let body = json!({ "sessionId": session_id });
        let _: serde_json::Value = self
            .post_json("/interview/stop", body, self.config().read_timeout)
            .await?;
        Ok(())
    }

    async fn interview_summary(&self, session_id: &str) -> Result<serde_json::Value, ApiError> {
        self.get_json(&format!("/interview/summary/{}", session_id)).await
    }
}
