// Interview session data models
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewerIdentity {
    pub name: String,
    pub role: String,
    pub tone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewQuestion {
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interviewer_identity: Option<InterviewerIdentity>,
}

impl InterviewQuestion {
    /// The start endpoint returns the first question as bare text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            question_type: String::new(),
            difficulty: String::new(),
            context: None,
            interviewer_identity: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInterviewResponse {
    pub session_id: String,
    pub first_question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    #[serde(default)]
    pub current_question: Option<InterviewQuestion>,
    #[serde(default)]
    pub question_count: u32,
    #[serde(default)]
    pub transcript_length: u32,
    #[serde(default)]
    pub satisfaction: i32,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub last_feedback: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerBreakdown {
    pub accuracy: f64,
    pub depth: f64,
    pub communication: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VibeScores {
    pub clarity: f64,
    pub confidence: f64,
    pub brevity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub feedback: String,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub satisfaction: i32,
    #[serde(default)]
    pub next_question: Option<InterviewQuestion>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<AnswerBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibe: Option<VibeScores>,
}
