// Interview session flow
//
// Wraps the interview endpoints with persisted-session recovery and draft
// handling. Recovery classifies a stored session id into exactly one of
// Active / Finished / Expired; transient failures classify as none of them
// and leave every piece of local state untouched so recovery can be retried.

use crate::api::{ApiError, InterviewApi};
use crate::models::InterviewQuestion;
use crate::storage::{draft_key, KeyValueStore, SESSION_ID_KEY};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

pub const SESSION_EXPIRED_MESSAGE: &str =
    "Your interview session has expired or was not found. Protocol dictates a restart.";

const AWAITING_QUESTION_TEXT: &str = "Preparing your next interrogation challenge...";

/// What the last answered exchange looked like, for re-rendering feedback
/// after a restart.
#[derive(Debug, Clone)]
pub struct LastExchange {
    pub feedback: String,
    pub satisfaction: i32,
    pub done: bool,
}

/// Outcome of recovering a persisted session.
#[derive(Debug, Clone)]
pub enum Recovery {
    /// The session is live; resume at `question`.
    Active {
        question: InterviewQuestion,
        last: Option<LastExchange>,
    },
    /// The session ran to completion; the summary is fetchable.
    Finished,
    /// No usable session. Local session state has been cleared.
    Expired { message: String },
}

pub struct InterviewFlow {
    api: Arc<dyn InterviewApi>,
    store: Arc<dyn KeyValueStore>,
    /// First question of a session started by this instance. Lets recovery
    /// right after start skip the network round-trip.
    first_question: Mutex<Option<InterviewQuestion>>,
}

impl InterviewFlow {
    pub fn new(api: Arc<dyn InterviewApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api,
            store,
            first_question: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.store.get(SESSION_ID_KEY)
    }

    /// Starts a new interview and persists its session id. Not retried.
    pub async fn start(
        &self,
        github_username: &str,
        difficulty: &str,
    ) -> Result<InterviewQuestion, ApiError> {
        let response = self.api.start_interview(github_username, difficulty).await?;
        info!("Interview session {} started", response.session_id);

        self.store.set(SESSION_ID_KEY, &response.session_id);
        let question = InterviewQuestion::from_text(response.first_question);
        *self.first_question.lock() = Some(question.clone());
        Ok(question)
    }

    /// Recovers the persisted session, if any. With `force` false, a session
    /// started by this instance is resumed from memory without a status
    /// request; `force` true always asks the server.
    ///
    /// Returns `Err` only on transient failures, with all local state intact.
    pub async fn recover(&self, force: bool) -> Result<Recovery, ApiError> {
        let session_id = match self.session_id() {
            Some(id) => id,
            None => {
                return Ok(Recovery::Expired {
                    message: SESSION_EXPIRED_MESSAGE.to_string(),
                })
            }
        };

        if !force {
            if let Some(question) = self.first_question.lock().clone() {
                return Ok(Recovery::Active {
                    question,
                    last: None,
                });
            }
        }

        match self.api.session_status(&session_id).await {
            Ok(status) => {
                if status.done {
                    info!("Session {} already finished", session_id);
                    return Ok(Recovery::Finished);
                }

                let last = status.last_feedback.map(|feedback| LastExchange {
                    feedback,
                    satisfaction: status.satisfaction,
                    done: false,
                });

                // A live session momentarily between questions still resumes;
                // the placeholder is replaced once the server catches up.
                let question = status
                    .current_question
                    .unwrap_or_else(|| InterviewQuestion::from_text(AWAITING_QUESTION_TEXT));

                info!("Session {} recovered as active", session_id);
                Ok(Recovery::Active { question, last })
            }
            Err(err) if err.is_expired() => {
                info!("Session {} expired server-side", session_id);
                self.clear_session_state(&session_id);
                Ok(Recovery::Expired {
                    message: SESSION_EXPIRED_MESSAGE.to_string(),
                })
            }
            Err(err) => {
                warn!("Session {} recovery failed: {}", session_id, err);
                Err(err)
            }
        }
    }

    /// Submits an answer for the current session. On success the draft is
    /// consumed; on transient failure it is kept for resubmission.
    pub async fn submit_answer(
        &self,
        answer: &str,
    ) -> Result<crate::models::AnswerOutcome, ApiError> {
        let session_id = self
            .session_id()
            .ok_or_else(|| ApiError::expired(SESSION_EXPIRED_MESSAGE))?;

        match self.api.submit_answer(&session_id, answer).await {
            Ok(outcome) => {
                self.store.remove(&draft_key(&session_id));
                *self.first_question.lock() = outcome.next_question.clone();

                if outcome.done {
                    info!("Session {} finished", session_id);
                    self.store.remove(SESSION_ID_KEY);
                }
                Ok(outcome)
            }
            Err(err) if err.is_expired() => {
                // Session is gone, but the typed answer may be worth keeping
                // around for the user; only the id is dropped.
                self.store.remove(SESSION_ID_KEY);
                *self.first_question.lock() = None;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Ends the session server-side. On failure the id is kept so the stop
    /// can be retried.
    pub async fn stop(&self) -> Result<(), ApiError> {
        let session_id = match self.session_id() {
            Some(id) => id,
            None => return Ok(()),
        };

        match self.api.stop_interview(&session_id).await {
            Ok(()) => {
                info!("Session {} stopped", session_id);
                self.store.remove(SESSION_ID_KEY);
                *self.first_question.lock() = None;
                Ok(())
            }
            Err(err) => {
                warn!("Failed to stop session {}: {}", session_id, err);
                Err(err)
            }
        }
    }

    pub async fn summary(&self, session_id: &str) -> Result<serde_json::Value, ApiError> {
        self.api.interview_summary(session_id).await
    }

    /// Persists an in-progress answer, scoped to the session. Empty drafts
    /// clear instead of storing noise.
    pub fn save_draft(&self, session_id: &str, draft: &str) {
        let key = draft_key(session_id);
        if draft.is_empty() {
            self.store.remove(&key);
        } else {
            self.store.set(&key, draft);
        }
    }

    pub fn load_draft(&self, session_id: &str) -> Option<String> {
        self.store.get(&draft_key(session_id))
    }

    pub fn clear_draft(&self, session_id: &str) {
        self.store.remove(&draft_key(session_id));
    }

    fn clear_session_state(&self, session_id: &str) {
        self.store.remove(SESSION_ID_KEY);
        self.store.remove(&draft_key(session_id));
        *self.first_question.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerOutcome, SessionStatus, StartInterviewResponse};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeInterview {
        start_responses: Mutex<VecDeque<Result<StartInterviewResponse, ApiError>>>,
        status_responses: Mutex<VecDeque<Result<SessionStatus, ApiError>>>,
        answer_responses: Mutex<VecDeque<Result<AnswerOutcome, ApiError>>>,
        stop_responses: Mutex<VecDeque<Result<(), ApiError>>>,
        status_calls: AtomicUsize,
    }

    #[async_trait]
    impl InterviewApi for FakeInterview {
        async fn start_interview(
            &self,
            _github_username: &str,
            _difficulty: &str,
        ) -> Result<StartInterviewResponse, ApiError> {
            self.start_responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::transient("no scripted start response")))
        }

        async fn session_status(&self, _session_id: &str) -> Result<SessionStatus, ApiError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.status_responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::transient("no scripted status response")))
        }

        async fn submit_answer(
            &self,
            _session_id: &str,
            _answer: &str,
        ) -> Result<AnswerOutcome, ApiError> {
            self.answer_responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::transient("no scripted answer response")))
        }

        async fn stop_interview(&self, _session_id: &str) -> Result<(), ApiError> {
            self.stop_responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::transient("no scripted stop response")))
        }

        async fn interview_summary(
            &self,
            _session_id: &str,
        ) -> Result<serde_json::Value, ApiError> {
            Ok(serde_json::json!({ "verdict": "hire" }))
        }
    }

    fn active_status(question: &str, feedback: Option<&str>) -> Result<SessionStatus, ApiError> {
        Ok(SessionStatus {
            current_question: Some(InterviewQuestion::from_text(question)),
            question_count: 2,
            transcript_length: 3,
            satisfaction: 58,
            done: false,
            last_feedback: feedback.map(str::to_string),
        })
    }

    fn outcome(feedback: &str, next: Option<&str>, done: bool) -> Result<AnswerOutcome, ApiError> {
        Ok(AnswerOutcome {
            feedback: feedback.to_string(),
            score: 7,
            satisfaction: 61,
            next_question: next.map(InterviewQuestion::from_text),
            done,
            red_flags: None,
            breakdown: None,
            vibe: None,
        })
    }

    fn flow_with(api: Arc<FakeInterview>, store: Arc<MemoryStore>) -> InterviewFlow {
        InterviewFlow::new(api, store)
    }

    #[tokio::test]
    async fn test_recovers_active_session_with_feedback() {
        let api = Arc::new(FakeInterview::default());
        api.status_responses
            .lock()
            .push_back(active_status("Explain borrow checking.", Some("Too shallow.")));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-1");

        let flow = flow_with(api, store);
        match flow.recover(false).await.unwrap() {
            Recovery::Active { question, last } => {
                assert_eq!(question.text, "Explain borrow checking.");
                let last = last.unwrap();
                assert_eq!(last.feedback, "Too shallow.");
                assert_eq!(last.satisfaction, 58);
            }
            other => panic!("expected active recovery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recovers_finished_session() {
        let api = Arc::new(FakeInterview::default());
        api.status_responses.lock().push_back(Ok(SessionStatus {
            current_question: None,
            question_count: 8,
            transcript_length: 16,
            satisfaction: 77,
            done: true,
            last_feedback: None,
        }));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-2");

        let flow = flow_with(api, Arc::clone(&store));
        assert!(matches!(flow.recover(false).await.unwrap(), Recovery::Finished));
        // Finished is informational; the id stays until the caller stops.
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("sess-2"));
    }

    #[tokio::test]
    async fn test_missing_id_recovers_as_expired() {
        let flow = flow_with(Arc::new(FakeInterview::default()), Arc::new(MemoryStore::new()));
        match flow.recover(false).await.unwrap() {
            Recovery::Expired { message } => assert_eq!(message, SESSION_EXPIRED_MESSAGE),
            other => panic!("expected expired recovery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_session_clears_id_and_draft() {
        let api = Arc::new(FakeInterview::default());
        api.status_responses
            .lock()
            .push_back(Err(ApiError::expired("unknown session")));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-3");
        store.set(&draft_key("sess-3"), "half an answer");

        let flow = flow_with(api, Arc::clone(&store));
        match flow.recover(false).await.unwrap() {
            Recovery::Expired { message } => assert_eq!(message, SESSION_EXPIRED_MESSAGE),
            other => panic!("expected expired recovery, got {:?}", other),
        }

        assert!(store.get(SESSION_ID_KEY).is_none());
        assert!(store.get(&draft_key("sess-3")).is_none());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retryable_and_non_destructive() {
        let api = Arc::new(FakeInterview::default());
        api.status_responses
            .lock()
            .push_back(Err(ApiError::transient("gateway timeout")));
        api.status_responses
            .lock()
            .push_back(active_status("Still here?", None));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-4");
        store.set(&draft_key("sess-4"), "draft text");

        let flow = flow_with(api, Arc::clone(&store));

        assert!(flow.recover(false).await.is_err());
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("sess-4"));
        assert_eq!(store.get(&draft_key("sess-4")).as_deref(), Some("draft text"));

        // Same state, second try succeeds.
        assert!(matches!(
            flow.recover(false).await.unwrap(),
            Recovery::Active { .. }
        ));
    }

    #[tokio::test]
    async fn test_recovery_after_start_skips_the_network() {
        let api = Arc::new(FakeInterview::default());
        api.start_responses.lock().push_back(Ok(StartInterviewResponse {
            session_id: "sess-5".to_string(),
            first_question: "Tell me about yourself.".to_string(),
        }));

        let store = Arc::new(MemoryStore::new());
        let flow = flow_with(Arc::clone(&api), Arc::clone(&store));

        flow.start("octocat", "MEDIUM").await.unwrap();
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("sess-5"));

        match flow.recover(false).await.unwrap() {
            Recovery::Active { question, .. } => {
                assert_eq!(question.text, "Tell me about yourself.")
            }
            other => panic!("expected active recovery, got {:?}", other),
        }
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forced_recovery_asks_the_server() {
        let api = Arc::new(FakeInterview::default());
        api.start_responses.lock().push_back(Ok(StartInterviewResponse {
            session_id: "sess-6".to_string(),
            first_question: "First question.".to_string(),
        }));
        api.status_responses
            .lock()
            .push_back(active_status("Server-side question.", None));

        let flow = flow_with(Arc::clone(&api), Arc::new(MemoryStore::new()));
        flow.start("octocat", "HARD").await.unwrap();

        match flow.recover(true).await.unwrap() {
            Recovery::Active { question, .. } => {
                assert_eq!(question.text, "Server-side question.")
            }
            other => panic!("expected active recovery, got {:?}", other),
        }
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_active_session_between_questions_gets_placeholder() {
        let api = Arc::new(FakeInterview::default());
        api.status_responses.lock().push_back(Ok(SessionStatus {
            current_question: None,
            question_count: 1,
            transcript_length: 1,
            satisfaction: 50,
            done: false,
            last_feedback: None,
        }));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-7");

        let flow = flow_with(api, store);
        match flow.recover(false).await.unwrap() {
            Recovery::Active { question, .. } => {
                assert_eq!(question.text, AWAITING_QUESTION_TEXT)
            }
            other => panic!("expected active recovery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_answer_consumes_draft() {
        let api = Arc::new(FakeInterview::default());
        api.answer_responses
            .lock()
            .push_back(outcome("Good.", Some("Next question."), false));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-8");

        let flow = flow_with(api, Arc::clone(&store));
        flow.save_draft("sess-8", "my answer");

        let result = flow.submit_answer("my answer").await.unwrap();
        assert_eq!(result.feedback, "Good.");
        assert!(store.get(&draft_key("sess-8")).is_none());
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("sess-8"));
    }

    #[tokio::test]
    async fn test_final_answer_releases_the_session() {
        let api = Arc::new(FakeInterview::default());
        api.answer_responses
            .lock()
            .push_back(outcome("That concludes it.", None, true));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-9");

        let flow = flow_with(api, Arc::clone(&store));
        let result = flow.submit_answer("final answer").await.unwrap();
        assert!(result.done);
        assert!(store.get(SESSION_ID_KEY).is_none());
    }

    #[tokio::test]
    async fn test_failed_answer_keeps_the_draft() {
        let api = Arc::new(FakeInterview::default());
        api.answer_responses
            .lock()
            .push_back(Err(ApiError::transient("connection reset")));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-10");

        let flow = flow_with(api, Arc::clone(&store));
        flow.save_draft("sess-10", "careful answer");

        assert!(flow.submit_answer("careful answer").await.is_err());
        assert_eq!(
            store.get(&draft_key("sess-10")).as_deref(),
            Some("careful answer")
        );
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("sess-10"));
    }

    #[tokio::test]
    async fn test_expired_answer_drops_id_but_keeps_draft() {
        let api = Arc::new(FakeInterview::default());
        api.answer_responses
            .lock()
            .push_back(Err(ApiError::expired("unknown session")));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-11");

        let flow = flow_with(api, Arc::clone(&store));
        flow.save_draft("sess-11", "typed answer");

        assert!(flow.submit_answer("typed answer").await.is_err());
        assert!(store.get(SESSION_ID_KEY).is_none());
        assert_eq!(
            store.get(&draft_key("sess-11")).as_deref(),
            Some("typed answer")
        );
    }

    #[tokio::test]
    async fn test_drafts_survive_across_flow_instances() {
        let store = Arc::new(MemoryStore::new());

        {
            let flow = flow_with(Arc::new(FakeInterview::default()), Arc::clone(&store));
            flow.save_draft("sess-12", "work in progress");
        }

        let flow = flow_with(Arc::new(FakeInterview::default()), Arc::clone(&store));
        assert_eq!(flow.load_draft("sess-12").as_deref(), Some("work in progress"));

        flow.save_draft("sess-12", "");
        assert!(flow.load_draft("sess-12").is_none());
    }

    #[tokio::test]
    async fn test_failed_stop_keeps_the_session() {
        let api = Arc::new(FakeInterview::default());
        api.stop_responses
            .lock()
            .push_back(Err(ApiError::transient("gateway timeout")));
        api.stop_responses.lock().push_back(Ok(()));

        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_ID_KEY, "sess-13");

        let flow = flow_with(api, Arc::clone(&store));

        assert!(flow.stop().await.is_err());
        assert_eq!(store.get(SESSION_ID_KEY).as_deref(), Some("sess-13"));

        flow.stop().await.unwrap();
        assert!(store.get(SESSION_ID_KEY).is_none());
    }
}
