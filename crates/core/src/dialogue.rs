//! Dialogue Exchange Client
//!
//! The remote dialogue service owns the interview's intelligence and its
//! server-side session state. From the coordinator's point of view each call is
//! stateless: one `exchange` per candidate turn, one `end_session` per session,
//! no retries. Recovery from failures is the coordinator's job.

use crate::error::DialogueError;
use crate::session::{FeedbackResult, InterviewConfig, SessionStart};
use crate::timer::format_clock;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// The interviewer's next utterance, as returned by the dialogue service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InterviewerReply {
    pub response: String,
    #[serde(default)]
    pub question_count: Option<u32>,
    #[serde(default)]
    pub session_status: Option<String>,
}

impl InterviewerReply {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            question_count: None,
            session_status: None,
        }
    }
}

/// Defines the contract for any service that can carry the interview forward.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DialogueClient: Send + Sync {
    /// Sends one candidate utterance and returns the interviewer's reply.
    async fn exchange(
        &self,
        session_id: &str,
        candidate_text: &str,
    ) -> Result<InterviewerReply, DialogueError>;

    /// Closes the session on the server and returns the final feedback.
    async fn end_session(&self, session_id: &str) -> Result<FeedbackResult, DialogueError>;
}

#[derive(Deserialize)]
struct StartResponse {
    session_id: String,
    initial_greeting: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

/// A `DialogueClient` for the interview HTTP API.
pub struct HttpDialogueClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDialogueClient {
    /// Creates a client for the API rooted at `base_url`
    /// (e.g. `http://localhost:8000/api`). Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DialogueError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Opens a new interview session on the server.
    #[instrument(skip_all, fields(persona = %config.persona_id))]
    pub async fn start_session(
        &self,
        config: &InterviewConfig,
    ) -> Result<SessionStart, DialogueError> {
        let body = serde_json::to_value(config)
            .map_err(|e| DialogueError::InvalidResponse(e.to_string()))?;
        let started: StartResponse = self.post("/interview/start", Some(&body)).await?;
        debug!(session_id = %started.session_id, "Interview session opened.");
        Ok(SessionStart {
            session_id: started.session_id,
            initial_greeting: started.initial_greeting,
            persona: config.persona_id,
            duration_seconds: config.interview_length.seconds(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, DialogueError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.detail);
            let message = match detail {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            };
            return Err(DialogueError::Server {
                status: status.as_u16(),
                message,
            });
        }

        // Read the body before parsing it: reqwest reports a connection lost
        // mid-body as a decode error too.
        let body = response.bytes().await.map_err(classify)?;
        serde_json::from_slice::<T>(&body)
            .map_err(|e| DialogueError::InvalidResponse(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> DialogueError {
    if err.is_timeout() {
        DialogueError::Timeout
    } else {
        DialogueError::Network(err)
    }
}

#[async_trait]
impl DialogueClient for HttpDialogueClient {
    #[instrument(skip(self, candidate_text), fields(chars = candidate_text.len()))]
    async fn exchange(
        &self,
        session_id: &str,
        candidate_text: &str,
    ) -> Result<InterviewerReply, DialogueError> {
        let body = json!({ "content": candidate_text });
        self.post(&format!("/interview/message/{}", session_id), Some(&body))
            .await
    }

    #[instrument(skip(self))]
    async fn end_session(&self, session_id: &str) -> Result<FeedbackResult, DialogueError> {
        self.post(&format!("/interview/stop/{}", session_id), None)
            .await
    }
}

const REHEARSAL_QUESTIONS: [&str; 5] = [
    "That's interesting. Can you tell me more about how you handled challenges in that role?",
    "I see. What would you say is your greatest strength when working in a team environment?",
    "Thank you for sharing that. How do you typically approach problem-solving in your work?",
    "That's a great example. Can you walk me through a specific situation where you had to adapt quickly?",
    "Excellent. What do you know about our company culture and how do you see yourself fitting in?",
];

/// A `DialogueClient` for offline rehearsal.
///
/// Cycles through a fixed set of follow-up questions and ends with an
/// unscored summary, so a session can run without the dialogue service.
pub struct ScriptedDialogueClient {
    exchanges: AtomicUsize,
    started: Instant,
}

impl ScriptedDialogueClient {
    pub fn new() -> Self {
        Self {
            exchanges: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }
}

impl Default for ScriptedDialogueClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DialogueClient for ScriptedDialogueClient {
    async fn exchange(
        &self,
        _session_id: &str,
        _candidate_text: &str,
    ) -> Result<InterviewerReply, DialogueError> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(InterviewerReply {
            response: REHEARSAL_QUESTIONS[n % REHEARSAL_QUESTIONS.len()].to_string(),
            question_count: Some(n as u32 + 2),
            session_status: Some("active".to_string()),
        })
    }

    async fn end_session(&self, session_id: &str) -> Result<FeedbackResult, DialogueError> {
        let asked = self.exchanges.load(Ordering::SeqCst) as u32 + 1;
        Ok(FeedbackResult {
            session_id: session_id.to_string(),
            scores: Default::default(),
            improvements: vec![],
            conversation_summary: "Offline rehearsal: answers were not scored.".to_string(),
            duration: format_clock(self.started.elapsed().as_secs() as u32),
            total_questions: asked,
        })
    }
}
