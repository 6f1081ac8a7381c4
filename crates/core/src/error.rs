//! Error Taxonomy and User-Facing Notices
//!
//! Each port has its own error type. The coordinator folds all of them into
//! [`InterviewError`], none of which is fatal to a session: every variant maps to
//! a recovery path and a [`Notice`] for the notice collaborator.

use serde::Serialize;
use thiserror::Error;

/// Why a single capture attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureFailure {
    #[error("microphone access was denied")]
    Denied,
    #[error("no speech was detected")]
    NoSpeech,
    #[error("speech recognition network error")]
    Network,
    #[error("capture device error: {0}")]
    Device(String),
}

/// Errors raised by the speech output tiers.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("voice synthesis failed: {0}")]
    Synthesis(String),
    #[error("voice synthesis request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("voice synthesis returned no audio")]
    EmptyAudio,
    #[error("audio playback failed: {0}")]
    Playback(String),
    #[error("local voice is unavailable")]
    Unavailable,
}

/// Errors raised by the dialogue service client.
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("dialogue request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("dialogue service error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("invalid response from dialogue service: {0}")]
    InvalidResponse(String),
    #[error("dialogue request timed out")]
    Timeout,
}

/// Session-level failure kinds surfaced by the coordinator.
#[derive(Debug, Error)]
pub enum InterviewError {
    /// Capture is not supported on this device. Detected once, at start.
    #[error("voice input is not available, answers must be typed")]
    CaptureUnavailable,
    /// A single capture attempt failed.
    #[error("could not capture your answer: {0}")]
    CaptureTransient(CaptureFailure),
    /// Both synthesis tiers failed for one utterance.
    #[error("the interviewer's voice could not be played: {0}")]
    OutputFailure(String),
    /// The dialogue exchange failed; a fallback turn was used instead.
    #[error("the interviewer could not be reached: {0}")]
    ExchangeFailure(DialogueError),
    /// The session-stop call failed; the result carries no feedback.
    #[error("final feedback is unavailable: {0}")]
    SessionEndFailure(DialogueError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A message for the user. The notice collaborator only displays these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    /// Set for degraded-mode signals that stay true for the whole session.
    pub permanent: bool,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            permanent: false,
        }
    }
}

impl From<&InterviewError> for Notice {
    fn from(err: &InterviewError) -> Self {
        let severity = match err {
            InterviewError::CaptureUnavailable => Severity::Warning,
            InterviewError::CaptureTransient(CaptureFailure::NoSpeech) => Severity::Info,
            InterviewError::CaptureTransient(_) => Severity::Warning,
            InterviewError::OutputFailure(_) => Severity::Warning,
            InterviewError::ExchangeFailure(_) => Severity::Error,
            InterviewError::SessionEndFailure(_) => Severity::Error,
        };
        Self {
            severity,
            message: err.to_string(),
            permanent: matches!(err, InterviewError::CaptureUnavailable),
        }
    }
}
