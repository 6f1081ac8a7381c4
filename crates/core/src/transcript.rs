use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Interviewer => write!(f, "interviewer"),
            Speaker::Candidate => write!(f, "candidate"),
        }
    }
}

/// One utterance by either party. Fields are private so a turn cannot change
/// after it has been appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    id: Uuid,
    sender: Speaker,
    text: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sender(&self) -> Speaker {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Append-only record of the conversation, in conversational order.
///
/// The log also holds the voice-generation markers: the set of interviewer
/// turns whose playback has already been triggered.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    turns: Vec<Turn>,
    voiced: HashSet<Uuid>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new turn stamped with the current time.
    ///
    /// Timestamps never go backwards within a log, even if the wall clock does.
    pub fn append(&mut self, sender: Speaker, text: impl Into<String>) -> &Turn {
        let now = Utc::now();
        let created_at = match self.turns.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };
        self.turns.push(Turn {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            created_at,
        });
        &self.turns[self.turns.len() - 1]
    }

    #[cfg(test)]
    fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of interviewer turns so far.
    pub fn question_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.sender == Speaker::Interviewer)
            .count()
    }

    /// Marks an interviewer turn as voiced. Returns `false` if it was already
    /// marked or is not an interviewer turn in this log.
    pub fn mark_voiced(&mut self, id: Uuid) -> bool {
        let is_interviewer = self
            .turns
            .iter()
            .any(|t| t.id == id && t.sender == Speaker::Interviewer);
        is_interviewer && self.voiced.insert(id)
    }

    #[cfg(test)]
    fn is_voiced(&self, id: Uuid) -> bool {
        self.voiced.contains(&id)
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order_and_timestamps() {
        let mut log = TranscriptLog::new();
        log.append(Speaker::Interviewer, "Hello");
        log.append(Speaker::Candidate, "Hi");
        log.append(Speaker::Interviewer, "Tell me about yourself");

        let texts: Vec<&str> = log.turns().iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["Hello", "Hi", "Tell me about yourself"]);
        for pair in log.turns().windows(2) {
            assert!(pair[0].created_at() <= pair[1].created_at());
        }
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let mut log = TranscriptLog::new();
        let a = log.append(Speaker::Interviewer, "a").id();
        let b = log.append(Speaker::Interviewer, "a").id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_mark_voiced_only_once() {
        let mut log = TranscriptLog::new();
        let id = log.append(Speaker::Interviewer, "Hello").id();
        assert!(!log.is_voiced(id));
        assert!(log.mark_voiced(id));
        assert!(!log.mark_voiced(id));
        assert!(log.is_voiced(id));
    }

    #[test]
    fn test_mark_voiced_rejects_candidate_and_unknown_turns() {
        let mut log = TranscriptLog::new();
        let id = log.append(Speaker::Candidate, "Hi").id();
        assert!(!log.mark_voiced(id));
        assert!(!log.mark_voiced(Uuid::new_v4()));
    }

    #[test]
    fn test_question_count() {
        let mut log = TranscriptLog::new();
        log.append(Speaker::Interviewer, "q1");
        log.append(Speaker::Candidate, "a1");
        log.append(Speaker::Interviewer, "q2");
        assert_eq!(log.question_count(), 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_speaker_display_and_serialization() {
        assert_eq!(format!("{}", Speaker::Candidate), "candidate");
        assert_eq!(
            serde_json::to_string(&Speaker::Interviewer).unwrap(),
            "\"interviewer\""
        );
    }
}
