//! Session Records
//!
//! The values that flow in and out of a coordinator: the session-start record it
//! is built from, the personas and interview settings that shape it, and the
//! [`SessionResult`] handed to the feedback collaborator when it ends.

use crate::transcript::Turn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a persona, length or type name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonaId {
    HrFriendly,
    ManagerCritical,
    TechExpert,
    StressInterviewer,
    CeoExecutive,
}

/// Static description of an interviewer persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub id: PersonaId,
    pub name: &'static str,
    pub style: &'static str,
    /// Voice used by the remote synthesis tier.
    pub voice_id: &'static str,
}

impl PersonaId {
    pub const ALL: [PersonaId; 5] = [
        PersonaId::HrFriendly,
        PersonaId::ManagerCritical,
        PersonaId::TechExpert,
        PersonaId::StressInterviewer,
        PersonaId::CeoExecutive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::HrFriendly => "hr-friendly",
            PersonaId::ManagerCritical => "manager-critical",
            PersonaId::TechExpert => "tech-expert",
            PersonaId::StressInterviewer => "stress-interviewer",
            PersonaId::CeoExecutive => "ceo-executive",
        }
    }

    pub fn persona(&self) -> Persona {
        let (name, style, voice_id) = match self {
            PersonaId::HrFriendly => (
                "Sarah Chen",
                "Supportive and conversational",
                "21m00Tcm4TlvDq8ikWAM",
            ),
            PersonaId::ManagerCritical => (
                "Robert Martinez",
                "Direct and analytical",
                "29vD33N1CtxCmqQRPOHJ",
            ),
            PersonaId::TechExpert => (
                "Dr. Emily Watson",
                "Technical and precise",
                "pNInz6obpgDQGcFmaJgB",
            ),
            PersonaId::StressInterviewer => (
                "Marcus Thompson",
                "Intense and fast-paced",
                "Yko7PKHZNXotIFUBG7I9",
            ),
            PersonaId::CeoExecutive => (
                "James Wilson",
                "Strategic and visionary",
                "TX3LPaxmHKxFdv7VOQHJ",
            ),
        };
        Persona {
            id: *self,
            name,
            style,
            voice_id,
        }
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaId {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PersonaId::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "persona",
                value: s.to_string(),
            })
    }
}

impl Persona {
    /// Opening line used when the dialogue service does not supply a greeting.
    pub fn greeting(&self) -> String {
        format!(
            "Hello! I'm {}. Thank you for taking the time to speak with me today. \
             I'm excited to learn more about you and your background. Let's start with a \
             simple question: Could you please tell me a bit about yourself and what drew \
             you to apply for this position?",
            self.name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewLength {
    Quick,
    Standard,
    Extended,
}

impl InterviewLength {
    pub fn seconds(&self) -> u32 {
        match self {
            InterviewLength::Quick => 600,
            InterviewLength::Standard => 1800,
            InterviewLength::Extended => 3600,
        }
    }
}

impl FromStr for InterviewLength {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(InterviewLength::Quick),
            "standard" => Ok(InterviewLength::Standard),
            "extended" => Ok(InterviewLength::Extended),
            _ => Err(UnknownVariant {
                kind: "interview length",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewType {
    FirstRound,
    FinalRound,
    Technical,
    CulturalFit,
    General,
    SalaryNegotiation,
}

impl FromStr for InterviewType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase())).map_err(|_| {
            UnknownVariant {
                kind: "interview type",
                value: s.to_string(),
            }
        })
    }
}

/// Settings sent to the dialogue service when a session is opened.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewConfig {
    pub persona_id: PersonaId,
    pub interview_type: InterviewType,
    pub interview_length: InterviewLength,
    pub job_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_text: Option<String>,
}

/// Everything a coordinator needs to begin a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    /// Opaque identifier owned by the dialogue service.
    pub session_id: String,
    pub initial_greeting: String,
    pub persona: PersonaId,
    pub duration_seconds: u32,
}

/// Final feedback produced by the dialogue service when a session stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub session_id: String,
    /// Scores from 0 to 10 keyed by dimension (confidence, clarity, overall_fit).
    pub scores: BTreeMap<String, f64>,
    pub improvements: Vec<String>,
    pub conversation_summary: String,
    /// Duration as reported by the service, "MM:SS".
    pub duration: String,
    pub total_questions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The session timer reached zero.
    TimeUp,
    /// An explicit end-session request arrived.
    Requested,
}

/// Terminal state of a session, handed one-way to the feedback collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub session_id: String,
    pub turns: Vec<Turn>,
    pub duration_seconds: u32,
    pub end_reason: EndReason,
    pub feedback: Option<FeedbackResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_round_trip_names() {
        for id in PersonaId::ALL {
            assert_eq!(id.as_str().parse::<PersonaId>().unwrap(), id);
            assert_eq!(
                serde_json::to_string(&id).unwrap(),
                format!("\"{}\"", id.as_str())
            );
        }
    }

    #[test]
    fn test_unknown_persona() {
        let err = "pirate-captain".parse::<PersonaId>().unwrap_err();
        assert_eq!(err.to_string(), "unknown persona: 'pirate-captain'");
    }

    #[test]
    fn test_persona_greeting_uses_name() {
        let persona = PersonaId::TechExpert.persona();
        assert_eq!(persona.name, "Dr. Emily Watson");
        assert!(persona.greeting().starts_with("Hello! I'm Dr. Emily Watson."));
    }

    #[test]
    fn test_interview_length_seconds() {
        assert_eq!("quick".parse::<InterviewLength>().unwrap().seconds(), 600);
        assert_eq!("Standard".parse::<InterviewLength>().unwrap().seconds(), 1800);
        assert_eq!(InterviewLength::Extended.seconds(), 3600);
        assert!("forever".parse::<InterviewLength>().is_err());
    }

    #[test]
    fn test_interview_type_parse() {
        assert_eq!(
            "cultural-fit".parse::<InterviewType>().unwrap(),
            InterviewType::CulturalFit
        );
        assert_eq!(
            "general".parse::<InterviewType>().unwrap(),
            InterviewType::General
        );
        assert!("lunch".parse::<InterviewType>().is_err());
    }

    #[test]
    fn test_interview_config_serialization() {
        let config = InterviewConfig {
            persona_id: PersonaId::HrFriendly,
            interview_type: InterviewType::FirstRound,
            interview_length: InterviewLength::Quick,
            job_description: "Backend engineer working on payments".to_string(),
            cv_text: None,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["persona_id"], "hr-friendly");
        assert_eq!(value["interview_type"], "first-round");
        assert_eq!(value["interview_length"], "quick");
        assert!(value.get("cv_text").is_none());
    }

    #[test]
    fn test_feedback_deserialization_ignores_extra_fields() {
        let json = r#"{
            "session_id": "abc",
            "scores": {"confidence": 7.5, "clarity": 8.0, "overall_fit": 6.0},
            "improvements": ["Use more concrete examples"],
            "conversation_summary": "Solid answers.",
            "duration": "12:04",
            "total_questions": 6,
            "completed_at": "2024-05-01T10:00:00.123456"
        }"#;
        let feedback: FeedbackResult = serde_json::from_str(json).unwrap();
        assert_eq!(feedback.scores["clarity"], 8.0);
        assert_eq!(feedback.total_questions, 6);
    }
}
