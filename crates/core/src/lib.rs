//! Voice turn-taking for spoken mock interviews.
//!
//! A [`coordinator::Coordinator`] runs one timed interview session. It speaks
//! interviewer turns through a speech output port, listens for the candidate
//! through a speech capture port, and relays answers to a remote dialogue
//! service, keeping exactly one of those activities live at a time.

pub mod coordinator;
pub mod dialogue;
pub mod error;
pub mod events;
pub mod session;
pub mod speech_capture;
pub mod speech_output;
pub mod synthesis;
pub mod timer;
pub mod transcript;

use coordinator::Phase;
use error::Notice;
use session::EndReason;
use transcript::Turn;

/// Progress reported by a running coordinator to its (optional) observer.
///
/// This is the only channel between the core and whatever renders the
/// session; observers never feed back into coordinator state.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// The coordinator moved to a new phase.
    Phase(Phase),
    /// A turn was appended to the transcript.
    Turn(Turn),
    /// Provisional speech-to-text for the candidate's current answer.
    Interim(String),
    /// Something the user should be told about.
    Notice(Notice),
    /// The session clock ticked.
    Clock { remaining_seconds: u32 },
    /// The session is over; the result follows from `Coordinator::run`.
    Ended(EndReason),
}
