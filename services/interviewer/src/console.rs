//! Console front end: renders session updates and routes typed input.

use interview_core::SessionUpdate;
use interview_core::coordinator::{CoordinatorHandle, Phase};
use interview_core::error::Severity;
use interview_core::session::EndReason;
use interview_core::timer::format_clock;
use interview_core::transcript::Speaker;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What a line typed at the console asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    End,
    Listen,
    Done,
    Answer(String),
    Blank,
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    match line {
        "" => ConsoleInput::Blank,
        "/end" | "/quit" => ConsoleInput::End,
        "/listen" => ConsoleInput::Listen,
        "/done" => ConsoleInput::Done,
        text => ConsoleInput::Answer(text.to_string()),
    }
}

/// Formats an update for the terminal. Returns `None` for updates that are
/// not worth a line of their own.
pub fn render(update: &SessionUpdate) -> Option<String> {
    match update {
        SessionUpdate::Turn(turn) => Some(match turn.sender() {
            Speaker::Interviewer => format!("Interviewer: {}", turn.text()),
            Speaker::Candidate => format!("You: {}", turn.text()),
        }),
        SessionUpdate::Phase(Phase::Listening) => {
            Some("[listening] type your answer and press Enter".to_string())
        }
        SessionUpdate::Phase(Phase::Processing) => Some("[thinking]".to_string()),
        SessionUpdate::Phase(_) => None,
        SessionUpdate::Interim(text) => Some(format!("  ({})", text)),
        SessionUpdate::Notice(notice) => {
            let label = match notice.severity {
                Severity::Info => "info",
                Severity::Warning => "warning",
                Severity::Error => "error",
            };
            Some(format!("[{}] {}", label, notice.message))
        }
        SessionUpdate::Clock { remaining_seconds } => {
            let remaining = *remaining_seconds;
            (remaining > 0 && (remaining % 300 == 0 || remaining == 60 || remaining == 10))
                .then(|| format!("[{} left]", format_clock(remaining)))
        }
        SessionUpdate::Ended(EndReason::TimeUp) => {
            Some("[time is up] collecting feedback".to_string())
        }
        SessionUpdate::Ended(EndReason::Requested) => {
            Some("[session ended] collecting feedback".to_string())
        }
    }
}

/// Prints updates until the coordinator goes away.
pub async fn print_updates(mut updates: mpsc::UnboundedReceiver<SessionUpdate>) {
    while let Some(update) = updates.recv().await {
        if let Some(line) = render(&update) {
            println!("{}", line);
        }
    }
}

/// Reads stdin on a dedicated thread so a pending read never holds up
/// runtime shutdown.
pub fn spawn_stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read console input.");
                    break;
                }
            }
        }
        debug!("Console input closed.");
    });
    rx
}

/// Turns console lines into coordinator controls.
///
/// With a voice line sink, answers go to the capture device, which drops
/// anything typed before its current attempt started. Without one, answers
/// are submitted as typed text. Returns when input ends or the session is
/// over.
pub async fn route_input(
    mut lines: mpsc::UnboundedReceiver<String>,
    handle: CoordinatorHandle,
    voice_lines: Option<mpsc::UnboundedSender<String>>,
) {
    while let Some(line) = lines.recv().await {
        let delivered = match parse_line(&line) {
            ConsoleInput::Blank => true,
            ConsoleInput::End => {
                handle.end_session().await;
                break;
            }
            ConsoleInput::Listen => handle.listen().await,
            ConsoleInput::Done => handle.stop_listening().await,
            ConsoleInput::Answer(text) => match &voice_lines {
                Some(sink) if sink.send(text.clone()).is_ok() => true,
                _ => handle.submit_text(text).await,
            },
        };
        if !delivered {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::LineRecognizer;
    use async_trait::async_trait;
    use interview_core::coordinator::{Coordinator, Ports};
    use interview_core::dialogue::{DialogueClient, InterviewerReply, ScriptedDialogueClient};
    use interview_core::error::{DialogueError, Notice};
    use interview_core::events::event_bus;
    use interview_core::session::{FeedbackResult, PersonaId, SessionStart};
    use interview_core::speech_capture::SpeechCapture;
    use interview_core::speech_output::TieredSpeechOutput;
    use interview_core::transcript::TranscriptLog;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted rehearsal that takes a while to answer.
    struct SlowRehearsal {
        inner: ScriptedDialogueClient,
        delay: Duration,
        exchanges: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DialogueClient for SlowRehearsal {
        async fn exchange(
            &self,
            session_id: &str,
            candidate_text: &str,
        ) -> Result<InterviewerReply, DialogueError> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.inner.exchange(session_id, candidate_text).await
        }

        async fn end_session(&self, session_id: &str) -> Result<FeedbackResult, DialogueError> {
            self.inner.end_session(session_id).await
        }
    }

    async fn until_phase(updates: &mut mpsc::UnboundedReceiver<SessionUpdate>, phase: Phase) {
        while let Some(update) = updates.recv().await {
            if matches!(update, SessionUpdate::Phase(p) if p == phase) {
                return;
            }
        }
        panic!("session closed before reaching {}", phase);
    }

    fn offline_start() -> SessionStart {
        SessionStart {
            session_id: "offline".to_string(),
            initial_greeting: String::new(),
            persona: PersonaId::HrFriendly,
            duration_seconds: 600,
        }
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("/end"), ConsoleInput::End);
        assert_eq!(parse_line("  /listen "), ConsoleInput::Listen);
        assert_eq!(parse_line("/done"), ConsoleInput::Done);
        assert_eq!(parse_line("   "), ConsoleInput::Blank);
        assert_eq!(
            parse_line(" I led a team of four "),
            ConsoleInput::Answer("I led a team of four".to_string())
        );
    }

    #[test]
    fn test_render_turns_and_notices() {
        let mut log = TranscriptLog::new();
        let question = log.append(Speaker::Interviewer, "Why Rust?").clone();
        let answer = log.append(Speaker::Candidate, "Fearless concurrency").clone();

        assert_eq!(
            render(&SessionUpdate::Turn(question)).as_deref(),
            Some("Interviewer: Why Rust?")
        );
        assert_eq!(
            render(&SessionUpdate::Turn(answer)).as_deref(),
            Some("You: Fearless concurrency")
        );
        assert_eq!(
            render(&SessionUpdate::Notice(Notice::info("No speech detected"))).as_deref(),
            Some("[info] No speech detected")
        );
        assert_eq!(render(&SessionUpdate::Phase(Phase::Speaking)), None);
    }

    #[test]
    fn test_render_clock_only_at_milestones() {
        let clock = |remaining_seconds| render(&SessionUpdate::Clock { remaining_seconds });
        assert_eq!(clock(600).as_deref(), Some("[10:00 left]"));
        assert_eq!(clock(60).as_deref(), Some("[1:00 left]"));
        assert_eq!(clock(10).as_deref(), Some("[0:10 left]"));
        assert_eq!(clock(599), None);
        assert_eq!(clock(0), None);
    }

    #[tokio::test]
    async fn test_typed_answers_reach_the_session() {
        let (bus, events) = event_bus();
        let ports = Ports {
            output: Box::new(TieredSpeechOutput::new(None, None, bus.clone())),
            capture: Box::new(SpeechCapture::new(
                Arc::new(LineRecognizer::unsupported()),
                bus,
                Duration::ZERO,
            )),
            events,
        };
        let (coordinator, handle) =
            Coordinator::new(offline_start(), ports, Arc::new(ScriptedDialogueClient::new()));
        let session = tokio::spawn(coordinator.run());

        let (lines, input) = mpsc::unbounded_channel();
        for line in ["I build services in Rust", "/end", "ignored"] {
            lines.send(line.to_string()).unwrap();
        }
        route_input(input, handle, None).await;

        let result = session.await.unwrap();
        assert_eq!(result.end_reason, EndReason::Requested);
        assert_eq!(result.turns[0].sender(), Speaker::Candidate);
        assert_eq!(result.turns[0].text(), "I build services in Rust");
        assert!(result.turns.iter().all(|t| t.text() != "ignored"));
        assert!(result.feedback.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spoken_answer_during_processing_is_not_replayed() {
        let (bus, events) = event_bus();
        let (recognizer, voice_lines) = LineRecognizer::new();
        let ports = Ports {
            output: Box::new(TieredSpeechOutput::new(None, None, bus.clone())),
            capture: Box::new(SpeechCapture::new(Arc::new(recognizer), bus, Duration::ZERO)),
            events,
        };
        let exchanges = Arc::new(AtomicUsize::new(0));
        let dialogue = SlowRehearsal {
            inner: ScriptedDialogueClient::new(),
            delay: Duration::from_millis(300),
            exchanges: exchanges.clone(),
        };
        let (updates_tx, mut updates) = mpsc::unbounded_channel();
        let (coordinator, handle) = Coordinator::new(offline_start(), ports, Arc::new(dialogue));
        let session = tokio::spawn(coordinator.with_updates(updates_tx).run());

        let (lines, input) = mpsc::unbounded_channel();
        let router = tokio::spawn(route_input(input, handle, Some(voice_lines)));

        until_phase(&mut updates, Phase::Listening).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        lines.send("first answer".to_string()).unwrap();

        until_phase(&mut updates, Phase::Processing).await;
        lines.send("said during processing".to_string()).unwrap();

        until_phase(&mut updates, Phase::Listening).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        lines.send("/end".to_string()).unwrap();

        let result = session.await.unwrap();
        router.await.unwrap();

        let answers: Vec<&str> = result
            .turns
            .iter()
            .filter(|t| t.sender() == Speaker::Candidate)
            .map(|t| t.text())
            .collect();
        assert_eq!(answers, vec!["first answer"]);
        assert_eq!(exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(result.end_reason, EndReason::Requested);
    }
}
