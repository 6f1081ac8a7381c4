//! Turn-Taking Coordinator
//!
//! One coordinator owns one interview session. It is the only writer of the
//! transcript and the only user of its speech ports, and it runs as a single
//! task that handles controls, timer ticks, port events and exchange results
//! in arrival order.

use crate::SessionUpdate;
use crate::dialogue::{DialogueClient, InterviewerReply};
use crate::error::{CaptureFailure, DialogueError, InterviewError, Notice};
use crate::events::{CaptureEvent, EventReceiver, OutputEvent, PortEvent};
use crate::session::{EndReason, SessionResult, SessionStart};
use crate::speech_capture::SpeechCapturePort;
use crate::speech_output::SpeechOutputPort;
use crate::timer::{SessionTimer, TICK_INTERVAL, Tick};
use crate::transcript::{Speaker, TranscriptLog};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Spoken in place of a reply when the dialogue service cannot be reached.
pub const FALLBACK_REPLY: &str =
    "I apologize, I'm having a brief technical issue. Could you please repeat that?";

/// Upper bound on the closing feedback request.
pub const DEFAULT_END_TIMEOUT: Duration = Duration::from_secs(30);

const CONTROL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    /// Output port is playing the latest interviewer turn.
    Speaking,
    /// Capture port is recording the candidate.
    Listening,
    /// A dialogue exchange is in flight.
    Processing,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Speaking => "speaking",
            Phase::Listening => "listening",
            Phase::Processing => "processing",
            Phase::Ended => "ended",
        };
        write!(f, "{}", name)
    }
}

/// Requests from outside the session (UI, console, tests).
#[derive(Debug)]
enum Control {
    EndSession,
    SubmitText(String),
    Listen,
    StopListening,
}

/// Cloneable handle for steering a running coordinator.
///
/// Every method returns `false` once the session has ended.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Control>,
}

impl CoordinatorHandle {
    pub async fn end_session(&self) -> bool {
        self.send(Control::EndSession).await
    }

    /// Submits a typed answer, bypassing speech capture.
    pub async fn submit_text(&self, text: impl Into<String>) -> bool {
        self.send(Control::SubmitText(text.into())).await
    }

    /// Re-arms capture after a capture error left the session idle.
    pub async fn listen(&self) -> bool {
        self.send(Control::Listen).await
    }

    /// The candidate is done talking; finalize whatever was heard so far.
    pub async fn stop_listening(&self) -> bool {
        self.send(Control::StopListening).await
    }

    async fn send(&self, control: Control) -> bool {
        self.tx.send(control).await.is_ok()
    }
}

/// The concrete ports a coordinator drives, plus the bus they report on.
pub struct Ports {
    pub output: Box<dyn SpeechOutputPort>,
    pub capture: Box<dyn SpeechCapturePort>,
    pub events: EventReceiver,
}

type ExchangeResult = (u64, Result<InterviewerReply, DialogueError>);

struct PendingExchange {
    seq: u64,
    task: JoinHandle<()>,
}

pub struct Coordinator {
    session_id: String,
    phase: Phase,
    log: TranscriptLog,
    timer: SessionTimer,
    output: Box<dyn SpeechOutputPort>,
    capture: Box<dyn SpeechCapturePort>,
    dialogue: Arc<dyn DialogueClient>,
    port_events: EventReceiver,
    controls: mpsc::Receiver<Control>,
    updates: Option<mpsc::UnboundedSender<SessionUpdate>>,
    /// Utterance currently owned by the output port.
    speaking: Option<Uuid>,
    /// Capture attempt currently owned by the capture port.
    listening: Option<u64>,
    exchange: Option<PendingExchange>,
    exchange_seq: u64,
    exchange_tx: mpsc::UnboundedSender<ExchangeResult>,
    exchange_rx: mpsc::UnboundedReceiver<ExchangeResult>,
    end_timeout: Duration,
}

impl Coordinator {
    /// Builds a coordinator for a freshly started session. The greeting, if
    /// any, becomes the first turn and is spoken as soon as `run` begins.
    pub fn new(
        start: SessionStart,
        ports: Ports,
        dialogue: Arc<dyn DialogueClient>,
    ) -> (Self, CoordinatorHandle) {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (exchange_tx, exchange_rx) = mpsc::unbounded_channel();

        let mut log = TranscriptLog::new();
        let greeting = start.initial_greeting.trim();
        if !greeting.is_empty() {
            log.append(Speaker::Interviewer, greeting);
        }

        let coordinator = Self {
            session_id: start.session_id,
            phase: Phase::Idle,
            log,
            timer: SessionTimer::new(start.duration_seconds),
            output: ports.output,
            capture: ports.capture,
            dialogue,
            port_events: ports.events,
            controls: control_rx,
            updates: None,
            speaking: None,
            listening: None,
            exchange: None,
            exchange_seq: 0,
            exchange_tx,
            exchange_rx,
            end_timeout: DEFAULT_END_TIMEOUT,
        };
        (coordinator, CoordinatorHandle { tx: control_tx })
    }

    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<SessionUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn with_end_timeout(mut self, timeout: Duration) -> Self {
        self.end_timeout = timeout;
        self
    }

    /// Runs the session to completion and returns its terminal state.
    pub async fn run(self) -> SessionResult {
        let span = info_span!("interview_session", session_id = %self.session_id);
        self.drive().instrument(span).await
    }

    async fn drive(mut self) -> SessionResult {
        info!(
            duration_seconds = self.timer.total(),
            "Interview session started."
        );
        if let Some(turn) = self.log.last().cloned() {
            self.publish(SessionUpdate::Turn(turn));
        }
        if !self.capture.is_available() {
            self.report(InterviewError::CaptureUnavailable);
        }
        if !self.speak_latest() {
            self.listen();
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
        let reason = loop {
            tokio::select! {
                biased;

                Some(control) = self.controls.recv() => {
                    if let Control::EndSession = control {
                        info!("End of session requested.");
                        break EndReason::Requested;
                    }
                    self.on_control(control);
                }

                _ = ticker.tick() => match self.timer.tick() {
                    Tick::Running => {
                        let remaining_seconds = self.timer.remaining();
                        self.publish(SessionUpdate::Clock { remaining_seconds });
                    }
                    Tick::Expired => {
                        self.publish(SessionUpdate::Clock { remaining_seconds: 0 });
                        info!("Session time is up.");
                        break EndReason::TimeUp;
                    }
                },

                Some(event) = self.port_events.recv() => self.on_port_event(event),

                Some((seq, result)) = self.exchange_rx.recv() => self.on_exchange(seq, result),
            }
        };

        self.finish(reason).await
    }

    fn on_control(&mut self, control: Control) {
        match control {
            Control::SubmitText(text) => self.on_typed_answer(text),
            Control::Listen => {
                if self.phase == Phase::Idle {
                    self.listen();
                } else {
                    debug!(phase = %self.phase, "Ignoring listen request.");
                }
            }
            Control::StopListening => {
                if self.phase == Phase::Listening {
                    self.capture.stop();
                }
            }
            Control::EndSession => {}
        }
    }

    fn on_typed_answer(&mut self, text: String) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match self.phase {
            Phase::Listening => {
                self.capture.abort();
                self.listening = None;
            }
            Phase::Idle => {}
            phase => {
                debug!(%phase, "Typed answer arrived while busy; dropping it.");
                self.publish(SessionUpdate::Notice(Notice::info(
                    "Please wait for the interviewer to finish.",
                )));
                return;
            }
        }
        self.begin_exchange(text.to_string());
    }

    fn on_port_event(&mut self, event: PortEvent) {
        match event {
            PortEvent::Output { utterance, event } => self.on_output(utterance, event),
            PortEvent::Capture { attempt, event } => self.on_capture(attempt, event),
        }
    }

    fn on_output(&mut self, utterance: Uuid, event: OutputEvent) {
        if self.phase != Phase::Speaking || self.speaking != Some(utterance) {
            debug!(%utterance, ?event, "Dropping stale output event.");
            return;
        }
        match event {
            OutputEvent::Started => debug!(%utterance, "Playback started."),
            OutputEvent::Completed => {
                debug!(%utterance, "Playback completed.");
                self.finish_speaking();
            }
            OutputEvent::Failed(err) => {
                // Output failure never blocks the conversation.
                self.report(InterviewError::OutputFailure(err.to_string()));
                self.finish_speaking();
            }
        }
    }

    fn on_capture(&mut self, attempt: u64, event: CaptureEvent) {
        if self.phase != Phase::Listening || self.listening != Some(attempt) {
            debug!(attempt, phase = %self.phase, ?event, "Dropping stale capture event.");
            return;
        }
        match event {
            CaptureEvent::Started => debug!(attempt, "Capture started."),
            CaptureEvent::Interim(text) => self.publish(SessionUpdate::Interim(text)),
            CaptureEvent::Final(text) => {
                self.listening = None;
                let text = text.trim();
                if text.is_empty() {
                    self.set_phase(Phase::Idle);
                    self.report(InterviewError::CaptureTransient(CaptureFailure::NoSpeech));
                } else {
                    self.begin_exchange(text.to_string());
                }
            }
            CaptureEvent::Error(failure) => {
                self.listening = None;
                self.set_phase(Phase::Idle);
                self.report(InterviewError::CaptureTransient(failure));
            }
            CaptureEvent::Ended => {
                debug!(attempt, "Capture ended without an answer.");
                self.listening = None;
                self.set_phase(Phase::Idle);
            }
        }
    }

    /// Records the candidate's answer and sends it to the dialogue service.
    fn begin_exchange(&mut self, text: String) {
        let turn = self.log.append(Speaker::Candidate, text.as_str()).clone();
        self.publish(SessionUpdate::Turn(turn));
        self.set_phase(Phase::Processing);

        self.exchange_seq += 1;
        let seq = self.exchange_seq;
        let dialogue = Arc::clone(&self.dialogue);
        let session_id = self.session_id.clone();
        let results = self.exchange_tx.clone();
        let task = tokio::spawn(async move {
            let result = dialogue.exchange(&session_id, &text).await;
            let _ = results.send((seq, result));
        });
        self.exchange = Some(PendingExchange { seq, task });
    }

    fn on_exchange(&mut self, seq: u64, result: Result<InterviewerReply, DialogueError>) {
        let current = self.exchange.as_ref().map(|pending| pending.seq);
        if self.phase != Phase::Processing || current != Some(seq) {
            debug!(seq, "Dropping stale exchange result.");
            return;
        }
        self.exchange = None;

        let reply = match result {
            Ok(reply) if !reply.response.trim().is_empty() => {
                debug!(question_count = ?reply.question_count, "Interviewer replied.");
                reply.response
            }
            Ok(_) => {
                self.report(InterviewError::ExchangeFailure(DialogueError::InvalidResponse(
                    "empty interviewer reply".to_string(),
                )));
                FALLBACK_REPLY.to_string()
            }
            Err(err) => {
                self.report(InterviewError::ExchangeFailure(err));
                FALLBACK_REPLY.to_string()
            }
        };

        let turn = self.log.append(Speaker::Interviewer, reply.trim()).clone();
        self.publish(SessionUpdate::Turn(turn));
        if !self.speak_latest() {
            self.set_phase(Phase::Idle);
            self.listen();
        }
    }

    /// Voices the most recent turn if it is an interviewer turn that has never
    /// been voiced. Returns whether playback was started.
    fn speak_latest(&mut self) -> bool {
        if !matches!(self.phase, Phase::Idle | Phase::Processing) {
            debug!(phase = %self.phase, "Not speaking: port busy.");
            return false;
        }
        let Some(turn) = self.log.last() else {
            return false;
        };
        if turn.sender() != Speaker::Interviewer {
            return false;
        }
        let (id, text) = (turn.id(), turn.text().to_string());
        if !self.log.mark_voiced(id) {
            debug!(turn = %id, "Turn already voiced.");
            return false;
        }

        if self.capture.is_active() {
            self.capture.abort();
        }
        self.listening = None;
        self.speaking = Some(id);
        self.set_phase(Phase::Speaking);
        self.output.speak(id, &text);
        true
    }

    fn finish_speaking(&mut self) {
        self.speaking = None;
        if !self.try_listen() {
            self.set_phase(Phase::Idle);
        }
    }

    /// Starts capture from Idle.
    fn listen(&mut self) {
        if self.phase != Phase::Idle {
            debug!(phase = %self.phase, "Not listening: session busy.");
            return;
        }
        self.try_listen();
    }

    fn try_listen(&mut self) -> bool {
        if !self.capture.is_available() {
            return false;
        }
        match self.capture.start() {
            Some(attempt) => {
                self.listening = Some(attempt);
                self.set_phase(Phase::Listening);
                true
            }
            None => {
                debug!("Capture did not start.");
                false
            }
        }
    }

    async fn finish(mut self, reason: EndReason) -> SessionResult {
        self.set_phase(Phase::Ended);
        self.output.cancel();
        self.capture.abort();
        self.speaking = None;
        self.listening = None;
        if let Some(pending) = self.exchange.take() {
            pending.task.abort();
        }

        info!(
            ?reason,
            elapsed_seconds = self.timer.elapsed(),
            turns = self.log.len(),
            questions = self.log.question_count(),
            "Interview session ended."
        );

        let outcome = tokio::time::timeout(
            self.end_timeout,
            self.dialogue.end_session(&self.session_id),
        )
        .await;
        let feedback = match outcome {
            Ok(Ok(feedback)) => Some(feedback),
            Ok(Err(err)) => {
                self.report(InterviewError::SessionEndFailure(err));
                None
            }
            Err(_) => {
                self.report(InterviewError::SessionEndFailure(DialogueError::Timeout));
                None
            }
        };

        self.publish(SessionUpdate::Ended(reason));
        SessionResult {
            duration_seconds: self.timer.elapsed(),
            session_id: self.session_id,
            turns: self.log.into_turns(),
            end_reason: reason,
            feedback,
        }
    }

    fn report(&self, err: InterviewError) {
        match &err {
            InterviewError::ExchangeFailure(_) | InterviewError::SessionEndFailure(_) => {
                error!(error = %err, "Interview error.");
            }
            _ => warn!(error = %err, "Interview degraded."),
        }
        self.publish(SessionUpdate::Notice(Notice::from(&err)));
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "Phase change.");
            self.phase = phase;
            self.publish(SessionUpdate::Phase(phase));
        }
    }

    fn publish(&self, update: SessionUpdate) {
        if let Some(updates) = &self.updates {
            let _ = updates.send(update);
        }
    }
}
