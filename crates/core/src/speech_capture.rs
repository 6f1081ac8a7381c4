//! Speech Capture Port
//!
//! Wraps a platform [`Recognizer`] with the guarantees the coordinator relies
//! on: at most one attempt at a time, a settling delay between consecutive
//! attempts, exactly one terminal event per attempt, and `stop` treated as
//! "I'm done talking" rather than "discard".

use crate::error::CaptureFailure;
use crate::events::{CaptureEvent, EventSender};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Default pause between the end of one attempt and the start of the next.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

/// The capture seam the coordinator drives.
pub trait SpeechCapturePort: Send {
    /// Whether capture is supported at all. Fixed for the life of the port.
    fn is_available(&self) -> bool;
    /// Starts an attempt and returns its number, or `None` if capture is
    /// unavailable or an attempt is already active.
    fn start(&mut self) -> Option<u64>;
    /// Ends the active attempt, delivering any interim text as the final
    /// transcript.
    fn stop(&mut self);
    /// Ends the active attempt and discards what was heard. No events follow.
    fn abort(&mut self);
    fn is_active(&self) -> bool;
}

/// Raw results from a recognition device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    Partial(String),
    Final(String),
}

/// A speech-to-text device.
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Runs one recognition attempt, pushing results into `results`.
    ///
    /// Returns when the device gives up on the utterance. The future is
    /// dropped to cancel the attempt.
    async fn recognize(
        &self,
        results: mpsc::UnboundedSender<RecognizerEvent>,
    ) -> Result<(), CaptureFailure>;
}

/// State shared between the port and the task running one attempt.
#[derive(Debug, Default)]
struct AttemptState {
    interim: String,
    /// Set once the attempt's terminal event has been decided.
    settled: bool,
    ended_at: Option<Instant>,
}

struct ActiveAttempt {
    state: Arc<Mutex<AttemptState>>,
    handle: JoinHandle<()>,
}

fn lock(state: &Mutex<AttemptState>) -> MutexGuard<'_, AttemptState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`SpeechCapturePort`] over any [`Recognizer`].
pub struct SpeechCapture {
    recognizer: Arc<dyn Recognizer>,
    events: EventSender,
    settle: Duration,
    available: bool,
    attempt: u64,
    current: Option<ActiveAttempt>,
}

impl SpeechCapture {
    pub fn new(recognizer: Arc<dyn Recognizer>, events: EventSender, settle: Duration) -> Self {
        let available = recognizer.is_supported();
        if !available {
            debug!("Speech recognizer is not supported on this device.");
        }
        Self {
            recognizer,
            events,
            settle,
            available,
            attempt: 0,
            current: None,
        }
    }

    fn remaining_settle(&self) -> Duration {
        let ended_at = self
            .current
            .as_ref()
            .and_then(|active| lock(&active.state).ended_at);
        match ended_at {
            Some(at) => self.settle.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Settles the active attempt from the port side. Returns the interim
    /// text, or `None` if the attempt had already settled on its own.
    fn release(&mut self) -> Option<String> {
        let active = self.current.as_ref()?;
        let mut state = lock(&active.state);
        active.handle.abort();
        if state.settled {
            return None;
        }
        state.settled = true;
        state.ended_at = Some(Instant::now());
        Some(std::mem::take(&mut state.interim))
    }
}

impl SpeechCapturePort for SpeechCapture {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self) -> Option<u64> {
        if !self.available {
            return None;
        }
        if self.is_active() {
            debug!(attempt = self.attempt, "Capture already active; ignoring start.");
            return None;
        }

        let delay = self.remaining_settle();
        self.attempt += 1;
        let attempt = self.attempt;
        let state = Arc::new(Mutex::new(AttemptState::default()));
        let handle = tokio::spawn(run_attempt(
            self.recognizer.clone(),
            self.events.clone(),
            attempt,
            state.clone(),
            delay,
        ));
        self.current = Some(ActiveAttempt { state, handle });
        debug!(attempt, ?delay, "Capture started.");
        Some(attempt)
    }

    fn stop(&mut self) {
        let attempt = self.attempt;
        match self.release() {
            Some(text) if !text.trim().is_empty() => {
                self.events.capture(attempt, CaptureEvent::Final(text));
            }
            Some(_) => self.events.capture(attempt, CaptureEvent::Ended),
            None => {}
        }
    }

    fn abort(&mut self) {
        if self.release().is_some() {
            debug!(attempt = self.attempt, "Capture aborted.");
        }
    }

    fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|active| !lock(&active.state).settled)
    }
}

impl Drop for SpeechCapture {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn run_attempt(
    recognizer: Arc<dyn Recognizer>,
    events: EventSender,
    attempt: u64,
    state: Arc<Mutex<AttemptState>>,
    delay: Duration,
) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    events.capture(attempt, CaptureEvent::Started);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let recognition = recognizer.recognize(tx);
    tokio::pin!(recognition);

    let mut recognizing = true;
    let mut outcome = Ok(());
    let mut heard = None;
    loop {
        tokio::select! {
            biased;
            result = rx.recv() => match result {
                Some(RecognizerEvent::Partial(text)) => {
                    let mut guard = lock(&state);
                    if guard.settled {
                        return;
                    }
                    guard.interim = text.clone();
                    events.capture(attempt, CaptureEvent::Interim(text));
                }
                Some(RecognizerEvent::Final(text)) => {
                    heard = Some(text);
                    break;
                }
                None if recognizing => {
                    outcome = (&mut recognition).await;
                    break;
                }
                None => break,
            },
            result = &mut recognition, if recognizing => {
                recognizing = false;
                outcome = result;
            }
        }
    }

    let mut guard = lock(&state);
    if guard.settled {
        return;
    }
    guard.settled = true;
    guard.ended_at = Some(Instant::now());
    let pending = std::mem::take(&mut guard.interim);
    let event = match (heard, outcome) {
        (Some(text), _) if !text.trim().is_empty() => CaptureEvent::Final(text),
        (None, Err(failure)) => CaptureEvent::Error(failure),
        (None, Ok(())) if !pending.trim().is_empty() => CaptureEvent::Final(pending),
        _ => CaptureEvent::Error(CaptureFailure::NoSpeech),
    };
    events.capture(attempt, event);
}
