//! Port Event Bus
//!
//! Both speech ports report back to their coordinator over one channel. Each
//! event names the operation it belongs to (an utterance id for output, an
//! attempt number for capture) so the coordinator can drop events from
//! operations it has already cancelled.

use crate::error::{CaptureFailure, OutputError};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug)]
pub enum OutputEvent {
    Started,
    Completed,
    /// Every synthesis tier failed.
    Failed(OutputError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Started,
    /// Provisional transcript; replaces any earlier interim text.
    Interim(String),
    Final(String),
    Error(CaptureFailure),
    /// The attempt ended without a transcript (stopped with nothing heard).
    Ended,
}

#[derive(Debug)]
pub enum PortEvent {
    Output { utterance: Uuid, event: OutputEvent },
    Capture { attempt: u64, event: CaptureEvent },
}

/// Sending half handed to each port.
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<PortEvent>);

/// Receiving half owned by the coordinator, its single subscriber.
pub type EventReceiver = mpsc::UnboundedReceiver<PortEvent>;

/// Creates the bus shared by one coordinator and its ports.
pub fn event_bus() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender(tx), rx)
}

impl EventSender {
    pub fn output(&self, utterance: Uuid, event: OutputEvent) {
        self.send(PortEvent::Output { utterance, event });
    }

    pub fn capture(&self, attempt: u64, event: CaptureEvent) {
        self.send(PortEvent::Capture { attempt, event });
    }

    fn send(&self, event: PortEvent) {
        // After the session ends the receiver is gone and late events are moot.
        if self.0.send(event).is_err() {
            tracing::trace!("Dropping port event: coordinator has shut down.");
        }
    }
}
