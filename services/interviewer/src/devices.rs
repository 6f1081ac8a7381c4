//! Terminal-backed speech devices.
//!
//! The console stands in for a microphone (each line routed to the
//! recognizer while listening is a finished utterance) and shells out to
//! external commands for audio playback and local speech.

use async_trait::async_trait;
use bytes::Bytes;
use interview_core::error::{CaptureFailure, OutputError};
use interview_core::speech_capture::{Recognizer, RecognizerEvent};
use interview_core::speech_output::{AudioPlayer, LocalVoice, Playback};
use std::io::Write;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, instrument};

/// Splits a configured command line into program and leading arguments.
pub fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// A recognizer fed by console lines.
pub struct LineRecognizer {
    lines: Option<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl LineRecognizer {
    /// Returns the recognizer and the sender the console writes lines into.
    pub fn new() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                lines: Some(Mutex::new(rx)),
            },
            tx,
        )
    }

    /// A recognizer that reports no capture capability at all.
    pub fn unsupported() -> Self {
        Self { lines: None }
    }
}

#[async_trait]
impl Recognizer for LineRecognizer {
    fn is_supported(&self) -> bool {
        self.lines.is_some()
    }

    async fn recognize(
        &self,
        results: mpsc::UnboundedSender<RecognizerEvent>,
    ) -> Result<(), CaptureFailure> {
        let Some(lines) = &self.lines else {
            return Err(CaptureFailure::Device("no input device".to_string()));
        };
        let mut lines = lines.lock().await;
        // Lines typed before this attempt began were never heard.
        let mut stale = 0usize;
        while lines.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!(stale, "Discarded console lines typed outside a capture attempt.");
        }
        match lines.recv().await {
            Some(line) => {
                let _ = results.send(RecognizerEvent::Final(line));
                Ok(())
            }
            None => Err(CaptureFailure::Device("console input closed".to_string())),
        }
    }
}

/// Plays synthesized audio by handing a temporary file to an external player.
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn from_command(command: &str) -> Result<Self, OutputError> {
        let (program, args) = split_command(command)
            .ok_or_else(|| OutputError::Playback("empty audio player command".to_string()))?;
        Ok(Self { program, args })
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    #[instrument(skip_all, fields(player = %self.program, bytes = audio.len()))]
    async fn play(&self, audio: Bytes) -> Result<(), OutputError> {
        let mut file = tempfile::Builder::new()
            .prefix("interviewer-")
            .suffix(".mp3")
            .tempfile()
            .map_err(|e| OutputError::Playback(e.to_string()))?;
        file.write_all(&audio)
            .and_then(|_| file.flush())
            .map_err(|e| OutputError::Playback(e.to_string()))?;

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| OutputError::Playback(format!("{}: {}", self.program, e)))?;

        if !status.success() {
            return Err(OutputError::Playback(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        debug!("Audio playback finished.");
        Ok(())
    }
}

/// Local speech through an external text-to-speech command (`say`, `espeak`).
pub struct CommandVoice {
    program: String,
    args: Vec<String>,
}

impl CommandVoice {
    pub fn from_command(command: &str) -> Result<Self, OutputError> {
        let (program, args) = split_command(command).ok_or(OutputError::Unavailable)?;
        Ok(Self { program, args })
    }
}

#[async_trait]
impl LocalVoice for CommandVoice {
    async fn speak(&self, text: &str) -> Result<Playback, OutputError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| OutputError::Playback(format!("{}: {}", self.program, e)))?;

        if status.success() {
            Ok(Playback::Confirmed)
        } else {
            Err(OutputError::Playback(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}
