//! Speech Output Port
//!
//! Plays interviewer utterances with a two-tier strategy: remote synthesis
//! played through an audio player, then a local voice. A failure in the first
//! tier is logged and never reaches the coordinator; only when every tier has
//! failed does the port report [`OutputEvent::Failed`].

use crate::error::OutputError;
use crate::events::{EventSender, OutputEvent};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-character playback estimate for voices that never signal completion.
const ESTIMATE_PER_CHAR: Duration = Duration::from_millis(50);
/// Upper bound on the playback estimate.
const ESTIMATE_CAP: Duration = Duration::from_secs(5);

/// The output seam the coordinator drives.
///
/// `speak` returns immediately; progress arrives as [`OutputEvent`]s tagged
/// with `utterance`.
pub trait SpeechOutputPort: Send {
    /// Starts playing `text`, silencing anything still playing.
    fn speak(&mut self, utterance: Uuid, text: &str);
    /// Silences any in-progress playback. No events follow for it.
    fn cancel(&mut self);
}

/// Remote text-to-speech: turns text into encoded audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, OutputError>;
}

/// Plays encoded audio to completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: Bytes) -> Result<(), OutputError>;
}

/// How a local voice reported the end of playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// The voice returned once the audio had finished.
    Confirmed,
    /// The voice returned without knowing when audio ends.
    Unconfirmed,
}

/// Local, lower-fidelity speech used when remote synthesis fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalVoice: Send + Sync {
    async fn speak(&self, text: &str) -> Result<Playback, OutputError>;
}

/// A local voice with no audio at all. Playback length is estimated from the
/// text so the conversation still pauses for roughly as long as speech would.
pub struct SilentVoice;

#[async_trait]
impl LocalVoice for SilentVoice {
    async fn speak(&self, _text: &str) -> Result<Playback, OutputError> {
        Ok(Playback::Unconfirmed)
    }
}

/// Heuristic playback length: 50 ms per character, capped at 5 seconds.
pub fn estimated_duration(text: &str) -> Duration {
    let chars = text.chars().count() as u32;
    ESTIMATE_PER_CHAR.saturating_mul(chars).min(ESTIMATE_CAP)
}

/// Remote synthesis plus the player for its audio.
#[derive(Clone)]
pub struct RemoteVoice {
    pub synthesizer: Arc<dyn VoiceSynthesizer>,
    pub player: Arc<dyn AudioPlayer>,
    pub voice_id: String,
}

impl RemoteVoice {
    async fn say(&self, text: &str) -> Result<(), OutputError> {
        let audio = self.synthesizer.synthesize(text, &self.voice_id).await?;
        if audio.is_empty() {
            return Err(OutputError::EmptyAudio);
        }
        self.player.play(audio).await
    }
}

/// [`SpeechOutputPort`] with a remote primary tier and a local fallback tier.
pub struct TieredSpeechOutput {
    primary: Option<RemoteVoice>,
    fallback: Option<Arc<dyn LocalVoice>>,
    events: EventSender,
    current: Option<JoinHandle<()>>,
}

impl TieredSpeechOutput {
    pub fn new(
        primary: Option<RemoteVoice>,
        fallback: Option<Arc<dyn LocalVoice>>,
        events: EventSender,
    ) -> Self {
        Self {
            primary,
            fallback,
            events,
            current: None,
        }
    }
}

impl SpeechOutputPort for TieredSpeechOutput {
    fn speak(&mut self, utterance: Uuid, text: &str) {
        self.cancel();

        let primary = self.primary.clone();
        let fallback = self.fallback.clone();
        let events = self.events.clone();
        let text = text.to_string();
        self.current = Some(tokio::spawn(async move {
            events.output(utterance, OutputEvent::Started);
            let event = match play_tiers(primary.as_ref(), fallback.as_deref(), &text).await {
                Ok(()) => OutputEvent::Completed,
                Err(e) => OutputEvent::Failed(e),
            };
            events.output(utterance, event);
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            if !handle.is_finished() {
                debug!("Silencing in-progress playback.");
            }
            handle.abort();
        }
    }
}

impl Drop for TieredSpeechOutput {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn play_tiers(
    primary: Option<&RemoteVoice>,
    fallback: Option<&dyn LocalVoice>,
    text: &str,
) -> Result<(), OutputError> {
    let mut last_error = OutputError::Unavailable;

    if let Some(remote) = primary {
        match remote.say(text).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(error = %e, "Remote voice failed, falling back to local voice.");
                last_error = e;
            }
        }
    }

    let Some(local) = fallback else {
        return Err(last_error);
    };
    match local.speak(text).await? {
        Playback::Confirmed => {}
        Playback::Unconfirmed => tokio::time::sleep(estimated_duration(text)).await,
    }
    Ok(())
}
