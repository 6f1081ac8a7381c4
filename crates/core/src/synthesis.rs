//! Remote voice synthesis over the ElevenLabs text-to-speech API.

use crate::error::OutputError;
use crate::speech_output::VoiceSynthesizer;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_VOICE_API_URL: &str = "https://api.elevenlabs.io/v1";
const MODEL_ID: &str = "eleven_monolingual_v1";

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, OutputError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl VoiceSynthesizer for ElevenLabsSynthesizer {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, OutputError> {
        let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);
        let request = SynthesisRequest {
            text,
            model_id: MODEL_ID,
            voice_settings: VoiceSettings {
                stability: 0.71,
                similarity_boost: 0.5,
                style: 0.0,
                use_speaker_boost: true,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutputError::Synthesis(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let audio = response.bytes().await?;
        debug!(bytes = audio.len(), "Synthesized interviewer audio.");
        Ok(audio)
    }
}
