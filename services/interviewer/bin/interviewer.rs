//! Main Entrypoint for the Interviewer Console
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and command line.
//! 2. Opening an interview session (or a local rehearsal with `--offline`).
//! 3. Wiring the speech ports to the terminal and external audio commands.
//! 4. Running the coordinator until time runs out or `/end` is typed.
//! 5. Printing the final session result as JSON.

use anyhow::Context;
use clap::Parser;
use interview_core::coordinator::{Coordinator, CoordinatorHandle, Ports};
use interview_core::dialogue::{DialogueClient, HttpDialogueClient, ScriptedDialogueClient};
use interview_core::events::event_bus;
use interview_core::session::{
    InterviewConfig, InterviewLength, InterviewType, PersonaId, SessionStart,
};
use interview_core::speech_capture::SpeechCapture;
use interview_core::speech_output::{LocalVoice, RemoteVoice, SilentVoice, TieredSpeechOutput};
use interview_core::synthesis::ElevenLabsSynthesizer;
use interviewer_service::config::Config;
use interviewer_service::console::{print_updates, route_input, spawn_stdin_lines};
use interviewer_service::devices::{CommandPlayer, CommandVoice, LineRecognizer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Spoken mock interviews in the terminal
#[derive(Parser, Debug)]
#[command(name = "interviewer", version, about = "Spoken mock interviews in the terminal")]
struct Cli {
    /// Rehearse with scripted questions instead of the dialogue service
    #[arg(long)]
    offline: bool,

    /// Treat speech capture as unavailable; every line is a typed answer
    #[arg(long)]
    no_voice_input: bool,

    /// Interviewer persona (hr-friendly, manager-critical, tech-expert, ...)
    #[arg(long, value_name = "PERSONA")]
    persona: Option<PersonaId>,

    /// Interview type (first-round, technical, general, ...)
    #[arg(long, value_name = "TYPE")]
    interview_type: Option<InterviewType>,

    /// Interview length (quick, standard, extended)
    #[arg(long, value_name = "LENGTH")]
    length: Option<InterviewLength>,

    /// Job description the interview is for
    #[arg(long, value_name = "TEXT")]
    job_description: Option<String>,

    /// Path to a plain-text CV shared with the interviewer
    #[arg(long, value_name = "PATH")]
    cv: Option<PathBuf>,

    /// Dialogue service base URL
    #[arg(long, value_name = "URL")]
    dialogue_url: Option<String>,
}

/// Ends the session when `Ctrl+C` is pressed.
async fn shutdown_signal(handle: CoordinatorHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received interrupt. Ending the session...");
        handle.end_session().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(persona) = cli.persona {
        config.persona = persona;
    }
    if let Some(interview_type) = cli.interview_type {
        config.interview_type = interview_type;
    }
    if let Some(length) = cli.length {
        config.interview_length = length;
    }
    if let Some(job_description) = cli.job_description {
        config.job_description = Some(job_description);
    }
    if let Some(url) = cli.dialogue_url {
        config.dialogue_api_url = url;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Opening interview session...");

    // --- 3. Open the Session ---
    let persona = config.persona.persona();
    let (start, dialogue): (SessionStart, Arc<dyn DialogueClient>) = if cli.offline {
        info!(persona = %config.persona, "Starting offline rehearsal.");
        let start = SessionStart {
            session_id: "offline-rehearsal".to_string(),
            initial_greeting: persona.greeting(),
            persona: config.persona,
            duration_seconds: config.interview_length.seconds(),
        };
        let dialogue: Arc<dyn DialogueClient> = Arc::new(ScriptedDialogueClient::new());
        (start, dialogue)
    } else {
        let cv_text = match &cli.cv {
            Some(path) => Some(
                tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read CV from {}", path.display()))?,
            ),
            None => None,
        };
        let interview = InterviewConfig {
            persona_id: config.persona,
            interview_type: config.interview_type,
            interview_length: config.interview_length,
            job_description: config.require_job_description()?.to_string(),
            cv_text,
        };
        let client = HttpDialogueClient::new(&config.dialogue_api_url, config.request_timeout)
            .context("Failed to build dialogue client")?;
        let start = client
            .start_session(&interview)
            .await
            .context("Failed to start interview session")?;
        let dialogue: Arc<dyn DialogueClient> = Arc::new(client);
        (start, dialogue)
    };
    info!(
        session_id = %start.session_id,
        interviewer = persona.name,
        duration_seconds = start.duration_seconds,
        "Interview session opened."
    );

    // --- 4. Wire the Speech Ports ---
    let (bus, events) = event_bus();

    let primary = match &config.voice_api_key {
        Some(key) => Some(RemoteVoice {
            synthesizer: Arc::new(ElevenLabsSynthesizer::new(
                &config.voice_api_url,
                key.clone(),
                config.request_timeout,
            )?),
            player: Arc::new(CommandPlayer::from_command(&config.audio_player)?),
            voice_id: persona.voice_id.to_string(),
        }),
        None => {
            warn!("VOICE_API_KEY is not set; using the local voice only.");
            None
        }
    };
    let fallback: Arc<dyn LocalVoice> = match &config.local_tts_command {
        Some(command) => Arc::new(CommandVoice::from_command(command)?),
        None => Arc::new(SilentVoice),
    };
    let output = TieredSpeechOutput::new(primary, Some(fallback), bus.clone());

    let (recognizer, voice_lines) = if cli.no_voice_input {
        (LineRecognizer::unsupported(), None)
    } else {
        let (recognizer, lines) = LineRecognizer::new();
        (recognizer, Some(lines))
    };
    let capture = SpeechCapture::new(Arc::new(recognizer), bus, config.capture_settle);

    let ports = Ports {
        output: Box::new(output),
        capture: Box::new(capture),
        events,
    };

    // --- 5. Run the Session ---
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (coordinator, handle) = Coordinator::new(start, ports, dialogue);
    let coordinator = coordinator
        .with_updates(updates_tx)
        .with_end_timeout(config.request_timeout);

    let printer = tokio::spawn(print_updates(updates_rx));
    let input = tokio::spawn(route_input(
        spawn_stdin_lines(),
        handle.clone(),
        voice_lines,
    ));
    let interrupt = tokio::spawn(shutdown_signal(handle));

    let result = coordinator.run().await;
    input.abort();
    interrupt.abort();
    printer.await.context("Update printer failed")?;

    // --- 6. Hand Off the Result ---
    info!(
        turns = result.turns.len(),
        duration_seconds = result.duration_seconds,
        "Interview finished."
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialize session result")?
    );
    Ok(())
}
