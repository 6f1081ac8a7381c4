use interview_core::session::{InterviewLength, InterviewType, PersonaId};
use interview_core::synthesis::DEFAULT_VOICE_API_URL;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub dialogue_api_url: String,
    pub voice_api_key: Option<String>,
    pub voice_api_url: String,
    /// Command that plays an audio file; the file path is appended.
    pub audio_player: String,
    /// Command that speaks text aloud; the text is appended.
    pub local_tts_command: Option<String>,
    pub persona: PersonaId,
    pub interview_type: InterviewType,
    pub interview_length: InterviewLength,
    pub job_description: Option<String>,
    pub request_timeout: Duration,
    pub capture_settle: Duration,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let dialogue_api_url = var_or("DIALOGUE_API_URL", "http://localhost:8000/api");
        let voice_api_key = std::env::var("VOICE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let voice_api_url = var_or("VOICE_API_URL", DEFAULT_VOICE_API_URL);

        let audio_player = var_or("AUDIO_PLAYER", "mpg123 -q");
        if audio_player.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "AUDIO_PLAYER".to_string(),
                "command must not be empty".to_string(),
            ));
        }
        let local_tts_command = std::env::var("LOCAL_TTS_COMMAND")
            .ok()
            .filter(|c| !c.trim().is_empty());

        let persona = parse_var::<PersonaId>("PERSONA", "hr-friendly")?;
        let interview_type = parse_var::<InterviewType>("INTERVIEW_TYPE", "general")?;
        let interview_length = parse_var::<InterviewLength>("INTERVIEW_LENGTH", "standard")?;
        let job_description = std::env::var("JOB_DESCRIPTION")
            .ok()
            .filter(|d| !d.trim().is_empty());

        let request_timeout =
            Duration::from_secs(parse_var::<u64>("REQUEST_TIMEOUT_SECS", "30")?);
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let capture_settle = Duration::from_millis(parse_var::<u64>("CAPTURE_SETTLE_MS", "300")?);

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            dialogue_api_url,
            voice_api_key,
            voice_api_url,
            audio_player,
            local_tts_command,
            persona,
            interview_type,
            interview_length,
            job_description,
            request_timeout,
            capture_settle,
            log_level,
        })
    }

    /// The job description the dialogue service needs to open a session.
    pub fn require_job_description(&self) -> Result<&str, ConfigError> {
        self.job_description.as_deref().ok_or_else(|| {
            ConfigError::MissingVar(
                "JOB_DESCRIPTION must be set unless running with --offline".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("DIALOGUE_API_URL");
            env::remove_var("VOICE_API_KEY");
            env::remove_var("VOICE_API_URL");
            env::remove_var("AUDIO_PLAYER");
            env::remove_var("LOCAL_TTS_COMMAND");
            env::remove_var("PERSONA");
            env::remove_var("INTERVIEW_TYPE");
            env::remove_var("INTERVIEW_LENGTH");
            env::remove_var("JOB_DESCRIPTION");
            env::remove_var("REQUEST_TIMEOUT_SECS");
            env::remove_var("CAPTURE_SETTLE_MS");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.dialogue_api_url, "http://localhost:8000/api");
        assert_eq!(config.voice_api_key, None);
        assert_eq!(config.voice_api_url, "https://api.elevenlabs.io/v1");
        assert_eq!(config.audio_player, "mpg123 -q");
        assert_eq!(config.local_tts_command, None);
        assert_eq!(config.persona, PersonaId::HrFriendly);
        assert_eq!(config.interview_type, InterviewType::General);
        assert_eq!(config.interview_length, InterviewLength::Standard);
        assert_eq!(config.job_description, None);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.capture_settle, Duration::from_millis(300));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("DIALOGUE_API_URL", "https://interviews.example.com/api");
            env::set_var("VOICE_API_KEY", "voice-key");
            env::set_var("LOCAL_TTS_COMMAND", "espeak");
            env::set_var("PERSONA", "tech-expert");
            env::set_var("INTERVIEW_TYPE", "technical");
            env::set_var("INTERVIEW_LENGTH", "quick");
            env::set_var("JOB_DESCRIPTION", "Backend engineer, Rust");
            env::set_var("REQUEST_TIMEOUT_SECS", "5");
            env::set_var("CAPTURE_SETTLE_MS", "0");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.dialogue_api_url, "https://interviews.example.com/api");
        assert_eq!(config.voice_api_key, Some("voice-key".to_string()));
        assert_eq!(config.local_tts_command, Some("espeak".to_string()));
        assert_eq!(config.persona, PersonaId::TechExpert);
        assert_eq!(config.interview_type, InterviewType::Technical);
        assert_eq!(config.interview_length, InterviewLength::Quick);
        assert_eq!(
            config.require_job_description().unwrap(),
            "Backend engineer, Rust"
        );
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.capture_settle, Duration::ZERO);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_blank_key_is_absent() {
        clear_env_vars();
        unsafe {
            env::set_var("VOICE_API_KEY", "   ");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.voice_api_key, None);
    }

    #[test]
    #[serial]
    fn test_config_invalid_persona() {
        clear_env_vars();
        unsafe {
            env::set_var("PERSONA", "pirate-captain");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "PERSONA"),
            _ => panic!("Expected InvalidValue for PERSONA"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_timeout() {
        clear_env_vars();
        unsafe {
            env::set_var("REQUEST_TIMEOUT_SECS", "0");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "REQUEST_TIMEOUT_SECS"),
            _ => panic!("Expected InvalidValue for REQUEST_TIMEOUT_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_missing_job_description() {
        clear_env_vars();

        let config = Config::from_env().unwrap();
        match config.require_job_description().unwrap_err() {
            ConfigError::MissingVar(msg) => assert!(msg.contains("JOB_DESCRIPTION")),
            _ => panic!("Expected MissingVar for JOB_DESCRIPTION"),
        }
    }
}
