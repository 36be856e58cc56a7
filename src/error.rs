//! Error types for microphone acquisition and configuration
use thiserror::Error;

/// Shown when the platform gives us nothing more specific to say.
pub const GENERIC_MICROPHONE_MESSAGE: &str = "Microphone access is needed to blow out the candles";

/// Failures surfaced while acquiring the microphone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MicrophoneError {
    /// The user (or a cached platform decision) refused access
    #[error("Microphone permission was denied — please allow access")]
    PermissionDenied,

    /// No input device matched the request
    #[error("No microphone found on this device")]
    DeviceNotFound,

    /// A device exists but cannot be opened in this environment
    #[error("Microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    /// Any other platform failure
    #[error("Microphone error: {0}")]
    Unknown(String),
}

impl MicrophoneError {
    /// Text for the error prompt. Unlike `Display`, carries no category prefix.
    pub fn user_message(&self) -> String {
        match self {
            MicrophoneError::PermissionDenied | MicrophoneError::DeviceNotFound => self.to_string(),
            MicrophoneError::MicrophoneUnavailable(reason) | MicrophoneError::Unknown(reason) => {
                if reason.trim().is_empty() {
                    GENERIC_MICROPHONE_MESSAGE.to_string()
                } else {
                    reason.clone()
                }
            }
        }
    }

    pub fn is_denial(&self) -> bool {
        matches!(self, MicrophoneError::PermissionDenied)
    }

    /// Backends report permission problems as free-form text, so sniff for them.
    fn from_backend(description: String) -> Self {
        let lowered = description.to_lowercase();
        if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("not allowed") {
            MicrophoneError::PermissionDenied
        } else {
            MicrophoneError::Unknown(description)
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for MicrophoneError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        match err {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => MicrophoneError::DeviceNotFound,
            cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                MicrophoneError::MicrophoneUnavailable("input streams are not supported".to_string())
            }
            cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                MicrophoneError::from_backend(err.description)
            }
        }
    }
}

impl From<cpal::BuildStreamError> for MicrophoneError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => MicrophoneError::DeviceNotFound,
            cpal::BuildStreamError::StreamConfigNotSupported => {
                MicrophoneError::MicrophoneUnavailable("stream configuration not supported".to_string())
            }
            cpal::BuildStreamError::BackendSpecific { err } => MicrophoneError::from_backend(err.description),
            other => MicrophoneError::Unknown(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for MicrophoneError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => MicrophoneError::DeviceNotFound,
            cpal::PlayStreamError::BackendSpecific { err } => MicrophoneError::from_backend(err.description),
        }
    }
}

impl From<cpal::DevicesError> for MicrophoneError {
    fn from(err: cpal::DevicesError) -> Self {
        MicrophoneError::MicrophoneUnavailable(err.to_string())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timing: {0}")]
    InvalidTiming(String),
}
