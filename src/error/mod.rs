// Error types for the audio analysis relay
//
// Each subsystem has its own error enum with a stable numeric code so the
// binary can report failures uniformly and log lines can be grepped by code.

mod analysis;
mod audio;
mod config;
mod transport;

pub use analysis::{AnalysisError, AnalysisErrorCodes};
pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use config::{ConfigError, ConfigErrorCodes};
pub use transport::{log_transport_error, TransportError, TransportErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Failure while bringing the engine up
///
/// Wraps whichever subsystem refused to start so the binary can report one
/// error with the subsystem's own code.
#[derive(Debug, Clone, PartialEq)]
pub enum StartupError {
    Config(ConfigError),
    Audio(AudioError),
    Transport(TransportError),
}

impl ErrorCode for StartupError {
    fn code(&self) -> i32 {
        match self {
            StartupError::Config(err) => err.code(),
            StartupError::Audio(err) => err.code(),
            StartupError::Transport(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            StartupError::Config(err) => err.message(),
            StartupError::Audio(err) => err.message(),
            StartupError::Transport(err) => err.message(),
        }
    }
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupError::Config(err) => err.fmt(f),
            StartupError::Audio(err) => err.fmt(f),
            StartupError::Transport(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Config(err) => Some(err),
            StartupError::Audio(err) => Some(err),
            StartupError::Transport(err) => Some(err),
        }
    }
}

impl From<ConfigError> for StartupError {
    fn from(err: ConfigError) -> Self {
        StartupError::Config(err)
    }
}

impl From<AudioError> for StartupError {
    fn from(err: AudioError) -> Self {
        StartupError::Audio(err)
    }
}

impl From<TransportError> for StartupError {
    fn from(err: TransportError) -> Self {
        StartupError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_keeps_subsystem_code() {
        let err: StartupError = TransportError::BindFailed {
            reason: "in use".to_string(),
        }
        .into();
        assert_eq!(err.code(), TransportErrorCodes::BIND_FAILED);
        assert!(err.to_string().contains("TransportError"));

        let err: StartupError = AudioError::NotRunning.into();
        assert_eq!(err.code(), AudioErrorCodes::NOT_RUNNING);
    }
}
