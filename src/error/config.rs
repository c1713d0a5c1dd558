// Configuration error types

use crate::error::ErrorCode;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 2001-2004
pub struct ConfigErrorCodes;

impl ConfigErrorCodes {
    /// Config or bucket map file could not be read
    pub const IO: i32 = 2001;

    /// File contents are not valid JSON for the expected shape
    pub const PARSE: i32 = 2002;

    /// A value is out of its allowed range
    pub const INVALID_VALUE: i32 = 2003;

    /// Bucket map violates its structural invariants
    pub const BUCKET_MAP: i32 = 2004;
}

/// Errors raised while loading or validating configuration
///
/// All of these are fatal at startup: the process reports them once and
/// exits before any audio is opened.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// File could not be read
    Io { path: String, reason: String },

    /// File could not be parsed
    Parse { path: String, reason: String },

    /// Field value out of range
    InvalidValue { field: &'static str, reason: String },

    /// Bucket map failed validation
    BucketMap { reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn bucket_map(reason: impl Into<String>) -> Self {
        ConfigError::BucketMap {
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::Io { .. } => ConfigErrorCodes::IO,
            ConfigError::Parse { .. } => ConfigErrorCodes::PARSE,
            ConfigError::InvalidValue { .. } => ConfigErrorCodes::INVALID_VALUE,
            ConfigError::BucketMap { .. } => ConfigErrorCodes::BUCKET_MAP,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::Io { path, reason } => format!("Failed to read {}: {}", path, reason),
            ConfigError::Parse { path, reason } => {
                format!("Failed to parse {}: {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                format!("Invalid value for {}: {}", field, reason)
            }
            ConfigError::BucketMap { reason } => format!("Invalid bucket map: {}", reason),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_codes() {
        assert_eq!(
            ConfigError::invalid("analysis.hop_size", "must be > 0").code(),
            ConfigErrorCodes::INVALID_VALUE
        );
        assert_eq!(
            ConfigError::bucket_map("empty").code(),
            ConfigErrorCodes::BUCKET_MAP
        );
    }

    #[test]
    fn test_invalid_value_message_names_field() {
        let err = ConfigError::invalid("network.port", "must be non-zero");
        assert_eq!(
            err.message(),
            "Invalid value for network.port: must be non-zero"
        );
        assert!(err.to_string().contains("2003"));
    }
}
