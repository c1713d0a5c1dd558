// Analysis primitive error types

use crate::error::ErrorCode;
use std::fmt;

/// Analysis error code constants
///
/// Error code range: 3001-3003
pub struct AnalysisErrorCodes;

impl AnalysisErrorCodes {
    /// Primitive produced NaN or infinity
    pub const NON_FINITE: i32 = 3001;

    /// Input window has the wrong length
    pub const WINDOW_LENGTH: i32 = 3002;

    /// Spectrum or output buffer has the wrong length
    pub const BUFFER_LENGTH: i32 = 3003;
}

/// Failures of an analysis primitive on a single window
///
/// These never leave the audio callback: the orchestrator turns them into
/// "no event this window" and bumps a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisError {
    /// Output contained NaN or infinity
    NonFinite { primitive: &'static str },

    /// Window length differs from the configured size
    WindowLength { expected: usize, actual: usize },

    /// A spectrum or output buffer has the wrong length
    BufferLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::NonFinite { .. } => AnalysisErrorCodes::NON_FINITE,
            AnalysisError::WindowLength { .. } => AnalysisErrorCodes::WINDOW_LENGTH,
            AnalysisError::BufferLength { .. } => AnalysisErrorCodes::BUFFER_LENGTH,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::NonFinite { primitive } => {
                format!("{} produced a non-finite value", primitive)
            }
            AnalysisError::WindowLength { expected, actual } => {
                format!("window has {} samples, expected {}", actual, expected)
            }
            AnalysisError::BufferLength {
                what,
                expected,
                actual,
            } => format!("{} has {} values, expected {}", what, actual, expected),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnalysisError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for AnalysisError {}
