// Transport error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Transport error code constants
///
/// Error code range: 4001-4005
pub struct TransportErrorCodes;

impl TransportErrorCodes {
    /// Local socket could not be bound
    pub const BIND_FAILED: i32 = 4001;

    /// Destination host did not resolve
    pub const RESOLVE_FAILED: i32 = 4002;

    /// Datagram send failed
    pub const SEND_FAILED: i32 = 4003;

    /// Spectrum too long for the 16-bit length field
    pub const PAYLOAD_TOO_LARGE: i32 = 4004;

    /// Received datagram does not match any known layout
    pub const MALFORMED_DATAGRAM: i32 = 4005;
}

/// Log a transport error with structured context
pub fn log_transport_error(err: &TransportError, context: &str) {
    error!(
        "Transport error in {}: code={}, component=UdpSender, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// UDP transport and wire format errors
///
/// Bind and resolve failures are fatal at startup. Send failures are counted
/// and the datagram is dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Local socket could not be bound
    BindFailed { reason: String },

    /// Destination could not be resolved
    ResolveFailed { destination: String, reason: String },

    /// Datagram send failed
    SendFailed { reason: String },

    /// Spectrum length exceeds the 16-bit length field
    PayloadTooLarge { len: usize },

    /// Datagram could not be decoded
    MalformedDatagram { reason: String },
}

impl ErrorCode for TransportError {
    fn code(&self) -> i32 {
        match self {
            TransportError::BindFailed { .. } => TransportErrorCodes::BIND_FAILED,
            TransportError::ResolveFailed { .. } => TransportErrorCodes::RESOLVE_FAILED,
            TransportError::SendFailed { .. } => TransportErrorCodes::SEND_FAILED,
            TransportError::PayloadTooLarge { .. } => TransportErrorCodes::PAYLOAD_TOO_LARGE,
            TransportError::MalformedDatagram { .. } => TransportErrorCodes::MALFORMED_DATAGRAM,
        }
    }

    fn message(&self) -> String {
        match self {
            TransportError::BindFailed { reason } => {
                format!("Failed to bind UDP socket: {}", reason)
            }
            TransportError::ResolveFailed {
                destination,
                reason,
            } => format!("Failed to resolve {}: {}", destination, reason),
            TransportError::SendFailed { reason } => format!("Send failed: {}", reason),
            TransportError::PayloadTooLarge { len } => {
                format!("Spectrum of {} buckets does not fit a 16-bit length", len)
            }
            TransportError::MalformedDatagram { reason } => {
                format!("Malformed datagram: {}", reason)
            }
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransportError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for TransportError {}
