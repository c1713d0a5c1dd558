// Wire format for event datagrams
//
// One event per datagram, all multi-byte values little-endian:
//
//   Onset     [0x77]
//   Spectrum  [0x66][len: u16][f32 × len]
//   Pitch     [0x88][f32 frequency][f32 confidence]

use serde::Serialize;

use crate::analysis::PitchEstimate;
use crate::emitter::QueuedEvent;
use crate::error::TransportError;

pub const MSG_SPECTRUM: u8 = 0x66;
pub const MSG_ONSET: u8 = 0x77;
pub const MSG_PITCH: u8 = 0x88;

/// Largest payload of a single IPv4 UDP datagram
pub const MAX_UDP_PAYLOAD: usize = 65_507;

const SPECTRUM_HEADER_LEN: usize = 3;

/// Most buckets a spectrum datagram can carry
pub const MAX_SPECTRUM_BUCKETS: usize = (MAX_UDP_PAYLOAD - SPECTRUM_HEADER_LEN) / 4;

/// Largest datagram: a spectrum of [`MAX_SPECTRUM_BUCKETS`] buckets
pub const MAX_DATAGRAM_LEN: usize = SPECTRUM_HEADER_LEN + MAX_SPECTRUM_BUCKETS * 4;

/// Encode `event` into `buf`, replacing its contents.
///
/// `buf` is reused across calls so steady-state encoding does not allocate.
pub fn encode(event: &QueuedEvent, buf: &mut Vec<u8>) -> Result<(), TransportError> {
    buf.clear();
    match event {
        QueuedEvent::Onset => buf.push(MSG_ONSET),
        QueuedEvent::Spectrum(values) => {
            if values.len() > MAX_SPECTRUM_BUCKETS {
                return Err(TransportError::PayloadTooLarge { len: values.len() });
            }
            let len = values.len() as u16;
            buf.reserve(SPECTRUM_HEADER_LEN + values.len() * 4);
            buf.push(MSG_SPECTRUM);
            buf.extend_from_slice(&len.to_le_bytes());
            for value in values {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
        QueuedEvent::Pitch(estimate) => {
            buf.push(MSG_PITCH);
            buf.extend_from_slice(&estimate.frequency.to_le_bytes());
            buf.extend_from_slice(&estimate.confidence.to_le_bytes());
        }
    }
    Ok(())
}

/// A decoded datagram, as printed by the `listen` command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Datagram {
    Onset,
    Spectrum { values: Vec<f32> },
    Pitch { frequency: f32, confidence: f32 },
}

impl From<Datagram> for QueuedEvent {
    fn from(datagram: Datagram) -> Self {
        match datagram {
            Datagram::Onset => QueuedEvent::Onset,
            Datagram::Spectrum { values } => QueuedEvent::Spectrum(values),
            Datagram::Pitch {
                frequency,
                confidence,
            } => QueuedEvent::Pitch(PitchEstimate {
                frequency,
                confidence,
            }),
        }
    }
}

fn malformed(reason: impl Into<String>) -> TransportError {
    TransportError::MalformedDatagram {
        reason: reason.into(),
    }
}

fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decode one datagram; the length must match its header exactly
pub fn decode(bytes: &[u8]) -> Result<Datagram, TransportError> {
    let (&tag, body) = bytes
        .split_first()
        .ok_or_else(|| malformed("empty datagram"))?;

    match tag {
        MSG_ONSET => {
            if !body.is_empty() {
                return Err(malformed(format!(
                    "onset carries {} unexpected bytes",
                    body.len()
                )));
            }
            Ok(Datagram::Onset)
        }
        MSG_SPECTRUM => {
            if body.len() < 2 {
                return Err(malformed("spectrum header truncated"));
            }
            let len = u16::from_le_bytes([body[0], body[1]]) as usize;
            let payload = &body[2..];
            if payload.len() != len * 4 {
                return Err(malformed(format!(
                    "spectrum declares {} values but carries {} bytes",
                    len,
                    payload.len()
                )));
            }
            Ok(Datagram::Spectrum {
                values: payload.chunks_exact(4).map(read_f32).collect(),
            })
        }
        MSG_PITCH => {
            if body.len() != 8 {
                return Err(malformed(format!(
                    "pitch carries {} bytes, expected 8",
                    body.len()
                )));
            }
            Ok(Datagram::Pitch {
                frequency: read_f32(&body[..4]),
                confidence: read_f32(&body[4..]),
            })
        }
        other => Err(malformed(format!("unknown message type 0x{:02x}", other))),
    }
}
