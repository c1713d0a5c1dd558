// Firemix Audio - real-time audio analysis relay
// Captures mono input, analyzes fixed windows (spectrum, onset, pitch) on the
// audio thread and streams the results as UDP datagrams.

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod spectrum;
pub mod telemetry;
pub mod transport;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::{AudioBackend, Engine, ShutdownReason, ShutdownSignal};
pub use error::{ErrorCode, StartupError};
