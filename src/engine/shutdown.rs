// Shutdown signal shared by the audio callback, the sender task and the
// binary's signal handler

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// Why the engine is stopping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Input device went away mid-stream
    DeviceLost(String),
    /// Replay or synthetic input ran out
    EndOfInput,
    /// Ctrl-C / SIGINT
    Interrupted,
    /// `Engine::stop` called by the owner
    Requested,
}

impl ShutdownReason {
    /// Whether the sender should flush events that are already queued
    pub fn drains_queue(&self) -> bool {
        matches!(self, ShutdownReason::EndOfInput)
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::DeviceLost(reason) => write!(f, "input device lost: {}", reason),
            ShutdownReason::EndOfInput => write!(f, "end of input"),
            ShutdownReason::Interrupted => write!(f, "interrupted"),
            ShutdownReason::Requested => write!(f, "stop requested"),
        }
    }
}

#[derive(Default)]
struct ShutdownState {
    triggered: AtomicBool,
    reason: Mutex<Option<ShutdownReason>>,
    notify: Notify,
}

/// One-shot, cloneable shutdown flag.
///
/// `is_triggered` is a single atomic load and safe on the audio thread.
/// `trigger` takes a short lock to record the reason and must not be called
/// from the per-block path.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<ShutdownState>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger shutdown. Returns false if it was already triggered; the
    /// first reason wins.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        if let Ok(mut slot) = self.inner.reason.lock() {
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        let first = !self.inner.triggered.swap(true, Ordering::AcqRel);
        self.inner.notify.notify_waiters();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.inner.reason.lock().ok().and_then(|slot| slot.clone())
    }

    /// Resolve once shutdown has been triggered
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .field("reason", &self.reason())
            .finish()
    }
}
