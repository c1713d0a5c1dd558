//! UDP transport to the lighting controller
//!
//! [`wire`] defines the datagram layouts; [`sender`] owns the socket and the
//! task that drains the event queue.

pub mod sender;
pub mod wire;

pub use sender::{spawn_sender, UdpSender};
pub use wire::{decode, encode, Datagram, MSG_ONSET, MSG_PITCH, MSG_SPECTRUM};
