//! Transport layer (HTTP + WebSocket).
//!
//! Terminates connections, frames envelopes as JSON text and bridges each
//! socket to its room mailbox. No game state is touched here.

pub mod codec;
pub mod http;
pub mod ws;
