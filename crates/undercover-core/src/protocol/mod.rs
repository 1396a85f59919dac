//! Protocol modules: envelopes, payloads, and the shared game vocabulary.
//!
//! Every message in either direction is a tagged envelope around a JSON payload.
//! Parsing is panic-free: malformed input surfaces as `UndercoverError` or, for
//! payloads behind a recognised tag, as an absent value, so a hostile client can
//! never take a room down.

pub mod envelope;
pub mod messages;
pub mod types;

pub use envelope::{RequestEnvelope, RequestTag, ResponseEnvelope, ResponseTag};
pub use types::{PlayerView, Role, Stage, Winner};
