//! Game sessions: per-room state, the stage machine and the room event loop.

pub mod membership;
pub mod player;
pub mod runtime;
pub mod session;
pub mod stages;

pub use membership::JoinKind;
pub use player::{Player, Sink, SinkId};
pub use runtime::{Inbound, Mailbox, Origin, SessionRuntime};
pub use session::Session;
