//! Room lookup, creation and the join handshake.

pub mod registry;

pub use registry::{Joined, RoomRegistry};
