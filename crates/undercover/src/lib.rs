//! Top-level facade crate for the undercover game server.
//!
//! Re-exports the protocol core and the gateway library so users can depend on a single crate.

pub mod core {
    pub use undercover_core::*;
}

pub mod gateway {
    pub use undercover_gateway::*;
}
