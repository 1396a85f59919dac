//! Undercover game server library entry.
//!
//! This crate wires the transport, room registry and per-room game runtimes
//! into one server. It is consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod game;
pub mod obs;
pub mod ops;
pub mod rooms;
pub mod router;
pub mod transport;
