//! WebSocket frame <-> envelope codec.
//!
//! - Text frames => `RequestEnvelope` (payload kept raw until a stage asks)
//! - Binary frames are not part of the protocol and are rejected
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use undercover_core::error::{Result, UndercoverError};
use undercover_core::protocol::{RequestEnvelope, ResponseEnvelope};

#[derive(Debug)]
pub enum Frame {
    Request(RequestEnvelope),
    Ping(Vec<u8>),
    Pong,
    Close,
}

pub fn decode(msg: Message) -> Result<Frame> {
    match msg {
        Message::Text(s) => RequestEnvelope::from_json(&s).map(Frame::Request),
        Message::Binary(b) => Err(UndercoverError::BadRequest(format!(
            "binary frames are not supported ({} bytes)",
            b.len()
        ))),
        Message::Ping(v) => Ok(Frame::Ping(v)),
        Message::Pong(_) => Ok(Frame::Pong),
        Message::Close(_) => Ok(Frame::Close),
    }
}

pub fn encode(env: &ResponseEnvelope) -> Result<Message> {
    env.to_json().map(Message::Text)
}
