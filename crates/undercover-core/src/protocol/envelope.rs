//! Tagged request/response envelopes (JSON).
//!
//! Requests keep `data` as `RawValue` so a payload is only parsed once a handler
//! asks for the tag it carries. The tag is the sole dispatch key: a payload that
//! fails to decode for a matching tag is logged and treated as "not this type".

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::{Result, UndercoverError};

/// Known request tags (`request_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTag {
    JoinGame,
    SetWords,
    StartGame,
    Describe,
    Vote,
    ExitGame,
    /// Deadline firing; only ever produced by the room itself.
    Timeout,
}

impl RequestTag {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestTag::JoinGame => "JoinGame",
            RequestTag::SetWords => "SetWords",
            RequestTag::StartGame => "StartGame",
            RequestTag::Describe => "Describe",
            RequestTag::Vote => "Vote",
            RequestTag::ExitGame => "ExitGame",
            RequestTag::Timeout => "Timeout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "JoinGame" => Some(RequestTag::JoinGame),
            "SetWords" => Some(RequestTag::SetWords),
            "StartGame" => Some(RequestTag::StartGame),
            "Describe" => Some(RequestTag::Describe),
            "Vote" => Some(RequestTag::Vote),
            "ExitGame" => Some(RequestTag::ExitGame),
            "Timeout" => Some(RequestTag::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known response tags (`response_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseTag {
    JoinGame,
    SetWords,
    StartGame,
    GameState,
    Describe,
    Vote,
    Eliminate,
    GameResult,
    ExitGame,
    Error,
}

impl ResponseTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseTag::JoinGame => "JoinGame",
            ResponseTag::SetWords => "SetWords",
            ResponseTag::StartGame => "StartGame",
            ResponseTag::GameState => "GameState",
            ResponseTag::Describe => "Describe",
            ResponseTag::Vote => "Vote",
            ResponseTag::Eliminate => "Eliminate",
            ResponseTag::GameResult => "GameResult",
            ResponseTag::ExitGame => "ExitGame",
            ResponseTag::Error => "Error",
        }
    }
}

impl fmt::Display for ResponseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Message type (field name is `request_type` in JSON).
    #[serde(rename = "request_type")]
    pub req_type: String,
    /// Optional payload, stored as raw JSON (lazy parsing).
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl RequestEnvelope {
    /// Build an envelope around an encoded payload.
    pub fn new<T: Serialize>(tag: RequestTag, data: &T) -> Result<Self> {
        let raw = serde_json::value::to_raw_value(data)
            .map_err(|e| UndercoverError::Internal(format!("json encode failed: {e}")))?;
        Ok(Self {
            req_type: tag.as_str().to_owned(),
            data: Some(raw),
        })
    }

    /// Envelope with no payload.
    pub fn bare(tag: RequestTag) -> Self {
        Self {
            req_type: tag.as_str().to_owned(),
            data: None,
        }
    }

    /// Parse an envelope from a text frame.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| UndercoverError::BadRequest(format!("invalid envelope json: {e}")))
    }

    /// `None` for tags this server does not know.
    pub fn tag(&self) -> Option<RequestTag> {
        RequestTag::parse(&self.req_type)
    }

    pub fn is(&self, tag: RequestTag) -> bool {
        self.req_type == tag.as_str()
    }

    /// Decode the payload if, and only if, the envelope carries `wanted`.
    ///
    /// A missing payload decodes as `{}` so empty request bodies work.
    pub fn decode<T: DeserializeOwned>(&self, wanted: RequestTag) -> Option<T> {
        if !self.is(wanted) {
            return None;
        }
        let raw = self.data.as_deref().map(RawValue::get).unwrap_or("{}");
        match serde_json::from_str(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(tag = %wanted, error = %e, "undecodable payload for matching tag");
                None
            }
        }
    }
}

/// Outbound envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Message type (field name is `response_type` in JSON).
    #[serde(rename = "response_type")]
    pub resp_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(
        default,
        rename = "error_message",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Wrap a typed payload. Encoding failures degrade to a `null` payload.
    pub fn wrap<T: Serialize>(tag: ResponseTag, data: &T) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(tag = %tag, error = %e, "response payload encode failed");
                Value::Null
            }
        };
        Self {
            resp_type: tag.as_str().to_owned(),
            data,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            resp_type: ResponseTag::Error.as_str().to_owned(),
            data: Value::Null,
            error: Some(msg.into()),
        }
    }

    pub fn is(&self, tag: ResponseTag) -> bool {
        self.resp_type == tag.as_str()
    }

    /// Typed view of the payload when the tag matches.
    pub fn decode<T: DeserializeOwned>(&self, wanted: ResponseTag) -> Option<T> {
        if !self.is(wanted) {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| UndercoverError::Internal(format!("json encode failed: {e}")))
    }
}
