//! Payload types carried inside envelopes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{PlayerView, Role, Stage, Winner};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub room_name: String,
    pub creator_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
    /// Seated as admin; join with this id to take the seat.
    pub creator: PlayerView,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinGameRequest {
    pub room_id: String,
    pub joiner_name: String,
    /// Client-supplied id, used to reconnect to an existing seat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    /// Ask to watch instead of play.
    #[serde(default)]
    pub observer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinGameResponse {
    pub room_id: String,
    pub room_name: String,
    pub stage: Stage,
    pub joiner: PlayerView,
    pub players: Vec<PlayerView>,
    pub master_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetWordsRequest {
    /// Index 0 is the answer word, index 1 the impostor word.
    pub word_list: Vec<String>,
}

/// Acknowledges a word list without revealing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetWordsResponse {
    pub word_list: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartGameRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartGameResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_word: Option<String>,
    /// Full roster, only sent to the admin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<PlayerView>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub speaker_id: String,
    pub speaker_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub target_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub voter_id: String,
    pub voter_name: String,
    pub target_id: String,
    pub target_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateNotification {
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn_name: Option<String>,
    pub round: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EliminateNotification {
    pub eliminated_id: String,
    pub eliminated_name: String,
    pub eliminated_word: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResultResponse {
    pub winner: Winner,
    pub answer_word: String,
    pub spy_word: String,
    /// Player name -> role held before any elimination.
    pub player_roles: BTreeMap<String, Role>,
    /// Player name -> assigned word (empty for blank).
    pub player_words: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitGameRequest {
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitGameResponse {
    pub left_player_id: String,
    pub left_player_name: String,
}

/// Deadline payload; `stage` guards against a timer outliving its stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutRequest {
    pub stage: Stage,
}
