//! Per-room game state and the helpers stage handlers share.
//!
//! A `Session` is owned by exactly one runtime task. No method blocks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::Instant;
use undercover_core::error::UndercoverError;
use undercover_core::protocol::messages::GameStateNotification;
use undercover_core::protocol::{PlayerView, ResponseEnvelope, ResponseTag, Role, Stage};

use crate::config::GameRules;
use crate::game::player::{Delivery, Player, Sink, SinkId};
use crate::obs::GameMetrics;

/// The single pending stage deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub at: Instant,
    /// Stage that armed the deadline.
    pub stage: Stage,
}

pub struct Session {
    pub room_id: String,
    pub room_name: String,
    pub stage: Stage,
    /// Join order; players are never removed.
    pub players: Vec<Player>,
    pub word_list: Vec<String>,
    pub answer_word: String,
    pub spy_word: String,
    pub round: u32,
    pub speaking_order: Vec<String>,
    pub current_speaker: usize,
    /// voter id -> target id
    pub votes: HashMap<String, String>,
    pub deadline: Option<Deadline>,
    pub rules: GameRules,
    pub rng: StdRng,
    pub metrics: Arc<GameMetrics>,
}

impl Session {
    pub fn new(
        room_id: impl Into<String>,
        room_name: impl Into<String>,
        rules: GameRules,
        metrics: Arc<GameMetrics>,
    ) -> Self {
        Self::with_rng(room_id, room_name, rules, metrics, StdRng::from_os_rng())
    }

    /// Deterministic randomness for tests.
    pub fn with_rng(
        room_id: impl Into<String>,
        room_name: impl Into<String>,
        rules: GameRules,
        metrics: Arc<GameMetrics>,
        rng: StdRng,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            room_name: room_name.into(),
            stage: Stage::Waiting,
            players: Vec::new(),
            word_list: Vec::new(),
            answer_word: String::new(),
            spy_word: String::new(),
            round: 1,
            speaking_order: Vec::new(),
            current_speaker: 0,
            votes: HashMap::new(),
            deadline: None,
            rules,
            rng,
            metrics,
        }
    }

    // ---- queries

    pub fn admin(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.role == Role::Admin)
    }

    pub fn admin_id(&self) -> String {
        self.admin().map(|p| p.id.clone()).unwrap_or_default()
    }

    pub fn is_admin(&self, player_id: &str) -> bool {
        self.admin().is_some_and(|p| p.id == player_id)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive())
    }

    pub fn count_alive(&self) -> usize {
        self.alive_players().count()
    }

    pub fn is_spy_alive(&self) -> bool {
        self.players.iter().any(|p| p.role == Role::Spy)
    }

    pub fn is_blank_alive(&self) -> bool {
        self.players.iter().any(|p| p.role == Role::Blank)
    }

    /// Sanitized roster in join order.
    pub fn public_roster(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::public_view).collect()
    }

    /// Roster with every role and word.
    pub fn master_roster(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::private_view).collect()
    }

    pub fn current_speaker_id(&self) -> Option<&str> {
        self.speaking_order
            .get(self.current_speaker)
            .map(String::as_str)
    }

    // ---- outbound

    /// Best-effort send to every connected player.
    pub fn broadcast(&self, env: &ResponseEnvelope) {
        for p in &self.players {
            if let Some(sink) = &p.sink {
                self.deliver(p, sink, env.clone(), "broadcast");
            }
        }
    }

    /// Best-effort send to one player; silently skipped while disconnected.
    pub fn unicast(&self, player_id: &str, env: ResponseEnvelope) {
        let Some(p) = self.player(player_id) else {
            tracing::debug!(room_id = %self.room_id, player_id, "unicast to unknown player");
            return;
        };
        if let Some(sink) = &p.sink {
            self.deliver(p, sink, env, "unicast");
        }
    }

    /// Answer a failed request on the requester's current sink.
    pub fn reply_error(&self, player_id: &str, err: &UndercoverError) {
        self.unicast(player_id, ResponseEnvelope::error(err.to_string()));
    }

    /// Answer a connection that is not seated, then let its sink go.
    pub fn refuse(&self, sink: Sink, msg: &str) {
        let outcome = sink.deliver(ResponseEnvelope::error(msg));
        self.note_delivery(outcome, None, sink.id(), "refusal");
    }

    fn deliver(&self, p: &Player, sink: &Sink, env: ResponseEnvelope, kind: &'static str) {
        let outcome = sink.deliver(env);
        self.note_delivery(outcome, Some(&p.id), sink.id(), kind);
    }

    fn note_delivery(&self, outcome: Delivery, player_id: Option<&str>, sink_id: SinkId, kind: &'static str) {
        let player_id = player_id.unwrap_or("-");
        match outcome {
            Delivery::Sent => {}
            Delivery::Full => {
                self.metrics.dropped_messages.inc(&[("kind", kind)]);
                tracing::warn!(
                    room_id = %self.room_id,
                    player_id,
                    sink_id,
                    kind,
                    "outbound queue full, message dropped"
                );
            }
            Delivery::Closed => {
                tracing::debug!(room_id = %self.room_id, player_id, sink_id, kind, "outbound receiver gone");
            }
        }
    }

    /// Broadcast the stage, round and current speaker.
    pub fn broadcast_state(&self) {
        let speaker = self.current_speaker_id().and_then(|id| self.player(id));
        let note = GameStateNotification {
            stage: self.stage,
            current_turn_id: speaker.map(|p| p.id.clone()),
            current_turn_name: speaker.map(|p| p.name.clone()),
            round: self.round,
        };
        self.broadcast(&ResponseEnvelope::wrap(ResponseTag::GameState, &note));
    }

    // ---- deadline

    /// Arm the stage deadline, replacing any pending one.
    pub fn set_timeout(&mut self, after: Duration) {
        self.deadline = Some(Deadline {
            at: Instant::now() + after,
            stage: self.stage,
        });
    }

    pub fn clear_timeout(&mut self) {
        self.deadline = None;
    }
}
