//! Final reveal of the winner, both words and every player's identity.

use std::collections::BTreeMap;

use undercover_core::protocol::messages::GameResultResponse;
use undercover_core::protocol::{ResponseEnvelope, ResponseTag, Role, Winner};

use super::Flow;
use crate::game::session::Session;

pub(super) fn enter(s: &mut Session) -> Flow {
    let winner = if s.is_spy_alive() || s.is_blank_alive() {
        Winner::ImpostorSide
    } else {
        Winner::Civilians
    };

    let mut player_roles = BTreeMap::new();
    let mut player_words = BTreeMap::new();
    for p in s.players.iter().filter(|p| p.role != Role::Admin) {
        player_roles.insert(p.name.clone(), p.final_role());
        player_words.insert(p.name.clone(), p.final_word().to_owned());
    }

    tracing::info!(room_id = %s.room_id, ?winner, round = s.round, "game finished");
    s.broadcast(&ResponseEnvelope::wrap(
        ResponseTag::GameResult,
        &GameResultResponse {
            winner,
            answer_word: s.answer_word.clone(),
            spy_word: s.spy_word.clone(),
            player_roles,
            player_words,
        },
    ));
    Flow::Stay
}
