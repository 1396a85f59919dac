//! Tally, eliminate, check for a winner.

use std::collections::HashMap;

use rand::Rng;
use undercover_core::protocol::messages::EliminateNotification;
use undercover_core::protocol::{ResponseEnvelope, ResponseTag, Role, Stage};

use super::Flow;
use crate::game::session::Session;

/// Alive count at or below which a surviving spy or blank wins.
const IMPOSTOR_WIN_ALIVE: usize = 4;

pub(super) fn enter(s: &mut Session) -> Flow {
    let Some(eliminated) = pick_eliminated(s) else {
        tracing::warn!(room_id = %s.room_id, "no candidates to eliminate");
        return Flow::Next(Stage::Finished);
    };
    eliminate(s, &eliminated);

    let alive = s.count_alive();
    let spy_alive = s.is_spy_alive();
    let blank_alive = s.is_blank_alive();
    tracing::info!(room_id = %s.room_id, alive, spy_alive, blank_alive, round = s.round, "judged");

    if !spy_alive && !blank_alive {
        return Flow::Next(Stage::Finished);
    }
    if alive <= IMPOSTOR_WIN_ALIVE {
        return Flow::Next(Stage::Finished);
    }

    s.round += 1;
    if s.round > s.rules.max_rounds {
        return Flow::Next(Stage::Finished);
    }

    s.set_timeout(s.rules.judging());
    Flow::Stay
}

/// Plurality over every alive player, zero-vote players included; ties are
/// broken uniformly at random.
fn pick_eliminated(s: &mut Session) -> Option<String> {
    let mut tally: HashMap<&str, usize> = HashMap::new();
    for (voter, target) in &s.votes {
        if s.player(voter).is_some_and(|p| p.is_alive()) {
            *tally.entry(target.as_str()).or_default() += 1;
        }
    }

    let mut best = 0;
    let mut candidates: Vec<String> = Vec::new();
    for p in s.alive_players() {
        let n = tally.get(p.id.as_str()).copied().unwrap_or(0);
        if candidates.is_empty() || n > best {
            best = n;
            candidates.clear();
            candidates.push(p.id.clone());
        } else if n == best {
            candidates.push(p.id.clone());
        }
    }

    if candidates.is_empty() {
        return None;
    }
    let idx = s.rng.random_range(0..candidates.len());
    Some(candidates.swap_remove(idx))
}

fn eliminate(s: &mut Session, id: &str) {
    let Some(p) = s.player_mut(id) else {
        return;
    };
    p.original = Some(p.role);
    p.role = Role::Observer;
    let note = EliminateNotification {
        eliminated_id: p.id.clone(),
        eliminated_name: p.name.clone(),
        eliminated_word: p.word.clone(),
    };
    tracing::info!(room_id = %s.room_id, player_id = %note.eliminated_id, "player eliminated");
    s.broadcast(&ResponseEnvelope::wrap(ResponseTag::Eliminate, &note));
}
