//! Turn-based descriptions.

use rand::seq::SliceRandom;
use undercover_core::error::{Result, UndercoverError};
use undercover_core::protocol::messages::{DescribeRequest, DescribeResponse};
use undercover_core::protocol::{RequestTag, ResponseEnvelope, ResponseTag, Role, Stage};

use super::{Action, Flow};
use crate::game::session::Session;

/// 0-based slot before which the blank never speaks.
const BLANK_EARLIEST_SLOT: usize = 3;

pub(super) fn enter(s: &mut Session) -> Flow {
    let mut order: Vec<String> = s.alive_players().map(|p| p.id.clone()).collect();
    order.shuffle(&mut s.rng);
    let blank = s
        .alive_players()
        .find(|p| p.role == Role::Blank)
        .map(|p| p.id.clone());
    if let Some(blank) = blank {
        delay_blank(&mut order, &blank);
    }

    s.speaking_order = order;
    s.current_speaker = 0;
    if s.speaking_order.is_empty() {
        tracing::warn!(room_id = %s.room_id, "nobody alive to speak");
        return Flow::Next(Stage::Voting);
    }

    s.broadcast_state();
    s.set_timeout(s.rules.first_speaker());
    Flow::Stay
}

pub(super) fn handle(s: &mut Session, action: Action<'_>) -> Result<Flow> {
    if action.tag != RequestTag::Describe {
        return Err(action.wrong_stage(Stage::Speaking));
    }
    let Some(req) = action.env.decode::<DescribeRequest>(RequestTag::Describe) else {
        return Ok(Flow::Stay);
    };
    if s.current_speaker_id() != Some(action.caller) {
        return Err(UndercoverError::NotYourTurn);
    }
    let speaker = s
        .player(action.caller)
        .ok_or_else(|| UndercoverError::Internal("speaker missing from roster".into()))?;

    let speech = DescribeResponse {
        speaker_id: speaker.id.clone(),
        speaker_name: speaker.name.clone(),
        message: req.message,
    };
    s.broadcast(&ResponseEnvelope::wrap(ResponseTag::Describe, &speech));

    Ok(next_turn(s))
}

/// Hand the floor to the next speaker still at the table, or close the
/// round of speeches.
pub(super) fn next_turn(s: &mut Session) -> Flow {
    s.current_speaker += 1;
    while s
        .current_speaker_id()
        .is_some_and(|id| !s.player(id).is_some_and(|p| p.is_alive()))
    {
        s.current_speaker += 1;
    }
    if s.current_speaker >= s.speaking_order.len() {
        return Flow::Next(Stage::Voting);
    }
    s.broadcast_state();
    s.set_timeout(s.rules.speaker());
    Flow::Stay
}

/// The speaker holding the floor left: pass it on instead of waiting out
/// their turn.
pub(super) fn on_leave(s: &mut Session, player_id: &str) -> Flow {
    if s.current_speaker_id() == Some(player_id) {
        return next_turn(s);
    }
    Flow::Stay
}

/// Move the blank back to `BLANK_EARLIEST_SLOT` (or the last slot in small
/// games). Never moves it forward.
fn delay_blank(order: &mut Vec<String>, blank: &str) {
    if order.len() < 2 {
        return;
    }
    let Some(idx) = order.iter().position(|id| id == blank) else {
        return;
    };
    let target = BLANK_EARLIEST_SLOT.min(order.len() - 1);
    if idx < target {
        let id = order.remove(idx);
        order.insert(target, id);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testkit::*;
    use super::super::advance;
    use super::*;
    use crate::game::session::testkit::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use undercover_core::protocol::messages::GameStateNotification;

    fn speaking_session(n: usize) -> Session {
        let mut s = session();
        let _ = seat(&mut s, "admin", Role::Admin);
        for i in 0..n {
            let role = match i {
                0 => Role::Blank,
                1 => Role::Spy,
                _ => Role::Normal,
            };
            let _ = seat(&mut s, &format!("p{i}"), role);
        }
        s.stage = Stage::Speaking;
        s
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn blank_moves_back_to_fourth_slot() {
        let mut order = ids(&["b", "x", "y", "z", "w"]);
        delay_blank(&mut order, "b");
        assert_eq!(order, ids(&["x", "y", "z", "b", "w"]));
    }

    #[test]
    fn blank_is_never_moved_forward() {
        let mut order = ids(&["x", "y", "z", "w", "b"]);
        delay_blank(&mut order, "b");
        assert_eq!(order[4], "b");
    }

    #[test]
    fn small_games_put_blank_last() {
        let mut order = ids(&["b", "x", "y"]);
        delay_blank(&mut order, "b");
        assert_eq!(order, ids(&["x", "y", "b"]));
    }

    #[test]
    fn blank_never_speaks_before_fourth_slot() {
        for seed in 0..32 {
            let mut s = speaking_session(8);
            s.rng = StdRng::seed_from_u64(seed);
            enter(&mut s);
            let pos = s.speaking_order.iter().position(|id| id == "p0").unwrap();
            assert!(pos >= 3, "seed {seed}: blank at {pos}");
            assert_eq!(s.speaking_order.len(), 8);
            assert!(!s.speaking_order.contains(&"admin".to_string()));
        }
    }

    #[test]
    fn out_of_turn_speech_is_rejected() {
        let mut s = speaking_session(8);
        enter(&mut s);
        let not_current = s.speaking_order[1].clone();
        let env = request(RequestTag::Describe, &DescribeRequest { message: "hm".into() });
        let err = act(&mut s, &not_current, &env).unwrap_err();
        assert!(matches!(err, UndercoverError::NotYourTurn));
        assert_eq!(s.current_speaker, 0);
    }

    #[test]
    fn every_speaker_then_voting() {
        let mut s = speaking_session(8);
        let mut admin_rx = {
            let (sink, rx) = crate::game::player::Sink::channel(64);
            s.players[0].sink = Some(sink);
            rx
        };
        enter(&mut s);
        let order = s.speaking_order.clone();
        for (turn, id) in order.iter().enumerate() {
            if turn % 2 == 0 {
                let env = request(RequestTag::Describe, &DescribeRequest { message: "word".into() });
                act(&mut s, id, &env).unwrap();
            } else {
                fire_timeout(&mut s);
            }
        }
        assert_eq!(s.stage, Stage::Voting);

        let msgs = drain(&mut admin_rx);
        let speeches = msgs.iter().filter(|m| m.is(ResponseTag::Describe)).count();
        assert_eq!(speeches, 4);
        let first: GameStateNotification = msgs[0].decode(ResponseTag::GameState).unwrap();
        assert_eq!(first.current_turn_id.as_deref(), Some(order[0].as_str()));
    }

    #[test]
    fn floor_passes_when_the_speaker_leaves() {
        let mut s = speaking_session(8);
        enter(&mut s);
        let first = s.speaking_order[0].clone();
        let second = s.speaking_order[1].clone();

        leave(&mut s, &first);
        assert_eq!(s.stage, Stage::Speaking);
        assert_eq!(s.current_speaker_id(), Some(second.as_str()));
        assert_eq!(s.deadline.map(|d| d.stage), Some(Stage::Speaking));
    }

    #[test]
    fn departed_speakers_are_skipped() {
        let mut s = speaking_session(8);
        enter(&mut s);
        let order = s.speaking_order.clone();

        leave(&mut s, &order[1]);
        assert_eq!(s.current_speaker_id(), Some(order[0].as_str()));
        fire_timeout(&mut s);
        assert_eq!(s.current_speaker_id(), Some(order[2].as_str()));

        // the last speaker leaving while waiting for them ends the speeches
        for id in &order[3..7] {
            leave(&mut s, id);
        }
        assert_eq!(s.current_speaker_id(), Some(order[2].as_str()));
        fire_timeout(&mut s);
        assert_eq!(s.current_speaker_id(), Some(order[7].as_str()));
        leave(&mut s, &order[7]);
        assert_eq!(s.stage, Stage::Voting);
    }

    #[test]
    fn empty_order_goes_straight_to_voting() {
        let mut s = session();
        let _ = seat(&mut s, "admin", Role::Admin);
        s.stage = Stage::Preparing;
        advance(&mut s, Flow::Next(Stage::Speaking));
        assert_eq!(s.stage, Stage::Voting);
    }
}
