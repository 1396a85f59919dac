//! Secret role and word assignment, revealed privately before speeches.

use rand::Rng;
use undercover_core::protocol::messages::StartGameResponse;
use undercover_core::protocol::{ResponseEnvelope, ResponseTag, Role};

use super::Flow;
use crate::game::session::Session;

pub(super) fn enter(s: &mut Session) -> Flow {
    assign_roles(s);

    s.round = 1;
    s.speaking_order.clear();
    s.current_speaker = 0;
    s.votes.clear();

    for p in &s.players {
        let reveal = match p.role {
            Role::Admin => StartGameResponse {
                players: Some(s.master_roster()),
                ..Default::default()
            },
            role if role.is_alive() => StartGameResponse {
                assigned_role: Some(role),
                assigned_word: (!p.word.is_empty()).then(|| p.word.clone()),
                players: None,
            },
            _ => StartGameResponse::default(),
        };
        s.unicast(&p.id, ResponseEnvelope::wrap(ResponseTag::StartGame, &reveal));
    }

    s.set_timeout(s.rules.preparing());
    Flow::Stay
}

/// One blank and one spy drawn from unset players; the rest play normal.
fn assign_roles(s: &mut Session) {
    let (answer, spy) = match s.word_list.as_slice() {
        [answer, spy, ..] => (answer.clone(), spy.clone()),
        _ => {
            tracing::error!(room_id = %s.room_id, "word list missing at role assignment");
            return;
        }
    };

    let mut pool: Vec<usize> = s
        .players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.role == Role::Unset)
        .map(|(i, _)| i)
        .collect();
    if pool.len() < 2 {
        tracing::error!(room_id = %s.room_id, candidates = pool.len(), "not enough players to assign roles");
        return;
    }

    let blank = pool.swap_remove(s.rng.random_range(0..pool.len()));
    let spy_idx = pool.swap_remove(s.rng.random_range(0..pool.len()));

    s.players[blank].role = Role::Blank;
    s.players[blank].word.clear();
    s.players[spy_idx].role = Role::Spy;
    s.players[spy_idx].word = spy.clone();
    for i in pool {
        s.players[i].role = Role::Normal;
        s.players[i].word = answer.clone();
    }

    tracing::info!(
        room_id = %s.room_id,
        blank = %s.players[blank].id,
        spy = %s.players[spy_idx].id,
        "roles assigned"
    );
    s.answer_word = answer;
    s.spy_word = spy;
}

#[cfg(test)]
mod tests {
    use super::super::testkit::*;
    use crate::game::session::testkit::*;
    use crate::game::session::Session;
    use undercover_core::protocol::messages::{SetWordsRequest, StartGameRequest, StartGameResponse};
    use tokio::sync::mpsc::Receiver;
    use undercover_core::protocol::{RequestTag, ResponseEnvelope, ResponseTag, Role, Stage};

    fn started() -> (Session, Vec<Receiver<ResponseEnvelope>>) {
        let mut s = session();
        let mut rxs = vec![seat(&mut s, "admin", Role::Admin)];
        rxs.extend((0..8).map(|i| seat(&mut s, &format!("p{i}"), Role::Unset)));
        rxs.push(seat(&mut s, "watcher", Role::Observer));

        let words = SetWordsRequest {
            word_list: vec!["apple".into(), "banana".into()],
        };
        act(&mut s, "admin", &request(RequestTag::SetWords, &words)).unwrap();
        act(&mut s, "admin", &request(RequestTag::StartGame, &StartGameRequest {})).unwrap();
        (s, rxs)
    }

    fn reveal(rx: &mut Receiver<ResponseEnvelope>) -> StartGameResponse {
        drain(rx)
            .iter()
            .find_map(|e| e.decode(ResponseTag::StartGame))
            .unwrap()
    }

    #[test]
    fn exactly_one_blank_and_one_spy() {
        let (s, _rxs) = started();
        assert_eq!(s.stage, Stage::Preparing);
        let count = |r: Role| s.players.iter().filter(|p| p.role == r).count();
        assert_eq!(count(Role::Blank), 1);
        assert_eq!(count(Role::Spy), 1);
        assert_eq!(count(Role::Normal), 6);

        for p in &s.players {
            match p.role {
                Role::Normal => assert_eq!(p.word, "apple"),
                Role::Spy => assert_eq!(p.word, "banana"),
                _ => assert!(p.word.is_empty()),
            }
        }
        assert!(s.deadline.is_some());
    }

    #[test]
    fn reveals_are_private_and_admin_gets_roster() {
        let (s, mut rxs) = started();

        let admin = reveal(&mut rxs[0]);
        assert_eq!(admin.assigned_role, None);
        let roster = admin.players.unwrap();
        assert_eq!(roster.len(), 10);
        assert!(roster.iter().any(|v| v.role == Some(Role::Spy) && v.word.as_deref() == Some("banana")));

        for (i, rx) in rxs.iter_mut().enumerate().skip(1).take(8) {
            let r = reveal(rx);
            let me = &s.players[i];
            assert_eq!(r.assigned_role, Some(me.role));
            assert_eq!(r.players, None);
            match me.role {
                Role::Blank => assert_eq!(r.assigned_word, None),
                _ => assert_eq!(r.assigned_word.as_deref(), Some(me.word.as_str())),
            }
        }

        let watcher = reveal(&mut rxs[9]);
        assert_eq!(watcher.assigned_role, None);
        assert_eq!(watcher.players, None);
    }

    #[test]
    fn timeout_moves_to_speaking() {
        let (mut s, _rxs) = started();
        fire_timeout(&mut s);
        assert_eq!(s.stage, Stage::Speaking);
    }
}
