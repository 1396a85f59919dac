//! Join, reconnect and exit rules. These run identically in every stage.

use undercover_core::protocol::messages::{ExitGameResponse, JoinGameRequest, JoinGameResponse};
use undercover_core::protocol::{PlayerView, ResponseEnvelope, ResponseTag, Role, Stage};

use crate::game::player::{Player, Sink, SinkId};
use crate::game::session::Session;

/// How a join was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    ReconnectById,
    ReconnectByName,
    Admin,
    /// Alive seats full; watching without a room broadcast.
    Overflow,
    Candidate,
    Observer,
}

impl JoinKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinKind::ReconnectById => "reconnect_id",
            JoinKind::ReconnectByName => "reconnect_name",
            JoinKind::Admin | JoinKind::Candidate => "new",
            JoinKind::Overflow => "overflow",
            JoinKind::Observer => "observer",
        }
    }
}

impl Session {
    /// Admit, re-admit or reject a connection attaching through `JoinGame`.
    ///
    /// Rejections are answered on `sink`, which is then dropped.
    pub fn join(&mut self, req: JoinGameRequest, sink: Sink) -> Option<JoinKind> {
        let name = req.joiner_name.trim();
        if name.is_empty() {
            self.refuse(sink, "joiner name must not be empty");
            return None;
        }
        let requested_id = req.player_id.as_deref().map(str::trim).filter(|s| !s.is_empty());

        // (a) / (b): reconnects keep role, word and name, only the sink changes.
        let existing = requested_id
            .and_then(|id| self.position_of(|p| p.id == id))
            .map(|i| (i, JoinKind::ReconnectById))
            .or_else(|| {
                self.position_of(|p| p.name == name)
                    .map(|i| (i, JoinKind::ReconnectByName))
            });
        if let Some((idx, kind)) = existing {
            self.reconnect(idx, sink, kind);
            return Some(kind);
        }

        let kind = if self.players.is_empty() {
            JoinKind::Admin
        } else if self.count_alive() >= self.rules.max_players {
            JoinKind::Overflow
        } else if self.stage == Stage::Waiting && !req.observer {
            JoinKind::Candidate
        } else {
            JoinKind::Observer
        };
        let role = match kind {
            JoinKind::Admin => Role::Admin,
            JoinKind::Candidate => Role::Unset,
            _ => Role::Observer,
        };

        let id = requested_id
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let mut player = Player::new(id, name, role);
        player.sink = Some(sink);
        let view = player.public_view();
        let player_id = player.id.clone();
        self.players.push(player);

        tracing::info!(
            room_id = %self.room_id,
            player_id = %player_id,
            role = %role,
            kind = kind.as_str(),
            "player joined"
        );
        self.metrics.joins.inc(&[("kind", kind.as_str())]);

        let ack = ResponseEnvelope::wrap(ResponseTag::JoinGame, &self.join_snapshot(view));
        if kind == JoinKind::Overflow {
            self.unicast(&player_id, ack);
        } else {
            self.broadcast(&ack);
        }
        Some(kind)
    }

    fn reconnect(&mut self, idx: usize, sink: Sink, kind: JoinKind) {
        let player = &mut self.players[idx];
        // replacing the sink drops the stale sender and ends its relay
        player.sink = Some(sink);
        let private = player.private_view();
        let public = player.public_view();
        let player_id = player.id.clone();

        tracing::info!(
            room_id = %self.room_id,
            player_id = %player_id,
            kind = kind.as_str(),
            "player reconnected"
        );
        self.metrics.joins.inc(&[("kind", kind.as_str())]);

        self.unicast(
            &player_id,
            ResponseEnvelope::wrap(ResponseTag::JoinGame, &self.join_snapshot(private)),
        );
        self.broadcast(&ResponseEnvelope::wrap(
            ResponseTag::JoinGame,
            &self.join_snapshot(public),
        ));
    }

    /// Detach a departing connection.
    ///
    /// Only the connection holding the player's current sink may leave;
    /// exits from a connection superseded by a reconnect change nothing and
    /// return false.
    pub fn exit(&mut self, player_id: &str, sink_id: SinkId) -> bool {
        let room_id = self.room_id.clone();
        let Some(player) = self.player_mut(player_id) else {
            tracing::debug!(room_id = %room_id, player_id, "exit from unknown player");
            return false;
        };
        if !player.owns_sink(sink_id) {
            tracing::debug!(room_id = %room_id, player_id, sink_id, "stale exit ignored");
            return false;
        }

        player.sink = None;
        if player.role != Role::Admin {
            if player.role.is_secret() {
                player.original.get_or_insert(player.role);
            }
            let word = std::mem::take(&mut player.word);
            if player.original.is_some() && player.original_word.is_none() {
                player.original_word = Some(word);
            }
            player.role = Role::Observer;
        }
        let notice = ExitGameResponse {
            left_player_id: player.id.clone(),
            left_player_name: player.name.clone(),
        };

        tracing::info!(room_id = %room_id, player_id, "player left");
        self.broadcast(&ResponseEnvelope::wrap(ResponseTag::ExitGame, &notice));
        true
    }

    fn join_snapshot(&self, joiner: PlayerView) -> JoinGameResponse {
        JoinGameResponse {
            room_id: self.room_id.clone(),
            room_name: self.room_name.clone(),
            stage: self.stage,
            joiner,
            players: self.public_roster(),
            master_id: self.admin_id(),
        }
    }

    fn position_of(&self, pred: impl Fn(&Player) -> bool) -> Option<usize> {
        self.players.iter().position(pred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::testkit::*;

    fn join_req(name: &str) -> JoinGameRequest {
        JoinGameRequest {
            room_id: "room0001".into(),
            joiner_name: name.into(),
            ..Default::default()
        }
    }

    fn ack(env: &ResponseEnvelope) -> JoinGameResponse {
        env.decode(ResponseTag::JoinGame).unwrap()
    }

    #[test]
    fn first_joiner_becomes_admin_then_candidates() {
        let mut s = session();
        let (sink, mut rx) = Sink::channel(8);
        assert_eq!(s.join(join_req("boss"), sink), Some(JoinKind::Admin));
        let (sink, _rx2) = Sink::channel(8);
        assert_eq!(s.join(join_req("bob"), sink), Some(JoinKind::Candidate));

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 2);
        let last = ack(&msgs[1]);
        assert_eq!(last.players.len(), 2);
        assert_eq!(last.master_id, s.players[0].id);
        assert_eq!(s.players[1].role, Role::Unset);
    }

    #[test]
    fn observer_flag_is_honored_while_waiting() {
        let mut s = session();
        let _a = seat(&mut s, "a", Role::Admin);
        let (sink, _rx) = Sink::channel(8);
        let req = JoinGameRequest { observer: true, ..join_req("watcher") };
        assert_eq!(s.join(req, sink), Some(JoinKind::Observer));
    }

    #[test]
    fn late_joiner_watches() {
        let mut s = session();
        let _a = seat(&mut s, "a", Role::Admin);
        s.stage = Stage::Voting;
        let (sink, _rx) = Sink::channel(8);
        assert_eq!(s.join(join_req("late"), sink), Some(JoinKind::Observer));
        assert_eq!(s.players[1].role, Role::Observer);
    }

    #[test]
    fn capacity_overflow_gets_private_ack_only() {
        let mut s = session();
        let mut admin_rx = seat(&mut s, "a", Role::Admin);
        let _rxs: Vec<_> = (0..8).map(|i| seat(&mut s, &format!("p{i}"), Role::Unset)).collect();

        let (sink, mut rx) = Sink::channel(8);
        assert_eq!(s.join(join_req("ninth"), sink), Some(JoinKind::Overflow));
        assert_eq!(s.players[9].role, Role::Observer);
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(drain(&mut admin_rx).is_empty());
    }

    #[test]
    fn reconnect_by_id_keeps_role_and_word() {
        let mut s = session();
        let mut admin_rx = seat(&mut s, "a", Role::Admin);
        let _old = seat(&mut s, "spy", Role::Spy);
        s.players[1].word = "banana".into();

        let (sink, mut rx) = Sink::channel(8);
        let new_sink_id = sink.id();
        let req = JoinGameRequest {
            player_id: Some("spy".into()),
            ..join_req("whatever")
        };
        assert_eq!(s.join(req, sink), Some(JoinKind::ReconnectById));

        let p = s.player("spy").unwrap();
        assert_eq!(p.role, Role::Spy);
        assert_eq!(p.word, "banana");
        assert_eq!(p.name, "name-spy");
        assert!(p.owns_sink(new_sink_id));

        let mine = drain(&mut rx);
        assert_eq!(mine.len(), 2);
        let private = ack(&mine[0]);
        assert_eq!(private.joiner.word.as_deref(), Some("banana"));
        assert_eq!(private.joiner.role, Some(Role::Spy));

        let theirs = drain(&mut admin_rx);
        assert_eq!(theirs.len(), 1);
        let public = ack(&theirs[0]);
        assert_eq!(public.joiner.word, None);
        assert_eq!(public.joiner.role, None);
        assert!(public.players.iter().all(|v| v.word.is_none()));
    }

    #[test]
    fn reconnect_by_name_when_id_is_lost() {
        let mut s = session();
        let _a = seat(&mut s, "a", Role::Admin);
        let _old = seat(&mut s, "n1", Role::Normal);
        s.players[1].word = "apple".into();

        let (sink, _rx) = Sink::channel(8);
        assert_eq!(s.join(join_req("name-n1"), sink), Some(JoinKind::ReconnectByName));
        assert_eq!(s.players.len(), 2);
        assert_eq!(s.players[1].word, "apple");
    }

    #[test]
    fn replaced_sink_closes_old_relay() {
        let mut s = session();
        let mut old_rx = seat(&mut s, "p", Role::Unset);
        let (sink, _rx) = Sink::channel(8);
        let req = JoinGameRequest { player_id: Some("p".into()), ..join_req("x") };
        s.join(req, sink);

        drain(&mut old_rx);
        assert!(matches!(
            old_rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn stale_exit_is_ignored() {
        let mut s = session();
        let _a = seat(&mut s, "a", Role::Admin);
        let old = seat(&mut s, "p", Role::Unset);
        let stale_id = s.players[1].sink.as_ref().unwrap().id();
        drop(old);

        let (sink, _rx) = Sink::channel(8);
        let req = JoinGameRequest { player_id: Some("p".into()), ..join_req("x") };
        s.join(req, sink);

        assert!(!s.exit("p", stale_id));
        let p = s.player("p").unwrap();
        assert!(p.is_connected());
        assert_eq!(p.role, Role::Unset);
    }

    #[test]
    fn exit_demotes_player_but_admin_keeps_seat() {
        let mut s = session();
        let _a = seat(&mut s, "a", Role::Admin);
        let mut other = seat(&mut s, "n", Role::Normal);
        s.players[1].word = "apple".into();

        let admin_sink = s.players[0].sink.as_ref().unwrap().id();
        s.exit("a", admin_sink);
        assert_eq!(s.players[0].role, Role::Admin);
        assert!(!s.players[0].is_connected());

        let sink_id = s.players[1].sink.as_ref().unwrap().id();
        s.exit("n", sink_id);
        let p = &s.players[1];
        assert_eq!(p.role, Role::Observer);
        assert_eq!(p.original, Some(Role::Normal));
        assert!(p.word.is_empty());
        assert_eq!(p.final_word(), "apple");

        // the admin's departure reached the other player; their own did not
        let msgs = drain(&mut other);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].is(ResponseTag::ExitGame));
    }

    #[test]
    fn eliminated_player_keeps_word_after_leaving() {
        let mut s = session();
        let _a = seat(&mut s, "a", Role::Admin);
        let _s = seat(&mut s, "s", Role::Observer);
        s.players[1].original = Some(Role::Spy);
        s.players[1].word = "banana".into();

        let sink_id = s.players[1].sink.as_ref().unwrap().id();
        assert!(s.exit("s", sink_id));
        let p = &s.players[1];
        assert!(p.word.is_empty());
        assert_eq!(p.final_role(), Role::Spy);
        assert_eq!(p.final_word(), "banana");
    }

    #[test]
    fn empty_name_is_rejected_on_the_sink() {
        let mut s = session();
        let (sink, mut rx) = Sink::channel(8);
        assert_eq!(s.join(join_req("  "), sink), None);
        assert!(s.players.is_empty());
        assert!(drain(&mut rx)[0].is(ResponseTag::Error));
    }
}
