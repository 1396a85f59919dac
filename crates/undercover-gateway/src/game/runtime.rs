//! Per-room event loop.
//!
//! One task owns one [`Session`] and is the only code that touches it. The
//! loop multiplexes the room mailbox, the pending stage deadline and a
//! shutdown signal; whichever is ready first is handled to completion before
//! the next is looked at, so every mutation is totally ordered.

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use undercover_core::error::UndercoverError;
use undercover_core::protocol::messages::{JoinGameRequest, TimeoutRequest};
use undercover_core::protocol::{RequestEnvelope, RequestTag};

use crate::game::player::{Sink, SinkId};
use crate::game::session::{Deadline, Session};
use crate::game::stages::{self, Action};

/// Where a mailbox item came from.
#[derive(Debug)]
pub enum Origin {
    /// A connection attaching through `JoinGame`, with the sink it listens on.
    Attach(Sink),
    /// A joined connection. The id is stamped by the transport.
    Connection { player_id: String, sink_id: SinkId },
    /// The room's own deadline.
    Internal,
}

#[derive(Debug)]
pub struct Inbound {
    pub env: RequestEnvelope,
    pub origin: Origin,
}

impl Inbound {
    pub fn attach(env: RequestEnvelope, sink: Sink) -> Self {
        Self {
            env,
            origin: Origin::Attach(sink),
        }
    }

    pub fn from_player(env: RequestEnvelope, player_id: impl Into<String>, sink_id: SinkId) -> Self {
        Self {
            env,
            origin: Origin::Connection {
                player_id: player_id.into(),
                sink_id,
            },
        }
    }
}

/// Sending half of a room mailbox.
pub type Mailbox = mpsc::Sender<Inbound>;

pub struct SessionRuntime {
    session: Session,
    inbox: mpsc::Receiver<Inbound>,
    shutdown: oneshot::Receiver<()>,
}

impl SessionRuntime {
    pub fn new(
        session: Session,
        inbox: mpsc::Receiver<Inbound>,
        shutdown: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            session,
            inbox,
            shutdown,
        }
    }

    /// Drive the room until it finishes, is shut down, or loses its mailbox.
    /// Returns the final state.
    pub async fn run(mut self) -> Session {
        let flow = stages::enter(&mut self.session);
        stages::advance(&mut self.session, flow);
        tracing::info!(room_id = %self.session.room_id, stage = %self.session.stage, "room runtime started");

        while !self.session.stage.is_terminal() {
            let deadline = self.session.deadline;
            let at = deadline.map(|d| d.at);

            tokio::select! {
                _ = &mut self.shutdown => {
                    tracing::info!(room_id = %self.session.room_id, "room shutdown requested");
                    break;
                }
                maybe = self.inbox.recv() => {
                    let Some(inbound) = maybe else {
                        tracing::info!(room_id = %self.session.room_id, "room mailbox closed");
                        break;
                    };
                    self.dispatch(inbound);
                }
                _ = sleep_until(at.unwrap_or_else(Instant::now)), if at.is_some() => {
                    if let Some(d) = deadline {
                        self.fire(d);
                    }
                }
            }
        }

        tracing::info!(room_id = %self.session.room_id, stage = %self.session.stage, "room runtime stopped");
        self.session
    }

    /// Turn an expired deadline into a `Timeout` request for the room.
    fn fire(&mut self, deadline: Deadline) {
        self.session.clear_timeout();
        match RequestEnvelope::new(RequestTag::Timeout, &TimeoutRequest { stage: deadline.stage }) {
            Ok(env) => self.dispatch(Inbound {
                env,
                origin: Origin::Internal,
            }),
            Err(e) => tracing::error!(room_id = %self.session.room_id, error = %e, "timeout envelope"),
        }
    }

    fn dispatch(&mut self, inbound: Inbound) {
        let Inbound { env, origin } = inbound;
        let Some(tag) = env.tag() else {
            tracing::debug!(room_id = %self.session.room_id, tag = %env.req_type, "unknown request tag ignored");
            return;
        };
        tracing::debug!(room_id = %self.session.room_id, stage = %self.session.stage, %tag, "request");

        match origin {
            Origin::Attach(sink) => self.attach(tag, &env, sink),
            Origin::Internal => {
                if tag == RequestTag::Timeout {
                    self.timeout(&env);
                }
            }
            Origin::Connection { player_id, sink_id } => {
                if !self
                    .session
                    .player(&player_id)
                    .is_some_and(|p| p.owns_sink(sink_id))
                {
                    tracing::debug!(room_id = %self.session.room_id, %player_id, "request from superseded connection dropped");
                    return;
                }
                match tag {
                    RequestTag::ExitGame => {
                        if self.session.exit(&player_id, sink_id) {
                            let flow = stages::on_leave(&mut self.session, &player_id);
                            stages::advance(&mut self.session, flow);
                        }
                    }
                    RequestTag::JoinGame | RequestTag::Timeout => self.reject(
                        &player_id,
                        UndercoverError::BadRequest(format!("{tag} is not accepted from a client")),
                    ),
                    _ => {
                        let action = Action {
                            caller: &player_id,
                            tag,
                            env: &env,
                        };
                        match stages::handle(&mut self.session, action) {
                            Ok(flow) => stages::advance(&mut self.session, flow),
                            Err(e) => self.reject(&player_id, e),
                        }
                    }
                }
            }
        }
    }

    fn attach(&mut self, tag: RequestTag, env: &RequestEnvelope, sink: Sink) {
        if sink.is_closed() {
            // the handshake gave up before the room got to it
            tracing::debug!(room_id = %self.session.room_id, sink_id = sink.id(), "abandoned join dropped");
            return;
        }
        if tag != RequestTag::JoinGame {
            self.session.refuse(sink, "first request must be JoinGame");
            return;
        }
        match env.decode::<JoinGameRequest>(RequestTag::JoinGame) {
            Some(req) => {
                self.session.join(req, sink);
            }
            None => self.session.refuse(sink, "invalid JoinGame payload"),
        }
    }

    fn timeout(&mut self, env: &RequestEnvelope) {
        let Some(req) = env.decode::<TimeoutRequest>(RequestTag::Timeout) else {
            return;
        };
        if req.stage != self.session.stage {
            tracing::debug!(room_id = %self.session.room_id, armed = %req.stage, stage = %self.session.stage, "stale timeout ignored");
            return;
        }
        let flow = stages::on_timeout(&mut self.session);
        stages::advance(&mut self.session, flow);
    }

    fn reject(&self, player_id: &str, err: UndercoverError) {
        if err.is_domain() {
            tracing::debug!(room_id = %self.session.room_id, player_id, error = %err, "request rejected");
        } else {
            tracing::warn!(room_id = %self.session.room_id, player_id, error = %err, "request failed");
        }
        self.session.reply_error(player_id, &err);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::game::session::testkit::*;
    use undercover_core::protocol::messages::{GameStateNotification, SetWordsRequest, StartGameRequest};
    use undercover_core::protocol::{ResponseTag, Role, Stage};

    struct Room {
        mailbox: Mailbox,
        shutdown: oneshot::Sender<()>,
        task: tokio::task::JoinHandle<Session>,
    }

    fn spawn(session: Session) -> Room {
        let (mailbox, inbox) = mpsc::channel(16);
        let (shutdown, stop) = oneshot::channel();
        let task = tokio::spawn(SessionRuntime::new(session, inbox, stop).run());
        Room { mailbox, shutdown, task }
    }

    fn sink_of(s: &Session, id: &str) -> SinkId {
        s.player(id).unwrap().sink.as_ref().unwrap().id()
    }

    #[tokio::test]
    async fn client_timeout_is_rejected() {
        let mut s = session();
        let mut rx = seat(&mut s, "admin", Role::Admin);
        let sink_id = sink_of(&s, "admin");
        let room = spawn(s);

        let env = RequestEnvelope::new(RequestTag::Timeout, &TimeoutRequest { stage: Stage::Waiting }).unwrap();
        room.mailbox.send(Inbound::from_player(env, "admin", sink_id)).await.unwrap();

        let reply = rx.recv().await.unwrap();
        assert!(reply.is(ResponseTag::Error));

        room.shutdown.send(()).unwrap();
        let s = room.task.await.unwrap();
        assert_eq!(s.stage, Stage::Waiting);
    }

    #[tokio::test]
    async fn unknown_tags_are_ignored() {
        let mut s = session();
        let mut rx = seat(&mut s, "admin", Role::Admin);
        let sink_id = sink_of(&s, "admin");
        let room = spawn(s);

        let env = RequestEnvelope::from_json(r#"{"request_type":"Dance"}"#).unwrap();
        room.mailbox.send(Inbound::from_player(env, "admin", sink_id)).await.unwrap();
        drop(room.mailbox);

        let s = room.task.await.unwrap();
        assert_eq!(s.stage, Stage::Waiting);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn preparing_deadline_starts_speeches() {
        let mut s = session();
        let _admin = seat(&mut s, "admin", Role::Admin);
        let sink_id = sink_of(&s, "admin");
        let mut player_rx: Vec<_> = (0..8).map(|i| seat(&mut s, &format!("p{i}"), Role::Unset)).collect();
        let room = spawn(s);

        let words = SetWordsRequest {
            word_list: vec!["apple".into(), "banana".into()],
        };
        for env in [
            RequestEnvelope::new(RequestTag::SetWords, &words).unwrap(),
            RequestEnvelope::new(RequestTag::StartGame, &StartGameRequest {}).unwrap(),
        ] {
            room.mailbox.send(Inbound::from_player(env, "admin", sink_id)).await.unwrap();
        }

        tokio::time::sleep(Duration::from_secs(31)).await;

        let rx = &mut player_rx[0];
        let mut state = None;
        while let Ok(env) = rx.try_recv() {
            if let Some(n) = env.decode::<GameStateNotification>(ResponseTag::GameState) {
                state = Some(n);
            }
        }
        let state = state.unwrap();
        assert_eq!(state.stage, Stage::Speaking);
        assert_eq!(state.round, 1);
        assert!(state.current_turn_id.is_some());

        room.shutdown.send(()).unwrap();
        let s = room.task.await.unwrap();
        assert_eq!(s.stage, Stage::Speaking);
    }

    #[tokio::test]
    async fn superseded_connection_cannot_act() {
        let mut s = session();
        let mut rx = seat(&mut s, "admin", Role::Admin);
        let stale = sink_of(&s, "admin") + 10_000;
        let room = spawn(s);

        let words = SetWordsRequest {
            word_list: vec!["apple".into(), "banana".into()],
        };
        let env = RequestEnvelope::new(RequestTag::SetWords, &words).unwrap();
        room.mailbox.send(Inbound::from_player(env, "admin", stale)).await.unwrap();
        drop(room.mailbox);

        let s = room.task.await.unwrap();
        assert!(s.word_list.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn abandoned_join_is_not_seated() {
        let mut s = session();
        let _admin = seat(&mut s, "admin", Role::Admin);
        let room = spawn(s);

        let (sink, rx) = Sink::channel(8);
        drop(rx);
        let req = JoinGameRequest {
            room_id: "room0001".into(),
            joiner_name: "ghost".into(),
            ..Default::default()
        };
        let env = RequestEnvelope::new(RequestTag::JoinGame, &req).unwrap();
        room.mailbox.send(Inbound::attach(env, sink)).await.unwrap();
        drop(room.mailbox);

        let s = room.task.await.unwrap();
        assert_eq!(s.players.len(), 1);
        assert!(s.player("ghost").is_none());
    }

    #[tokio::test]
    async fn exit_of_the_last_undecided_voter_closes_voting() {
        let mut s = session();
        let _admin = seat(&mut s, "admin", Role::Admin);
        let mut rxs = Vec::new();
        for (id, role) in [("b", Role::Blank), ("s", Role::Spy), ("n0", Role::Normal), ("n1", Role::Normal), ("n2", Role::Normal)] {
            rxs.push(seat(&mut s, id, role));
        }
        s.stage = Stage::Voting;
        let sinks: Vec<(&str, SinkId)> = ["b", "s", "n0", "n1", "n2"]
            .into_iter()
            .map(|id| (id, sink_of(&s, id)))
            .collect();
        let leaver = sink_of(&s, "n2");
        let room = spawn(s);

        for ((voter, sink_id), target) in sinks.iter().zip(["n0", "n0", "s", "n0"]) {
            let vote = undercover_core::protocol::messages::VoteRequest { target_id: target.into() };
            let env = RequestEnvelope::new(RequestTag::Vote, &vote).unwrap();
            room.mailbox.send(Inbound::from_player(env, *voter, *sink_id)).await.unwrap();
        }

        let env = RequestEnvelope::new(
            RequestTag::ExitGame,
            &undercover_core::protocol::messages::ExitGameRequest { player_id: "n2".into() },
        )
        .unwrap();
        room.mailbox.send(Inbound::from_player(env, "n2", leaver)).await.unwrap();
        drop(room.mailbox);

        let s = room.task.await.unwrap();
        assert_eq!(s.player("n0").unwrap().original, Some(Role::Normal));
        assert_eq!(s.player("n2").unwrap().role, Role::Observer);
        assert_ne!(s.stage, Stage::Voting);
    }
}
