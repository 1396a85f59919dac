//! Room registry: creates sessions and performs the join handshake.
//!
//! The map of room handles is the only state shared across rooms. The lock
//! guards map mutation only; session state stays inside each room's task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use undercover_core::error::{Result, UndercoverError};
use undercover_core::protocol::messages::{
    CreateRoomRequest, CreateRoomResponse, ExitGameRequest, JoinGameRequest, JoinGameResponse,
};
use undercover_core::protocol::{RequestEnvelope, RequestTag, ResponseEnvelope, ResponseTag, Role};
use uuid::Uuid;

use crate::config::{GameRules, RoomsSection};
use crate::game::{Inbound, Mailbox, Player, Session, SessionRuntime, Sink, SinkId};
use crate::obs::GameMetrics;

const ROOM_ID_LEN: usize = 8;

struct RoomHandle {
    mailbox: Mailbox,
    shutdown: oneshot::Sender<()>,
}

/// A connection admitted into a room.
#[derive(Debug)]
pub struct Joined {
    pub room_id: String,
    pub player_id: String,
    pub mailbox: Mailbox,
    /// The room's `JoinGame` acknowledgement, to be relayed to the client.
    pub ack: ResponseEnvelope,
}

#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<String, RoomHandle>>>,
    closed: Arc<AtomicBool>,
    cfg: RoomsSection,
    rules: GameRules,
    metrics: Arc<GameMetrics>,
}

impl RoomRegistry {
    pub fn new(cfg: RoomsSection, rules: GameRules, metrics: Arc<GameMetrics>) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            cfg,
            rules,
            metrics,
        }
    }

    pub fn config(&self) -> &RoomsSection {
        &self.cfg
    }

    /// Open a room, seat its creator as admin and start its runtime.
    ///
    /// The creator has no sink until they join with the returned player id.
    pub async fn create_room(&self, req: CreateRoomRequest) -> Result<CreateRoomResponse> {
        let room_name = req.room_name.trim();
        let creator_name = req.creator_name.trim();
        if room_name.is_empty() || creator_name.is_empty() {
            return Err(UndercoverError::BadRequest(
                "room name and creator name must not be empty".into(),
            ));
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(UndercoverError::Internal("registry is closed".into()));
        }

        let mut rooms = self.rooms.lock().await;
        let room_id = loop {
            let id = mint_room_id();
            if !rooms.contains_key(&id) {
                break id;
            }
        };

        let creator = Player::new(Uuid::new_v4().simple().to_string(), creator_name, Role::Admin);
        let creator_view = creator.private_view();
        let mut session = Session::new(room_id.clone(), room_name, self.rules, Arc::clone(&self.metrics));
        session.players.push(creator);

        let (mailbox, inbox) = mpsc::channel(self.cfg.mailbox_capacity);
        let (shutdown, stop) = oneshot::channel();
        rooms.insert(room_id.clone(), RoomHandle { mailbox, shutdown });
        drop(rooms);

        self.metrics.rooms_created.inc(&[]);
        self.metrics.rooms_active.inc(&[]);
        tracing::info!(%room_id, room_name, creator_id = %creator_view.id, "room created");

        let runtime = SessionRuntime::new(session, inbox, stop);
        let rooms = Arc::clone(&self.rooms);
        let metrics = Arc::clone(&self.metrics);
        let id = room_id.clone();
        tokio::spawn(async move {
            let finished = runtime.run().await;
            rooms.lock().await.remove(&id);
            metrics.rooms_active.dec(&[]);
            tracing::info!(room_id = %id, stage = %finished.stage, "room removed");
        });

        Ok(CreateRoomResponse {
            room_id,
            creator: creator_view,
        })
    }

    /// Attach a connection to a room.
    ///
    /// `sink` is handed to the room; its receiving half `rx` is read here until
    /// the room acknowledges the join or `rooms.join_timeout_ms` passes.
    pub async fn join_room(
        &self,
        req: JoinGameRequest,
        sink: Sink,
        rx: &mut mpsc::Receiver<ResponseEnvelope>,
    ) -> Result<Joined> {
        let res = self.handshake(req, sink, rx).await;
        if let Err(e) = &res {
            let reason = match e {
                UndercoverError::RoomNotFound(_) => "not_found",
                UndercoverError::RoomBusy => "busy",
                UndercoverError::JoinTimeout => "timeout",
                UndercoverError::JoinRejected(_) => "rejected",
                _ => "invalid",
            };
            self.metrics.join_failures.inc(&[("reason", reason)]);
            tracing::warn!(error = %e, reason, "join handshake failed");
        }
        res
    }

    async fn handshake(
        &self,
        req: JoinGameRequest,
        sink: Sink,
        rx: &mut mpsc::Receiver<ResponseEnvelope>,
    ) -> Result<Joined> {
        let room_id = req.room_id.trim().to_owned();
        if room_id.is_empty() || req.joiner_name.trim().is_empty() {
            return Err(UndercoverError::BadRequest(
                "room id and joiner name must not be empty".into(),
            ));
        }

        let mailbox = self
            .mailbox(&room_id)
            .await
            .ok_or_else(|| UndercoverError::RoomNotFound(room_id.clone()))?;

        let sink_id = sink.id();
        let env = RequestEnvelope::new(RequestTag::JoinGame, &req)?;
        mailbox
            .try_send(Inbound::attach(env, sink))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => UndercoverError::RoomBusy,
                mpsc::error::TrySendError::Closed(_) => UndercoverError::RoomNotFound(room_id.clone()),
            })?;

        let ack = match tokio::time::timeout(self.cfg.join_timeout(), rx.recv()).await {
            Err(_) => {
                // a closed sink is never seated; an ack that raced the close is undone
                rx.close();
                if let Ok(late) = rx.try_recv() {
                    release_late_join(&room_id, &mailbox, &late, sink_id);
                }
                return Err(UndercoverError::JoinTimeout);
            }
            Ok(None) => {
                return Err(UndercoverError::JoinRejected("room closed the connection".into()))
            }
            Ok(Some(env)) => env,
        };

        if ack.is(ResponseTag::Error) {
            let msg = ack.error.unwrap_or_else(|| "join refused".into());
            return Err(UndercoverError::JoinRejected(msg));
        }
        let Some(joined) = ack.decode::<JoinGameResponse>(ResponseTag::JoinGame) else {
            return Err(UndercoverError::JoinRejected(format!(
                "unexpected {} response",
                ack.resp_type
            )));
        };

        tracing::info!(%room_id, player_id = %joined.joiner.id, "join acknowledged");
        Ok(Joined {
            room_id,
            player_id: joined.joiner.id,
            mailbox,
            ack,
        })
    }

    pub async fn mailbox(&self, room_id: &str) -> Option<Mailbox> {
        self.rooms
            .lock()
            .await
            .get(room_id)
            .map(|h| h.mailbox.clone())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Stop one room. Returns false if it was not open.
    pub async fn close_room(&self, room_id: &str) -> bool {
        let Some(handle) = self.rooms.lock().await.remove(room_id) else {
            return false;
        };
        let _ = handle.shutdown.send(());
        tracing::info!(%room_id, "room closed");
        true
    }

    /// Stop every room and refuse new ones.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let handles: Vec<(String, RoomHandle)> = self.rooms.lock().await.drain().collect();
        for (room_id, handle) in handles {
            let _ = handle.shutdown.send(());
            tracing::debug!(%room_id, "room shutdown signalled");
        }
        tracing::info!("room registry closed");
    }
}

/// Send the `ExitGame` a connection would have sent for a join it gave up on.
fn release_late_join(room_id: &str, mailbox: &Mailbox, ack: &ResponseEnvelope, sink_id: SinkId) {
    let Some(joined) = ack.decode::<JoinGameResponse>(ResponseTag::JoinGame) else {
        return;
    };
    let player_id = joined.joiner.id;
    let exit = ExitGameRequest {
        player_id: player_id.clone(),
    };
    let sent = RequestEnvelope::new(RequestTag::ExitGame, &exit).and_then(|env| {
        mailbox
            .try_send(Inbound::from_player(env, player_id.clone(), sink_id))
            .map_err(|_| UndercoverError::RoomBusy)
    });
    match sent {
        Ok(()) => tracing::debug!(%room_id, %player_id, "late join released"),
        Err(e) => tracing::warn!(%room_id, %player_id, error = %e, "late join could not be released"),
    }
}

fn mint_room_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(ROOM_ID_LEN);
    id
}
