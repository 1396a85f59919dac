//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS
//! - Join handshake: the first text frame must be a `JoinGame` envelope
//! - Forward every later request into the room mailbox, stamped with the
//!   player id (fail-fast when the mailbox is full)
//! - Relay everything the room sends on this connection's sink
//! - Lifecycle: ping + idle timeout, `ExitGame` on disconnect

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use undercover_core::error::{Result, UndercoverError};
use undercover_core::protocol::messages::{ExitGameRequest, JoinGameRequest};
use undercover_core::protocol::{RequestEnvelope, RequestTag, ResponseEnvelope};

use crate::app_state::AppState;
use crate::game::{Inbound, Sink, SinkId};
use crate::rooms::Joined;
use crate::transport::codec::{self, Frame};

type WsTx = SplitSink<WebSocket, Message>;
type WsRx = SplitStream<WebSocket>;

/// `GET /api/v1/ws/join`
pub async fn ws_join(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        let metrics = app.metrics();
        metrics.ws_connections.inc(&[]);
        if let Err(e) = run_connection(app, socket).await {
            tracing::debug!(error = %e, "connection ended with error");
        }
        metrics.ws_connections.dec(&[]);
    })
}

async fn run_connection(app: AppState, socket: WebSocket) -> Result<()> {
    let gw = app.cfg().gateway.clone();
    let join_timeout = app.cfg().rooms.join_timeout();
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);
    let ping_every = Duration::from_millis(gw.ping_interval_ms);

    let (mut ws_tx, mut ws_rx) = socket.split();

    // ---- handshake
    let req = match first_join_request(&mut ws_rx, idle_timeout).await {
        Ok(req) => req,
        Err(e) => return refuse(&mut ws_tx, e).await,
    };
    let (sink, mut out_rx) = Sink::channel(gw.outbound_queue);
    let sink_id = sink.id();
    let joined = match app.registry().join_room(req, sink, &mut out_rx).await {
        Ok(joined) => joined,
        Err(e) => return refuse(&mut ws_tx, e).await,
    };
    ws_tx
        .send(codec::encode(&joined.ack)?)
        .await
        .map_err(|e| UndercoverError::Internal(format!("ws send failed: {e}")))?;

    tracing::info!(room_id = %joined.room_id, player_id = %joined.player_id, "connection attached");

    // ---- relay
    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();
    let mut released = false;

    loop {
        tokio::select! {
            // room -> client
            out = out_rx.recv() => {
                let Some(env) = out else {
                    // the room dropped this sink (exit or reconnect elsewhere)
                    released = true;
                    break;
                };
                if ws_tx.send(codec::encode(&env)?).await.is_err() {
                    break;
                }
            }

            // client -> room
            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break; };
                last_activity = Instant::now();

                match codec::decode(msg) {
                    Ok(Frame::Request(env)) => {
                        if !forward(&joined, sink_id, env, &mut ws_tx).await {
                            break;
                        }
                    }
                    Ok(Frame::Ping(payload)) => {
                        let _ = ws_tx.send(Message::Pong(payload)).await;
                    }
                    Ok(Frame::Pong) => {}
                    Ok(Frame::Close) => break,
                    Err(e) => {
                        let _ = send_error(&mut ws_tx, &e).await;
                    }
                }
            }

            _ = ping_tick.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            _ = tokio::time::sleep_until(last_activity + idle_timeout) => {
                tracing::debug!(player_id = %joined.player_id, "idle timeout");
                let _ = send_error(&mut ws_tx, &UndercoverError::BadRequest("idle timeout".into())).await;
                break;
            }
        }
    }

    if !released {
        leave(&joined, sink_id, &mut out_rx, join_timeout).await;
    }
    let _ = ws_tx.close().await;
    tracing::info!(room_id = %joined.room_id, player_id = %joined.player_id, "connection detached");
    Ok(())
}

/// Wait for the first text frame and read it as a join request.
async fn first_join_request(ws_rx: &mut WsRx, within: Duration) -> Result<JoinGameRequest> {
    let read = async {
        while let Some(incoming) = ws_rx.next().await {
            let msg = incoming.map_err(|e| UndercoverError::BadRequest(format!("ws read failed: {e}")))?;
            match codec::decode(msg)? {
                Frame::Request(env) => {
                    return env
                        .decode::<JoinGameRequest>(RequestTag::JoinGame)
                        .ok_or_else(|| {
                            UndercoverError::BadRequest("first message must be a JoinGame request".into())
                        });
                }
                Frame::Ping(_) | Frame::Pong => continue,
                Frame::Close => break,
            }
        }
        Err(UndercoverError::BadRequest("connection closed before joining".into()))
    };
    tokio::time::timeout(within, read)
        .await
        .map_err(|_| UndercoverError::BadRequest("no JoinGame request received in time".into()))?
}

/// Push one client request into the room. Returns false once the room is gone.
async fn forward(joined: &Joined, sink_id: SinkId, env: RequestEnvelope, ws_tx: &mut WsTx) -> bool {
    match joined
        .mailbox
        .try_send(Inbound::from_player(env, joined.player_id.clone(), sink_id))
    {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(room_id = %joined.room_id, player_id = %joined.player_id, "room mailbox full");
            let _ = send_error(ws_tx, &UndercoverError::RoomBusy).await;
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// Tell the room this connection is gone and wait (bounded) for it to let go
/// of the sink.
async fn leave(
    joined: &Joined,
    sink_id: SinkId,
    out_rx: &mut mpsc::Receiver<ResponseEnvelope>,
    within: Duration,
) {
    let exit = ExitGameRequest {
        player_id: joined.player_id.clone(),
    };
    let env = match RequestEnvelope::new(RequestTag::ExitGame, &exit) {
        Ok(env) => env,
        Err(e) => {
            tracing::error!(error = %e, "exit envelope");
            return;
        }
    };
    let inbound = Inbound::from_player(env, joined.player_id.clone(), sink_id);
    if joined.mailbox.send_timeout(inbound, within).await.is_err() {
        tracing::warn!(room_id = %joined.room_id, player_id = %joined.player_id, "exit not delivered");
        return;
    }
    let drained = tokio::time::timeout(within, async {
        while out_rx.recv().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(room_id = %joined.room_id, player_id = %joined.player_id, "room did not release sink in time");
    }
}

async fn refuse(ws_tx: &mut WsTx, e: UndercoverError) -> Result<()> {
    let _ = send_error(ws_tx, &e).await;
    let _ = ws_tx.close().await;
    Err(e)
}

async fn send_error(ws_tx: &mut WsTx, e: &UndercoverError) -> Result<()> {
    let msg = codec::encode(&ResponseEnvelope::error(e.to_string()))?;
    ws_tx
        .send(msg)
        .await
        .map_err(|e| UndercoverError::Internal(format!("ws send failed: {e}")))
}
