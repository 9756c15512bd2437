//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchHandle, PlayerId, PlayerInput};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Roster id the connection plays as
    pub player_id: PlayerId,
}

/// WebSocket upgrade handler.
///
/// Match and roster are checked before the upgrade itself, so a bad id is a
/// 404/403 rather than an upgrade error.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Path(match_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(handle) = state.match_registry.get(&match_id) else {
        warn!(match_id = %match_id, "WebSocket upgrade for unknown match");
        return (StatusCode::NOT_FOUND, "Unknown match").into_response();
    };

    if !handle.has_player(&query.player_id) {
        warn!(match_id = %match_id, player_id = %query.player_id, "Player not on roster");
        return (StatusCode::FORBIDDEN, "Player not on roster").into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(match_id = %match_id, error = %rejection, "WebSocket upgrade rejected");
            return rejection.into_response();
        }
    };

    info!(match_id = %match_id, player_id = %query.player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, query.player_id, handle))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: PlayerId, handle: MatchHandle) {
    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before the welcome so no broadcast slips between them
    let event_rx = handle.subscribe();

    let welcome = ServerMsg::Welcome {
        match_id: handle.id,
        player_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    // Late joiners and reconnects get the current state right away
    let snapshot = handle.snapshot();
    let finished = !snapshot.status.is_running();
    let current = ServerMsg::Snapshot {
        snapshot,
        events: Vec::new(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &current).await {
        debug!(player_id = %player_id, error = %e, "Failed to send initial snapshot");
        return;
    }
    if finished {
        let _ = ws_sink.send(Message::Close(None)).await;
        return;
    }

    run_session(player_id, ws_sink, ws_stream, handle.input_tx.clone(), event_rx).await;

    info!(match_id = %handle.id, player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: PlayerId,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut event_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    // Replies meant for this client only
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(16);

    // Spawn writer task: match broadcasts and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                broadcast_msg = event_rx.recv() => match broadcast_msg {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            player_id = %player_id,
                            lagged_count = n,
                            "Client lagged, skipping {} messages", n
                        );
                        // Next snapshot carries the full state again
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %player_id, "Match channel closed");
                        break;
                    }
                },
            };

            let terminal = matches!(
                msg,
                ServerMsg::MatchEnded { .. } | ServerMsg::MatchAborted { .. }
            );
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
            if terminal {
                let _ = ws_sink.send(Message::Close(None)).await;
                break;
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Ping { t }) => {
                        let _ = direct_tx.try_send(ServerMsg::Pong { t });
                    }
                    Ok(client_msg) => {
                        let leaving = matches!(client_msg, ClientMsg::Leave);
                        let input = PlayerInput {
                            player_id,
                            msg: client_msg,
                            received_at: unix_millis(),
                        };

                        if input_tx.send(input).await.is_err() {
                            debug!(player_id = %player_id, "Input channel closed");
                            break;
                        }
                        if leaving {
                            writer_handle.abort();
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        let _ = direct_tx.try_send(ServerMsg::Error {
                            code: "bad_message".to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // A dropped connection counts as leaving
    let _ = input_tx
        .send(PlayerInput {
            player_id,
            msg: ClientMsg::Leave,
            received_at: unix_millis(),
        })
        .await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
