use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::{broadcast, mpsc};

use crate::{
    feed::{drain_pending, NotificationFeed, NotificationSource},
    middleware::{AuthContext, AuthUser},
    state::AppState,
    websocket::connection::SessionSignal,
    websocket::types::{ClientMessage, ErrorPayload, SyncLostPayload, WsMessage},
};

/// WebSocket upgrade handler for the live notification feed
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx, state))
}

/// One connected dashboard session. The task owns the user's feed outright:
/// every refresh, acknowledgement and push happens here, so at most one fetch
/// is in flight per user and no locking is needed.
async fn handle_socket(socket: WebSocket, ctx: AuthContext, state: AppState) {
    let user_id = ctx.user_id;
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<SessionSignal>();

    state.sessions.register(user_id, signal_tx.clone());

    // Change subscription is owned by this task; dropping it on exit is the
    // teardown, after which no event can reach a dead session.
    let mut changes = state.notifications.subscribe();
    let mut feed = NotificationFeed::new(
        state.notifications.clone(),
        state.read_store.clone(),
        ctx.viewer(),
    );

    // Pump outbound messages onto the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    refresh_and_push(&mut feed, &tx).await;

    loop {
        tokio::select! {
            changed = changes.recv() => {
                match changed {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Collapse whatever else queued (including anything
                        // arriving while the last refresh was in flight)
                        // into this one fetch.
                        drain_pending(&mut changes);
                        refresh_and_push(&mut feed, &tx).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!("Change feed closed, ending session for user {}", user_id);
                        break;
                    }
                }
            }
            signal = signal_rx.recv() => {
                match signal {
                    Some(SessionSignal::ReadStateChanged) => {
                        feed.reload_read_state();
                        let _ = tx.send(WsMessage::Feed(feed.snapshot()));
                    }
                    None => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = process_client_message(&text, &mut feed, &tx).await {
                            tracing::error!("Error processing message: {:?}", e);
                            let _ = tx.send(WsMessage::Error(ErrorPayload {
                                message: e.to_string(),
                            }));
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    send_task.abort();
    state.sessions.unregister(&user_id, &signal_tx);
    tracing::info!("WebSocket connection closed for user {}", user_id);
}

async fn refresh_and_push(
    feed: &mut NotificationFeed,
    tx: &mpsc::UnboundedSender<WsMessage>,
) {
    if let Err(e) = feed.refresh().await {
        let _ = tx.send(WsMessage::SyncLost(SyncLostPayload {
            message: e.to_string(),
        }));
    }
    // Pushed even after a failure: the snapshot carries the retained list
    // and reports itself stale.
    let _ = tx.send(WsMessage::Feed(feed.snapshot()));
}

/// Process incoming client messages against the session's feed.
/// Acknowledgements are synchronous local writes; no remote round trip.
async fn process_client_message(
    text: &str,
    feed: &mut NotificationFeed,
    tx: &mpsc::UnboundedSender<WsMessage>,
) -> crate::error::Result<()> {
    let client_msg: ClientMessage = serde_json::from_str(text)
        .map_err(|e| crate::error::AppError::BadRequest(format!("Invalid message format: {}", e)))?;

    match client_msg {
        ClientMessage::MarkRead { id } => {
            feed.mark_read(id)?;
            let _ = tx.send(WsMessage::Feed(feed.snapshot()));
        }
        ClientMessage::MarkAllRead => {
            feed.mark_all_read()?;
            let _ = tx.send(WsMessage::Feed(feed.snapshot()));
        }
        ClientMessage::Refresh => {
            refresh_and_push(feed, tx).await;
        }
    }

    Ok(())
}
