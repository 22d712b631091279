use axum::{
    debug_handler,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::Relay;
use crate::presence::OUTBOX_CAPACITY;

/// A client that accepts no frame for this long is disconnected.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[debug_handler(state = crate::AppState)]
pub async fn relay_ws(
    State(relay): State<Relay>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| serve(relay, stream))
}

async fn serve(relay: Relay, stream: WebSocket) {
    let (outbox, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
    let mut session = match relay.connect(outbox) {
        Ok(session) => session,
        Err(err) => {
            error!(error = %err, "refusing connection");
            return;
        }
    };
    let conn = session.id();
    info!(%conn, "client connected");

    let (mut sender, mut receiver) = stream.split();

    let mut write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    error!(%conn, error = %err, "failed to encode event");
                    continue;
                }
            };
            match tokio::time::timeout(WRITE_TIMEOUT, sender.send(Message::Text(text.into()))).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => break,
                Err(_) => {
                    warn!(%conn, "client stopped reading");
                    break;
                }
            }
        }
    });

    // frames are handled one at a time so a connection's events keep their order
    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => session.handle_frame(text.as_str().as_bytes()).await,
                Some(Ok(Message::Binary(bytes))) => session.handle_frame(&bytes).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%conn, error = %err, "read failed");
                    break;
                }
            },
            _ = &mut write_task => break,
        }
    }

    session.disconnect().await;
    write_task.abort();
    info!(%conn, "client disconnected");
}
