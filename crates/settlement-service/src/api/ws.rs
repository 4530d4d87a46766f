//! The `/ws/orders` live-update socket. A client subscribes once per
//! connection under `(actorType, actorId)`; after that it only receives
//! `order_event` frames the fabric addresses to it, plus a periodic `ping`
//! it's expected to answer with `pong` to keep the connection alive.

use {
    super::{AppState, parse_actor_type},
    axum::extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    database::types::ActorType,
    engine::subscription::OutboundMessage,
    serde::Deserialize,
    std::{sync::Arc, time::Duration},
};

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundMessage {
    Subscribe { actor_type: String, actor_id: uuid::Uuid },
    Pong,
}

pub async fn handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> axum::response::Response {
    ws.on_upgrade(move |socket| run(socket, state))
}

async fn run(mut socket: WebSocket, state: Arc<AppState>) {
    let Some((actor_type, actor_id)) = await_subscription(&mut socket).await else {
        return;
    };

    let mut events = state.fabric.subscribe(actor_type, actor_id);
    let subscribed = OutboundMessage::Subscribed { actor_type, actor_id };
    if send(&mut socket, &subscribed).await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(PING_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { return };
                if send(&mut socket, &event).await.is_err() {
                    return;
                }
            }
            _ = ticker.tick() => {
                if send(&mut socket, &OutboundMessage::Ping).await.is_err() {
                    return;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) | Some(Err(_)) => {}
                }
            }
        }
    }
}

/// Blocks until the client sends a well-formed `subscribe` frame, dropping
/// the connection on anything else. One subscription per socket; there's no
/// re-subscribe handshake.
async fn await_subscription(socket: &mut WebSocket) -> Option<(ActorType, uuid::Uuid)> {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let Ok(InboundMessage::Subscribe { actor_type, actor_id }) = serde_json::from_str(&text) else { continue };
        let Some(actor_type) = parse_actor_type(&actor_type) else { continue };
        return Some((actor_type, actor_id));
    }
    None
}

async fn send(socket: &mut WebSocket, message: &OutboundMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).expect("OutboundMessage always serializes");
    socket.send(Message::Text(text.into())).await
}
