// Agent connections: one task per socket, bound to one registered client id

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at, timeout};

use super::{ApiError, AppState};
use crate::models::MetricSnapshot;
use crate::registry::{Binding, ClientRegistry};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub(super) struct WsQuery {
    id: Option<String>,
}

/// WS /ws?id=<client id>. Unknown ids are rejected before the upgrade.
pub(super) async fn ws_client(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    let Some(id) = q.id.filter(|id| !id.is_empty()) else {
        return ApiError::BadRequest("missing client id".into()).into_response();
    };
    if !state.registry.contains(&id).await {
        tracing::info!(client_id = %id, "rejecting connection for unregistered client id");
        return ApiError::BadRequest("unregistered client id".into()).into_response();
    }
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = serve_client(socket, registry, id).await {
            tracing::info!("client stream error: {}", e);
        }
    })
}

enum Inbound {
    Snapshot(MetricSnapshot),
    Ignore,
    Closed,
}

fn decode(msg: Message) -> anyhow::Result<Inbound> {
    Ok(match msg {
        Message::Text(text) => Inbound::Snapshot(serde_json::from_str(text.as_str())?),
        Message::Binary(data) => Inbound::Snapshot(serde_json::from_slice(&data)?),
        Message::Ping(_) | Message::Pong(_) => Inbound::Ignore,
        Message::Close(_) => Inbound::Closed,
    })
}

/// Read loop for one agent. Whatever ends the loop, the binding is released,
/// which marks the record disconnected with zeroed metrics unless a newer
/// connection already owns the id.
async fn serve_client(mut socket: WebSocket, registry: Arc<ClientRegistry>, id: String) -> anyhow::Result<()> {
    let Some(Binding { serial, mut closed }) = registry.bind(&id, chrono::Utc::now()).await else {
        // deregistered between the handshake check and the upgrade
        let _ = socket.send(Message::Close(None)).await;
        return Ok(());
    };
    tracing::info!(client_id = %id, serial, "client connected");

    let result = read_loop(&mut socket, &registry, &id, serial, &mut closed).await;

    if registry.release(&id, serial).await {
        tracing::info!(client_id = %id, serial, "client disconnected");
    } else {
        tracing::debug!(client_id = %id, serial, "connection closed after being replaced or removed");
    }
    let _ = timeout(WS_SEND_TIMEOUT, socket.send(Message::Close(None))).await;
    result
}

async fn read_loop(
    socket: &mut WebSocket,
    registry: &ClientRegistry,
    id: &str,
    serial: u64,
    closed: &mut tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let mut ping_interval = interval_at(Instant::now() + WS_PING_INTERVAL, WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { return Ok(()) };
                match decode(msg?)? {
                    Inbound::Snapshot(snapshot) => {
                        if !registry.report(id, serial, snapshot, chrono::Utc::now()).await {
                            return Ok(());
                        }
                    }
                    Inbound::Ignore => {}
                    Inbound::Closed => return Ok(()),
                }
            }
            _ = &mut *closed => {
                tracing::debug!(client_id = %id, serial, "connection closed by registry");
                return Ok(());
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    return Ok(());
                }
            }
        }
    }
}
