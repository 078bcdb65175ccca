// Agent -> collector transport seam and its WebSocket implementation

use std::future::Future;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

use crate::models::MetricSnapshot;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// An established connection that carries snapshots to the collector.
pub trait Transport: Send {
    fn send(&mut self, snapshot: &MetricSnapshot)
    -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Performs the handshake that yields a [`Transport`].
pub trait Connector: Send + Sync {
    type Conn: Transport;

    fn connect(&self, url: &Url) -> impl Future<Output = anyhow::Result<Self::Conn>> + Send;
}

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects with tokio-tungstenite; `wss://` goes through rustls.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

pub struct WsTransport {
    stream: WsStream,
}

impl Connector for WsConnector {
    type Conn = WsTransport;

    async fn connect(&self, url: &Url) -> anyhow::Result<WsTransport> {
        let (stream, response) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| anyhow::anyhow!("handshake timed out after {:?}", HANDSHAKE_TIMEOUT))??;
        tracing::debug!(status = %response.status(), "websocket handshake complete");
        Ok(WsTransport { stream })
    }
}

impl Transport for WsTransport {
    async fn send(&mut self, snapshot: &MetricSnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_string(snapshot)?;
        tokio::time::timeout(SEND_TIMEOUT, self.stream.send(Message::Text(json.into())))
            .await
            .map_err(|_| anyhow::anyhow!("send timed out after {:?}", SEND_TIMEOUT))??;
        Ok(())
    }
}
