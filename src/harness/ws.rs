// src/harness/ws.rs
// WebSocket connection handling for probes

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::expectation::Observation;
use crate::error::{ProbeError, ProbeResult};

/// A live bidirectional text channel to the system under test
#[async_trait]
pub trait Channel: Send {
    /// Send one text frame
    async fn send_text(&mut self, text: String) -> ProbeResult<()>;

    /// Wait for the next text frame. `Ok(None)` means the peer closed.
    async fn recv_text(&mut self) -> ProbeResult<Option<String>>;

    async fn close(&mut self) -> ProbeResult<()>;
}

/// Opens channels; the runner owns whatever it returns
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str, timeout: Duration) -> ProbeResult<Box<dyn Channel>>;
}

/// Send a JSON value as one text frame
pub async fn send_json(channel: &mut dyn Channel, message: &serde_json::Value) -> ProbeResult<Observation> {
    let text = serde_json::to_string(message).map_err(|e| ProbeError::Decode(e.to_string()))?;
    channel.send_text(text).await?;
    Ok(Observation::Sent)
}

/// Await one message, bounded by `timeout`. Expiry is an observation, not an error.
pub async fn receive(channel: &mut dyn Channel, timeout: Duration) -> ProbeResult<Observation> {
    match tokio::time::timeout(timeout, channel.recv_text()).await {
        Ok(Ok(Some(text))) => Ok(Observation::Message(text)),
        Ok(Ok(None)) => Err(ProbeError::connection("connection closed before a message arrived")),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            debug!("[ws] no message within {:?}", timeout);
            Ok(Observation::Silence)
        }
    }
}

/// tokio-tungstenite backed connector
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str, timeout: Duration) -> ProbeResult<Box<dyn Channel>> {
        info!("[ws] Connecting to {}", url);

        let (stream, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        info!("[ws] Connected to {}", url);
        Ok(Box::new(WsChannel { stream, closed: false }))
    }
}

pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl Channel for WsChannel {
    async fn send_text(&mut self, text: String) -> ProbeResult<()> {
        debug!("[ws] -> {}", text);
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> ProbeResult<Option<String>> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                Message::Text(text) => {
                    debug!("[ws] <- {}", text.as_str());
                    return Ok(Some(text.to_string()));
                }
                Message::Binary(data) => {
                    return Ok(Some(String::from_utf8_lossy(&data).into_owned()));
                }
                Message::Close(_) => {
                    self.closed = true;
                    return Ok(None);
                }
                // Ping replies are queued by tungstenite itself
                _ => {}
            }
        }
        self.closed = true;
        Ok(None)
    }

    async fn close(&mut self) -> ProbeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            warn!("[ws] close handshake failed: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}
