//! tokio-tungstenite implementation of the alert stream seam.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use vigil_core::effects::{AlertStream, AlertStreamConnector};
use vigil_core::{Result, VigilError};

/// Production connector over tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertStreamConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn AlertStream>> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| VigilError::connection_closed(e.to_string()))?;
        debug!(status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsStream { inner: stream }))
    }
}

struct WsStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl AlertStream for WsStream {
    async fn next_message(&mut self) -> Option<String> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => return Some(text),
                    Err(_) => warn!("binary stream frame is not UTF-8; skipping"),
                },
                // tungstenite queues the pong reply itself on the next read
                // or write.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(_)) => return None,
                Err(error) => {
                    warn!(%error, "websocket receive failed");
                    return None;
                }
            }
        }
    }
}
