//! WebSocket transport for the connection manager.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::connection::{Channel, ChannelEvent, Connector};
use crate::error::{Error, Result};

/// Opens `ws://` / `wss://` channels with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Channel>> {
        let (stream, response) = connect_async(endpoint)
            .await
            .map_err(|e| Error::Connect(format!("{}: {}", endpoint, e)))?;
        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketChannel {
            stream,
            closed: false,
        }))
    }
}

struct WebSocketChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl Channel for WebSocketChannel {
    async fn next_event(&mut self) -> ChannelEvent {
        if self.closed {
            return ChannelEvent::Closed;
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return ChannelEvent::Message(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return ChannelEvent::Message(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.closed = true;
                    return ChannelEvent::Closed;
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    // The stream reports the close on the next call
                    self.closed = true;
                    return ChannelEvent::Error(e.to_string());
                }
            }
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.stream.close(None).await {
                debug!("WebSocket close failed: {}", e);
            }
        }
    }
}
