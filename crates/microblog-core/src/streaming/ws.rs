use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::channel::{PushConnection, PushConnector};
use crate::error::ChannelError;

/// WebSocket transport for the push channel
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl PushConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn PushConnection>, ChannelError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ChannelError::Connect(format!("WebSocket connect failed: {}", e)))?;
        tracing::debug!("WebSocket handshake with {}: {}", url, response.status());
        Ok(Box::new(WsConnection {
            stream,
            finished: false,
        }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Set after a close frame or a read error; later reads report end of stream
    finished: bool,
}

#[async_trait]
impl PushConnection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<String, ChannelError>> {
        if self.finished {
            return None;
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()));
                }
                // Pings are answered by tungstenite itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("WebSocket closed by peer: {:?}", frame);
                    self.finished = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(ChannelError::Transport(e.to_string())));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("Error closing WebSocket: {}", e);
        }
        self.finished = true;
    }
}
