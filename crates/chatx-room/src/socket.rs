//! Room event socket.
//!
//! [`SocketConnector`] opens the per-room WebSocket and hands back an
//! [`EventSocket`] that yields text frames. [`WsConnector`] is the
//! `tokio-tungstenite` implementation; tests substitute their own.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::trace;

use chatx_core::{ChatExchangeError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens room sockets.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    /// Connect to `url`, presenting `origin` as the `Origin` header.
    async fn connect(&self, url: &str, origin: &str) -> Result<Box<dyn EventSocket>>;
}

/// An open room socket.
#[async_trait]
pub trait EventSocket: Send {
    /// Next text frame. `None` once the peer has closed the socket; an error
    /// also ends the stream.
    async fn next_frame(&mut self) -> Option<Result<String>>;

    /// Close from our side.
    async fn close(&mut self);
}

/// [`SocketConnector`] over `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl SocketConnector for WsConnector {
    async fn connect(&self, url: &str, origin: &str) -> Result<Box<dyn EventSocket>> {
        let mut request = url
            .into_client_request()
            .map_err(|e| ChatExchangeError::Socket(format!("invalid socket url `{url}`: {e}")))?;
        let origin = HeaderValue::from_str(origin)
            .map_err(|e| ChatExchangeError::Socket(format!("invalid origin `{origin}`: {e}")))?;
        let _ = request.headers_mut().insert("Origin", origin);

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| ChatExchangeError::Socket(format!("WebSocket connect: {e}")))?;
        Ok(Box::new(WsSocket { stream }))
    }
}

struct WsSocket {
    stream: WsStream,
}

#[async_trait]
impl EventSocket for WsSocket {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    trace!(?frame, "socket closed by peer");
                    return None;
                }
                // Pings are answered by tungstenite itself.
                Ok(_) => {}
                Err(e) => return Some(Err(ChatExchangeError::Socket(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
