//! WebSocket Transport
//!
//! Frame-level abstraction over the socket so the connection supervisor can
//! be driven by the real WebSocket client or by a scripted connector in
//! tests.
//!
//! - [`Connector`]: opens a connection and returns its two halves
//! - [`FrameSink`]: write half (text commands, ping, pong)
//! - [`FrameSource`]: read half (binary ticks, control frames)

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

// =============================================================================
// Frames and Errors
// =============================================================================

/// Frame written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON control command.
    Text(String),
    /// Ping with payload.
    Ping(Vec<u8>),
    /// Pong echoing a server ping.
    Pong(Vec<u8>),
}

impl OutboundFrame {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
        }
    }
}

/// Frame read from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Binary tick frame.
    Binary(Vec<u8>),
    /// Text frame (server notices).
    Text(String),
    /// Server ping.
    Ping(Vec<u8>),
    /// Server pong.
    Pong(Vec<u8>),
    /// Close frame.
    Close,
}

/// Transport failures. Every variant ends the current connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// WebSocket protocol or I/O error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Peer closed the connection.
    #[error("connection closed")]
    Closed,

    /// Other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Short label used in metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::WebSocket(_) => "websocket",
            Self::Closed => "closed",
            Self::Other(_) => "other",
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one frame. A frame is either written whole or not at all.
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), TransportError>;

    /// Close the write half.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>>;

    /// Whether the transport queues its own pong for every server ping.
    ///
    /// When `false`, the supervisor writes an [`OutboundFrame::Pong`] for each
    /// [`InboundFrame::Ping`] it reads.
    fn answers_pings(&self) -> bool {
        false
    }
}

/// An open connection split into halves.
pub struct Connection {
    /// Write half.
    pub sink: Box<dyn FrameSink>,
    /// Read half.
    pub source: Box<dyn FrameSource>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url`.
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

// =============================================================================
// WebSocket Implementation
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(url).await?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();
        Ok(Connection {
            sink: Box::new(WebSocketSink(write)),
            source: Box::new(WebSocketSource(read)),
        })
    }
}

struct WebSocketSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text.into()),
            OutboundFrame::Ping(data) => Message::Ping(data.into()),
            OutboundFrame::Pong(data) => Message::Pong(data.into()),
        };
        self.0.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0.close().await?;
        Ok(())
    }
}

struct WebSocketSource(SplitStream<WsStream>);

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        loop {
            let frame = match self.0.next().await? {
                Ok(Message::Binary(data)) => InboundFrame::Binary(data.to_vec()),
                Ok(Message::Text(text)) => InboundFrame::Text(text.to_string()),
                Ok(Message::Ping(data)) => InboundFrame::Ping(data.to_vec()),
                Ok(Message::Pong(data)) => InboundFrame::Pong(data.to_vec()),
                Ok(Message::Close(_)) => InboundFrame::Close,
                // Raw frames are not surfaced by the reader.
                Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            };
            return Some(Ok(frame));
        }
    }

    // tungstenite queues the pong itself and flushes it with the next I/O.
    fn answers_pings(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_labels() {
        assert_eq!(OutboundFrame::Text(String::new()).label(), "text");
        assert_eq!(OutboundFrame::Ping(vec![]).label(), "ping");
        assert_eq!(OutboundFrame::Pong(vec![]).label(), "pong");
    }

    #[test]
    fn error_kinds() {
        assert_eq!(TransportError::Closed.kind(), "closed");
        assert_eq!(TransportError::Connect("refused".into()).kind(), "connect");
        assert_eq!(
            TransportError::Closed.to_string(),
            "connection closed".to_string()
        );
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        let result = WebSocketConnector.connect("ws://127.0.0.1:1/").await;
        assert!(result.is_err());
    }
}
