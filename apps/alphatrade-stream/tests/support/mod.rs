//! Scripted in-memory transport shared by the integration tests.
//!
//! Every `connect` hands the test a [`ServerSide`] through a channel. The
//! test pushes inbound frames with it and inspects what the client wrote.
//! Dropping the `ServerSide` ends the stream, which the client sees as a
//! lost connection.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use alphatrade_stream::infrastructure::alphatrade::{
    Connection, Connector, ControlCommand, FrameSink, FrameSource, InboundFrame, OutboundFrame,
    TransportError,
};
use alphatrade_stream::FrameKind;

/// Test side of one accepted connection.
pub struct ServerSide {
    /// URL the client connected to.
    pub url: String,
    inbound: mpsc::UnboundedSender<Result<InboundFrame, TransportError>>,
    written: Arc<Mutex<Vec<OutboundFrame>>>,
}

impl ServerSide {
    /// Deliver a binary frame to the client.
    pub fn push_binary(&self, frame: Vec<u8>) {
        let _ = self.inbound.send(Ok(InboundFrame::Binary(frame)));
    }

    /// Deliver any frame to the client.
    pub fn push(&self, frame: InboundFrame) {
        let _ = self.inbound.send(Ok(frame));
    }

    /// Frames the client wrote on this connection.
    pub fn written(&self) -> Vec<OutboundFrame> {
        self.written.lock().clone()
    }

    /// Control commands the client wrote on this connection.
    pub fn commands(&self) -> Vec<ControlCommand> {
        self.written()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(json) => serde_json::from_str(&json).ok(),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` commands were written.
    pub async fn wait_for_commands(&self, count: usize) -> Vec<ControlCommand> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let commands = self.commands();
                if commands.len() >= count {
                    return commands;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("commands not written in time")
    }
}

/// Connector that serves in-memory connections.
pub struct ScriptedConnector {
    accepted: mpsc::UnboundedSender<ServerSide>,
    failures_left: AtomicUsize,
    write_failures_left: Arc<AtomicUsize>,
    transport_pongs: AtomicBool,
    attempts: AtomicUsize,
    chunk_log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    /// Create a connector and the receiver of accepted connections.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accepted,
            failures_left: AtomicUsize::new(0),
            write_failures_left: Arc::new(AtomicUsize::new(0)),
            transport_pongs: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            chunk_log: Arc::new(Mutex::new(Vec::new())),
        });
        (connector, rx)
    }

    /// Refuse the next `count` connection attempts.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` text writes, on whichever connection is open.
    pub fn fail_next_write(&self, count: usize) {
        self.write_failures_left.store(count, Ordering::SeqCst);
    }

    /// Make new connections report that the transport answers server pings.
    pub fn transport_answers_pings(&self, enabled: bool) {
        self.transport_pongs.store(enabled, Ordering::SeqCst);
    }

    /// Number of connection attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Text frames as written in halves across every connection.
    pub fn chunk_log(&self) -> Vec<String> {
        self.chunk_log.lock().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("refused".to_string()));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let written = Arc::new(Mutex::new(Vec::new()));

        let server = ServerSide {
            url: url.to_string(),
            inbound: inbound_tx,
            written: Arc::clone(&written),
        };
        self.accepted
            .send(server)
            .map_err(|_| TransportError::Other("test harness gone".to_string()))?;

        Ok(Connection {
            sink: Box::new(RecordingSink {
                written,
                chunk_log: Arc::clone(&self.chunk_log),
                failures_left: Arc::clone(&self.write_failures_left),
            }),
            source: Box::new(ChannelSource {
                rx: inbound_rx,
                answers_pings: self.transport_pongs.load(Ordering::SeqCst),
            }),
        })
    }
}

/// Sink that records frames and writes text in two halves with a yield in
/// between, so unserialized writers would interleave.
struct RecordingSink {
    written: Arc<Mutex<Vec<OutboundFrame>>>,
    chunk_log: Arc<Mutex<Vec<String>>>,
    failures_left: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        if let OutboundFrame::Text(json) = &frame {
            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(TransportError::Other("broken pipe".to_string()));
            }

            let mid = json.len() / 2;
            self.chunk_log.lock().push(json[..mid].to_string());
            tokio::task::yield_now().await;
            self.chunk_log.lock().push(json[mid..].to_string());
        }
        self.written.lock().push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<InboundFrame, TransportError>>,
    answers_pings: bool,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        self.rx.recv().await
    }

    fn answers_pings(&self) -> bool {
        self.answers_pings
    }
}

/// Accept the next connection or panic after a timeout.
pub async fn accept(rx: &mut mpsc::UnboundedReceiver<ServerSide>) -> ServerSide {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no connection attempt in time")
        .expect("connector dropped")
}

// =============================================================================
// Frame Builders
// =============================================================================

/// Big-endian frame writer.
#[derive(Default)]
pub struct FrameBuilder {
    buf: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(kind: FrameKind, exchange: u8) -> Self {
        Self {
            buf: vec![kind.tag(), exchange],
        }
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        let len = u16::try_from(s.len()).unwrap();
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Market data frame with the given token and raw last price. Other prices
/// are derived from `ltp`.
pub fn market_data(exchange: u8, token: u32, ltp: u32) -> Vec<u8> {
    FrameBuilder::new(FrameKind::MarketData, exchange)
        .u32(token)
        .u32(ltp)
        .u32(1_700_000_000) // ltt
        .u32(10) // ltq
        .u32(5_000) // volume
        .u32(ltp - 5) // best bid
        .u32(100)
        .u32(ltp + 5) // best ask
        .u32(200)
        .u64(1_000)
        .u64(2_000)
        .u32(ltp) // atp
        .u32(1_700_000_001)
        .u32(ltp) // open
        .u32(ltp + 100) // high
        .u32(ltp - 100) // low
        .u32(ltp) // close
        .u32(ltp * 2) // 52w high
        .u32(ltp / 2) // 52w low
        .build()
}

/// Market status frame.
pub fn market_status(exchange: u8, market_type: &str, status: &str) -> Vec<u8> {
    FrameBuilder::new(FrameKind::MarketStatus, exchange)
        .string(market_type)
        .string(status)
        .build()
}

/// Compact frame.
pub fn compact(exchange: u8, token: u32, ltp: u32) -> Vec<u8> {
    FrameBuilder::new(FrameKind::Compact, exchange)
        .u32(token)
        .u32(ltp)
        .u32(0)
        .u32(1_700_000_000)
        .u32(42)
        .build()
}
