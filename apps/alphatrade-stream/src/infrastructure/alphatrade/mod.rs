//! AlphaTrade Quote Stream Adapters
//!
//! Client for the AlphaTrade binary market data stream:
//!
//! - **Codec**: binary frame decoding and JSON control commands
//! - **Normalizer**: exchange-aware price scaling and enrichment
//! - **Dispatcher**: routes normalized records to callback slots
//! - **Supervisor**: connection lifecycle, heartbeats and reconnects
//! - **Client**: public façade tying the pieces together

pub mod client;
pub mod codec;
pub mod commands;
pub mod dispatcher;
pub mod frames;
pub mod heartbeat;
pub mod normalizer;
pub mod reconnect;
pub mod supervisor;
pub mod transport;

pub use client::{ClientError, StreamClient, StreamClientBuilder};
pub use codec::{CodecError, DecodeError, FrameDecoder, JsonCodec};
pub use commands::{CommandValues, ControlCommand, HEARTBEAT_ACTION};
pub use dispatcher::{DecodeErrorHandler, Dispatcher, TickHandler};
pub use frames::{RawFrame, min_payload_len};
pub use heartbeat::{
    DEFAULT_HEARTBEAT_INTERVAL, HeartbeatConfig, HeartbeatEvent, HeartbeatManager, LinkActivity,
};
pub use normalizer::{
    CDS_PRICE_MULTIPLIER, DEFAULT_PRICE_MULTIPLIER, PriceMultipliers, UnitNormalizer,
};
pub use reconnect::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY, ReconnectConfig, ReconnectPolicy};
pub use supervisor::{
    ConnectionHandlers, ConnectionState, ConnectionSupervisor, ErrorHandler, LifecycleHandler,
    SendError, SupervisorConfig, SupervisorError,
};
pub use transport::{
    Connection, Connector, FrameSink, FrameSource, InboundFrame, OutboundFrame, TransportError,
    WebSocketConnector,
};
