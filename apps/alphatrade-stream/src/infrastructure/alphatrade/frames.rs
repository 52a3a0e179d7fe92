//! AlphaTrade Binary Frame Types
//!
//! Raw records exactly as they appear on the wire, before unit
//! normalization. Every frame starts with a one-byte kind tag followed by a
//! fixed or length-prefixed payload. All integers are big-endian.
//!
//! # Payload Layouts
//!
//! | Tag | Record          | Payload bytes |
//! |-----|-----------------|---------------|
//! | 1   | Market data     | 85            |
//! | 2   | Compact         | 21            |
//! | 3   | Snap quote      | 129           |
//! | 4   | Full snap quote | 165           |
//! | 7   | DPR             | 17            |
//! | 8   | Open interest   | 11            |
//! | 9   | Market status   | 5 + strings   |
//! | 10  | Exchange message| 7 + string    |

use crate::domain::streaming::{DEPTH_LEVELS, FrameKind};

/// Depth ladder as six arrays of raw integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawDepth {
    /// Number of buy orders per level.
    pub buyers: [u32; DEPTH_LEVELS],
    /// Bid price per level.
    pub bid_prices: [u32; DEPTH_LEVELS],
    /// Bid quantity per level.
    pub bid_quantities: [u32; DEPTH_LEVELS],
    /// Number of sell orders per level.
    pub sellers: [u32; DEPTH_LEVELS],
    /// Ask price per level.
    pub ask_prices: [u32; DEPTH_LEVELS],
    /// Ask quantity per level.
    pub ask_quantities: [u32; DEPTH_LEVELS],
}

/// Tag 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawMarketData {
    pub exchange: u8,
    pub token: u32,
    pub ltp: u32,
    pub ltt: u32,
    pub ltq: u32,
    pub volume: u32,
    pub best_bid_price: u32,
    pub best_bid_quantity: u32,
    pub best_ask_price: u32,
    pub best_ask_quantity: u32,
    pub total_buy_quantity: u64,
    pub total_sell_quantity: u64,
    pub atp: u32,
    pub exchange_timestamp: u32,
    pub open: u32,
    pub high: u32,
    pub low: u32,
    pub close: u32,
    pub yearly_high: u32,
    pub yearly_low: u32,
}

/// Tag 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawCompact {
    pub exchange: u8,
    pub token: u32,
    pub ltp: u32,
    pub change: u32,
    pub exchange_timestamp: u32,
    pub volume: u32,
}

/// Tag 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawSnapQuote {
    pub exchange: u8,
    pub token: u32,
    pub depth: RawDepth,
    pub exchange_timestamp: u32,
}

/// Tag 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawFullSnapQuote {
    pub exchange: u8,
    pub token: u32,
    pub depth: RawDepth,
    pub atp: u32,
    pub open: u32,
    pub high: u32,
    pub low: u32,
    pub close: u32,
    pub total_buy_quantity: u64,
    pub total_sell_quantity: u64,
    pub volume: u32,
}

/// Tag 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawDpr {
    pub exchange: u8,
    pub token: u32,
    pub exchange_timestamp: u32,
    pub high: u32,
    pub low: u32,
}

/// Tag 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawOpenInterest {
    pub exchange: u8,
    pub token: u32,
    pub current_open_interest: u8,
    pub initial_open_interest: u8,
    pub exchange_timestamp: u32,
}

/// Tag 9.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawMarketStatus {
    pub exchange: u8,
    pub market_type: String,
    pub status: String,
}

/// Tag 10.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawExchangeMessage {
    pub exchange: u8,
    pub message: String,
    pub exchange_timestamp: u32,
}

/// A decoded but not yet normalized frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RawFrame {
    MarketData(RawMarketData),
    Compact(RawCompact),
    SnapQuote(RawSnapQuote),
    FullSnapQuote(RawFullSnapQuote),
    Dpr(RawDpr),
    OpenInterest(RawOpenInterest),
    MarketStatus(RawMarketStatus),
    ExchangeMessage(RawExchangeMessage),
}

impl RawFrame {
    /// Frame kind of the record.
    #[must_use]
    pub const fn kind(&self) -> FrameKind {
        match self {
            Self::MarketData(_) => FrameKind::MarketData,
            Self::Compact(_) => FrameKind::Compact,
            Self::SnapQuote(_) => FrameKind::SnapQuote,
            Self::FullSnapQuote(_) => FrameKind::FullSnapQuote,
            Self::Dpr(_) => FrameKind::Dpr,
            Self::OpenInterest(_) => FrameKind::OpenInterest,
            Self::MarketStatus(_) => FrameKind::MarketStatus,
            Self::ExchangeMessage(_) => FrameKind::ExchangeMessage,
        }
    }

    /// Raw exchange code.
    #[must_use]
    pub const fn exchange_code(&self) -> u8 {
        match self {
            Self::MarketData(f) => f.exchange,
            Self::Compact(f) => f.exchange,
            Self::SnapQuote(f) => f.exchange,
            Self::FullSnapQuote(f) => f.exchange,
            Self::Dpr(f) => f.exchange,
            Self::OpenInterest(f) => f.exchange,
            Self::MarketStatus(f) => f.exchange,
            Self::ExchangeMessage(f) => f.exchange,
        }
    }
}

/// Minimum payload length (tag byte excluded) for a kind, if it has a layout.
#[must_use]
pub const fn min_payload_len(kind: FrameKind) -> Option<usize> {
    match kind {
        FrameKind::MarketData => Some(85),
        FrameKind::Compact => Some(21),
        FrameKind::SnapQuote => Some(129),
        FrameKind::FullSnapQuote => Some(165),
        FrameKind::Dpr => Some(17),
        FrameKind::OpenInterest => Some(11),
        FrameKind::MarketStatus => Some(5),
        FrameKind::ExchangeMessage => Some(7),
        FrameKind::Spread | FrameKind::SpreadSnapQuote => None,
    }
}
