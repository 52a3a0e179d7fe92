//! Market Data Streaming Types
//!
//! Normalized tick records delivered to application callbacks. Prices are
//! decimal currency units and the exchange is resolved to its name; the raw
//! wire representation lives in the infrastructure codec.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::instrument::{Exchange, Instrument};

/// Number of price levels in a depth ladder.
pub const DEPTH_LEVELS: usize = 5;

// =============================================================================
// Frame Kind
// =============================================================================

/// Leading tag byte of every inbound binary frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum FrameKind {
    /// Top of book with OHLC.
    MarketData = 1,
    /// Compact last-price update.
    Compact = 2,
    /// Five-level depth snapshot.
    SnapQuote = 3,
    /// Five-level depth with OHLC and volumes.
    FullSnapQuote = 4,
    /// Spread contract data.
    Spread = 5,
    /// Spread contract depth snapshot.
    SpreadSnapQuote = 6,
    /// Daily price range (circuit limits).
    Dpr = 7,
    /// Open interest update.
    OpenInterest = 8,
    /// Market session status.
    MarketStatus = 9,
    /// Free-text exchange broadcast.
    ExchangeMessage = 10,
}

impl FrameKind {
    /// Resolve a tag byte.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::MarketData),
            2 => Some(Self::Compact),
            3 => Some(Self::SnapQuote),
            4 => Some(Self::FullSnapQuote),
            5 => Some(Self::Spread),
            6 => Some(Self::SpreadSnapQuote),
            7 => Some(Self::Dpr),
            8 => Some(Self::OpenInterest),
            9 => Some(Self::MarketStatus),
            10 => Some(Self::ExchangeMessage),
            _ => None,
        }
    }

    /// Get the tag byte.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Callback slot that receives records of this kind.
    ///
    /// Spread kinds have no slot because their layout is not published.
    #[must_use]
    pub const fn slot(self) -> Option<CallbackSlot> {
        match self {
            Self::MarketData | Self::Compact | Self::SnapQuote | Self::FullSnapQuote => {
                Some(CallbackSlot::Tick)
            }
            Self::Dpr => Some(CallbackSlot::Dpr),
            Self::OpenInterest => Some(CallbackSlot::OpenInterest),
            Self::MarketStatus => Some(CallbackSlot::MarketStatus),
            Self::ExchangeMessage => Some(CallbackSlot::ExchangeMessage),
            Self::Spread | Self::SpreadSnapQuote => None,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarketData => "market_data",
            Self::Compact => "compact",
            Self::SnapQuote => "snap_quote",
            Self::FullSnapQuote => "full_snap_quote",
            Self::Spread => "spread",
            Self::SpreadSnapQuote => "spread_snap_quote",
            Self::Dpr => "dpr",
            Self::OpenInterest => "open_interest",
            Self::MarketStatus => "market_status",
            Self::ExchangeMessage => "exchange_message",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback slot a record is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackSlot {
    /// Market data, compact, snap quote and full snap quote records.
    Tick,
    /// Daily price range records.
    Dpr,
    /// Open interest records.
    OpenInterest,
    /// Market status records.
    MarketStatus,
    /// Exchange message records.
    ExchangeMessage,
}

// =============================================================================
// Depth
// =============================================================================

/// Five-level order book ladder. Index 0 is the best level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketDepth {
    /// Number of buy orders per level.
    pub buyers: [u32; DEPTH_LEVELS],
    /// Bid price per level.
    pub bid_prices: [Decimal; DEPTH_LEVELS],
    /// Bid quantity per level.
    pub bid_quantities: [u32; DEPTH_LEVELS],
    /// Number of sell orders per level.
    pub sellers: [u32; DEPTH_LEVELS],
    /// Ask price per level.
    pub ask_prices: [Decimal; DEPTH_LEVELS],
    /// Ask quantity per level.
    pub ask_quantities: [u32; DEPTH_LEVELS],
}

impl MarketDepth {
    /// Best bid as `(price, quantity)`.
    #[must_use]
    pub const fn best_bid(&self) -> (Decimal, u32) {
        (self.bid_prices[0], self.bid_quantities[0])
    }

    /// Best ask as `(price, quantity)`.
    #[must_use]
    pub const fn best_ask(&self) -> (Decimal, u32) {
        (self.ask_prices[0], self.ask_quantities[0])
    }
}

// =============================================================================
// Records
// =============================================================================

/// Top-of-book market data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketDataTick {
    /// Exchange.
    pub exchange: Exchange,
    /// Instrument token.
    pub token: u32,
    /// Instrument descriptor, when the lookup knows it.
    pub instrument: Option<Instrument>,
    /// Last traded price.
    pub ltp: Decimal,
    /// Last traded time (epoch seconds).
    pub last_trade_time: u32,
    /// Last traded quantity.
    pub last_trade_quantity: u32,
    /// Day volume.
    pub volume: u32,
    /// Best bid price.
    pub best_bid_price: Decimal,
    /// Best bid quantity.
    pub best_bid_quantity: u32,
    /// Best ask price.
    pub best_ask_price: Decimal,
    /// Best ask quantity.
    pub best_ask_quantity: u32,
    /// Total pending buy quantity.
    pub total_buy_quantity: u64,
    /// Total pending sell quantity.
    pub total_sell_quantity: u64,
    /// Average traded price.
    pub atp: Decimal,
    /// Exchange timestamp (epoch seconds).
    pub exchange_timestamp: u32,
    /// Day open.
    pub open: Decimal,
    /// Day high.
    pub high: Decimal,
    /// Day low.
    pub low: Decimal,
    /// Previous close.
    pub close: Decimal,
    /// 52-week high.
    pub yearly_high: Decimal,
    /// 52-week low.
    pub yearly_low: Decimal,
}

/// Compact last-price update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactTick {
    /// Exchange.
    pub exchange: Exchange,
    /// Instrument token.
    pub token: u32,
    /// Instrument descriptor, when the lookup knows it.
    pub instrument: Option<Instrument>,
    /// Last traded price.
    pub ltp: Decimal,
    /// Change as sent by the server (not rescaled).
    pub change: u32,
    /// Exchange timestamp (epoch seconds).
    pub exchange_timestamp: u32,
    /// Day volume.
    pub volume: u32,
}

/// Five-level depth snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapQuoteTick {
    /// Exchange.
    pub exchange: Exchange,
    /// Instrument token.
    pub token: u32,
    /// Instrument descriptor, when the lookup knows it.
    pub instrument: Option<Instrument>,
    /// Depth ladder.
    pub depth: MarketDepth,
    /// Exchange timestamp (epoch seconds).
    pub exchange_timestamp: u32,
}

/// Five-level depth with OHLC and volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullSnapQuoteTick {
    /// Exchange.
    pub exchange: Exchange,
    /// Instrument token.
    pub token: u32,
    /// Instrument descriptor, when the lookup knows it.
    pub instrument: Option<Instrument>,
    /// Depth ladder.
    pub depth: MarketDepth,
    /// Average traded price.
    pub atp: Decimal,
    /// Day open.
    pub open: Decimal,
    /// Day high.
    pub high: Decimal,
    /// Day low.
    pub low: Decimal,
    /// Previous close.
    pub close: Decimal,
    /// Total pending buy quantity.
    pub total_buy_quantity: u64,
    /// Total pending sell quantity.
    pub total_sell_quantity: u64,
    /// Day volume.
    pub volume: u32,
}

/// Daily price range (upper and lower circuit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DprTick {
    /// Exchange.
    pub exchange: Exchange,
    /// Instrument token.
    pub token: u32,
    /// Instrument descriptor, when the lookup knows it.
    pub instrument: Option<Instrument>,
    /// Exchange timestamp (epoch seconds).
    pub exchange_timestamp: u32,
    /// Upper price band.
    pub high: Decimal,
    /// Lower price band.
    pub low: Decimal,
}

/// Open interest update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenInterestTick {
    /// Exchange.
    pub exchange: Exchange,
    /// Instrument token.
    pub token: u32,
    /// Instrument descriptor, when the lookup knows it.
    pub instrument: Option<Instrument>,
    /// Current open interest.
    pub current_open_interest: u8,
    /// Open interest at session start.
    pub initial_open_interest: u8,
    /// Exchange timestamp (epoch seconds).
    pub exchange_timestamp: u32,
}

/// Market session status broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketStatusUpdate {
    /// Exchange.
    pub exchange: Exchange,
    /// Market type, e.g. `NORMAL`.
    pub market_type: String,
    /// Status text, e.g. `OPEN`.
    pub status: String,
}

/// Free-text exchange broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeMessageUpdate {
    /// Exchange.
    pub exchange: Exchange,
    /// Message text.
    pub message: String,
    /// Exchange timestamp (epoch seconds).
    pub exchange_timestamp: u32,
}

/// A normalized record, one variant per decodable frame kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TickRecord {
    /// Market data.
    MarketData(MarketDataTick),
    /// Compact market data.
    Compact(CompactTick),
    /// Snap quote.
    SnapQuote(SnapQuoteTick),
    /// Full snap quote.
    FullSnapQuote(FullSnapQuoteTick),
    /// Daily price range.
    Dpr(DprTick),
    /// Open interest.
    OpenInterest(OpenInterestTick),
    /// Market status.
    MarketStatus(MarketStatusUpdate),
    /// Exchange message.
    ExchangeMessage(ExchangeMessageUpdate),
}

impl TickRecord {
    /// Frame kind this record was decoded from.
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

    /// Exchange of the record.
    #[must_use]
    pub const fn exchange(&self) -> Exchange {
        match self {
            Self::MarketData(t) => t.exchange,
            Self::Compact(t) => t.exchange,
            Self::SnapQuote(t) => t.exchange,
            Self::FullSnapQuote(t) => t.exchange,
            Self::Dpr(t) => t.exchange,
            Self::OpenInterest(t) => t.exchange,
            Self::MarketStatus(t) => t.exchange,
            Self::ExchangeMessage(t) => t.exchange,
        }
    }

    /// Instrument token, absent for market status records.
    #[must_use]
    pub const fn token(&self) -> Option<u32> {
        match self {
            Self::MarketData(t) => Some(t.token),
            Self::Compact(t) => Some(t.token),
            Self::SnapQuote(t) => Some(t.token),
            Self::FullSnapQuote(t) => Some(t.token),
            Self::Dpr(t) => Some(t.token),
            Self::OpenInterest(t) => Some(t.token),
            Self::MarketStatus(_) | Self::ExchangeMessage(_) => None,
        }
    }

    /// Enriched instrument descriptor, if any.
    #[must_use]
    pub const fn instrument(&self) -> Option<&Instrument> {
        match self {
            Self::MarketData(t) => t.instrument.as_ref(),
            Self::Compact(t) => t.instrument.as_ref(),
            Self::SnapQuote(t) => t.instrument.as_ref(),
            Self::FullSnapQuote(t) => t.instrument.as_ref(),
            Self::Dpr(t) => t.instrument.as_ref(),
            Self::OpenInterest(t) => t.instrument.as_ref(),
            Self::MarketStatus(_) | Self::ExchangeMessage(_) => None,
        }
    }

    /// Last traded price for records that carry one.
    #[must_use]
    pub const fn last_price(&self) -> Option<Decimal> {
        match self {
            Self::MarketData(t) => Some(t.ltp),
            Self::Compact(t) => Some(t.ltp),
            _ => None,
        }
    }

    /// Exchange timestamp as UTC, for records that carry one.
    #[must_use]
    pub fn exchange_time(&self) -> Option<DateTime<Utc>> {
        let secs = match self {
            Self::MarketData(t) => t.exchange_timestamp,
            Self::Compact(t) => t.exchange_timestamp,
            Self::SnapQuote(t) => t.exchange_timestamp,
            Self::Dpr(t) => t.exchange_timestamp,
            Self::OpenInterest(t) => t.exchange_timestamp,
            Self::ExchangeMessage(t) => t.exchange_timestamp,
            Self::FullSnapQuote(_) | Self::MarketStatus(_) => return None,
        };
        epoch_seconds_to_utc(secs)
    }
}

/// Convert a wire timestamp (epoch seconds) to UTC.
#[must_use]
pub fn epoch_seconds_to_utc(secs: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(secs), 0)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_kind_tags_round_trip() {
        for tag in 1..=10u8 {
            let kind = FrameKind::from_tag(tag).unwrap();
            assert_eq!(kind.tag(), tag);
        }
        assert_eq!(FrameKind::from_tag(0), None);
        assert_eq!(FrameKind::from_tag(11), None);
    }

    #[test]
    fn quote_kinds_share_tick_slot() {
        for kind in [
            FrameKind::MarketData,
            FrameKind::Compact,
            FrameKind::SnapQuote,
            FrameKind::FullSnapQuote,
        ] {
            assert_eq!(kind.slot(), Some(CallbackSlot::Tick));
        }
        assert_eq!(FrameKind::Dpr.slot(), Some(CallbackSlot::Dpr));
        assert_eq!(
            FrameKind::OpenInterest.slot(),
            Some(CallbackSlot::OpenInterest)
        );
        assert_eq!(
            FrameKind::MarketStatus.slot(),
            Some(CallbackSlot::MarketStatus)
        );
        assert_eq!(
            FrameKind::ExchangeMessage.slot(),
            Some(CallbackSlot::ExchangeMessage)
        );
        assert_eq!(FrameKind::Spread.slot(), None);
        assert_eq!(FrameKind::SpreadSnapQuote.slot(), None);
    }

    #[test]
    fn epoch_conversion() {
        let time = epoch_seconds_to_utc(1_700_000_000).unwrap();
        assert_eq!(time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn record_accessors() {
        let record = TickRecord::Compact(CompactTick {
            exchange: Exchange::Nse,
            token: 22,
            instrument: None,
            ltp: Decimal::new(15_025, 2),
            change: 3,
            exchange_timestamp: 1_700_000_000,
            volume: 10,
        });

        assert_eq!(record.kind(), FrameKind::Compact);
        assert_eq!(record.exchange(), Exchange::Nse);
        assert_eq!(record.token(), Some(22));
        assert_eq!(record.last_price(), Some(Decimal::new(15_025, 2)));
        assert!(record.exchange_time().is_some());
    }

    #[test]
    fn record_serializes_with_kind_tag() {
        let record = TickRecord::MarketStatus(MarketStatusUpdate {
            exchange: Exchange::Nse,
            market_type: "NORMAL".to_string(),
            status: "OPEN".to_string(),
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "market_status");
        assert_eq!(json["exchange"], "NSE");
        assert_eq!(json["status"], "OPEN");
    }
}
