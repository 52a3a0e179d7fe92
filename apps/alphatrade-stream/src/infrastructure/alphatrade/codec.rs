//! Stream Codec Module
//!
//! Provides decoding for inbound binary tick frames and encoding for
//! outbound JSON control commands.
//!
//! - **Inbound**: one-byte kind tag, then a big-endian payload (see
//!   [`frames`](super::frames) for the layouts)
//! - **Outbound**: JSON [`ControlCommand`] envelopes
//!
//! Decoding never panics on malformed input. Every failure is reported as a
//! [`DecodeError`] and the frame is dropped by the caller.

use crate::domain::streaming::{DEPTH_LEVELS, FrameKind};
use crate::domain::subscription::SubscriptionCommand;

use super::commands::ControlCommand;
use super::frames::{
    RawCompact, RawDepth, RawDpr, RawExchangeMessage, RawFrame, RawFullSnapQuote, RawMarketData,
    RawMarketStatus, RawOpenInterest, RawSnapQuote, min_payload_len,
};

// =============================================================================
// Errors
// =============================================================================

/// Per-frame decoding failures. None of them are fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Frame had no bytes at all.
    #[error("empty frame")]
    EmptyFrame,

    /// Tag byte matches no known frame kind.
    #[error("unknown frame kind tag {0}")]
    UnknownKind(u8),

    /// Kind is known but has no published layout.
    #[error("no published layout for {0} frames")]
    Unsupported(FrameKind),

    /// Payload ended before the layout was complete.
    #[error("truncated {kind} frame: need {needed} bytes, have {available}")]
    Truncated {
        /// Frame kind being decoded.
        kind: FrameKind,
        /// Bytes required to continue.
        needed: usize,
        /// Bytes present in the payload.
        available: usize,
    },

    /// Exchange code is not in the code table.
    #[error("unknown exchange code {code} in {kind} frame")]
    UnknownExchange {
        /// Frame kind being normalized.
        kind: FrameKind,
        /// Offending code.
        code: u8,
    },
}

impl DecodeError {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::EmptyFrame => "empty",
            Self::UnknownKind(_) => "unknown_kind",
            Self::Unsupported(_) => "unsupported",
            Self::Truncated { .. } => "truncated",
            Self::UnknownExchange { .. } => "unknown_exchange",
        }
    }
}

/// Codec errors for outbound commands.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Byte Reader
// =============================================================================

/// Bounds-checked big-endian cursor over a frame payload.
struct ByteReader<'a> {
    kind: FrameKind,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    const fn new(kind: FrameKind, buf: &'a [u8]) -> Self {
        Self { kind, buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.saturating_add(len);
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or(DecodeError::Truncated {
                kind: self.kind,
                needed: end,
                available: self.buf.len(),
            })?;
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn levels(&mut self) -> Result<[u32; DEPTH_LEVELS], DecodeError> {
        let mut levels = [0u32; DEPTH_LEVELS];
        for level in &mut levels {
            *level = self.u32()?;
        }
        Ok(levels)
    }

    fn depth(&mut self) -> Result<RawDepth, DecodeError> {
        Ok(RawDepth {
            buyers: self.levels()?,
            bid_prices: self.levels()?,
            bid_quantities: self.levels()?,
            sellers: self.levels()?,
            ask_prices: self.levels()?,
            ask_quantities: self.levels()?,
        })
    }

    /// u16 length followed by that many bytes; invalid UTF-8 is replaced.
    fn string(&mut self) -> Result<String, DecodeError> {
        let len = usize::from(self.u16()?);
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

// =============================================================================
// Frame Decoder
// =============================================================================

/// Stateless decoder for inbound binary frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a new decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Split off the tag byte and decode the rest of the frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::EmptyFrame`] for an empty slice,
    /// [`DecodeError::UnknownKind`] for an unknown tag, and any error from
    /// [`decode`](Self::decode).
    pub fn decode_frame(&self, raw: &[u8]) -> Result<RawFrame, DecodeError> {
        let (&tag, payload) = raw.split_first().ok_or(DecodeError::EmptyFrame)?;
        let kind = FrameKind::from_tag(tag).ok_or(DecodeError::UnknownKind(tag))?;
        self.decode(kind, payload)
    }

    /// Decode a payload (tag byte excluded) of the given kind.
    ///
    /// Trailing bytes beyond the layout are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if the payload is shorter than the
    /// layout requires and [`DecodeError::Unsupported`] for spread kinds.
    pub fn decode(&self, kind: FrameKind, payload: &[u8]) -> Result<RawFrame, DecodeError> {
        let Some(min_len) = min_payload_len(kind) else {
            return Err(DecodeError::Unsupported(kind));
        };

        if payload.len() < min_len {
            return Err(DecodeError::Truncated {
                kind,
                needed: min_len,
                available: payload.len(),
            });
        }

        let mut r = ByteReader::new(kind, payload);

        let frame = match kind {
            FrameKind::MarketData => RawFrame::MarketData(RawMarketData {
                exchange: r.u8()?,
                token: r.u32()?,
                ltp: r.u32()?,
                ltt: r.u32()?,
                ltq: r.u32()?,
                volume: r.u32()?,
                best_bid_price: r.u32()?,
                best_bid_quantity: r.u32()?,
                best_ask_price: r.u32()?,
                best_ask_quantity: r.u32()?,
                total_buy_quantity: r.u64()?,
                total_sell_quantity: r.u64()?,
                atp: r.u32()?,
                exchange_timestamp: r.u32()?,
                open: r.u32()?,
                high: r.u32()?,
                low: r.u32()?,
                close: r.u32()?,
                yearly_high: r.u32()?,
                yearly_low: r.u32()?,
            }),
            FrameKind::Compact => RawFrame::Compact(RawCompact {
                exchange: r.u8()?,
                token: r.u32()?,
                ltp: r.u32()?,
                change: r.u32()?,
                exchange_timestamp: r.u32()?,
                volume: r.u32()?,
            }),
            FrameKind::SnapQuote => RawFrame::SnapQuote(RawSnapQuote {
                exchange: r.u8()?,
                token: r.u32()?,
                depth: r.depth()?,
                exchange_timestamp: r.u32()?,
            }),
            FrameKind::FullSnapQuote => RawFrame::FullSnapQuote(RawFullSnapQuote {
                exchange: r.u8()?,
                token: r.u32()?,
                depth: r.depth()?,
                atp: r.u32()?,
                open: r.u32()?,
                high: r.u32()?,
                low: r.u32()?,
                close: r.u32()?,
                total_buy_quantity: r.u64()?,
                total_sell_quantity: r.u64()?,
                volume: r.u32()?,
            }),
            FrameKind::Dpr => RawFrame::Dpr(RawDpr {
                exchange: r.u8()?,
                token: r.u32()?,
                exchange_timestamp: r.u32()?,
                high: r.u32()?,
                low: r.u32()?,
            }),
            FrameKind::OpenInterest => RawFrame::OpenInterest(RawOpenInterest {
                exchange: r.u8()?,
                token: r.u32()?,
                current_open_interest: r.u8()?,
                initial_open_interest: r.u8()?,
                exchange_timestamp: r.u32()?,
            }),
            FrameKind::MarketStatus => RawFrame::MarketStatus(RawMarketStatus {
                exchange: r.u8()?,
                market_type: r.string()?,
                status: r.string()?,
            }),
            FrameKind::ExchangeMessage => RawFrame::ExchangeMessage(RawExchangeMessage {
                exchange: r.u8()?,
                message: r.string()?,
                exchange_timestamp: r.u32()?,
            }),
            FrameKind::Spread | FrameKind::SpreadSnapQuote => {
                return Err(DecodeError::Unsupported(kind));
            }
        };

        Ok(frame)
    }
}

// =============================================================================
// JSON Command Codec
// =============================================================================

/// JSON codec for outbound control commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a subscription command.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_command(&self, command: &SubscriptionCommand) -> Result<String, CodecError> {
        self.encode(&ControlCommand::from(command))
    }

    /// Encode the heartbeat payload.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_heartbeat(&self) -> Result<String, CodecError> {
        self.encode(&ControlCommand::heartbeat())
    }

    /// Encode a value to JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

// =============================================================================
// Tests
// =============================================================================
