//! Instrument Types
//!
//! Exchange code table, instrument descriptors, and feed modes.
//!
//! # Exchange Codes
//!
//! The quote server identifies exchanges by a single byte on the wire:
//!
//! | Exchange | Code |
//! |----------|------|
//! | NSE      | 1    |
//! | NFO      | 2    |
//! | CDS      | 3    |
//! | MCX      | 4    |
//! | BSE      | 6    |
//! | BFO      | 7    |

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// Exchange
// =============================================================================

/// Exchange segment served by the quote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Exchange {
    /// National Stock Exchange, cash segment.
    Nse = 1,
    /// NSE futures and options.
    Nfo = 2,
    /// NSE currency derivatives.
    Cds = 3,
    /// Multi Commodity Exchange.
    Mcx = 4,
    /// Bombay Stock Exchange, cash segment.
    Bse = 6,
    /// BSE futures and options.
    Bfo = 7,
}

impl Exchange {
    /// Get all exchanges in code order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Nse, Self::Nfo, Self::Cds, Self::Mcx, Self::Bse, Self::Bfo]
    }

    /// Resolve a wire exchange code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Nse),
            2 => Some(Self::Nfo),
            3 => Some(Self::Cds),
            4 => Some(Self::Mcx),
            6 => Some(Self::Bse),
            7 => Some(Self::Bfo),
            _ => None,
        }
    }

    /// Get the wire exchange code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Get the canonical exchange name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nse => "NSE",
            Self::Nfo => "NFO",
            Self::Cds => "CDS",
            Self::Mcx => "MCX",
            Self::Bse => "BSE",
            Self::Bfo => "BFO",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an exchange name is not in the code table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown exchange: {0}")]
pub struct UnknownExchangeName(pub String);

impl FromStr for Exchange {
    type Err = UnknownExchangeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|exchange| exchange.as_str() == upper)
            .ok_or_else(|| UnknownExchangeName(s.to_string()))
    }
}

// =============================================================================
// Instrument
// =============================================================================

/// A tradable instrument as described by the reference data service.
///
/// Identity is `(exchange, token)`; the remaining fields are descriptive and
/// do not take part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange the instrument trades on.
    pub exchange: Exchange,
    /// Exchange-assigned instrument token.
    pub token: u32,
    /// Trading symbol.
    pub symbol: String,
    /// Company or contract name.
    pub name: String,
    /// Contract expiry for derivatives.
    pub expiry: Option<NaiveDate>,
    /// Lot size for derivatives.
    pub lot_size: Option<u32>,
}

impl Instrument {
    /// Create an instrument with no derivative attributes.
    #[must_use]
    pub fn new(exchange: Exchange, token: u32, symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            exchange,
            token,
            name: symbol.clone(),
            symbol,
            expiry: None,
            lot_size: None,
        }
    }

    /// Set the company or contract name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the contract expiry.
    #[must_use]
    pub const fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Set the lot size.
    #[must_use]
    pub const fn with_lot_size(mut self, lot_size: u32) -> Self {
        self.lot_size = Some(lot_size);
        self
    }

    /// Wire target pair `[exchange_code, token]`.
    #[must_use]
    pub const fn target(&self) -> (u8, u32) {
        (self.exchange.code(), self.token)
    }
}

impl PartialEq for Instrument {
    fn eq(&self, other: &Self) -> bool {
        self.exchange == other.exchange && self.token == other.token
    }
}

impl Eq for Instrument {}

impl std::hash::Hash for Instrument {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.exchange.hash(state);
        self.token.hash(state);
    }
}

// =============================================================================
// Feed Mode
// =============================================================================

/// Granularity of market data requested for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeedMode {
    /// Top of book with OHLC and volumes.
    MarketData,
    /// Last price, change and volume only.
    Compact,
    /// Five-level depth.
    SnapQuote,
    /// Five-level depth with OHLC and volumes.
    FullSnapQuote,
}

impl FeedMode {
    /// Get all feed modes.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::MarketData,
            Self::Compact,
            Self::SnapQuote,
            Self::FullSnapQuote,
        ]
    }

    /// Subcommand string used in subscribe/unsubscribe commands.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::MarketData => "marketdata",
            Self::Compact => "compact_marketdata",
            Self::SnapQuote => "snapquote",
            Self::FullSnapQuote => "full_snapquote",
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Error returned when a feed mode name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feed mode: {0}")]
pub struct UnknownFeedMode(pub String);

impl FromStr for FeedMode {
    type Err = UnknownFeedMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "marketdata" | "market_data" => Ok(Self::MarketData),
            "compact" | "compact_marketdata" => Ok(Self::Compact),
            "snapquote" | "snap_quote" => Ok(Self::SnapQuote),
            "full_snapquote" | "full_snap_quote" => Ok(Self::FullSnapQuote),
            _ => Err(UnknownFeedMode(s.to_string())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_case::test_case;

    use super::*;

    #[test_case(1, Exchange::Nse ; "nse")]
    #[test_case(2, Exchange::Nfo ; "nfo")]
    #[test_case(3, Exchange::Cds ; "cds")]
    #[test_case(4, Exchange::Mcx ; "mcx")]
    #[test_case(6, Exchange::Bse ; "bse")]
    #[test_case(7, Exchange::Bfo ; "bfo")]
    fn exchange_code_table(code: u8, expected: Exchange) {
        assert_eq!(Exchange::from_code(code), Some(expected));
        assert_eq!(expected.code(), code);
    }

    #[test]
    fn exchange_unknown_codes() {
        assert_eq!(Exchange::from_code(0), None);
        assert_eq!(Exchange::from_code(5), None);
        assert_eq!(Exchange::from_code(8), None);
    }

    #[test]
    fn exchange_parse_case_insensitive() {
        assert_eq!("nse".parse::<Exchange>(), Ok(Exchange::Nse));
        assert_eq!(" MCX ".parse::<Exchange>(), Ok(Exchange::Mcx));
        assert!("LSE".parse::<Exchange>().is_err());
    }

    #[test]
    fn exchange_serializes_as_name() {
        let json = serde_json::to_string(&Exchange::Cds).unwrap();
        assert_eq!(json, "\"CDS\"");
    }

    #[test]
    fn instrument_identity_is_exchange_and_token() {
        let a = Instrument::new(Exchange::Nse, 2885, "RELIANCE-EQ");
        let b = Instrument::new(Exchange::Nse, 2885, "RELIANCE").with_lot_size(1);
        let c = Instrument::new(Exchange::Bse, 2885, "RELIANCE-EQ");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn instrument_target_pair() {
        let instrument = Instrument::new(Exchange::Mcx, 224_570, "CRUDEOIL");
        assert_eq!(instrument.target(), (4, 224_570));
    }

    #[test_case(FeedMode::MarketData, "marketdata")]
    #[test_case(FeedMode::Compact, "compact_marketdata")]
    #[test_case(FeedMode::SnapQuote, "snapquote")]
    #[test_case(FeedMode::FullSnapQuote, "full_snapquote")]
    fn feed_mode_wire_names(mode: FeedMode, wire: &str) {
        assert_eq!(mode.wire_name(), wire);
        assert_eq!(wire.parse::<FeedMode>(), Ok(mode));
    }

    #[test]
    fn feed_mode_parse_rejects_unknown() {
        assert!("depth".parse::<FeedMode>().is_err());
    }
}
