//! Unit Normalizer
//!
//! Converts raw wire records into domain [`TickRecord`]s: resolves the
//! exchange code, divides price fields by the exchange's price multiplier
//! and attaches the instrument descriptor from the lookup.
//!
//! Rescaled fields are exactly the price fields (`ltp`, best bid/ask,
//! `atp`, OHLC, yearly high/low, depth prices and DPR bands). Quantities,
//! counts, timestamps and the compact `change` field pass through as sent.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::application::ports::InstrumentLookup;
use crate::domain::instrument::{Exchange, Instrument};
use crate::domain::streaming::{
    CompactTick, DEPTH_LEVELS, DprTick, ExchangeMessageUpdate, FullSnapQuoteTick, MarketDataTick,
    MarketDepth, MarketStatusUpdate, OpenInterestTick, SnapQuoteTick, TickRecord,
};

use super::codec::DecodeError;
use super::frames::{RawDepth, RawFrame};

/// Default price multiplier (paise to rupees).
pub const DEFAULT_PRICE_MULTIPLIER: u32 = 100;

/// Currency derivatives price multiplier.
pub const CDS_PRICE_MULTIPLIER: u32 = 10_000_000;

// =============================================================================
// Price Multipliers
// =============================================================================

/// Per-exchange price multiplier table.
#[derive(Debug, Clone)]
pub struct PriceMultipliers {
    table: HashMap<Exchange, u32>,
}

impl Default for PriceMultipliers {
    fn default() -> Self {
        let table = Exchange::all()
            .iter()
            .map(|&exchange| {
                let multiplier = match exchange {
                    Exchange::Cds => CDS_PRICE_MULTIPLIER,
                    _ => DEFAULT_PRICE_MULTIPLIER,
                };
                (exchange, multiplier)
            })
            .collect();
        Self { table }
    }
}

impl PriceMultipliers {
    /// Override the multiplier for one exchange. Zero is ignored.
    #[must_use]
    pub fn with_override(mut self, exchange: Exchange, multiplier: u32) -> Self {
        if multiplier > 0 {
            self.table.insert(exchange, multiplier);
        }
        self
    }

    /// Multiplier for an exchange.
    #[must_use]
    pub fn multiplier(&self, exchange: Exchange) -> Decimal {
        Decimal::from(
            self.table
                .get(&exchange)
                .copied()
                .unwrap_or(DEFAULT_PRICE_MULTIPLIER),
        )
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// Raw-to-domain record converter.
#[derive(Clone)]
pub struct UnitNormalizer {
    multipliers: PriceMultipliers,
    lookup: Arc<dyn InstrumentLookup>,
}

impl std::fmt::Debug for UnitNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitNormalizer")
            .field("multipliers", &self.multipliers)
            .finish_non_exhaustive()
    }
}

impl UnitNormalizer {
    /// Create a normalizer with the default multiplier table.
    #[must_use]
    pub fn new(lookup: Arc<dyn InstrumentLookup>) -> Self {
        Self {
            multipliers: PriceMultipliers::default(),
            lookup,
        }
    }

    /// Replace the multiplier table.
    #[must_use]
    pub fn with_multipliers(mut self, multipliers: PriceMultipliers) -> Self {
        self.multipliers = multipliers;
        self
    }

    /// Normalize a raw frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownExchange`] if the exchange code is not
    /// in the code table.
    pub fn normalize(&self, frame: RawFrame) -> Result<TickRecord, DecodeError> {
        let kind = frame.kind();
        let code = frame.exchange_code();
        let exchange =
            Exchange::from_code(code).ok_or(DecodeError::UnknownExchange { kind, code })?;
        let scale = Scale(self.multipliers.multiplier(exchange));

        let record = match frame {
            RawFrame::MarketData(f) => TickRecord::MarketData(MarketDataTick {
                exchange,
                token: f.token,
                instrument: self.enrich(exchange, f.token),
                ltp: scale.price(f.ltp),
                last_trade_time: f.ltt,
                last_trade_quantity: f.ltq,
                volume: f.volume,
                best_bid_price: scale.price(f.best_bid_price),
                best_bid_quantity: f.best_bid_quantity,
                best_ask_price: scale.price(f.best_ask_price),
                best_ask_quantity: f.best_ask_quantity,
                total_buy_quantity: f.total_buy_quantity,
                total_sell_quantity: f.total_sell_quantity,
                atp: scale.price(f.atp),
                exchange_timestamp: f.exchange_timestamp,
                open: scale.price(f.open),
                high: scale.price(f.high),
                low: scale.price(f.low),
                close: scale.price(f.close),
                yearly_high: scale.price(f.yearly_high),
                yearly_low: scale.price(f.yearly_low),
            }),
            RawFrame::Compact(f) => TickRecord::Compact(CompactTick {
                exchange,
                token: f.token,
                instrument: self.enrich(exchange, f.token),
                ltp: scale.price(f.ltp),
                change: f.change,
                exchange_timestamp: f.exchange_timestamp,
                volume: f.volume,
            }),
            RawFrame::SnapQuote(f) => TickRecord::SnapQuote(SnapQuoteTick {
                exchange,
                token: f.token,
                instrument: self.enrich(exchange, f.token),
                depth: scale.depth(&f.depth),
                exchange_timestamp: f.exchange_timestamp,
            }),
            RawFrame::FullSnapQuote(f) => TickRecord::FullSnapQuote(FullSnapQuoteTick {
                exchange,
                token: f.token,
                instrument: self.enrich(exchange, f.token),
                depth: scale.depth(&f.depth),
                atp: scale.price(f.atp),
                open: scale.price(f.open),
                high: scale.price(f.high),
                low: scale.price(f.low),
                close: scale.price(f.close),
                total_buy_quantity: f.total_buy_quantity,
                total_sell_quantity: f.total_sell_quantity,
                volume: f.volume,
            }),
            RawFrame::Dpr(f) => TickRecord::Dpr(DprTick {
                exchange,
                token: f.token,
                instrument: self.enrich(exchange, f.token),
                exchange_timestamp: f.exchange_timestamp,
                high: scale.price(f.high),
                low: scale.price(f.low),
            }),
            RawFrame::OpenInterest(f) => TickRecord::OpenInterest(OpenInterestTick {
                exchange,
                token: f.token,
                instrument: self.enrich(exchange, f.token),
                current_open_interest: f.current_open_interest,
                initial_open_interest: f.initial_open_interest,
                exchange_timestamp: f.exchange_timestamp,
            }),
            RawFrame::MarketStatus(f) => TickRecord::MarketStatus(MarketStatusUpdate {
                exchange,
                market_type: f.market_type,
                status: f.status,
            }),
            RawFrame::ExchangeMessage(f) => TickRecord::ExchangeMessage(ExchangeMessageUpdate {
                exchange,
                message: f.message,
                exchange_timestamp: f.exchange_timestamp,
            }),
        };

        Ok(record)
    }

    fn enrich(&self, exchange: Exchange, token: u32) -> Option<Instrument> {
        self.lookup.instrument_by_token(exchange, token)
    }
}

/// Divisor for one record.
#[derive(Clone, Copy)]
struct Scale(Decimal);

impl Scale {
    fn price(self, raw: u32) -> Decimal {
        (Decimal::from(raw) / self.0).normalize()
    }

    fn levels(self, raw: &[u32; DEPTH_LEVELS]) -> [Decimal; DEPTH_LEVELS] {
        raw.map(|p| self.price(p))
    }

    fn depth(self, raw: &RawDepth) -> MarketDepth {
        MarketDepth {
            buyers: raw.buyers,
            bid_prices: self.levels(&raw.bid_prices),
            bid_quantities: raw.bid_quantities,
            sellers: raw.sellers,
            ask_prices: self.levels(&raw.ask_prices),
            ask_quantities: raw.ask_quantities,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::*;
    use crate::application::ports::MockInstrumentLookup;
    use crate::domain::streaming::FrameKind;
    use crate::infrastructure::alphatrade::frames::{
        RawCompact, RawDpr, RawFullSnapQuote, RawMarketData, RawMarketStatus, RawSnapQuote,
    };

    fn no_lookup() -> Arc<dyn InstrumentLookup> {
        Arc::new(|_: Exchange, _: u32| -> Option<Instrument> { None })
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn nse_market_data_prices_divided_by_hundred() {
        let normalizer = UnitNormalizer::new(no_lookup());
        let raw = RawFrame::MarketData(RawMarketData {
            exchange: 1,
            token: 2885,
            ltp: 150_000,
            ltq: 25,
            volume: 1_000,
            best_bid_price: 149_995,
            best_ask_price: 150_005,
            total_buy_quantity: 77,
            open: 148_000,
            yearly_low: 100_050,
            ..RawMarketData::default()
        });

        let TickRecord::MarketData(tick) = normalizer.normalize(raw).unwrap() else {
            panic!("expected market data");
        };

        assert_eq!(tick.exchange, Exchange::Nse);
        assert_eq!(tick.ltp, dec("1500"));
        assert_eq!(tick.best_bid_price, dec("1499.95"));
        assert_eq!(tick.best_ask_price, dec("1500.05"));
        assert_eq!(tick.open, dec("1480"));
        assert_eq!(tick.yearly_low, dec("1000.5"));
        assert_eq!(tick.last_trade_quantity, 25);
        assert_eq!(tick.volume, 1_000);
        assert_eq!(tick.total_buy_quantity, 77);
    }

    #[test]
    fn mcx_compact_price() {
        let normalizer = UnitNormalizer::new(no_lookup());
        let raw = RawFrame::Compact(RawCompact {
            exchange: 4,
            token: 1,
            ltp: 18_650_000,
            change: 250,
            ..RawCompact::default()
        });

        let TickRecord::Compact(tick) = normalizer.normalize(raw).unwrap() else {
            panic!("expected compact");
        };

        assert_eq!(tick.exchange, Exchange::Mcx);
        assert_eq!(tick.ltp, dec("186500"));
        assert_eq!(tick.change, 250);
    }

    #[test]
    fn cds_uses_ten_million_multiplier() {
        let normalizer = UnitNormalizer::new(no_lookup());
        let raw = RawFrame::Compact(RawCompact {
            exchange: 3,
            token: 1,
            ltp: 825_000_000,
            ..RawCompact::default()
        });

        let record = normalizer.normalize(raw).unwrap();
        assert_eq!(record.exchange(), Exchange::Cds);
        assert_eq!(record.last_price(), Some(dec("82.5")));
    }

    #[test]
    fn depth_prices_rescaled_and_counts_untouched() {
        let normalizer = UnitNormalizer::new(no_lookup());
        let depth = RawDepth {
            buyers: [3, 2, 1, 1, 1],
            bid_prices: [10_000, 9_995, 9_990, 9_985, 9_980],
            bid_quantities: [5, 6, 7, 8, 9],
            sellers: [1, 1, 2, 2, 3],
            ask_prices: [10_005, 10_010, 10_015, 10_020, 10_025],
            ask_quantities: [1, 2, 3, 4, 5],
        };
        let raw = RawFrame::SnapQuote(RawSnapQuote {
            exchange: 1,
            token: 7,
            depth,
            exchange_timestamp: 5,
        });

        let TickRecord::SnapQuote(tick) = normalizer.normalize(raw).unwrap() else {
            panic!("expected snap quote");
        };

        assert_eq!(tick.depth.best_bid(), (dec("100"), 5));
        assert_eq!(tick.depth.best_ask(), (dec("100.05"), 1));
        assert_eq!(tick.depth.bid_prices[4], dec("99.8"));
        assert_eq!(tick.depth.buyers, [3, 2, 1, 1, 1]);
        assert_eq!(tick.depth.ask_quantities, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn full_snap_quote_ohlc_rescaled() {
        let normalizer = UnitNormalizer::new(no_lookup());
        let raw = RawFrame::FullSnapQuote(RawFullSnapQuote {
            exchange: 7,
            token: 1,
            atp: 12_345,
            close: 12_000,
            volume: 9,
            ..RawFullSnapQuote::default()
        });

        let TickRecord::FullSnapQuote(tick) = normalizer.normalize(raw).unwrap() else {
            panic!("expected full snap quote");
        };

        assert_eq!(tick.exchange, Exchange::Bfo);
        assert_eq!(tick.atp, dec("123.45"));
        assert_eq!(tick.close, dec("120"));
        assert_eq!(tick.volume, 9);
    }

    #[test]
    fn dpr_bands_rescaled() {
        let normalizer = UnitNormalizer::new(no_lookup());
        let raw = RawFrame::Dpr(RawDpr {
            exchange: 2,
            token: 35001,
            exchange_timestamp: 1,
            high: 2_000_000,
            low: 1_500_000,
        });

        let TickRecord::Dpr(tick) = normalizer.normalize(raw).unwrap() else {
            panic!("expected dpr");
        };
        assert_eq!(tick.high, dec("20000"));
        assert_eq!(tick.low, dec("15000"));
    }

    #[test]
    fn status_records_have_no_lookup() {
        let mut lookup = MockInstrumentLookup::new();
        lookup.expect_instrument_by_token().never();

        let normalizer = UnitNormalizer::new(Arc::new(lookup));
        let raw = RawFrame::MarketStatus(RawMarketStatus {
            exchange: 6,
            market_type: "NORMAL".to_string(),
            status: "OPEN".to_string(),
        });

        let record = normalizer.normalize(raw).unwrap();
        assert_eq!(record.exchange(), Exchange::Bse);
        assert!(record.instrument().is_none());
    }

    #[test]
    fn known_token_is_enriched() {
        let mut lookup = MockInstrumentLookup::new();
        lookup
            .expect_instrument_by_token()
            .withf(|exchange, token| *exchange == Exchange::Nse && *token == 2885)
            .times(1)
            .returning(|exchange, token| Some(Instrument::new(exchange, token, "RELIANCE-EQ")));

        let normalizer = UnitNormalizer::new(Arc::new(lookup));
        let raw = RawFrame::Compact(RawCompact {
            exchange: 1,
            token: 2885,
            ..RawCompact::default()
        });

        let record = normalizer.normalize(raw).unwrap();
        assert_eq!(record.instrument().unwrap().symbol, "RELIANCE-EQ");
    }

    #[test]
    fn unknown_exchange_rejected() {
        let normalizer = UnitNormalizer::new(no_lookup());
        let raw = RawFrame::Compact(RawCompact {
            exchange: 5,
            ..RawCompact::default()
        });

        assert_eq!(
            normalizer.normalize(raw),
            Err(DecodeError::UnknownExchange {
                kind: FrameKind::Compact,
                code: 5,
            })
        );
    }

    #[test]
    fn multiplier_override() {
        let multipliers = PriceMultipliers::default().with_override(Exchange::Mcx, 10_000);
        let normalizer = UnitNormalizer::new(no_lookup()).with_multipliers(multipliers);
        let raw = RawFrame::Compact(RawCompact {
            exchange: 4,
            ltp: 18_650_000,
            ..RawCompact::default()
        });

        assert_eq!(
            normalizer.normalize(raw).unwrap().last_price(),
            Some(dec("1865"))
        );
    }

    fn known_exchanges() -> impl Strategy<Value = Exchange> {
        proptest::sample::select(Exchange::all().to_vec())
    }

    proptest! {
        #[test]
        fn normalized_price_times_multiplier_is_raw(raw in any::<u32>(), exchange in known_exchanges()) {
            let normalizer = UnitNormalizer::new(no_lookup());
            let frame = RawFrame::Compact(RawCompact {
                exchange: exchange.code(),
                ltp: raw,
                ..RawCompact::default()
            });

            let price = normalizer.normalize(frame).unwrap().last_price().unwrap();
            let multiplier = PriceMultipliers::default().multiplier(exchange);
            prop_assert_eq!(price * multiplier, Decimal::from(raw));
        }
    }
}
