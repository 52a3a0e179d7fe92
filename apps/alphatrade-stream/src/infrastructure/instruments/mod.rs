//! Instrument Catalog
//!
//! In-memory reference data indexed by `(exchange, token)` and
//! `(exchange, symbol)`. Implements [`InstrumentLookup`] so a loaded catalog
//! can enrich decoded records directly.
//!
//! Downloading the master contract is left to the caller; the catalog only
//! indexes what it is given.

use std::collections::HashMap;

use crate::application::ports::InstrumentLookup;
use crate::domain::instrument::{Exchange, Instrument};

/// Errors raised when loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Input was not a JSON array of instruments.
    #[error("invalid instrument JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Instrument reference data indexed for lookup.
#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    by_token: HashMap<(Exchange, u32), Instrument>,
    by_symbol: HashMap<(Exchange, String), u32>,
}

impl InstrumentCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON array of instruments.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Json`] if the input does not parse.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let instruments: Vec<Instrument> = serde_json::from_str(json)?;
        Ok(instruments.into_iter().collect())
    }

    /// Add or replace an instrument. Returns the previous entry for the same
    /// `(exchange, token)`.
    pub fn insert(&mut self, instrument: Instrument) -> Option<Instrument> {
        let key = (instrument.exchange, instrument.token);
        let previous = self.by_token.insert(key, instrument.clone());
        if let Some(old) = &previous {
            self.by_symbol
                .remove(&(old.exchange, old.symbol.to_uppercase()));
        }
        self.by_symbol.insert(
            (instrument.exchange, instrument.symbol.to_uppercase()),
            instrument.token,
        );
        previous
    }

    /// Find an instrument by exchange token.
    #[must_use]
    pub fn by_token(&self, exchange: Exchange, token: u32) -> Option<&Instrument> {
        self.by_token.get(&(exchange, token))
    }

    /// Find an instrument by trading symbol, case-insensitively.
    #[must_use]
    pub fn by_symbol(&self, exchange: Exchange, symbol: &str) -> Option<&Instrument> {
        let token = self
            .by_symbol
            .get(&(exchange, symbol.trim().to_uppercase()))?;
        self.by_token(exchange, *token)
    }

    /// Instruments listed on an exchange, in no particular order.
    pub fn on_exchange(&self, exchange: Exchange) -> impl Iterator<Item = &Instrument> {
        self.by_token
            .values()
            .filter(move |instrument| instrument.exchange == exchange)
    }

    /// Number of instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

impl FromIterator<Instrument> for InstrumentCatalog {
    fn from_iter<I: IntoIterator<Item = Instrument>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for instrument in iter {
            catalog.insert(instrument);
        }
        catalog
    }
}

impl InstrumentLookup for InstrumentCatalog {
    fn instrument_by_token(&self, exchange: Exchange, token: u32) -> Option<Instrument> {
        self.by_token(exchange, token).cloned()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn catalog() -> InstrumentCatalog {
        [
            Instrument::new(Exchange::Nse, 2885, "RELIANCE-EQ").with_name("RELIANCE INDUSTRIES"),
            Instrument::new(Exchange::Bse, 500_325, "RELIANCE"),
            Instrument::new(Exchange::Nfo, 35_001, "NIFTY24DECFUT")
                .with_expiry(NaiveDate::from_ymd_opt(2024, 12, 26).unwrap())
                .with_lot_size(25),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn lookup_by_token() {
        let catalog = catalog();
        let found = catalog.by_token(Exchange::Nse, 2885).unwrap();
        assert_eq!(found.name, "RELIANCE INDUSTRIES");
        assert!(catalog.by_token(Exchange::Bse, 2885).is_none());
    }

    #[test]
    fn lookup_by_symbol_ignores_case() {
        let catalog = catalog();
        let found = catalog.by_symbol(Exchange::Nfo, " nifty24decfut ").unwrap();
        assert_eq!(found.token, 35_001);
        assert_eq!(found.lot_size, Some(25));
        assert!(catalog.by_symbol(Exchange::Nse, "NIFTY24DECFUT").is_none());
    }

    #[test]
    fn insert_replaces_symbol_index() {
        let mut catalog = catalog();
        let previous = catalog.insert(Instrument::new(Exchange::Nse, 2885, "RIL"));

        assert_eq!(previous.map(|i| i.symbol), Some("RELIANCE-EQ".to_string()));
        assert!(catalog.by_symbol(Exchange::Nse, "RELIANCE-EQ").is_none());
        assert_eq!(catalog.by_symbol(Exchange::Nse, "RIL").unwrap().token, 2885);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn on_exchange_filters() {
        let catalog = catalog();
        let nse: Vec<_> = catalog.on_exchange(Exchange::Nse).collect();
        assert_eq!(nse.len(), 1);
        assert_eq!(catalog.on_exchange(Exchange::Mcx).count(), 0);
    }

    #[test]
    fn implements_lookup_port() {
        let lookup: &dyn InstrumentLookup = &catalog();
        assert_eq!(
            lookup
                .instrument_by_token(Exchange::Bse, 500_325)
                .map(|i| i.symbol),
            Some("RELIANCE".to_string())
        );
        assert!(lookup.instrument_by_token(Exchange::Nse, 1).is_none());
    }

    #[test]
    fn loads_from_json() {
        let json = r#"[
            {"exchange":"NSE","token":22,"symbol":"ACC-EQ","name":"ACC","expiry":null,"lot_size":null},
            {"exchange":"MCX","token":234230,"symbol":"GOLDM","name":"GOLD MINI","expiry":"2025-01-03","lot_size":1}
        ]"#;

        let catalog = InstrumentCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.by_token(Exchange::Mcx, 234_230).unwrap().expiry,
            NaiveDate::from_ymd_opt(2025, 1, 3)
        );
        assert!(InstrumentCatalog::from_json("{}").is_err());
    }
}
