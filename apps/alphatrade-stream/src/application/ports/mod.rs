//! Port Interfaces
//!
//! Contracts for the collaborators the streaming core consumes but does not
//! own, following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `InstrumentLookup`: reference data lookup by `(exchange, token)`
//! - `AccessTokenProvider`: session token used to build the socket URL

use crate::domain::instrument::{Exchange, Instrument};

/// Reference data lookup used to enrich decoded records.
///
/// Called on the read path for every frame that carries a token, so
/// implementations must not block.
#[cfg_attr(test, mockall::automock)]
pub trait InstrumentLookup: Send + Sync {
    /// Find the instrument for an exchange token.
    fn instrument_by_token(&self, exchange: Exchange, token: u32) -> Option<Instrument>;
}

impl<F> InstrumentLookup for F
where
    F: Fn(Exchange, u32) -> Option<Instrument> + Send + Sync,
{
    fn instrument_by_token(&self, exchange: Exchange, token: u32) -> Option<Instrument> {
        self(exchange, token)
    }
}

/// Error returned when no access token is available.
#[derive(Debug, Clone, thiserror::Error)]
#[error("access token unavailable: {0}")]
pub struct TokenError(pub String);

/// Source of the session access token.
///
/// Queried on every connection attempt so rotated tokens take effect on the
/// next reconnect.
pub trait AccessTokenProvider: Send + Sync {
    /// Current access token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] if no token is available.
    fn access_token(&self) -> Result<String, TokenError>;
}

/// Fixed access token.
#[derive(Clone)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    /// Wrap a token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticAccessToken")
            .field(&"[REDACTED]")
            .finish()
    }
}

impl AccessTokenProvider for StaticAccessToken {
    fn access_token(&self) -> Result<String, TokenError> {
        if self.0.is_empty() {
            return Err(TokenError("empty token".to_string()));
        }
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_lookup() {
        let lookup = |exchange: Exchange, token: u32| {
            (token == 2885).then(|| Instrument::new(exchange, token, "RELIANCE-EQ"))
        };

        assert!(lookup.instrument_by_token(Exchange::Nse, 2885).is_some());
        assert!(lookup.instrument_by_token(Exchange::Nse, 1).is_none());
    }

    #[test]
    fn static_token_redacted_debug() {
        let token = StaticAccessToken::new("secret-token");
        assert!(!format!("{token:?}").contains("secret-token"));
        assert_eq!(token.access_token().unwrap(), "secret-token");
    }

    #[test]
    fn static_token_rejects_empty() {
        assert!(StaticAccessToken::new("").access_token().is_err());
    }
}
