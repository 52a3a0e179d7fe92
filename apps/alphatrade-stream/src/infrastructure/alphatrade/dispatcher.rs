//! Frame Dispatcher
//!
//! Entry point for every inbound binary frame. Decodes the frame, normalizes
//! the record and hands it to the callback registered for the record's
//! slot. Market status and exchange message records are also appended to
//! bounded logs for later retrieval.
//!
//! Callbacks run on the connection's read task. A slow callback delays every
//! frame behind it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::application::services::{DEFAULT_MESSAGE_LOG_CAPACITY, MessageLog};
use crate::domain::streaming::{
    CallbackSlot, ExchangeMessageUpdate, FrameKind, MarketStatusUpdate, TickRecord,
};
use crate::infrastructure::metrics;

use super::codec::{DecodeError, FrameDecoder};
use super::normalizer::UnitNormalizer;

/// Callback receiving normalized records.
pub type TickHandler = Arc<dyn Fn(&TickRecord) + Send + Sync>;

/// Callback receiving per-frame decode failures.
pub type DecodeErrorHandler = Arc<dyn Fn(&DecodeError) + Send + Sync>;

/// Routes decoded records to callback slots.
pub struct Dispatcher {
    decoder: FrameDecoder,
    normalizer: UnitNormalizer,
    handlers: RwLock<HashMap<CallbackSlot, TickHandler>>,
    error_handler: RwLock<Option<DecodeErrorHandler>>,
    market_status_log: MessageLog<MarketStatusUpdate>,
    exchange_message_log: MessageLog<ExchangeMessageUpdate>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("normalizer", &self.normalizer)
            .field("slots", &self.handlers.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with default log capacity.
    #[must_use]
    pub fn new(normalizer: UnitNormalizer) -> Self {
        Self::with_log_capacity(normalizer, DEFAULT_MESSAGE_LOG_CAPACITY)
    }

    /// Create a dispatcher whose status logs retain at most `capacity`
    /// entries each.
    #[must_use]
    pub fn with_log_capacity(normalizer: UnitNormalizer, capacity: usize) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            normalizer,
            handlers: RwLock::new(HashMap::new()),
            error_handler: RwLock::new(None),
            market_status_log: MessageLog::new(capacity),
            exchange_message_log: MessageLog::new(capacity),
        }
    }

    /// Bind a callback to a slot, replacing any previous one.
    pub fn register(&self, slot: CallbackSlot, handler: TickHandler) {
        self.handlers.write().insert(slot, handler);
    }

    /// Remove the callback bound to a slot.
    pub fn unregister(&self, slot: CallbackSlot) {
        self.handlers.write().remove(&slot);
    }

    /// Bind the decode error callback.
    pub fn on_decode_error(&self, handler: DecodeErrorHandler) {
        *self.error_handler.write() = Some(handler);
    }

    /// Handle one inbound binary frame.
    ///
    /// Returns the kind of the dispatched record. A slot with no callback
    /// discards the record and still returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the [`DecodeError`] that caused the frame to be dropped. The
    /// error has already been logged and passed to the error callback.
    pub fn on_frame(&self, raw: &[u8]) -> Result<FrameKind, DecodeError> {
        let started = Instant::now();

        let record = match self
            .decoder
            .decode_frame(raw)
            .and_then(|frame| self.normalizer.normalize(frame))
        {
            Ok(record) => record,
            Err(error) => {
                self.reject(&error, raw.len());
                return Err(error);
            }
        };

        let kind = record.kind();
        self.append_to_log(&record);
        self.deliver(kind, &record);

        metrics::record_frame_received(kind.as_str());
        metrics::record_processing_duration(kind.as_str(), started.elapsed());
        Ok(kind)
    }

    /// Retained market status records, oldest first.
    #[must_use]
    pub fn market_status_messages(&self) -> Vec<MarketStatusUpdate> {
        self.market_status_log.snapshot()
    }

    /// Retained exchange messages, oldest first.
    #[must_use]
    pub fn exchange_messages(&self) -> Vec<ExchangeMessageUpdate> {
        self.exchange_message_log.snapshot()
    }

    fn append_to_log(&self, record: &TickRecord) {
        match record {
            TickRecord::MarketStatus(update) => self.market_status_log.push(update.clone()),
            TickRecord::ExchangeMessage(update) => self.exchange_message_log.push(update.clone()),
            _ => {}
        }
    }

    fn deliver(&self, kind: FrameKind, record: &TickRecord) {
        let Some(slot) = kind.slot() else {
            return;
        };

        // Clone out of the lock so a callback may re-register handlers.
        let handler = self.handlers.read().get(&slot).cloned();
        match handler {
            Some(handler) => handler(record),
            None => tracing::trace!(kind = %kind, "No callback registered, record discarded"),
        }
    }

    fn reject(&self, error: &DecodeError, len: usize) {
        tracing::warn!(error = %error, frame_len = len, "Dropping undecodable frame");
        metrics::record_frame_dropped(error.reason());

        let handler = self.error_handler.read().clone();
        if let Some(handler) = handler {
            handler(error);
        }
    }
}
