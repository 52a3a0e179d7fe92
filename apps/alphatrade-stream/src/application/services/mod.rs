//! Application Services
//!
//! - `MessageLog`: bounded retention of market status and exchange messages

pub mod message_log;

pub use message_log::{DEFAULT_MESSAGE_LOG_CAPACITY, MessageLog};
