//! AlphaTrade Control Commands
//!
//! JSON commands sent to the quote server over the streaming connection.
//!
//! # Wire Format (JSON)
//! ```json
//! {"a": "subscribe", "v": [[1, 2885], [2, 35001]], "m": "marketdata"}
//! {"a": "unsubscribe", "v": [[1, 2885]], "m": "snapquote"}
//! {"a": "subscribe", "v": [1, 2, 3, 4, 6], "m": "market_status"}
//! {"a": "h", "v": [], "m": ""}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::subscription::SubscriptionCommand;

/// Heartbeat action string.
pub const HEARTBEAT_ACTION: &str = "h";

/// Values carried by a control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValues {
    /// `[exchange_code, token]` pairs.
    Targets(Vec<(u8, u32)>),
    /// Bare exchange codes (status feeds, heartbeat).
    Exchanges(Vec<u8>),
}

/// Control command envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// Action: `subscribe`, `unsubscribe` or `h`.
    #[serde(rename = "a")]
    pub action: String,

    /// Command values.
    #[serde(rename = "v")]
    pub values: CommandValues,

    /// Mode or feed name.
    #[serde(rename = "m")]
    pub mode: String,
}

impl ControlCommand {
    /// Heartbeat command sent as a ping payload.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self {
            action: HEARTBEAT_ACTION.to_string(),
            values: CommandValues::Exchanges(Vec::new()),
            mode: String::new(),
        }
    }

    /// Check if this is a heartbeat.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.action == HEARTBEAT_ACTION
    }
}

impl From<&SubscriptionCommand> for ControlCommand {
    fn from(command: &SubscriptionCommand) -> Self {
        match command {
            SubscriptionCommand::Instruments {
                action,
                mode,
                targets,
            } => Self {
                action: action.as_str().to_string(),
                values: CommandValues::Targets(targets.clone()),
                mode: mode.wire_name().to_string(),
            },
            SubscriptionCommand::Status { feed, exchanges } => Self {
                action: command.action().as_str().to_string(),
                values: CommandValues::Exchanges(exchanges.clone()),
                mode: feed.wire_name().to_string(),
            },
        }
    }
}
