//! Configuration Module
//!
//! Configuration loading for the stream client.

mod settings;

pub use settings::{
    ACCESS_TOKEN_PLACEHOLDER, AccessToken, ClientConfig, ConfigError, DEFAULT_SOCKET_URL,
    StreamSettings, SubscriptionSpec, render_socket_url,
};
