//! Notifications published to subscribers of a running client

use protocol::{BanEntry, PlayerInfo};
use thiserror::Error;

/// Why an established session ended.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisconnectReason {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no acknowledgement for keep-alive")]
    LivenessTimeout,

    #[error("no response to login")]
    LoginTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RconEvent {
    LoggedIn,
    /// The server rejected the password.
    LoginFailed,
    Disconnected(DisconnectReason),
    /// Every reconnect attempt failed; the client stays down until restarted.
    ReconnectExhausted,

    PlayerConnected(PlayerInfo),
    PlayerDisconnected(PlayerInfo),
    PlayerVerified(PlayerInfo),

    /// Any line received on the chat channel, including roster notices.
    Chat(String),
    /// A response that is not a known listing.
    CommandResponse {
        sequence: u8,
        text: String,
    },
    Missions(Vec<String>),
    Bans(Vec<BanEntry>),

    /// A scheduled shutdown task ran and `#shutdown` was sent.
    ShutdownRequested,
}
