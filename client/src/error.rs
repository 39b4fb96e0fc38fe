use thiserror::Error;

/// Errors returned by the public client API.
///
/// Failures that happen on the wire after a call has returned (lost
/// connection, rejected login, liveness timeout) are reported as
/// [`RconEvent`](crate::events::RconEvent)s instead.
#[derive(Debug, Error)]
pub enum RconError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("could not resolve server address {0}")]
    Resolve(String),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("client worker has stopped")]
    WorkerStopped,

    #[error("timed out waiting for the server")]
    Timeout,

    #[error("task period {0:?} is out of range")]
    InvalidPeriod(std::time::Duration),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
