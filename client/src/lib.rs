//! # RCON Client Library
//!
//! This library provides a long-running administrative client for game servers
//! that speak the BattlEye RCON protocol over UDP. It logs in, keeps the session
//! alive, mirrors the server's player roster, runs scheduled administrative
//! tasks and republishes everything the server says as typed events.
//!
//! ## Architecture Overview
//!
//! The client is split into a pure state machine and a thin I/O shell:
//!
//! ### Session (`session`)
//! Owns all protocol state and performs no I/O. Every input (a datagram, a
//! tick, a command) carries the current time, and every output is queued as an
//! action. This keeps liveness checks, reconnect budgeting and task timing
//! testable without sockets or sleeps.
//!
//! ### Network (`network`)
//! A background worker owns the session and the socket. It multiplexes
//! handle requests, received datagrams and a periodic tick, then carries out
//! whatever the session queued. [`RconClient`] is the handle applications hold.
//!
//! ### Roster (`roster`)
//! Tracks connected players from `players` listings and chat notices, emitting
//! connect, disconnect and verification events exactly once per change.
//!
//! ### Scheduler (`scheduler`)
//! Time-ordered queue of one-shot and repeating tasks (broadcasts, kick-all,
//! lock, unlock, shutdown).
//!
//! ### Configuration and errors (`config`, `error`, `events`)
//! TOML-backed [`Config`] with defaults for every field, the [`RconError`]
//! returned by API calls, and the [`RconEvent`] stream for everything that
//! happens asynchronously.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::{Config, RconClient, RconEvent};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), client::RconError> {
//! let config = Config::from_file("rcon.toml")?;
//! let client = RconClient::new(config);
//! let mut events = client.subscribe();
//! client.start()?;
//!
//! client.wait_for_login(Duration::from_secs(10)).await?;
//! client.say("Server restart in 10 minutes").await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let RconEvent::PlayerConnected(player) = event {
//!         println!("{} joined", player.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Handling
//!
//! - Lost transport or an unanswered keep-alive: `Disconnected`, then up to
//!   `max_reconnect_attempts` reconnects spaced `reconnect_delay` apart
//! - Exhausted budget: `ReconnectExhausted`; call `restart` to try again
//! - Wrong password: `LoginFailed`, with no automatic retry

pub mod config;
pub mod error;
pub mod events;
pub mod network;
pub mod roster;
pub mod scheduler;
pub mod session;

pub use config::Config;
pub use error::RconError;
pub use events::{DisconnectReason, RconEvent};
pub use network::RconClient;
pub use protocol::{BanEntry, PlayerInfo};
pub use roster::Roster;
pub use scheduler::{TaskId, TaskKind};
pub use session::ConnectionState;
