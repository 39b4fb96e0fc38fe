//! # Mock RCON Server Library
//!
//! This library provides a small in-process stand-in for a game server's RCON
//! endpoint. It speaks the same wire protocol as a real server, which makes it
//! the counterpart the client's integration tests run against, and a handy
//! target for trying the client out without a game server.
//!
//! ## Behaviour
//!
//! - Logins are checked against a configured password
//! - Empty commands (keep-alives) are acknowledged with a bare response
//! - `players`, `bans` and `missions` answer with listings, split into
//!   multipart responses once they exceed the fragment size
//! - Every other command is recorded and acknowledged
//! - Chat lines are pushed to every logged-in session, each with its own
//!   chat numbering, and acknowledgements are recorded
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Logged-in admin sessions keyed by address, with timeout cleanup and
//! per-session chat numbering.
//!
//! ### Network Module (`network`)
//! The UDP receive loop, response generation and the scenario helpers tests
//! use to change the roster, inject chat or make the server go silent.

pub mod client_manager;
pub mod network;

pub use network::{MockConfig, MockServer};
