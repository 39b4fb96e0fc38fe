//! # RCON Protocol
//!
//! Wire-level building blocks shared by the RCON client and the mock server.
//! Nothing in this crate performs I/O; every function takes bytes or text and
//! returns values, so both sides of the conversation can be unit tested without
//! sockets.
//!
//! ## Modules
//!
//! ### Packet codec (`packet`)
//! Framing (`"BE"` magic, CRC-32 checksum, `0xFF` marker, type byte), typed
//! [`Packet`] values for both directions, and the rolling command
//! [`Sequencer`].
//!
//! ### Reassembly (`reassembly`)
//! Buffers fragments of multi-part command responses until every part has
//! arrived.
//!
//! ### Commands (`commands`)
//! Text of the administrative commands (`say`, `kick`, `addBan`, `#lock`, ...).
//!
//! ### Response and chat parsing (`message`, `players`, `bans`)
//! Classifies complete command responses by their first line and extracts
//! player tables, ban lists, mission lists and roster notices from chat.

pub mod bans;
pub mod commands;
pub mod error;
pub mod message;
pub mod packet;
pub mod players;
pub mod reassembly;

pub use bans::{parse_bans, BanEntry};
pub use error::ProtocolError;
pub use message::{classify_response, parse_chat, parse_missions, ChatEvent, ResponseKind};
pub use packet::{Packet, PacketType, ResponseBody, Sequencer};
pub use players::{parse_player_table, PlayerInfo};
pub use reassembly::ReassemblyCache;
