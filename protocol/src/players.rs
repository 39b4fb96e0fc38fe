//! Player listing parser
//!
//! The `players` command answers with a fixed-layout table:
//!
//! ```text
//! Players on server:
//! [#] [IP Address]:[Port] [Ping] [GUID] [Name]
//! --------------------------------------------------
//! 0   127.0.0.1:2304     45   76561190000000000(OK)  Alice
//! 1   10.0.0.7:2316      61   76561190000000001(?)   Bob (Lobby)
//! (2 players in total)
//! ```

use log::debug;

/// Header lines preceding the first player row.
pub const PLAYER_TABLE_HEADER_LINES: usize = 3;

const VERIFIED_SUFFIX: &str = "OK";
const LOBBY_SUFFIX: &str = " (Lobby)";

/// One connected player as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerInfo {
    /// Slot number, reused across sessions.
    pub number: String,
    pub name: String,
    pub guid: String,
    pub ip: String,
    pub port: u16,
    pub verified: bool,
    /// `-1` while the server has not measured it yet.
    pub ping: i32,
    pub lobby: bool,
}

impl PlayerInfo {
    pub fn new(number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Parses a full `players` response into entries, in listing order.
///
/// Lines that do not match the row layout (the trailing summary, blank lines)
/// are skipped.
pub fn parse_player_table(text: &str) -> Vec<PlayerInfo> {
    text.lines()
        .skip(PLAYER_TABLE_HEADER_LINES)
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('('))
        .filter_map(|line| {
            let player = parse_player_line(line);
            if player.is_none() {
                debug!("Skipping unparseable player row: {:?}", line);
            }
            player
        })
        .collect()
}

/// Parses one row of the player table.
pub fn parse_player_line(line: &str) -> Option<PlayerInfo> {
    let (number, rest) = next_token(line)?;
    let (address, rest) = next_token(rest)?;
    let (ping, rest) = next_token(rest)?;
    let (guid_field, rest) = next_token(rest)?;

    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (ip, port) = address.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let ping = ping.parse().ok()?;

    let (guid, verified) = match guid_field.split_once('(') {
        Some((guid, suffix)) => (guid, suffix.trim_end_matches(')') == VERIFIED_SUFFIX),
        None => (guid_field, false),
    };

    let mut name = rest.trim();
    let lobby = name.ends_with(LOBBY_SUFFIX);
    if lobby {
        name = name[..name.len() - LOBBY_SUFFIX.len()].trim_end();
    }
    if name.is_empty() {
        return None;
    }

    Some(PlayerInfo {
        number: number.to_string(),
        name: name.to_string(),
        guid: guid.to_string(),
        ip: ip.to_string(),
        port,
        verified,
        ping,
        lobby,
    })
}

/// Splits off the next whitespace-delimited token, keeping the remainder intact
/// so names with inner spaces survive.
fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((&input[..end], &input[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Players on server:\n\
        [#] [IP Address]:[Port] [Ping] [GUID] [Name]\n\
        --------------------------------------------------\n\
        0  127.0.0.1:2304   45  76561190000000000(OK)  Alice\n\
        1  10.0.0.7:2316    61  76561190000000001(?)  Bob the Builder (Lobby)\n\
        (2 players in total)";

    #[test]
    fn test_parse_verified_row() {
        let player = parse_player_line("0  127.0.0.1:2304   45  76561190000000000(OK)  Alice").unwrap();

        assert_eq!(player.number, "0");
        assert_eq!(player.ip, "127.0.0.1");
        assert_eq!(player.port, 2304);
        assert_eq!(player.ping, 45);
        assert_eq!(player.guid, "76561190000000000");
        assert!(player.verified);
        assert_eq!(player.name, "Alice");
        assert!(!player.lobby);
    }

    #[test]
    fn test_parse_table_skips_header_and_summary() {
        let players = parse_player_table(TABLE);

        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "Alice");
        assert_eq!(players[1].number, "1");
    }

    #[test]
    fn test_lobby_suffix_stripped_and_spaces_kept() {
        let players = parse_player_table(TABLE);
        let bob = &players[1];

        assert_eq!(bob.name, "Bob the Builder");
        assert!(bob.lobby);
        assert!(!bob.verified);
        assert_eq!(bob.guid, "76561190000000001");
    }

    #[test]
    fn test_unmeasured_ping() {
        let player = parse_player_line("3 192.168.0.2:2304 -1 abcdef(?) Carol").unwrap();
        assert_eq!(player.ping, -1);
    }

    #[test]
    fn test_empty_table() {
        let text = "Players on server:\n[#] [IP Address]:[Port] [Ping] [GUID] [Name]\n---\n(0 players in total)";
        assert!(parse_player_table(text).is_empty());
    }

    #[test]
    fn test_malformed_rows_rejected() {
        assert!(parse_player_line("x 127.0.0.1:2304 45 abc(OK) Alice").is_none());
        assert!(parse_player_line("0 127.0.0.1 45 abc(OK) Alice").is_none());
        assert!(parse_player_line("0 127.0.0.1:2304 45 abc(OK)").is_none());
        assert!(parse_player_line("").is_none());
    }
}
