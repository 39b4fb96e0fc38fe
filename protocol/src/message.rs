//! Classification of command responses and parsing of server chat lines

/// First line of a `players` response.
pub const PLAYERS_HEADER: &str = "Players on server:";
/// First line of a `missions` response.
pub const MISSIONS_HEADER: &str = "Missions on server:";
/// First line of a `bans` response.
pub const BANS_HEADER: &str = "GUID Bans:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Players,
    Missions,
    Bans,
    /// Anything else, delivered to subscribers untouched.
    Other,
}

/// Classifies a complete command response by its first line.
pub fn classify_response(text: &str) -> ResponseKind {
    let first = text.lines().next().unwrap_or("").trim();
    match first {
        PLAYERS_HEADER => ResponseKind::Players,
        MISSIONS_HEADER => ResponseKind::Missions,
        BANS_HEADER => ResponseKind::Bans,
        _ => ResponseKind::Other,
    }
}

/// Mission names listed after the header, one per line.
///
/// The listing format carries more detail on some servers; only the raw names
/// are kept.
pub fn parse_missions(text: &str) -> Vec<String> {
    text.lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Roster-relevant notifications carried on the chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    PlayerConnected {
        slot: String,
        name: String,
        address: Option<(String, u16)>,
    },
    PlayerDisconnected {
        slot: String,
        name: String,
    },
    PlayerVerified {
        slot: String,
        name: String,
        guid: String,
    },
}

/// Recognises connect, disconnect and GUID verification notices.
///
/// Returns `None` for ordinary chat and every other server message.
pub fn parse_chat(line: &str) -> Option<ChatEvent> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("Player #") {
        if let Some(body) = rest.strip_suffix(" disconnected") {
            let (slot, name) = split_slot(body)?;
            return Some(ChatEvent::PlayerDisconnected {
                slot: slot.to_string(),
                name: name.to_string(),
            });
        }

        if let Some(body) = rest.strip_suffix(" connected") {
            let (slot, name) = split_slot(body)?;
            let (name, address) = split_address(name);
            return Some(ChatEvent::PlayerConnected {
                slot: slot.to_string(),
                name: name.to_string(),
                address,
            });
        }

        return None;
    }

    let rest = line.strip_prefix("Verified GUID ")?;

    // Server form: "Verified GUID (<guid>) of player #<slot> <name>"
    if let Some(rest) = rest.strip_prefix('(') {
        let (guid, player) = rest.split_once(") of player #")?;
        let (slot, name) = split_slot(player)?;
        return Some(ChatEvent::PlayerVerified {
            slot: slot.to_string(),
            name: name.to_string(),
            guid: guid.to_string(),
        });
    }

    // Compact form: "Verified GUID <guid>(#<slot> <name>)"
    let (guid, player) = rest.split_once("(#")?;
    let (slot, name) = split_slot(player.strip_suffix(')')?)?;
    let guid = guid.trim();
    if guid.is_empty() {
        return None;
    }

    Some(ChatEvent::PlayerVerified {
        slot: slot.to_string(),
        name: name.to_string(),
        guid: guid.to_string(),
    })
}

fn split_slot(body: &str) -> Option<(&str, &str)> {
    let (slot, name) = body.split_once(' ')?;
    let name = name.trim();
    if slot.is_empty() || !slot.bytes().all(|b| b.is_ascii_digit()) || name.is_empty() {
        return None;
    }
    Some((slot, name))
}

/// Strips a trailing `(ip:port)` from a connect notice name.
fn split_address(name: &str) -> (&str, Option<(String, u16)>) {
    let Some(open) = name.rfind(" (") else {
        return (name, None);
    };
    let Some(inner) = name[open + 2..].strip_suffix(')') else {
        return (name, None);
    };
    let Some((ip, port)) = inner.rsplit_once(':') else {
        return (name, None);
    };
    match port.parse() {
        Ok(port) => (name[..open].trim_end(), Some((ip.to_string(), port))),
        Err(_) => (name, None),
    }
}
