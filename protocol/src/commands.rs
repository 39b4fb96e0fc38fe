//! Text of the administrative commands the client issues

pub const PLAYERS: &str = "players";
pub const BANS: &str = "bans";
pub const MISSIONS: &str = "missions";
pub const LOCK: &str = "#lock";
pub const UNLOCK: &str = "#unlock";
pub const SHUTDOWN: &str = "#shutdown";

/// Slot value addressing every player in a `say` command.
pub const EVERYONE: i32 = -1;

pub fn say_all(message: &str) -> String {
    format!("say {} {}", EVERYONE, message)
}

pub fn say_to(slot: u32, message: &str) -> String {
    format!("say {} {}", slot, message)
}

pub fn kick(slot: &str, reason: &str) -> String {
    format!("kick {} {}", slot, reason)
}

/// Bans a GUID whether or not its owner is online. `0` minutes is permanent.
pub fn add_ban(guid: &str, minutes: u32, reason: &str) -> String {
    format!("addBan {} {} {}", guid, minutes, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_text() {
        assert_eq!(say_all("restart in 5"), "say -1 restart in 5");
        assert_eq!(say_to(3, "hi"), "say 3 hi");
        assert_eq!(kick("7", "AFK"), "kick 7 AFK");
        assert_eq!(add_ban("abc123", 0, "Cheating"), "addBan abc123 0 Cheating");
    }
}
