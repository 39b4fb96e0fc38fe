//! GUID ban listing parser
//!
//! ```text
//! GUID Bans:
//! [#] [GUID] [Minutes left] [Reason]
//! ----------------------------------------
//! 0  0a1b2c3d4e5f  perm  Cheating
//! 1  6a7b8c9d0e1f  120   Spawn camping
//!
//! IP Bans:
//! ...
//! ```
//!
//! Only the GUID section is parsed; the listing ends at the first blank line or
//! at the `IP Bans:` header.

const BAN_TABLE_HEADER_LINES: usize = 3;
const IP_BANS_HEADER: &str = "IP Bans:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    pub index: u32,
    pub guid: String,
    /// `None` for permanent bans.
    pub minutes_left: Option<u32>,
    pub reason: String,
}

pub fn parse_bans(text: &str) -> Vec<BanEntry> {
    text.lines()
        .skip(BAN_TABLE_HEADER_LINES)
        .take_while(|line| !line.trim().is_empty() && line.trim() != IP_BANS_HEADER)
        .filter_map(parse_ban_line)
        .collect()
}

fn parse_ban_line(line: &str) -> Option<BanEntry> {
    let mut fields = line.split_whitespace();
    let index = fields.next()?.parse().ok()?;
    let guid = fields.next()?.to_string();
    let minutes_left = fields.next()?.parse().ok();
    let reason = fields.collect::<Vec<_>>().join(" ");

    Some(BanEntry {
        index,
        guid,
        minutes_left,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_guid_bans() {
        let text = "GUID Bans:\n\
            [#] [GUID] [Minutes left] [Reason]\n\
            ----------------------------------------\n\
            0  0a1b2c3d4e5f  perm  Cheating\n\
            1  6a7b8c9d0e1f  120   Spawn   camping\n\
            \n\
            IP Bans:\n\
            [#] [IP Address] [Minutes left] [Reason]\n\
            0  1.2.3.4  perm  VPN";

        let bans = parse_bans(text);

        assert_eq!(bans.len(), 2);
        assert_eq!(bans[0].guid, "0a1b2c3d4e5f");
        assert_eq!(bans[0].minutes_left, None);
        assert_eq!(bans[0].reason, "Cheating");
        assert_eq!(bans[1].index, 1);
        assert_eq!(bans[1].minutes_left, Some(120));
        assert_eq!(bans[1].reason, "Spawn camping");
    }

    #[test]
    fn test_ban_without_reason() {
        let text = "GUID Bans:\n[#]\n---\n3 ffff -";
        let bans = parse_bans(text);

        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].minutes_left, None);
        assert!(bans[0].reason.is_empty());
    }

    #[test]
    fn test_no_bans() {
        assert!(parse_bans("GUID Bans:\n[#] [GUID] [Minutes left] [Reason]\n---\n").is_empty());
    }
}
