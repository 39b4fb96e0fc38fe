//! Player roster tracking
//!
//! The roster is fed from two sources: periodic `players` listings and the
//! connect/disconnect/verification notices on the chat channel. Both paths
//! reconcile by player name and return the events the change produced, so the
//! caller decides how to publish them.

use crate::events::RconEvent;
use protocol::{ChatEvent, PlayerInfo};
use std::collections::HashMap;

/// Connected players keyed by name.
#[derive(Debug, Default)]
pub struct Roster {
    players: HashMap<String, PlayerInfo>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a fresh `players` listing into the roster
    ///
    /// Unknown names produce a connect event, followed by a verified event if
    /// the listing already shows them verified. A known player whose GUID
    /// turns verified produces a verified event, which covers notices the
    /// chat channel may have dropped. Verification is never revoked by a later
    /// listing. Players absent from the listing are kept until a disconnect
    /// notice arrives.
    pub fn refresh(&mut self, listing: Vec<PlayerInfo>) -> Vec<RconEvent> {
        let mut events = Vec::new();

        for player in listing {
            match self.players.get_mut(&player.name) {
                None => {
                    events.push(RconEvent::PlayerConnected(player.clone()));
                    if player.verified {
                        events.push(RconEvent::PlayerVerified(player.clone()));
                    }
                    self.players.insert(player.name.clone(), player);
                }
                Some(existing) => {
                    let was_verified = existing.verified;
                    *existing = PlayerInfo {
                        verified: was_verified || player.verified,
                        ..player
                    };
                    if !was_verified && existing.verified {
                        events.push(RconEvent::PlayerVerified(existing.clone()));
                    }
                }
            }
        }

        events
    }

    /// Applies a roster notice received on the chat channel.
    pub fn apply_chat(&mut self, event: ChatEvent) -> Vec<RconEvent> {
        match event {
            ChatEvent::PlayerConnected {
                slot,
                name,
                address,
            } => {
                let is_new = !self.players.contains_key(&name);
                let player = self
                    .players
                    .entry(name.clone())
                    .or_insert_with(|| PlayerInfo::new(slot.clone(), name));
                player.number = slot;
                if let Some((ip, port)) = address {
                    player.ip = ip;
                    player.port = port;
                }

                if is_new {
                    vec![RconEvent::PlayerConnected(player.clone())]
                } else {
                    Vec::new()
                }
            }
            ChatEvent::PlayerDisconnected { slot, name } => {
                let player = self
                    .players
                    .remove(&name)
                    .unwrap_or_else(|| PlayerInfo::new(slot, name));
                vec![RconEvent::PlayerDisconnected(player)]
            }
            ChatEvent::PlayerVerified { slot, name, guid } => {
                let player = self
                    .players
                    .entry(name.clone())
                    .or_insert_with(|| PlayerInfo::new(slot, name));
                player.guid = guid;

                if player.verified {
                    Vec::new()
                } else {
                    player.verified = true;
                    vec![RconEvent::PlayerVerified(player.clone())]
                }
            }
        }
    }

    /// Copy of every entry, ordered by slot.
    pub fn snapshot(&self) -> Vec<PlayerInfo> {
        let mut players: Vec<PlayerInfo> = self.players.values().cloned().collect();
        players.sort_by_key(|player| player.number.parse::<u32>().unwrap_or(u32::MAX));
        players
    }

    pub fn get(&self, name: &str) -> Option<&PlayerInfo> {
        self.players.get(name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(number: &str, name: &str, verified: bool) -> PlayerInfo {
        PlayerInfo {
            number: number.to_string(),
            name: name.to_string(),
            guid: format!("guid-{}", name),
            ip: "127.0.0.1".to_string(),
            port: 2304,
            verified,
            ping: 30,
            lobby: false,
        }
    }

    fn verified_count(events: &[RconEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, RconEvent::PlayerVerified(_)))
            .count()
    }

    #[test]
    fn test_first_listing_connects_everyone() {
        let mut roster = Roster::new();
        let events = roster.refresh(vec![listed("0", "Alice", false), listed("1", "Bob", false)]);

        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|event| matches!(event, RconEvent::PlayerConnected(_))));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_verified_on_first_sight() {
        let mut roster = Roster::new();
        let events = roster.refresh(vec![listed("0", "Alice", true)]);

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], RconEvent::PlayerConnected(p) if p.name == "Alice"));
        assert!(matches!(&events[1], RconEvent::PlayerVerified(p) if p.name == "Alice"));
    }

    #[test]
    fn test_verified_transition_fires_once() {
        let mut roster = Roster::new();
        roster.refresh(vec![listed("0", "Alice", false)]);

        let events = roster.refresh(vec![listed("0", "Alice", true)]);
        assert_eq!(verified_count(&events), 1);
        assert_eq!(events.len(), 1);

        let events = roster.refresh(vec![listed("0", "Alice", true)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_verified_flag_is_sticky() {
        let mut roster = Roster::new();
        roster.refresh(vec![listed("0", "Alice", true)]);

        let events = roster.refresh(vec![listed("0", "Alice", false)]);
        assert!(events.is_empty());
        assert!(roster.get("Alice").unwrap().verified);
    }

    #[test]
    fn test_refresh_updates_fields() {
        let mut roster = Roster::new();
        roster.refresh(vec![listed("0", "Alice", false)]);

        let mut moved = listed("4", "Alice", false);
        moved.ping = 120;
        roster.refresh(vec![moved]);

        let alice = roster.get("Alice").unwrap();
        assert_eq!(alice.number, "4");
        assert_eq!(alice.ping, 120);
    }

    #[test]
    fn test_chat_connect_then_listing_does_not_duplicate() {
        let mut roster = Roster::new();
        let events = roster.apply_chat(ChatEvent::PlayerConnected {
            slot: "2".to_string(),
            name: "Carol".to_string(),
            address: Some(("10.0.0.9".to_string(), 2310)),
        });

        assert_eq!(events.len(), 1);
        let carol = roster.get("Carol").unwrap();
        assert_eq!(carol.ip, "10.0.0.9");
        assert_eq!(carol.port, 2310);

        let events = roster.refresh(vec![listed("2", "Carol", false)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_chat_verification_then_listing() {
        let mut roster = Roster::new();
        roster.refresh(vec![listed("1", "Bob", false)]);

        let events = roster.apply_chat(ChatEvent::PlayerVerified {
            slot: "1".to_string(),
            name: "Bob".to_string(),
            guid: "abc".to_string(),
        });
        assert_eq!(verified_count(&events), 1);
        assert_eq!(roster.get("Bob").unwrap().guid, "abc");

        let events = roster.refresh(vec![listed("1", "Bob", true)]);
        assert_eq!(verified_count(&events), 0);
    }

    #[test]
    fn test_chat_disconnect_removes() {
        let mut roster = Roster::new();
        roster.refresh(vec![listed("0", "Alice", false), listed("1", "Bob", false)]);

        let events = roster.apply_chat(ChatEvent::PlayerDisconnected {
            slot: "0".to_string(),
            name: "Alice".to_string(),
        });

        assert!(matches!(&events[0], RconEvent::PlayerDisconnected(p) if p.guid == "guid-Alice"));
        assert_eq!(roster.len(), 1);
        assert!(roster.get("Alice").is_none());
    }

    #[test]
    fn test_snapshot_sorted_by_slot() {
        let mut roster = Roster::new();
        roster.refresh(vec![
            listed("10", "Zed", false),
            listed("2", "Amy", false),
            listed("0", "Kim", false),
        ]);

        let slots: Vec<String> = roster.snapshot().into_iter().map(|p| p.number).collect();
        assert_eq!(slots, vec!["0", "2", "10"]);
    }
}
