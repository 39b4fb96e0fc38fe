//! Admin session tracking for the mock RCON server
//!
//! This module handles the server-side bookkeeping of RCON administrators:
//! - Login state per remote address
//! - Activity timestamps and timeout cleanup
//! - Per-session chat packet numbering
//! - Capacity limits
//!
//! An address only becomes a session after a successful login; everything
//! else it sends is ignored.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A logged-in administrator
#[derive(Debug)]
pub struct AdminClient {
    /// Address responses are sent to
    pub addr: SocketAddr,
    /// Last time any packet arrived from this address
    pub last_seen: Instant,
    /// Number carried by the next chat packet pushed to this session
    pub next_chat_id: u8,
}

impl AdminClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            last_seen: Instant::now(),
            next_chat_id: 0,
        }
    }

    /// Returns true if nothing arrived from this client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages every logged-in administrator
///
/// Sessions are keyed by remote address. Logging in again from a known
/// address restarts that session rather than adding a second one.
pub struct ClientManager {
    clients: HashMap<SocketAddr, AdminClient>,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
            timeout,
        }
    }

    /// Registers a successful login
    ///
    /// Returns false if the server is at capacity and `addr` is not already
    /// a session.
    pub fn login(&mut self, addr: SocketAddr) -> bool {
        if !self.clients.contains_key(&addr) && self.clients.len() >= self.max_clients {
            return false;
        }

        info!("Admin logged in from {}", addr);
        self.clients.insert(addr, AdminClient::new(addr));
        true
    }

    pub fn is_logged_in(&self, addr: SocketAddr) -> bool {
        self.clients.contains_key(&addr)
    }

    /// Refreshes the activity timestamp. Returns false for unknown addresses.
    pub fn touch(&mut self, addr: SocketAddr) -> bool {
        match self.clients.get_mut(&addr) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, addr: SocketAddr) -> bool {
        if self.clients.remove(&addr).is_some() {
            info!("Admin {} removed", addr);
            true
        } else {
            false
        }
    }

    /// Takes the next chat number for `addr`, wrapping at 255
    pub fn next_chat_id(&mut self, addr: SocketAddr) -> Option<u8> {
        let client = self.clients.get_mut(&addr)?;
        let id = client.next_chat_id;
        client.next_chat_id = client.next_chat_id.wrapping_add(1);
        Some(id)
    }

    /// Addresses of every logged-in administrator
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.clients.keys().copied().collect()
    }

    /// Drops sessions that have been silent longer than the timeout
    ///
    /// Returns the removed addresses.
    pub fn check_timeouts(&mut self) -> Vec<SocketAddr> {
        let timed_out: Vec<SocketAddr> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(self.timeout))
            .map(|client| client.addr)
            .collect();

        for addr in &timed_out {
            info!("Admin {} timed out", addr);
            self.clients.remove(addr);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_login_registers_session() {
        let mut manager = ClientManager::new(2, Duration::from_secs(45));
        assert!(manager.is_empty());

        assert!(manager.login(test_addr()));
        assert!(manager.is_logged_in(test_addr()));
        assert!(!manager.is_logged_in(test_addr2()));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_relogin_does_not_duplicate() {
        let mut manager = ClientManager::new(1, Duration::from_secs(45));

        assert!(manager.login(test_addr()));
        manager.next_chat_id(test_addr());
        assert!(manager.login(test_addr()));

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.next_chat_id(test_addr()), Some(0));
    }

    #[test]
    fn test_capacity_enforced() {
        let mut manager = ClientManager::new(1, Duration::from_secs(45));

        assert!(manager.login(test_addr()));
        assert!(!manager.login(test_addr2()));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_chat_ids_per_session() {
        let mut manager = ClientManager::new(2, Duration::from_secs(45));
        manager.login(test_addr());
        manager.login(test_addr2());

        assert_eq!(manager.next_chat_id(test_addr()), Some(0));
        assert_eq!(manager.next_chat_id(test_addr()), Some(1));
        assert_eq!(manager.next_chat_id(test_addr2()), Some(0));
        assert_eq!(manager.next_chat_id("10.0.0.1:1".parse().unwrap()), None);
    }

    #[test]
    fn test_chat_id_wraps() {
        let mut manager = ClientManager::new(1, Duration::from_secs(45));
        manager.login(test_addr());

        for _ in 0..255 {
            manager.next_chat_id(test_addr());
        }
        assert_eq!(manager.next_chat_id(test_addr()), Some(255));
        assert_eq!(manager.next_chat_id(test_addr()), Some(0));
    }

    #[test]
    fn test_timeouts() {
        let mut manager = ClientManager::new(2, Duration::from_secs(1));
        manager.login(test_addr());
        manager.login(test_addr2());

        if let Some(client) = manager.clients.get_mut(&test_addr()) {
            client.last_seen = Instant::now() - Duration::from_secs(2);
        }

        let removed = manager.check_timeouts();
        assert_eq!(removed, vec![test_addr()]);
        assert!(!manager.is_logged_in(test_addr()));
        assert!(manager.is_logged_in(test_addr2()));
    }

    #[test]
    fn test_touch_and_remove() {
        let mut manager = ClientManager::new(2, Duration::from_secs(45));

        assert!(!manager.touch(test_addr()));
        manager.login(test_addr());
        assert!(manager.touch(test_addr()));

        assert!(manager.remove(test_addr()));
        assert!(!manager.remove(test_addr()));
        assert_eq!(manager.addrs(), Vec::<SocketAddr>::new());
    }
}
