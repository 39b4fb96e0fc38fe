//! Mock RCON server handling UDP communications with admin clients
//!
//! The server answers logins, acknowledges keep-alives, serves `players`,
//! `bans` and `missions` listings (split into multipart responses when they
//! exceed the fragment size) and pushes chat lines to every logged-in session.
//! Scenario helpers let tests change the roster, inject chat and go silent to
//! simulate a dead server.

use crate::client_manager::ClientManager;
use log::{debug, error, info, warn};
use protocol::commands;
use protocol::message::{BANS_HEADER, MISSIONS_HEADER, PLAYERS_HEADER};
use protocol::{BanEntry, Packet, PlayerInfo, ResponseBody};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;

const RECV_BUFFER_SIZE: usize = 65536;

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub password: String,
    /// Largest response body sent in one datagram before splitting.
    pub fragment_size: usize,
    pub max_clients: usize,
    pub client_timeout: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            password: "changeme".to_string(),
            fragment_size: 1024,
            max_clients: 10,
            client_timeout: Duration::from_secs(45),
        }
    }
}

/// Everything the server knows, shared between the receive loop and the
/// scenario helpers
struct ServerState {
    clients: ClientManager,
    players: Vec<PlayerInfo>,
    bans: Vec<BanEntry>,
    missions: Vec<String>,
    /// Non-empty commands in arrival order.
    commands: Vec<String>,
    chat_acks: Vec<u8>,
    silent: bool,
    locked: bool,
}

impl ServerState {
    /// Builds the datagrams answering one command
    fn respond(&mut self, sequence: u8, command: &str, fragment_size: usize) -> Vec<Vec<u8>> {
        if command.is_empty() {
            return vec![ack(sequence)];
        }

        debug!("Command {}: {:?}", sequence, command);
        self.commands.push(command.to_string());

        let listing = match command {
            commands::PLAYERS => Some(self.players_table()),
            commands::BANS => Some(self.bans_table()),
            commands::MISSIONS => Some(self.missions_table()),
            commands::LOCK => {
                self.locked = true;
                None
            }
            commands::UNLOCK => {
                self.locked = false;
                None
            }
            _ => None,
        };

        match listing {
            Some(text) => split_response(sequence, &text, fragment_size),
            None => vec![ack(sequence)],
        }
    }

    fn players_table(&self) -> String {
        let mut text = format!(
            "{}\n[#] [IP Address]:[Port] [Ping] [GUID] [Name]\n{}\n",
            PLAYERS_HEADER,
            "-".repeat(50)
        );
        for player in &self.players {
            text.push_str(&format!(
                "{:<3} {}:{:<6} {:<4} {}({})  {}{}\n",
                player.number,
                player.ip,
                player.port,
                player.ping,
                player.guid,
                if player.verified { "OK" } else { "?" },
                player.name,
                if player.lobby { " (Lobby)" } else { "" }
            ));
        }
        text.push_str(&format!("({} players in total)", self.players.len()));
        text
    }

    fn bans_table(&self) -> String {
        let mut text = format!(
            "{}\n[#] [GUID] [Minutes left] [Reason]\n{}\n",
            BANS_HEADER,
            "-".repeat(40)
        );
        for ban in &self.bans {
            let left = ban
                .minutes_left
                .map_or("perm".to_string(), |minutes| minutes.to_string());
            text.push_str(&format!("{:<3} {}  {}  {}\n", ban.index, ban.guid, left, ban.reason));
        }
        text
    }

    fn missions_table(&self) -> String {
        let mut text = MISSIONS_HEADER.to_string();
        for mission in &self.missions {
            text.push('\n');
            text.push_str(mission);
        }
        text
    }
}

fn ack(sequence: u8) -> Vec<u8> {
    Packet::CommandResponse {
        sequence,
        body: ResponseBody::Ack,
    }
    .encode()
}

/// Splits `text` into multipart responses when it exceeds `fragment_size`
pub fn split_response(sequence: u8, text: &str, fragment_size: usize) -> Vec<Vec<u8>> {
    let bytes = text.as_bytes();
    let fragment_size = fragment_size.max(1);

    if bytes.len() <= fragment_size {
        return vec![Packet::CommandResponse {
            sequence,
            body: ResponseBody::Text(text.to_string()),
        }
        .encode()];
    }

    let chunks: Vec<&[u8]> = bytes.chunks(fragment_size).collect();
    let total = u8::try_from(chunks.len()).unwrap_or(u8::MAX);

    chunks
        .into_iter()
        .take(usize::from(total))
        .enumerate()
        .map(|(index, fragment)| {
            Packet::CommandResponse {
                sequence,
                body: ResponseBody::Part {
                    total,
                    index: index as u8,
                    fragment: fragment.to_vec(),
                },
            }
            .encode()
        })
        .collect()
}

/// In-process RCON server for tests and local experiments
///
/// Cloning yields another handle to the same server.
#[derive(Clone)]
pub struct MockServer {
    socket: Arc<UdpSocket>,
    config: Arc<MockConfig>,
    state: Arc<RwLock<ServerState>>,
}

impl MockServer {
    pub async fn bind(addr: &str, config: MockConfig) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Mock RCON server listening on {}", socket.local_addr()?);

        let state = ServerState {
            clients: ClientManager::new(config.max_clients, config.client_timeout),
            players: Vec::new(),
            bans: Vec::new(),
            missions: Vec::new(),
            commands: Vec::new(),
            chat_acks: Vec::new(),
            silent: false,
            locked: false,
        };

        Ok(MockServer {
            socket,
            config: Arc::new(config),
            state: Arc::new(RwLock::new(state)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs the server on a background task
    pub fn spawn(&self) -> JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move { server.run().await })
    }

    /// Main server loop: answers datagrams and expires idle sessions
    pub async fn run(&self) {
        let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
        let mut timeout_check = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) => self.handle_datagram(&buffer[..len], addr).await,
                        Err(e) => {
                            error!("Error receiving packet: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                _ = timeout_check.tick() => {
                    self.state.write().await.clients.check_timeouts();
                },
            }
        }
    }

    async fn handle_datagram(&self, data: &[u8], addr: SocketAddr) {
        let packet = match Packet::decode_from_client(data) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Malformed packet from {}: {}", addr, e);
                return;
            }
        };

        let responses = {
            let mut state = self.state.write().await;
            if state.silent {
                debug!("Silent; dropping {:?} from {}", packet.packet_type(), addr);
                return;
            }

            match packet {
                Packet::Login { password } => {
                    let success = password == self.config.password && state.clients.login(addr);
                    if !success {
                        warn!("Rejected login from {}", addr);
                    }
                    vec![Packet::LoginResponse { success }.encode()]
                }
                Packet::Command { sequence, command } => {
                    if !state.clients.touch(addr) {
                        debug!("Ignoring command from {} without a session", addr);
                        return;
                    }
                    state.respond(sequence, &command, self.config.fragment_size)
                }
                Packet::ChatAck { id } => {
                    state.clients.touch(addr);
                    state.chat_acks.push(id);
                    Vec::new()
                }
                other => {
                    warn!("Unexpected {:?} packet from {}", other.packet_type(), addr);
                    Vec::new()
                }
            }
        };

        for datagram in responses {
            self.send_to(&datagram, addr).await;
        }
    }

    async fn send_to(&self, data: &[u8], addr: SocketAddr) {
        if let Err(e) = self.socket.send_to(data, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    /// Pushes a chat line to every logged-in session
    pub async fn push_chat(&self, message: &str) {
        let targets: Vec<(SocketAddr, u8)> = {
            let mut state = self.state.write().await;
            if state.silent {
                return;
            }
            state
                .clients
                .addrs()
                .into_iter()
                .filter_map(|addr| state.clients.next_chat_id(addr).map(|id| (addr, id)))
                .collect()
        };

        for (addr, id) in targets {
            let packet = Packet::Chat {
                id,
                message: message.to_string(),
            };
            self.send_to(&packet.encode(), addr).await;
        }
    }

    /// Adds a player to the listing and announces the connection in chat
    pub async fn add_player(&self, player: PlayerInfo) {
        let notice = format!(
            "Player #{} {} ({}:{}) connected",
            player.number, player.name, player.ip, player.port
        );
        self.state.write().await.players.push(player);
        self.push_chat(&notice).await;
    }

    /// Marks a player verified and announces it in chat
    pub async fn verify_player(&self, name: &str) {
        let notice = {
            let mut state = self.state.write().await;
            let Some(player) = state.players.iter_mut().find(|p| p.name == name) else {
                return;
            };
            player.verified = true;
            format!(
                "Verified GUID ({}) of player #{} {}",
                player.guid, player.number, player.name
            )
        };
        self.push_chat(&notice).await;
    }

    /// Removes a player from the listing and announces it in chat
    pub async fn remove_player(&self, name: &str) {
        let removed = {
            let mut state = self.state.write().await;
            let index = state.players.iter().position(|p| p.name == name);
            index.map(|index| state.players.remove(index))
        };
        if let Some(player) = removed {
            let notice = format!("Player #{} {} disconnected", player.number, player.name);
            self.push_chat(&notice).await;
        }
    }

    /// Changes the listing without any chat announcement
    pub async fn set_players(&self, players: Vec<PlayerInfo>) {
        self.state.write().await.players = players;
    }

    pub async fn set_bans(&self, bans: Vec<BanEntry>) {
        self.state.write().await.bans = bans;
    }

    pub async fn set_missions(&self, missions: Vec<String>) {
        self.state.write().await.missions = missions;
    }

    /// While silent the server drops every datagram unanswered
    pub async fn set_silent(&self, silent: bool) {
        info!("Mock server {}", if silent { "going silent" } else { "responding again" });
        self.state.write().await.silent = silent;
    }

    pub async fn received_commands(&self) -> Vec<String> {
        self.state.read().await.commands.clone()
    }

    pub async fn chat_acks(&self) -> Vec<u8> {
        self.state.read().await.chat_acks.clone()
    }

    pub async fn logged_in_clients(&self) -> usize {
        self.state.read().await.clients.len()
    }

    pub async fn is_locked(&self) -> bool {
        self.state.read().await.locked
    }
}
