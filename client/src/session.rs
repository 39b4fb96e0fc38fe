//! RCON session state machine
//!
//! [`Session`] holds everything a connection needs (login state, command
//! sequence, liveness timestamps, reconnect budget, reassembly cache, roster
//! and task queue) and performs no I/O. Inputs arrive as method calls carrying
//! the current [`Instant`]; outputs are queued as [`Action`]s that the
//! background worker drains after every input:
//!
//! - [`Action::Transmit`]: a datagram to write to the socket
//! - [`Action::Notify`]: an event for subscribers
//! - [`Action::Reconnect`]: open a fresh transport, then call
//!   [`Session::transport_connected`]
//!
//! ## Connection lifecycle
//!
//! `Disconnected → Connecting → LoggingIn → LoggedIn`, falling back to
//! `Disconnected` when the transport fails, a login goes unanswered, or a
//! keep-alive is not acknowledged in time. With auto-reconnect enabled a lost
//! connection schedules up to `max_reconnect_attempts` attempts spaced
//! `reconnect_delay` apart; the budget refills only after a successful login.

use crate::config::Config;
use crate::events::{DisconnectReason, RconEvent};
use crate::error::RconError;
use crate::roster::Roster;
use crate::scheduler::{Scheduler, Task, TaskId, TaskKind};
use log::{debug, error, info, warn};
use protocol::commands;
use protocol::{
    classify_response, parse_bans, parse_chat, parse_missions, parse_player_table, Packet,
    ReassemblyCache, ResponseBody, ResponseKind, Sequencer,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Upper bound on the wait between reconnect attempts.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Waiting for the worker to open a transport.
    Connecting,
    /// Login packet sent, waiting for the verdict.
    LoggingIn,
    LoggedIn,
}

#[derive(Debug)]
pub enum Action {
    Transmit(Vec<u8>),
    Notify(RconEvent),
    Reconnect,
}

#[derive(Debug, Default)]
struct Liveness {
    /// Cleared when a dead connection is detected so the check fires once.
    last_heartbeat_sent: Option<Instant>,
    last_ack: Option<Instant>,
    last_keepalive: Option<Instant>,
}

#[derive(Debug, Default)]
struct ReconnectBudget {
    attempts: u32,
    next_attempt_at: Option<Instant>,
    exhausted: bool,
}

impl ReconnectBudget {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct Session {
    config: Config,
    state: ConnectionState,
    sequencer: Sequencer,
    liveness: Liveness,
    login_sent_at: Option<Instant>,
    reconnect: ReconnectBudget,
    cache: ReassemblyCache,
    roster: Roster,
    scheduler: Scheduler,
    actions: VecDeque<Action>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            sequencer: Sequencer::new(),
            liveness: Liveness::default(),
            login_sent_at: None,
            reconnect: ReconnectBudget::default(),
            cache: ReassemblyCache::new(),
            roster: Roster::new(),
            scheduler: Scheduler::new(),
            actions: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == ConnectionState::LoggedIn
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Next queued output, in the order it was produced.
    pub fn poll_action(&mut self) -> Option<Action> {
        self.actions.pop_front()
    }

    /// Operator-initiated connect. Also the way back after the reconnect
    /// budget is exhausted.
    pub fn start(&mut self) {
        info!("Connecting to {}", self.config.server_addr());
        self.reconnect.reset();
        self.state = ConnectionState::Connecting;
        self.actions.push_back(Action::Reconnect);
    }

    /// The worker opened a transport; log in over it.
    pub fn transport_connected(&mut self, now: Instant) {
        self.sequencer.reset();
        self.cache.clear();
        self.liveness = Liveness::default();
        self.state = ConnectionState::LoggingIn;
        self.login_sent_at = Some(now);

        self.transmit(Packet::Login {
            password: self.config.password.clone(),
        });
    }

    pub fn transport_lost(&mut self, now: Instant, reason: DisconnectReason) {
        self.connection_lost(now, reason);
    }

    /// Routes one datagram received from the server.
    pub fn handle_datagram(&mut self, data: &[u8], now: Instant) {
        let packet = match Packet::decode_from_server(data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping malformed datagram ({} bytes): {}", data.len(), e);
                return;
            }
        };

        match packet {
            Packet::LoginResponse { success } => self.handle_login_response(success, now),
            Packet::CommandResponse { sequence, body } => {
                self.handle_command_response(sequence, body, now)
            }
            Packet::Chat { id, message } => self.handle_chat(id, message),
            other => debug!("Ignoring unexpected {:?} packet", other.packet_type()),
        }
    }

    /// Sends an administrative command. Responses, if any, arrive later as events.
    pub fn send_command(&mut self, command: &str) -> Result<u8, RconError> {
        if !self.is_logged_in() {
            return Err(RconError::NotLoggedIn);
        }
        Ok(self.send_command_packet(command))
    }

    pub fn add_task(
        &mut self,
        kind: TaskKind,
        data: String,
        repeat: bool,
        period: Duration,
        initial_delay: Duration,
        now: Instant,
    ) -> Result<TaskId, RconError> {
        let id = self
            .scheduler
            .add_task(kind, data, repeat, period, initial_delay, now)?;
        info!(
            "Scheduled {:?} task {} every {:?}{}",
            kind,
            id,
            period,
            if repeat { "" } else { " (once)" }
        );
        Ok(id)
    }

    pub fn cancel_task(&mut self, id: TaskId) -> bool {
        self.scheduler.cancel(id)
    }

    /// Periodic housekeeping: liveness, keep-alive, due tasks and reconnects.
    pub fn tick(&mut self, now: Instant) {
        match self.state {
            ConnectionState::LoggedIn => {
                self.check_liveness(now);
                if self.is_logged_in() {
                    self.send_heartbeat_if_due(now);
                    self.run_due_tasks(now);
                }
            }
            ConnectionState::LoggingIn => {
                let expired = self
                    .login_sent_at
                    .map_or(false, |sent| now.duration_since(sent) > self.config.ack_timeout);
                if expired {
                    self.connection_lost(now, DisconnectReason::LoginTimeout);
                }
            }
            ConnectionState::Connecting => {}
            ConnectionState::Disconnected => self.attempt_reconnect(now),
        }
    }

    fn handle_login_response(&mut self, success: bool, now: Instant) {
        if self.state != ConnectionState::LoggingIn {
            debug!("Ignoring login response in state {:?}", self.state);
            return;
        }
        self.login_sent_at = None;

        if !success {
            error!("Login rejected by {}; check the RCON password", self.config.server_addr());
            self.state = ConnectionState::Disconnected;
            self.notify(RconEvent::LoginFailed);
            return;
        }

        info!("Logged in to {}", self.config.server_addr());
        self.state = ConnectionState::LoggedIn;
        self.reconnect.reset();
        self.liveness.last_keepalive = Some(now);
        self.notify(RconEvent::LoggedIn);
        self.send_command_packet(commands::PLAYERS);
    }

    fn handle_command_response(&mut self, sequence: u8, body: ResponseBody, now: Instant) {
        self.liveness.last_ack = Some(now);

        match body {
            ResponseBody::Ack => debug!("Ack for sequence {}", sequence),
            ResponseBody::Part {
                total,
                index,
                fragment,
            } => {
                if let Some(text) = self.cache.insert(sequence, total, index, &fragment) {
                    self.route_response(sequence, text);
                }
            }
            ResponseBody::Text(text) => self.route_response(sequence, text),
        }
    }

    fn route_response(&mut self, sequence: u8, text: String) {
        match classify_response(&text) {
            ResponseKind::Players => {
                let listing = parse_player_table(&text);
                debug!("Player listing with {} entries", listing.len());
                for event in self.roster.refresh(listing) {
                    self.notify(event);
                }
            }
            ResponseKind::Missions => self.notify(RconEvent::Missions(parse_missions(&text))),
            ResponseKind::Bans => self.notify(RconEvent::Bans(parse_bans(&text))),
            ResponseKind::Other => self.notify(RconEvent::CommandResponse { sequence, text }),
        }
    }

    fn handle_chat(&mut self, id: u8, message: String) {
        // The server drops clients that leave chat packets unacknowledged
        self.transmit(Packet::ChatAck { id });

        debug!("Chat: {}", message);
        let notice = parse_chat(&message);
        self.notify(RconEvent::Chat(message));

        if let Some(notice) = notice {
            for event in self.roster.apply_chat(notice) {
                self.notify(event);
            }
        }
    }

    fn check_liveness(&mut self, now: Instant) {
        let Some(sent) = self.liveness.last_heartbeat_sent else {
            return;
        };
        let acked = self.liveness.last_ack.map_or(false, |ack| ack >= sent);

        if !acked && now.duration_since(sent) > self.config.ack_timeout {
            self.connection_lost(now, DisconnectReason::LivenessTimeout);
        }
    }

    fn send_heartbeat_if_due(&mut self, now: Instant) {
        let due = self
            .liveness
            .last_keepalive
            .map_or(true, |last| now.duration_since(last) >= self.config.heartbeat_interval);
        if !due {
            return;
        }

        let sequence = self.send_command_packet("");
        debug!("Keep-alive sent with sequence {}", sequence);

        // The gap is measured from the oldest keep-alive still unanswered
        let outstanding = match (self.liveness.last_heartbeat_sent, self.liveness.last_ack) {
            (Some(sent), Some(ack)) => ack < sent,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !outstanding {
            self.liveness.last_heartbeat_sent = Some(now);
        }
        self.liveness.last_keepalive = Some(now);
    }

    fn run_due_tasks(&mut self, now: Instant) {
        let mut repeating = Vec::new();

        while let Some(task) = self.scheduler.pop_due(now) {
            self.execute_task(&task);
            if task.repeat {
                repeating.push(task);
            }
        }

        for task in repeating {
            self.scheduler.reschedule(task, now);
        }
    }

    fn execute_task(&mut self, task: &Task) {
        info!("Running scheduled {:?} task {}", task.kind, task.id);

        match task.kind {
            TaskKind::GlobalMessage => {
                self.send_command_packet(&commands::say_all(&task.data));
            }
            TaskKind::KickAll => {
                let slots: Vec<String> = self
                    .roster
                    .snapshot()
                    .into_iter()
                    .map(|player| player.number)
                    .collect();
                let message = self.config.kick_all_message.clone();
                for slot in slots {
                    self.send_command_packet(&commands::kick(&slot, &message));
                }
            }
            TaskKind::Shutdown => {
                self.send_command_packet(commands::SHUTDOWN);
                self.notify(RconEvent::ShutdownRequested);
            }
            TaskKind::Lock => {
                self.send_command_packet(commands::LOCK);
            }
            TaskKind::Unlock => {
                self.send_command_packet(commands::UNLOCK);
            }
        }
    }

    fn connection_lost(&mut self, now: Instant, reason: DisconnectReason) {
        let was_logged_in = self.is_logged_in();

        self.state = ConnectionState::Disconnected;
        self.login_sent_at = None;
        self.liveness = Liveness::default();
        self.cache.clear();

        if was_logged_in {
            warn!("Connection to {} lost: {}", self.config.server_addr(), reason);
            self.notify(RconEvent::Disconnected(reason));
        } else {
            warn!("Connection attempt to {} failed: {}", self.config.server_addr(), reason);
        }

        if self.config.auto_reconnect
            && !self.reconnect.exhausted
            && self.reconnect.next_attempt_at.is_none()
        {
            info!("Reconnecting in {:?}", self.reconnect_delay());
            self.reconnect.next_attempt_at = Some(now + self.reconnect_delay());
        }
    }

    fn reconnect_delay(&self) -> Duration {
        self.config.reconnect_delay.min(MAX_RECONNECT_DELAY)
    }

    fn attempt_reconnect(&mut self, now: Instant) {
        let Some(at) = self.reconnect.next_attempt_at else {
            return;
        };
        if now < at {
            return;
        }

        let max = self.config.max_reconnect_attempts;
        if self.reconnect.attempts >= max {
            error!("Giving up after {} reconnect attempts", max);
            self.reconnect.next_attempt_at = None;
            self.reconnect.exhausted = true;
            self.notify(RconEvent::ReconnectExhausted);
            return;
        }

        self.reconnect.attempts += 1;
        self.reconnect.next_attempt_at = Some(now + self.reconnect_delay());
        info!("Reconnect attempt {}/{}", self.reconnect.attempts, max);

        self.state = ConnectionState::Connecting;
        self.actions.push_back(Action::Reconnect);
    }

    fn send_command_packet(&mut self, command: &str) -> u8 {
        let sequence = self.sequencer.advance();
        self.transmit(Packet::Command {
            sequence,
            command: command.to_string(),
        });
        sequence
    }

    fn transmit(&mut self, packet: Packet) {
        self.actions.push_back(Action::Transmit(packet.encode()));
    }

    fn notify(&mut self, event: RconEvent) {
        self.actions.push_back(Action::Notify(event));
    }
}
