//! Client network layer: the background worker and its public handle
//!
//! A single worker task owns the [`Session`] and the UDP socket. It is driven
//! by three sources multiplexed with `tokio::select!`: requests from
//! [`RconClient`] handles, datagrams forwarded by a receiver task, and a tick
//! interval. After every input the worker drains the session's queued actions,
//! writing datagrams, publishing events and opening transports as asked.

use crate::config::Config;
use crate::error::RconError;
use crate::events::{DisconnectReason, RconEvent};
use crate::scheduler::{TaskId, TaskKind};
use crate::session::{Action, ConnectionState, Session};
use log::{debug, error, info, trace, warn};
use protocol::commands;
use protocol::PlayerInfo;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Events buffered per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;
const RECV_BUFFER_SIZE: usize = 65536;
const MIN_TICK: Duration = Duration::from_millis(1);

/// Messages sent from client handles to the worker
enum Request {
    Start,
    Command {
        command: String,
        reply: oneshot::Sender<Result<u8, RconError>>,
    },
    AddTask {
        kind: TaskKind,
        data: String,
        repeat: bool,
        period: Duration,
        initial_delay: Duration,
        reply: oneshot::Sender<Result<TaskId, RconError>>,
    },
    CancelTask {
        id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    Players(oneshot::Sender<Vec<PlayerInfo>>),
    Shutdown,
}

/// Messages sent from the receiver task to the worker
///
/// Each transport gets a new generation; anything tagged with an older one
/// belongs to a socket that has since been replaced.
#[derive(Debug)]
enum Inbound {
    Datagram { generation: u64, data: Vec<u8> },
    Failed { generation: u64, error: String },
}

struct Worker {
    session: Session,
    config: Config,
    socket: Option<Arc<UdpSocket>>,
    receiver: Option<JoinHandle<()>>,
    generation: u64,

    // Communication channels
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    requests: mpsc::UnboundedReceiver<Request>,
    events: broadcast::Sender<RconEvent>,
    state: watch::Sender<ConnectionState>,
}

impl Worker {
    async fn run(mut self) {
        let mut ticker = interval(self.config.tick_interval.max(MIN_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!("Client worker started for {}", self.config.server_addr());

        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    match request {
                        Some(Request::Shutdown) | None => {
                            info!("Client shutting down");
                            break;
                        }
                        Some(request) => self.handle_request(request),
                    }
                },

                Some(inbound) = self.inbound_rx.recv() => {
                    self.handle_inbound(inbound);
                },

                _ = ticker.tick() => {
                    self.session.tick(Instant::now());
                },
            }

            self.flush().await;
        }

        self.close_transport();
        self.state.send_replace(ConnectionState::Disconnected);
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Start => self.session.start(),
            Request::Command { command, reply } => {
                let _ = reply.send(self.session.send_command(&command));
            }
            Request::AddTask {
                kind,
                data,
                repeat,
                period,
                initial_delay,
                reply,
            } => {
                let result = self
                    .session
                    .add_task(kind, data, repeat, period, initial_delay, Instant::now());
                let _ = reply.send(result);
            }
            Request::CancelTask { id, reply } => {
                let _ = reply.send(self.session.cancel_task(id));
            }
            Request::Players(reply) => {
                let _ = reply.send(self.session.roster().snapshot());
            }
            Request::Shutdown => {}
        }
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Datagram { generation, data } if generation == self.generation => {
                trace!("Received {} bytes", data.len());
                self.session.handle_datagram(&data, Instant::now());
            }
            Inbound::Failed { generation, error } if generation == self.generation => {
                self.close_transport();
                self.session
                    .transport_lost(Instant::now(), DisconnectReason::Transport(error));
            }
            stale => debug!("Discarding input from a closed transport: {:?}", stale),
        }
    }

    /// Carries out everything the session queued, then publishes its state.
    async fn flush(&mut self) {
        while let Some(action) = self.session.poll_action() {
            match action {
                Action::Transmit(data) => self.transmit(&data).await,
                Action::Notify(event) => {
                    // State goes out ahead of the event it explains
                    self.publish_state();
                    // No subscribers is not an error
                    let _ = self.events.send(event);
                }
                Action::Reconnect => self.open_transport().await,
            }
        }

        if self.session.state() == ConnectionState::Disconnected && self.socket.is_some() {
            self.close_transport();
        }
        self.publish_state();
    }

    fn publish_state(&self) {
        let state = self.session.state();
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    async fn transmit(&mut self, data: &[u8]) {
        let result = match &self.socket {
            Some(socket) => socket.send(data).await,
            None => {
                debug!("No open transport; dropping {} byte datagram", data.len());
                return;
            }
        };

        match result {
            Ok(_) => trace!("Sent {} bytes", data.len()),
            Err(e) => {
                error!("Failed to send to {}: {}", self.config.server_addr(), e);
                self.close_transport();
                self.session
                    .transport_lost(Instant::now(), DisconnectReason::Transport(e.to_string()));
            }
        }
    }

    async fn open_transport(&mut self) {
        self.close_transport();

        match self.connect_socket().await {
            Ok(socket) => {
                let socket = Arc::new(socket);
                self.receiver = Some(spawn_receiver(
                    Arc::clone(&socket),
                    self.generation,
                    self.inbound_tx.clone(),
                ));
                self.socket = Some(socket);
                self.session.transport_connected(Instant::now());
            }
            Err(e) => {
                warn!("Could not open transport to {}: {}", self.config.server_addr(), e);
                self.session
                    .transport_lost(Instant::now(), DisconnectReason::Transport(e.to_string()));
            }
        }
    }

    async fn connect_socket(&self) -> Result<UdpSocket, RconError> {
        let addr = self.config.server_addr();
        let target = lookup_host(&addr)
            .await?
            .next()
            .ok_or_else(|| RconError::Resolve(addr.clone()))?;

        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        debug!("Transport {} -> {}", socket.local_addr()?, target);
        Ok(socket)
    }

    fn close_transport(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
        self.socket = None;
        self.generation += 1;
    }
}

/// Spawns task that forwards every datagram on `socket` to the worker
fn spawn_receiver(
    socket: Arc<UdpSocket>,
    generation: u64,
    inbound: mpsc::UnboundedSender<Inbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let message = match socket.recv(&mut buffer).await {
                Ok(len) => Inbound::Datagram {
                    generation,
                    data: buffer[..len].to_vec(),
                },
                Err(e) => Inbound::Failed {
                    generation,
                    error: e.to_string(),
                },
            };
            let failed = matches!(message, Inbound::Failed { .. });

            if inbound.send(message).is_err() || failed {
                break;
            }
        }
    })
}

/// Handle to a running RCON client
///
/// Every method forwards to the background worker, so the handle is cheap to
/// call from any task. Dropping the handle stops the worker.
pub struct RconClient {
    requests: mpsc::UnboundedSender<Request>,
    events: broadcast::Sender<RconEvent>,
    state: watch::Receiver<ConnectionState>,
    worker: Option<JoinHandle<()>>,
}

impl RconClient {
    /// Spawns an idle worker. Nothing is sent until [`start`](Self::start).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let worker = Worker {
            session: Session::new(config.clone()),
            config,
            socket: None,
            receiver: None,
            generation: 0,
            inbound_tx,
            inbound_rx,
            requests: requests_rx,
            events: events.clone(),
            state: state_tx,
        };

        RconClient {
            requests: requests_tx,
            events,
            state: state_rx,
            worker: Some(tokio::spawn(worker.run())),
        }
    }

    /// Creates a client and starts connecting straight away.
    ///
    /// Events produced before the first [`subscribe`](Self::subscribe) are
    /// missed; use [`new`](Self::new) then `start` to observe everything.
    pub fn connect(config: Config) -> Result<Self, RconError> {
        let client = Self::new(config);
        client.start()?;
        Ok(client)
    }

    /// Connects and logs in, reconnecting on failure if configured to.
    pub fn start(&self) -> Result<(), RconError> {
        self.request(Request::Start)
    }

    /// Drops the current transport and connects again with a full
    /// reconnect budget.
    pub fn restart(&self) -> Result<(), RconError> {
        self.request(Request::Start)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RconEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == ConnectionState::LoggedIn
    }

    /// Receiver that observes every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub async fn wait_for_login(&self, timeout: Duration) -> Result<(), RconError> {
        let mut state = self.state.clone();
        // The watch guard borrows `state`, so it must be dropped inside the future
        let logged_in = async move {
            let reached = state
                .wait_for(|state| *state == ConnectionState::LoggedIn)
                .await
                .map(|_| ());
            reached
        };

        match tokio::time::timeout(timeout, logged_in).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RconError::WorkerStopped),
            Err(_) => Err(RconError::Timeout),
        }
    }

    /// Sends a raw command and returns the sequence number it went out with.
    ///
    /// Fails with [`RconError::NotLoggedIn`] unless a session is established.
    pub async fn send_command(&self, command: impl Into<String>) -> Result<u8, RconError> {
        let command = command.into();
        self.call(|reply| Request::Command { command, reply }).await?
    }

    /// Broadcasts a message to every player.
    pub async fn say(&self, message: &str) -> Result<u8, RconError> {
        self.send_command(commands::say_all(message)).await
    }

    pub async fn say_to(&self, slot: u32, message: &str) -> Result<u8, RconError> {
        self.send_command(commands::say_to(slot, message)).await
    }

    pub async fn kick(&self, slot: &str, reason: &str) -> Result<u8, RconError> {
        self.send_command(commands::kick(slot, reason)).await
    }

    /// Bans a GUID for `minutes`, `0` meaning permanently.
    pub async fn ban_guid(&self, guid: &str, minutes: u32, reason: &str) -> Result<u8, RconError> {
        self.send_command(commands::add_ban(guid, minutes, reason)).await
    }

    pub async fn lock(&self) -> Result<u8, RconError> {
        self.send_command(commands::LOCK).await
    }

    pub async fn unlock(&self) -> Result<u8, RconError> {
        self.send_command(commands::UNLOCK).await
    }

    pub async fn shutdown_server(&self) -> Result<u8, RconError> {
        self.send_command(commands::SHUTDOWN).await
    }

    /// Asks for a fresh `players` listing; the roster updates when it arrives.
    pub async fn refresh_players(&self) -> Result<u8, RconError> {
        self.send_command(commands::PLAYERS).await
    }

    /// The answer arrives as [`RconEvent::Bans`].
    pub async fn request_bans(&self) -> Result<u8, RconError> {
        self.send_command(commands::BANS).await
    }

    /// The answer arrives as [`RconEvent::Missions`].
    pub async fn request_missions(&self) -> Result<u8, RconError> {
        self.send_command(commands::MISSIONS).await
    }

    /// Schedules a task whose first run is one `period` from now.
    ///
    /// Tasks only run while logged in; a task that comes due while the
    /// connection is down runs on the first tick after the next login.
    pub async fn add_task(
        &self,
        kind: TaskKind,
        data: impl Into<String>,
        repeat: bool,
        period: Duration,
        initial_delay: Duration,
    ) -> Result<TaskId, RconError> {
        let data = data.into();
        self.call(|reply| Request::AddTask {
            kind,
            data,
            repeat,
            period,
            initial_delay,
            reply,
        })
        .await?
    }

    /// Returns whether a queued task with `id` was removed.
    pub async fn cancel_task(&self, id: TaskId) -> Result<bool, RconError> {
        self.call(|reply| Request::CancelTask { id, reply }).await
    }

    /// Snapshot of the roster, ordered by slot.
    pub async fn players(&self) -> Result<Vec<PlayerInfo>, RconError> {
        self.call(Request::Players).await
    }

    pub async fn player_count(&self) -> Result<usize, RconError> {
        Ok(self.players().await?.len())
    }

    /// Stops the worker and waits for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self.requests.send(Request::Shutdown);

        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!("Client worker failed: {}", e);
            }
        }
    }

    fn request(&self, request: Request) -> Result<(), RconError> {
        self.requests
            .send(request)
            .map_err(|_| RconError::WorkerStopped)
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, RconError> {
        let (reply, response) = oneshot::channel();
        self.request(make(reply))?;
        response.await.map_err(|_| RconError::WorkerStopped)
    }
}

impl Drop for RconClient {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.requests.send(Request::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 9,
            auto_reconnect: false,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_idle_client_is_disconnected() {
        let client = RconClient::new(unreachable_config());

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_logged_in());
        assert_eq!(client.player_count().await.unwrap(), 0);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_commands_rejected_before_login() {
        let client = RconClient::new(unreachable_config());

        let result = client.say("hello").await;
        assert!(matches!(result, Err(RconError::NotLoggedIn)));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_for_login_times_out() {
        let client = RconClient::new(unreachable_config());

        let result = client.wait_for_login(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(RconError::Timeout)));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_tasks_managed_while_offline() {
        let client = RconClient::new(unreachable_config());

        let id = client
            .add_task(
                TaskKind::GlobalMessage,
                "hello",
                true,
                Duration::from_secs(60),
                Duration::ZERO,
            )
            .await
            .unwrap();

        assert!(client.cancel_task(id).await.unwrap());
        assert!(!client.cancel_task(id).await.unwrap());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_out_of_range_period_keeps_worker_alive() {
        let client = RconClient::new(unreachable_config());

        let result = client
            .add_task(TaskKind::Lock, "", false, Duration::MAX, Duration::ZERO)
            .await;
        assert!(matches!(result, Err(RconError::InvalidPeriod(_))));

        assert_eq!(client.player_count().await.unwrap(), 0);

        client.shutdown().await;
    }
}
