//! WebSocket Game Server
//!
//! Async WebSocket server for the pong match.
//!
//! One match task owns the [`MatchSession`]. Each connection task parses
//! inbound frames and forwards them as [`SessionCommand`]s; outbound
//! snapshots flow back through a bounded per-connection queue.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{MatchConfig, SessionId};
use crate::game::tick::TickResult;
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::session::MatchSession;

/// Outbound messages buffered per connection before snapshots are dropped.
pub const OUTBOUND_QUEUE: usize = 64;

/// Commands buffered between connection tasks and the match task.
const COMMAND_QUEUE: usize = 1024;

/// How long a closing connection gets to flush its last messages.
const FLUSH_TIMEOUT: Duration = Duration::from_millis(250);

// =============================================================================
// CONFIG
// =============================================================================

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Simulation rate (Hz).
    pub tick_rate: u32,
    /// Snapshot broadcast rate (Hz).
    pub broadcast_rate: u32,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 64,
            tick_rate: crate::TICK_RATE,
            broadcast_rate: crate::TICK_RATE,
            version: crate::VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from `PONG_*` environment variables.
    ///
    /// Unset variables keep their default; unparsable ones log a warning
    /// and keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            bind_addr: parse_or("PONG_BIND_ADDR", &lookup, defaults.bind_addr, |_| true),
            max_connections: parse_or(
                "PONG_MAX_CONNECTIONS",
                &lookup,
                defaults.max_connections,
                |&n| n > 0,
            ),
            tick_rate: parse_or("PONG_TICK_RATE", &lookup, defaults.tick_rate, |&n| n > 0),
            broadcast_rate: parse_or(
                "PONG_BROADCAST_RATE",
                &lookup,
                defaults.broadcast_rate,
                |&n| n > 0,
            ),
            version: defaults.version,
        }
    }

    /// Game rules matching this config. A countdown step stays one second
    /// whatever the tick rate.
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            countdown_step_ticks: self.tick_rate.max(1),
            ..MatchConfig::default()
        }
    }
}

fn parse_or<T, F, V>(key: &str, lookup: &F, default: T, valid: V) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!("Invalid {}={:?}, using default {}", key, raw, default);
            default
        }
    }
}

/// Interval period for a rate in Hz.
fn period(rate_hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(rate_hz.max(1)))
}

// =============================================================================
// ERRORS
// =============================================================================

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,

    /// The match task is no longer accepting commands.
    #[error("Match task has stopped")]
    MatchClosed,
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Everything a connection task can ask of the match task.
#[derive(Debug)]
pub enum SessionCommand {
    /// A socket was accepted.
    Connect {
        /// New session.
        id: SessionId,
        /// Its outbound queue.
        sender: mpsc::Sender<ServerMessage>,
    },
    /// A parsed inbound message.
    Message {
        /// Sender.
        id: SessionId,
        /// Message.
        msg: ClientMessage,
    },
    /// The socket closed.
    Disconnect {
        /// Session that left.
        id: SessionId,
    },
}

// =============================================================================
// SERVER
// =============================================================================

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Rules for the hosted match.
    match_config: MatchConfig,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, SessionId>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, match_config: MatchConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            match_config,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Pong server listening on {}", listener.local_addr()?);

        let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(COMMAND_QUEUE);
        let session = MatchSession::new(self.match_config.clone());
        let match_handle = tokio::spawn(Self::run_match_loop(
            session,
            command_rx,
            self.config.tick_rate,
            self.config.broadcast_rate,
            self.shutdown_tx.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Err(e) = self.admit().await {
                                warn!("{}, rejecting {}", e, addr);
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr, command_tx.clone());
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(command_tx);
        if let Err(e) = match_handle.await {
            error!("Match task failed: {}", e);
        }

        Ok(())
    }

    /// Check the connection limit.
    async fn admit(&self) -> Result<(), GameServerError> {
        if self.clients.read().await.len() >= self.config.max_connections {
            return Err(GameServerError::ConnectionLimitReached);
        }
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        commands: mpsc::Sender<SessionCommand>,
    ) {
        let clients = self.clients.clone();
        let version = self.config.version.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            match Self::run_connection(stream, addr, clients, commands, shutdown_rx, version).await
            {
                Ok(()) => {}
                Err(GameServerError::WebSocket(e)) => {
                    error!("WebSocket error for {}: {}", addr, e);
                }
                Err(e) => debug!("Connection {} ended: {}", addr, e),
            }
        });
    }

    async fn run_connection(
        stream: TcpStream,
        addr: SocketAddr,
        clients: Arc<RwLock<BTreeMap<SocketAddr, SessionId>>>,
        commands: mpsc::Sender<SessionCommand>,
        mut shutdown_rx: broadcast::Receiver<()>,
        version: String,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);

        let id = SessionId::new_v4();
        clients.write().await.insert(addr, id);
        info!("Session {} connected from {}", id.short(), addr);

        // Queued first so it precedes every snapshot
        let _ = msg_tx.try_send(ServerMessage::Welcome {
            session_id: id.to_string(),
            version,
        });

        // Spawn message sender task
        let mut sender_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
                if matches!(msg, ServerMessage::Shutdown { .. }) {
                    let _ = ws_sender.close().await;
                    break;
                }
            }
        });

        let result = match commands
            .send(SessionCommand::Connect {
                id,
                sender: msg_tx.clone(),
            })
            .await
        {
            Ok(()) => {
                Self::pump_inbound(id, addr, &mut ws_receiver, &commands, &mut shutdown_rx, &msg_tx)
                    .await
            }
            Err(_) => Err(GameServerError::MatchClosed),
        };

        // Cleanup
        let _ = commands.send(SessionCommand::Disconnect { id }).await;
        clients.write().await.remove(&addr);
        drop(msg_tx);
        if timeout(FLUSH_TIMEOUT, &mut sender_task).await.is_err() {
            sender_task.abort();
        }
        info!("Session {} disconnected", id.short());

        result
    }

    /// Forward inbound frames until the socket closes or the server stops.
    async fn pump_inbound<S>(
        id: SessionId,
        addr: SocketAddr,
        ws_receiver: &mut S,
        commands: &mpsc::Sender<SessionCommand>,
        shutdown_rx: &mut broadcast::Receiver<()>,
        msg_tx: &mpsc::Sender<ServerMessage>,
    ) -> Result<(), GameServerError>
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let msg = match ClientMessage::from_json(&text) {
                                Ok(m) => m,
                                Err(e) => {
                                    debug!("Invalid message from {}: {}", addr, e);
                                    continue;
                                }
                            };
                            commands
                                .send(SessionCommand::Message { id, msg })
                                .await
                                .map_err(|_| GameServerError::MatchClosed)?;
                        }
                        Some(Ok(Message::Binary(_))) => {
                            debug!("Ignoring binary frame from {}", addr);
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} closed the connection", addr);
                            return Ok(());
                        }
                        Some(Err(e)) => return Err(e.into()),
                        // Ping/pong are answered by the WebSocket layer
                        Some(Ok(_)) => {}
                    }
                }
                _ = shutdown_rx.recv() => {
                    let _ = msg_tx.send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    }).await;
                    return Ok(());
                }
            }
        }
    }

    /// The match task: sole owner of the session.
    ///
    /// Commands queued before a simulation step are applied before it.
    /// Broadcasts never wait on a slow client.
    async fn run_match_loop(
        mut session: MatchSession,
        mut commands: mpsc::Receiver<SessionCommand>,
        tick_rate: u32,
        broadcast_rate: u32,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut sim_interval = interval(period(tick_rate));
        sim_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_interval = interval(period(broadcast_rate));
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut finished_logged = false;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => break,

                _ = sim_interval.tick() => {
                    while let Ok(command) = commands.try_recv() {
                        Self::handle_command(&mut session, command);
                    }
                    if let Some(result) = session.run_tick() {
                        log_tick(&result);
                        if result.match_ended && !finished_logged {
                            info!("Match over after {} ticks", session.state().tick);
                            finished_logged = true;
                        }
                    }
                }

                _ = broadcast_interval.tick() => {
                    session.broadcast_state();
                }

                command = commands.recv() => {
                    match command {
                        Some(command) => Self::handle_command(&mut session, command),
                        None => break,
                    }
                }
            }
        }

        debug!(
            "Match loop stopped with {} connections",
            session.connection_count()
        );
    }

    fn handle_command(session: &mut MatchSession, command: SessionCommand) {
        match command {
            SessionCommand::Connect { id, sender } => {
                session.connect(id, sender);
            }
            SessionCommand::Message { id, msg } => {
                if let Err(e) = session.apply(id, msg) {
                    debug!("Dropped message from {}: {}", id.short(), e);
                }
            }
            SessionCommand::Disconnect { id } => {
                if let Some(side) = session.disconnect(&id) {
                    info!("{} left, {:?} slot is free", side.player_label(), side);
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

fn log_tick(result: &TickResult) {
    for event in &result.events {
        log_event(event);
    }
}

fn log_event(event: &GameEvent) {
    match &event.data {
        GameEventData::PointScored { scorer, score } => {
            info!(
                "{} scores ({}-{})",
                scorer.player_label(),
                score.player1,
                score.player2
            );
        }
        GameEventData::MatchWon { winner, score } => {
            info!(
                "{} wins {}-{}",
                winner.player_label(),
                score.player1,
                score.player2
            );
        }
        data if event.is_notable() => info!("tick {}: {:?}", event.tick, data),
        data => trace!("tick {}: {:?}", event.tick, data),
    }
}
