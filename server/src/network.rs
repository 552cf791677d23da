//! Server network layer handling UDP communications and room loop coordination

use crate::client_manager::ClientManager;
use crate::config::RoomConfig;
use crate::room::{now_millis, Room};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Longest step the simulation advances in one tick, in milliseconds
const MAX_TICK_MS: f64 = 50.0;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
        player_id: String,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from room loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

/// Main server coordinating networking and the room simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    room: Room,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: RoomConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            room: Room::new(config)?,
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        // Encode once for every recipient.
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast packet: {}", e);
                                continue;
                            }
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for (client_id, player_id) in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout {
                        client_id,
                        player_id,
                    }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Sends every pending room change to connected clients as one patch
    fn broadcast_changes(&mut self, exclude: Option<u32>) {
        let changes = self.room.flush();
        if changes.is_empty() {
            return;
        }

        let packet = Packet::Patch {
            tick: self.room.current_tick(),
            changes,
        };
        self.broadcast_packet(packet, exclude);
    }

    /// Processes incoming packets and applies them to the room
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join { client_version } => {
                info!(
                    "Client joining from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: format!(
                            "Unsupported client version {} (server speaks {})",
                            client_version, PROTOCOL_VERSION
                        ),
                    };
                    self.send_packet(response, addr);
                    return;
                }

                // Replace an existing connection from the same address
                let existing = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(existing_id) = existing {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    let player_id = {
                        let mut clients = self.clients.write().await;
                        clients.remove_client(&existing_id)
                    };
                    if let Some(player_id) = player_id {
                        self.room.leave(&player_id);
                    }
                }

                let joined = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                match joined {
                    Some((client_id, player_id)) => {
                        // Existing clients catch up before the snapshot is
                        // taken; the joiner gets everything after it as patches.
                        self.broadcast_changes(Some(client_id));

                        let response = Packet::Joined {
                            player_id: player_id.clone(),
                            state: self.room.snapshot(),
                        };
                        self.send_packet(response, addr);
                        self.room.join(&player_id);
                    }
                    None => {
                        let response = Packet::Disconnected {
                            reason: "Server full".to_string(),
                        };
                        self.send_packet(response, addr);
                    }
                }
            }

            Packet::Message(message) => {
                let player = {
                    let mut clients = self.clients.write().await;
                    let player = clients.find_player_by_addr(addr);
                    if let Some((client_id, _)) = &player {
                        clients.touch(*client_id);
                    }
                    player
                };

                match player {
                    Some((_, player_id)) => {
                        self.room.handle_message(&player_id, &message, now_millis());
                    }
                    None => debug!("Message from unknown address {}", addr),
                }
            }

            Packet::Heartbeat => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.touch(client_id);
                }
            }

            Packet::Leave => {
                let player_id = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|client_id| clients.remove_client(&client_id))
                };

                if let Some(player_id) = player_id {
                    self.room.leave(&player_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id, player_id }) => {
                            info!("Client {} timed out", client_id);
                            self.room.leave(&player_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = tick_millis(now.duration_since(last_tick));
                    last_tick = now;

                    self.room.tick(dt, now_millis());
                    self.broadcast_changes(None);

                    // Periodic monitoring
                    let tick = self.room.current_tick();
                    if tick % 60 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };

                        if client_count > 0 {
                            let stats = self.room.stats();
                            debug!("Tick {}: {} clients, {:.1}Hz, {} logs burned, {} marshmallows eaten",
                                   tick, client_count, 1000.0 / dt.max(1.0),
                                   stats.logs_burned, stats.marshmallows_eaten);
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

/// Converts an elapsed interval into a simulation step, capped so a stalled
/// loop does not teleport the world forward.
fn tick_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).min(MAX_TICK_MS)
}
