//! Client connection management for the campfire server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Assignment of the player id each connection plays under
//! - Connection health monitoring and automatic cleanup
//!
//! The client manager decides which clients are allowed into the room and
//! maps network addresses back to players.

use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Length of the random session token in a player id
const SESSION_TOKEN_LEN: usize = 9;

/// Clients silent for longer than this are dropped
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Player id used in the state tree, stable for the connection
    pub player_id: String,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    /// Creates a new client with the given ID, player id and network address
    pub fn new(id: u32, player_id: String, addr: SocketAddr) -> Self {
        Self {
            id,
            player_id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Builds a player id of the form `<client id>_<session token>`.
pub fn player_id_for<R: Rng>(client_id: u32, rng: &mut R) -> String {
    let token: String = rng
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect();
    format!("{}_{}", client_id, token)
}

/// Manages all connected clients
///
/// The ClientManager enforces server capacity limits and keeps the mapping
/// between network addresses, client ids and player ids.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns the client id and player id if successful, None if the server
    /// is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<(u32, String)> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let player_id = player_id_for(client_id, &mut rand::thread_rng());
        info!(
            "Client {} connected from {} as {}",
            client_id, addr, player_id
        );
        self.clients
            .insert(client_id, Client::new(client_id, player_id.clone(), addr));

        Some((client_id, player_id))
    }

    /// Removes a client from the server
    ///
    /// Returns the player id of the removed client, or None if they were
    /// already gone. This handles both explicit disconnections and timeout
    /// cleanup.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<String> {
        self.clients.remove(client_id).map(|client| {
            info!("Client {} disconnected", client.id);
            client.player_id
        })
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Finds the client id and player id behind a network address
    pub fn find_player_by_addr(&self, addr: SocketAddr) -> Option<(u32, String)> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| (client.id, client.player_id.clone()))
    }

    /// Records activity from a client. Returns false for unknown clients.
    pub fn touch(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
            true
        } else {
            false
        }
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed clients with their player ids so the room can
    /// release whatever those players were holding.
    pub fn check_timeouts(&mut self) -> Vec<(u32, String)> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|client_id| {
                self.remove_client(&client_id)
                    .map(|player_id| (client_id, player_id))
            })
            .collect()
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
