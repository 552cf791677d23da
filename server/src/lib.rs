//! # Campfire Server Library
//!
//! This library provides the authoritative server for the shared campfire
//! scene. It owns the canonical world state, applies player commands,
//! advances the simulation on a fixed tick and streams every change to the
//! connected clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the only writable copy of the world: fire, logs, sticks,
//! marshmallows, the fox, the moon and every player's cursor. Clients never
//! mutate state themselves; they send commands and render what comes back.
//!
//! ### Change Streaming
//! Every mutation of the state tree is recorded as a `{path, operation,
//! value}` change. After each tick and each join the pending changes are
//! flushed, run through the room's own listeners and broadcast as one
//! `Patch` packet. A joining client receives a full snapshot first and only
//! patches afterwards.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Connection establishment and player id assignment
//! - Heartbeats and timeout detection
//! - Releasing whatever a departing player was dragging
//!
//! ## Module Organization
//!
//! - `config`: room tunables (`RoomConfig`)
//! - `world`: the state schema and the initial world
//! - `drag`: per-player drag sessions and their timeout
//! - `engine`: the per-tick simulation (`SimulationEngine`)
//! - `commands`: client message parsing and player command handlers
//! - `room`: engine plus change fan-out to local listeners
//! - `client_manager`: connected clients, addresses and timeouts
//! - `network`: UDP transport and the main server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::RoomConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16), // ~60Hz
//!         32,
//!         RoomConfig::default(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The server uses an event-driven architecture with internal async tasks:
//! - **Network Receiver**: listens for incoming packets
//! - **Network Sender**: drains the outgoing queue and performs broadcasts
//! - **Timeout Checker**: removes clients that stopped sending heartbeats
//! - **Main Loop**: owns the room; handles packets and ticks one at a time

pub mod client_manager;
pub mod commands;
pub mod config;
pub mod drag;
pub mod engine;
pub mod network;
pub mod room;
pub mod world;
