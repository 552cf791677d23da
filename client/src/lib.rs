//! # Campfire Client Library
//!
//! This library provides the client side of the shared campfire scene. The
//! client owns no game logic: it mirrors the server's state tree, keeps a
//! renderable proxy for every entity in step with incoming changes, and
//! turns pointer input into commands for the server.
//!
//! ## Architecture Overview
//!
//! ### State Mirroring
//! On join the server sends a full snapshot; afterwards only `Patch` packets
//! of `{path, operation, value}` changes arrive. Each change is applied to a
//! local [`shared::StateTree`] and then dispatched through a path
//! subscription registry whose listeners update the matching proxy.
//!
//! ### Proxies
//! A proxy is a renderable stand-in for one state entity. Attribute updates
//! are routed through per-kind dispatch tables, so a sprite, an animated
//! sprite and a group each know which attributes change how they draw.
//!
//! ### Threading
//! The network session runs on its own thread with a single-threaded tokio
//! runtime. The macroquad frame loop exchanges messages and events with it
//! over channels and never blocks on the socket.
//!
//! ## Module Organization
//!
//! - `proxy`: renderable proxies and their attribute dispatch tables
//! - `reconciler`: the state mirror and change routing (`ClientReconciler`)
//! - `scene`: which entities the campfire draws, mounting and hit testing
//! - `input`: pointer input to `dragLog`/`dragStick`/`moveCursor`/`releaseCursor`
//! - `network`: the UDP session with the server
//! - `rendering`: macroquad drawing of the scene
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{NetworkEvent, NetworkHandle};
//! use client::scene::CampScene;
//!
//! let mut network = NetworkHandle::spawn("127.0.0.1:8080", 0).unwrap();
//! let mut scene = None;
//! for event in network.poll() {
//!     if let NetworkEvent::Joined { player_id, state } = event {
//!         scene = CampScene::new(&player_id, state).ok();
//!     }
//! }
//! # let _ = scene;
//! network.shutdown();
//! ```

pub mod input;
pub mod network;
pub mod proxy;
pub mod reconciler;
pub mod rendering;
pub mod scene;
