//! # Game Server Library
//!
//! This library provides the authoritative server for the multiplayer
//! platform race. It owns the canonical world, runs the physics at a fixed
//! tick rate and streams snapshots to every connected client over TCP.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Clients only send intents (move left or right, a drag-to-jump vector,
//! ready, disconnect). The server applies gravity, resolves collisions
//! against the tile map, tracks platform ownership and decides who reached
//! the goal first.
//!
//! ### Rooms and Matches
//! Every player is either in the waiting room or in the active race:
//! - New connections land in the waiting room on the lobby map
//! - Once everyone waiting has readied up, they all move into the race
//! - Each round is played on a random map after a short countdown
//! - The first player to reach the required number of wins ends the match
//!
//! ### State Broadcasting
//! Both rooms get a `STATE` snapshot every tick. The active room's snapshot
//! also lists the platform tiles whose color changed that tick.
//!
//! ## Architecture Design
//!
//! ### One Lock
//! The room, both player sets, the maps and the phase all sit behind a
//! single `tokio::sync::Mutex`. The tick loop holds it for one frame; a
//! connection handler holds it only while it posts an intent. Socket writes
//! never happen under the lock: the room queues messages on per-client
//! channels and a writer task per connection drains them.
//!
//! ### Length-Prefixed TCP Frames
//! Every message is a 4-byte big-endian length followed by a bincode
//! payload, see [`shared::codec`].
//!
//! ## Module Organization
//!
//! - `config`: runtime settings and their defaults
//! - `error`: error types for binding, joining and map building
//! - `tile_map`: tiles, grid-indexed tile groups and platform occupancy
//! - `maps`: the built-in layouts and the random map pool
//! - `player`: intents, per-tick physics and collision resolution
//! - `registry`: connected clients, colors, room membership, ready set
//! - `room`: the match state machine driven by the tick loop
//! - `network`: accept loop, connection handlers and the tick task
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     let handle = server.handle()?;
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         handle.shutdown().await;
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod maps;
pub mod network;
pub mod player;
pub mod registry;
pub mod room;
pub mod tile_map;
