//! Connected players, their room membership and the color pool
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Color assignment (the palette doubles as the capacity limit)
//! - Which room each player is in (waiting or active, never both)
//! - The ready set used to gate the start of a match
//! - Per-client outbound channels used for broadcasting
//!
//! The registry lives inside the room behind the server's single lock, so
//! nothing here synchronizes on its own.

use crate::error::JoinError;
use crate::player::Player;
use log::{info, warn};
use shared::{PlayerColor, PlayerSnapshot, Rect, ServerMessage, Vec2};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// Free colors, handed out front first and returned to the back.
#[derive(Debug)]
pub struct ColorPool {
    free: VecDeque<PlayerColor>,
}

impl ColorPool {
    pub fn new() -> Self {
        Self {
            free: PlayerColor::PALETTE.iter().copied().collect(),
        }
    }

    pub fn acquire(&mut self) -> Result<PlayerColor, JoinError> {
        self.free.pop_front().ok_or(JoinError::ColorPoolExhausted)
    }

    pub fn release(&mut self, color: PlayerColor) {
        if !self.free.contains(&color) {
            self.free.push_back(color);
        }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl Default for ColorPool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    Waiting,
    Active,
}

/// A connection's claim on a color.
///
/// Colors are recycled, so the session number tells a stale handler apart
/// from whoever holds the color now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub color: PlayerColor,
    pub session: u64,
}

#[derive(Debug)]
pub struct Client {
    pub session: u64,
    pub addr: SocketAddr,
    pub player: Player,
    pub room: RoomKind,
    pub outbound: Outbound,
    pub connected_at: Instant,
}

impl Client {
    /// Queues a message for this client's writer task.
    /// Returns false once the writer has gone away.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbound.send(message).is_ok()
    }
}

pub struct PlayerRegistry {
    clients: BTreeMap<PlayerColor, Client>,
    ready: HashSet<PlayerColor>,
    pool: ColorPool,
    next_session: u64,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            ready: HashSet::new(),
            pool: ColorPool::new(),
            next_session: 1,
        }
    }

    /// Seats a new connection in the waiting room.
    ///
    /// Fails without creating a player when every color is taken.
    pub fn register(
        &mut self,
        addr: SocketAddr,
        outbound: Outbound,
        spawn: Vec2,
    ) -> Result<Seat, JoinError> {
        let color = self.pool.acquire()?;
        let session = self.next_session;
        self.next_session += 1;

        self.clients.insert(
            color,
            Client {
                session,
                addr,
                player: Player::new(color, spawn),
                room: RoomKind::Waiting,
                outbound,
                connected_at: Instant::now(),
            },
        );
        info!("Client {} joined as {}", addr, color);

        Ok(Seat { color, session })
    }

    /// Removes whoever holds `color` and frees it.
    pub fn remove(&mut self, color: PlayerColor) -> Option<Client> {
        let client = self.clients.remove(&color)?;
        self.ready.remove(&color);
        self.pool.release(color);
        info!(
            "Client {} ({}) left after {:.1}s",
            client.addr,
            color,
            client.connected_at.elapsed().as_secs_f32()
        );
        Some(client)
    }

    /// Removes the seat only if it still belongs to that session.
    pub fn remove_seat(&mut self, seat: Seat) -> Option<Client> {
        if self.is_seated(seat) {
            self.remove(seat.color)
        } else {
            None
        }
    }

    pub fn is_seated(&self, seat: Seat) -> bool {
        self.clients
            .get(&seat.color)
            .map_or(false, |client| client.session == seat.session)
    }

    pub fn get(&self, color: PlayerColor) -> Option<&Client> {
        self.clients.get(&color)
    }

    pub fn get_mut(&mut self, color: PlayerColor) -> Option<&mut Client> {
        self.clients.get_mut(&color)
    }

    pub fn seat_mut(&mut self, seat: Seat) -> Option<&mut Client> {
        self.clients
            .get_mut(&seat.color)
            .filter(|client| client.session == seat.session)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn available_colors(&self) -> usize {
        self.pool.available()
    }

    pub fn count(&self, room: RoomKind) -> usize {
        self.clients.values().filter(|c| c.room == room).count()
    }

    pub fn colors_in(&self, room: RoomKind) -> Vec<PlayerColor> {
        self.clients
            .iter()
            .filter(|(_, c)| c.room == room)
            .map(|(color, _)| *color)
            .collect()
    }

    pub fn players_in_mut(&mut self, room: RoomKind) -> impl Iterator<Item = &mut Player> {
        self.clients
            .values_mut()
            .filter(move |c| c.room == room)
            .map(|c| &mut c.player)
    }

    pub fn snapshots(&self, room: RoomKind) -> Vec<PlayerSnapshot> {
        self.clients
            .values()
            .filter(|c| c.room == room)
            .map(|c| c.player.snapshot())
            .collect()
    }

    pub fn rects(&self, room: RoomKind) -> Vec<(PlayerColor, Rect)> {
        self.clients
            .values()
            .filter(|c| c.room == room)
            .map(|c| (c.player.color, c.player.rect()))
            .collect()
    }

    /// Moves every member of `from` into `to`, respawning them at `spawn`.
    pub fn move_all(&mut self, from: RoomKind, to: RoomKind, spawn: Vec2) -> Vec<PlayerColor> {
        let mut moved = Vec::new();
        for (color, client) in self.clients.iter_mut().filter(|(_, c)| c.room == from) {
            client.room = to;
            client.player.reset(spawn);
            moved.push(*color);
        }
        moved
    }

    /// Marks a waiting player ready. Active players cannot ready up.
    pub fn mark_ready(&mut self, color: PlayerColor) -> bool {
        match self.clients.get(&color) {
            Some(client) if client.room == RoomKind::Waiting => {
                self.ready.insert(color);
                true
            }
            _ => false,
        }
    }

    pub fn is_ready(&self, color: PlayerColor) -> bool {
        self.ready.contains(&color)
    }

    /// True when someone is waiting and every waiting player is ready.
    pub fn ready_gate_open(&self) -> bool {
        let waiting = self.colors_in(RoomKind::Waiting);
        !waiting.is_empty() && waiting.iter().all(|color| self.ready.contains(color))
    }

    pub fn clear_ready(&mut self) {
        self.ready.clear();
    }

    /// Sends `message` to every member of `room`.
    ///
    /// Returns the colors whose channel is closed; the caller drops them.
    pub fn broadcast(&self, room: RoomKind, message: &ServerMessage) -> Vec<PlayerColor> {
        self.clients
            .iter()
            .filter(|(_, c)| c.room == room)
            .filter_map(|(color, client)| {
                if client.send(message.clone()) {
                    None
                } else {
                    warn!("Failed to send to {} ({})", client.addr, color);
                    Some(*color)
                }
            })
            .collect()
    }

    /// Empties the registry, returning every color to the pool.
    pub fn drain(&mut self) -> Vec<Client> {
        let colors: Vec<PlayerColor> = self.clients.keys().copied().collect();
        colors
            .into_iter()
            .filter_map(|color| self.remove(color))
            .collect()
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
