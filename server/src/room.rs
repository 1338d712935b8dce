//! The room: both player sets, the maps and the match state machine
//!
//! Everything the tick loop and the connection handlers share lives here,
//! behind the server's single lock. One call to [`Room::tick`] is one frame
//! of the simulation:
//!
//! 1. Waiting players are stepped on the lobby map without goal checks or
//!    territory rules.
//! 2. The phase machine advances (ready gate, countdown, race, round end).
//! 3. Both rooms receive a `STATE` snapshot; the active one also gets the
//!    platform tiles whose color changed this tick.
//!
//! Any client whose outbound channel is closed is dropped on the spot.

use crate::config::ServerConfig;
use crate::error::{JoinError, MapError};
use crate::maps::{MapDef, MapPool};
use crate::player::StepOutcome;
use crate::registry::{Outbound, PlayerRegistry, RoomKind, Seat};
use crate::tile_map::TileMap;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Direction, PlayerColor, ServerMessage, TileUpdate, Vec2};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Countdown { value: u8, next_at: Instant },
    Racing,
    /// Passed through within the tick that produced the winner
    RoundOver { winner: PlayerColor },
    /// Passed through on the way back to `Waiting`
    GameOver,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Countdown { .. } => "countdown",
            Phase::Racing => "racing",
            Phase::RoundOver { .. } => "round over",
            Phase::GameOver => "game over",
        }
    }
}

pub struct Room {
    registry: PlayerRegistry,
    pool: MapPool,
    lobby: TileMap,
    arena: TileMap,
    current_map: MapDef,
    /// Bumped whenever `arena` is replaced
    arena_generation: u64,
    phase: Phase,
    winner: Option<PlayerColor>,
    rng: StdRng,
    wins_to_win: u32,
    countdown_from: u8,
    countdown_interval: Duration,
    tick: u64,
}

impl Room {
    pub fn new(config: &ServerConfig, pool: MapPool) -> Result<Self, MapError> {
        // Build everything once so a broken layout fails at startup
        for def in &pool.races {
            def.build()?;
        }
        let lobby = pool.lobby.build()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            registry: PlayerRegistry::new(),
            arena: lobby.clone(),
            current_map: pool.lobby,
            arena_generation: 0,
            lobby,
            pool,
            phase: Phase::Waiting,
            winner: None,
            rng,
            wins_to_win: config.wins_to_win.max(1),
            countdown_from: config.countdown_from,
            countdown_interval: config.countdown_interval,
            tick: 0,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn winner(&self) -> Option<PlayerColor> {
        self.winner
    }

    pub fn current_map(&self) -> &'static str {
        self.current_map.name
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Seats a new connection in the waiting room and queues its `INITIAL`.
    pub fn join(&mut self, addr: SocketAddr, outbound: Outbound) -> Result<Seat, JoinError> {
        let seat = self.registry.register(addr, outbound, self.lobby.spawn)?;

        let initial = ServerMessage::Initial {
            players: self.registry.snapshots(RoomKind::Waiting),
            tile_map: self.lobby.tile_list(),
            your_player: seat.color,
        };
        if !self.send_to(seat, initial) {
            self.drop_client(seat.color);
        }
        Ok(seat)
    }

    /// Removes the seat; a stale seat whose color was reassigned is ignored.
    pub fn leave(&mut self, seat: Seat) -> bool {
        self.registry.remove_seat(seat).is_some()
    }

    pub fn is_seated(&self, seat: Seat) -> bool {
        self.registry.is_seated(seat)
    }

    pub fn send_to(&self, seat: Seat, message: ServerMessage) -> bool {
        self.registry
            .get(seat.color)
            .filter(|client| client.session == seat.session)
            .map_or(false, |client| client.send(message))
    }

    pub fn mark_ready(&mut self, seat: Seat) {
        if !self.registry.is_seated(seat) {
            return;
        }
        if self.registry.mark_ready(seat.color) {
            info!("{} is ready", seat.color);
        } else {
            debug!("Ignoring READY from {} outside the waiting room", seat.color);
        }
    }

    pub fn post_move(&mut self, seat: Seat, direction: Direction) {
        if let Some(client) = self.registry.seat_mut(seat) {
            client.player.intents.post_move(direction);
        }
    }

    /// Queues a jump; non-finite drag vectors are logged and ignored.
    pub fn post_jump(&mut self, seat: Seat, drag: Vec2) {
        if !drag.is_finite() {
            warn!("Ignoring JUMP from {} with drag {:?}", seat.color, drag);
            return;
        }
        if let Some(client) = self.registry.seat_mut(seat) {
            client.player.intents.post_jump(drag);
        }
    }

    /// Runs one frame of the simulation at time `now`.
    pub fn tick(&mut self, now: Instant) {
        self.tick += 1;

        self.step_waiting();

        let tiles = match self.phase {
            Phase::Waiting => {
                if self.registry.ready_gate_open() {
                    self.start_match(now);
                }
                Vec::new()
            }
            Phase::Countdown { value, next_at } => {
                if self.registry.count(RoomKind::Active) == 0 {
                    info!("Active room emptied during the countdown");
                    self.phase = Phase::GameOver;
                    Vec::new()
                } else {
                    let (_, tiles) = self.step_active(false);
                    if now >= next_at {
                        self.advance_countdown(value, next_at);
                    }
                    tiles
                }
            }
            Phase::Racing => {
                if self.registry.count(RoomKind::Active) == 0 {
                    info!("Active room emptied mid-race");
                    self.phase = Phase::GameOver;
                    Vec::new()
                } else {
                    let (winner, tiles) = self.step_active(true);
                    if let Some(winner) = winner {
                        self.winner = Some(winner);
                        self.phase = Phase::RoundOver { winner };
                    }
                    tiles
                }
            }
            Phase::RoundOver { .. } | Phase::GameOver => Vec::new(),
        };

        let generation = self.arena_generation;
        self.settle(now);
        // A replaced arena was sent whole; the old one's changes no longer apply
        let tiles = if self.arena_generation == generation {
            tiles
        } else {
            Vec::new()
        };
        self.broadcast_state(tiles);

        if self.tick % 60 == 0 {
            debug!(
                "Tick {}: phase {}, map {}, {} waiting, {} active",
                self.tick,
                self.phase.name(),
                self.current_map.name,
                self.registry.count(RoomKind::Waiting),
                self.registry.count(RoomKind::Active)
            );
        }
    }

    /// Tells every client the server is going away and releases them all.
    pub fn shutdown(&mut self) -> usize {
        for room in [RoomKind::Waiting, RoomKind::Active] {
            self.registry.broadcast(room, &ServerMessage::ShuttingDown);
        }
        let clients = self.registry.drain();
        info!("Released {} clients on shutdown", clients.len());
        clients.len()
    }

    fn step_waiting(&mut self) {
        // Lobby claims would never be shown, so platforms there are plain ground
        for player in self.registry.players_in_mut(RoomKind::Waiting) {
            player.step(&mut self.lobby, false, false);
        }
    }

    /// Steps the active room, stopping at the first player to reach a goal.
    fn step_active(&mut self, check_goal: bool) -> (Option<PlayerColor>, Vec<TileUpdate>) {
        let mut winner = None;
        for player in self.registry.players_in_mut(RoomKind::Active) {
            if player.step(&mut self.arena, check_goal, true) == StepOutcome::ReachedGoal {
                winner = Some(player.color);
                break;
            }
        }

        let rects = self.registry.rects(RoomKind::Active);
        let tiles = self.arena.refresh_platforms(&rects);
        (winner, tiles)
    }

    /// Resolves the transient phases until the room is in a resting one.
    fn settle(&mut self, now: Instant) {
        loop {
            match self.phase {
                Phase::RoundOver { winner } => self.finish_round(winner, now),
                Phase::GameOver => self.finish_match(),
                _ => break,
            }
        }
    }

    fn start_match(&mut self, now: Instant) {
        let moved = self
            .registry
            .move_all(RoomKind::Waiting, RoomKind::Active, self.lobby.spawn);
        self.registry.clear_ready();
        info!("Starting match with {} players", moved.len());
        self.start_round(now);
    }

    fn start_round(&mut self, now: Instant) {
        let map = match self.pick_map() {
            Ok(map) => map,
            Err(e) => {
                error!("Failed to build race map: {}", e);
                self.phase = Phase::GameOver;
                return;
            }
        };

        let spawn = map.spawn;
        self.arena = map;
        self.arena_generation += 1;
        for player in self.registry.players_in_mut(RoomKind::Active) {
            player.reset(spawn);
        }
        self.winner = None;
        info!("New round on {}", self.current_map.name);

        self.broadcast(
            RoomKind::Active,
            ServerMessage::NewGame {
                players: self.registry.snapshots(RoomKind::Active),
                tile_map: self.arena.tile_list(),
            },
        );
        self.broadcast(
            RoomKind::Active,
            ServerMessage::Countdown {
                value: self.countdown_from,
            },
        );

        self.phase = if self.countdown_from == 0 {
            Phase::Racing
        } else {
            Phase::Countdown {
                value: self.countdown_from,
                next_at: now + self.countdown_interval,
            }
        };
    }

    fn pick_map(&mut self) -> Result<TileMap, MapError> {
        let def = *self.pool.pick(&mut self.rng)?;
        let map = def.build()?;
        self.current_map = def;
        Ok(map)
    }

    fn advance_countdown(&mut self, value: u8, next_at: Instant) {
        let value = value.saturating_sub(1);
        self.broadcast(RoomKind::Active, ServerMessage::Countdown { value });

        self.phase = if value == 0 {
            info!("Race on {} has started", self.current_map.name);
            Phase::Racing
        } else {
            Phase::Countdown {
                value,
                next_at: next_at + self.countdown_interval,
            }
        };
    }

    fn finish_round(&mut self, winner: PlayerColor, now: Instant) {
        let wins = match self.registry.get_mut(winner) {
            Some(client) => {
                client.player.wins += 1;
                client.player.wins
            }
            None => {
                warn!("Round winner {} is no longer connected", winner);
                0
            }
        };

        info!("{} won the round ({}/{})", winner, wins, self.wins_to_win);
        self.broadcast(RoomKind::Active, ServerMessage::Winner { color: winner });

        if wins >= self.wins_to_win || self.registry.count(RoomKind::Active) == 0 {
            self.phase = Phase::GameOver;
        } else {
            self.start_round(now);
        }
    }

    fn finish_match(&mut self) {
        self.broadcast(RoomKind::Active, ServerMessage::GameOver);

        for player in self.registry.players_in_mut(RoomKind::Active) {
            player.wins = 0;
        }
        let moved = self
            .registry
            .move_all(RoomKind::Active, RoomKind::Waiting, self.lobby.spawn);
        self.registry.clear_ready();

        self.arena = self.lobby.clone();
        self.arena_generation += 1;
        self.current_map = self.pool.lobby;
        self.winner = None;
        self.phase = Phase::Waiting;
        info!("Game over, {} players back in the waiting room", moved.len());
    }

    fn broadcast_state(&mut self, tiles: Vec<TileUpdate>) {
        self.broadcast(
            RoomKind::Waiting,
            ServerMessage::State {
                players: self.registry.snapshots(RoomKind::Waiting),
                tiles: None,
            },
        );

        if self.registry.count(RoomKind::Active) > 0 {
            self.broadcast(
                RoomKind::Active,
                ServerMessage::State {
                    players: self.registry.snapshots(RoomKind::Active),
                    tiles: Some(tiles),
                },
            );
        }
    }

    fn broadcast(&mut self, room: RoomKind, message: ServerMessage) {
        for color in self.registry.broadcast(room, &message) {
            self.drop_client(color);
        }
    }

    fn drop_client(&mut self, color: PlayerColor) {
        if self.registry.remove(color).is_some() {
            warn!("Dropped {} after a failed send", color);
        }
    }
}
