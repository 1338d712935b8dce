//! Built-in map layouts
//!
//! Layouts are 40 x 23 digit grids (0 air, 1 ground, 2 platform, 3 goal) at
//! 16px per tile. Spawn points are the bottom-left corner of a player.

use crate::error::MapError;
use crate::tile_map::{parse_layout, TileMap};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Vec2, TILE_SIZE};

#[derive(Debug, Clone, Copy)]
pub struct MapDef {
    pub name: &'static str,
    pub layout: &'static [&'static str],
    pub spawn: (f32, f32),
}

impl MapDef {
    pub fn build(&self) -> Result<TileMap, MapError> {
        let layout = parse_layout(self.layout)?;
        TileMap::build(&layout, TILE_SIZE, Vec2::new(self.spawn.0, self.spawn.1))
    }
}

/// The waiting-room map plus the race maps a round is drawn from.
#[derive(Debug, Clone)]
pub struct MapPool {
    pub lobby: MapDef,
    pub races: Vec<MapDef>,
}

impl MapPool {
    pub fn new(lobby: MapDef, races: Vec<MapDef>) -> Result<Self, MapError> {
        if races.is_empty() {
            return Err(MapError::EmptyPool);
        }
        Ok(Self { lobby, races })
    }

    /// Uniformly random race map.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&MapDef, MapError> {
        self.races.choose(rng).ok_or(MapError::EmptyPool)
    }
}

impl Default for MapPool {
    fn default() -> Self {
        Self {
            lobby: LOBBY,
            races: vec![ASCENT, SWITCHBACK, ISLANDS],
        }
    }
}

pub const LOBBY: MapDef = MapDef {
    name: "lobby",
    spawn: (32.0, 336.0),
    layout: &[
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000001110000000000111000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000222222220000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000002222200000000000000000022222000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "1111111111111111111111111111111111111111",
        "1111111111111111111111111111111111111111",
    ],
};

pub const ASCENT: MapDef = MapDef {
    name: "ascent",
    spawn: (32.0, 336.0),
    layout: &[
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000030",
        "0000000000000000000000000000000000111111",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000022220000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000022220000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000022220000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000002222000000",
        "0000000000222200000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "1111111111000011111111000011111111111111",
        "1111111111000011111111000011111111111111",
    ],
};

pub const SWITCHBACK: MapDef = MapDef {
    name: "switchback",
    spawn: (32.0, 336.0),
    layout: &[
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0003000000000000000000000000000000000000",
        "0011111110000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000022222220000000022222222200000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000022222222200000000000000000",
        "0000000000000000000000000000000000001000",
        "0000000000000000000000000000000000001000",
        "0000000000000000000000000000000000001000",
        "0000222222222000000000002222222220001000",
        "0000000000000000000000000000000000001000",
        "0000000000000000000000000000000000001000",
        "0000000000000000000000000000000000001000",
        "1111111111111111111111111111111111111111",
        "1111111111111111111111111111111111111111",
    ],
};

pub const ISLANDS: MapDef = MapDef {
    name: "islands",
    spawn: (32.0, 336.0),
    layout: &[
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000300",
        "0000000000000000000000000000000000011111",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000022220000002220000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000000000222000000000000",
        "0000000000000022200000000000000000000000",
        "0000000000000000000000000000000000000000",
        "0000000000000000000022220000000000000000",
        "0000000000000000000000000000000000000000",
        "1111110000000000000000000000000000000000",
        "1111110000000000000000000000000000000000",
    ],
};
