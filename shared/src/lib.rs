use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod codec;
pub mod room_code;

pub use codec::{encode_frame, try_decode_frame, write_frame, FrameError, FrameReader};
pub use room_code::RoomCodeError;

pub const PORT: u16 = 5555;
pub const MAX_PLAYERS: usize = 8;

pub const SCREEN_WIDTH: f32 = 640.0;
pub const SCREEN_HEIGHT: f32 = 360.0;
pub const FPS: u32 = 45;

pub const TILE_SIZE: f32 = 16.0;
pub const GRID_WIDTH: usize = 40;
pub const GRID_HEIGHT: usize = 23;

pub const GRAVITY: f32 = 60.0 / FPS as f32;
pub const PLAYER_SPEED: f32 = 3.0 * GRAVITY;
pub const PLAYER_WIDTH: f32 = TILE_SIZE;
pub const PLAYER_HEIGHT: f32 = TILE_SIZE;
/// Drag vectors are divided by this before being applied as a launch impulse.
pub const JUMP_DAMPING: f32 = 10.0;
/// Vertical inflation applied to a platform when checking whether its occupant is still on it.
pub const PLATFORM_OCCUPANCY_SLACK: f32 = 2.0;

pub const NO_COLORS_AVAILABLE: &str = "Error: No more colors available";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Vec2) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle in screen coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rect whose bottom-left corner sits at `point`.
    pub fn from_bottom_left(point: Vec2, width: f32, height: f32) -> Self {
        Self::new(point.x, point.y - height, width, height)
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Grows the rect by `dx`/`dy` in total while keeping its center.
    pub fn inflate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(
            self.x - dx / 2.0,
            self.y - dy / 2.0,
            self.width + dx,
            self.height + dy,
        )
    }

    /// Strict overlap test; rects that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }
}

/// Player identity. Doubles as the wire key; there is no separate numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
    Pink,
    Cyan,
}

impl PlayerColor {
    pub const PALETTE: [PlayerColor; MAX_PLAYERS] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Green,
        PlayerColor::Yellow,
        PlayerColor::Purple,
        PlayerColor::Orange,
        PlayerColor::Pink,
        PlayerColor::Cyan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PlayerColor::Red => "red",
            PlayerColor::Blue => "blue",
            PlayerColor::Green => "green",
            PlayerColor::Yellow => "yellow",
            PlayerColor::Purple => "purple",
            PlayerColor::Orange => "orange",
            PlayerColor::Pink => "pink",
            PlayerColor::Cyan => "cyan",
        }
    }
}

impl fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Ground,
    Platform,
    Goal,
}

impl TileKind {
    /// Maps a layout cell to a tile kind; 0 is air and yields `None`.
    pub fn from_code(code: u8) -> Option<Option<TileKind>> {
        match code {
            0 => Some(None),
            1 => Some(Some(TileKind::Ground)),
            2 => Some(Some(TileKind::Platform)),
            3 => Some(Some(TileKind::Goal)),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            TileKind::Ground => 1,
            TileKind::Platform => 2,
            TileKind::Goal => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("invalid direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub x: f32,
    pub y: f32,
    pub color: PlayerColor,
    pub in_air: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileInfo {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: TileKind,
}

/// Display change of a platform. `color: None` means the default platform color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileUpdate {
    pub x: f32,
    pub y: f32,
    pub color: Option<PlayerColor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Move { direction: String },
    Jump { drag_x: f32, drag_y: f32 },
    Ready,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Initial {
        players: Vec<PlayerSnapshot>,
        tile_map: Vec<TileInfo>,
        your_player: PlayerColor,
    },
    State {
        players: Vec<PlayerSnapshot>,
        tiles: Option<Vec<TileUpdate>>,
    },
    NewGame {
        players: Vec<PlayerSnapshot>,
        tile_map: Vec<TileInfo>,
    },
    Countdown {
        value: u8,
    },
    Winner {
        color: PlayerColor,
    },
    GameOver,
    ShuttingDown,
    Disconnected,
    Error {
        reason: String,
    },
}

impl ServerMessage {
    pub fn no_colors_available() -> Self {
        ServerMessage::Error {
            reason: NO_COLORS_AVAILABLE.to_string(),
        }
    }
}
