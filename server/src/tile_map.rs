//! Static tile grid the players collide with
//!
//! A map is built once from an integer layout and replaced wholesale when the
//! room switches maps. Tiles are split into ground, platform and goal groups
//! because each group is queried separately every tick. The only state that
//! changes at runtime is platform occupancy and the color it displays.

use crate::error::MapError;
use log::debug;
use shared::{PlayerColor, Rect, TileInfo, TileKind, TileUpdate, Vec2, PLATFORM_OCCUPANCY_SLACK};
use std::collections::HashMap;

/// Anything that can answer "which tiles overlap this rectangle".
pub trait CollisionQueryable {
    /// Indices of overlapping tiles in row-major cell order.
    fn overlapping(&self, rect: &Rect) -> Vec<usize>;
}

#[derive(Debug, Clone)]
pub struct Tile {
    pub rect: Rect,
    pub kind: TileKind,
    /// Player currently claiming this platform
    pub occupied_by: Option<PlayerColor>,
    /// Color the clients are showing; `None` is the default platform color
    pub color: Option<PlayerColor>,
}

impl Tile {
    pub fn new(x: f32, y: f32, size: f32, kind: TileKind) -> Self {
        Self {
            rect: Rect::new(x, y, size, size),
            kind,
            occupied_by: None,
            color: None,
        }
    }

    /// Re-validates the occupant's claim against where the players are now.
    ///
    /// Returns true when the displayed color changed. New claims are made by
    /// player collision resolution, never here.
    pub fn refresh_occupancy(&mut self, players: &[(PlayerColor, Rect)]) -> bool {
        let Some(occupant) = self.occupied_by else {
            return false;
        };

        let probe = self.rect.inflate(0.0, PLATFORM_OCCUPANCY_SLACK);
        let still_there = players
            .iter()
            .any(|(color, rect)| *color == occupant && probe.intersects(rect));

        if still_there {
            if self.color != Some(occupant) {
                self.color = Some(occupant);
                return true;
            }
            false
        } else {
            self.occupied_by = None;
            if self.color.is_some() {
                self.color = None;
                return true;
            }
            false
        }
    }

    pub fn info(&self) -> TileInfo {
        TileInfo {
            x: self.rect.x,
            y: self.rect.y,
            kind: self.kind,
        }
    }

    pub fn display_update(&self) -> TileUpdate {
        TileUpdate {
            x: self.rect.x,
            y: self.rect.y,
            color: self.color,
        }
    }
}

/// One kind of tile, bucketed by grid cell for constant-time lookups.
#[derive(Debug, Clone)]
pub struct TileGroup {
    tiles: Vec<Tile>,
    cells: HashMap<(i32, i32), usize>,
    cell_size: f32,
}

impl TileGroup {
    pub fn new(cell_size: f32) -> Self {
        Self {
            tiles: Vec::new(),
            cells: HashMap::new(),
            cell_size,
        }
    }

    fn cell_of(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, tile: Tile) {
        let cell = self.cell_of(tile.rect.x, tile.rect.y);
        self.cells.insert(cell, self.tiles.len());
        self.tiles.push(tile);
    }

    pub fn get(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl CollisionQueryable for TileGroup {
    fn overlapping(&self, rect: &Rect) -> Vec<usize> {
        let (min_col, min_row) = self.cell_of(rect.left(), rect.top());
        let (max_col, max_row) = self.cell_of(rect.right(), rect.bottom());

        let mut hits = Vec::new();
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                if let Some(&index) = self.cells.get(&(col, row)) {
                    if self.tiles[index].rect.intersects(rect) {
                        hits.push(index);
                    }
                }
            }
        }
        hits
    }
}

/// Parses digit rows ("0012000") into an integer layout.
pub fn parse_layout(rows: &[&str]) -> Result<Vec<Vec<u8>>, MapError> {
    rows.iter()
        .enumerate()
        .map(|(row, line)| {
            line.chars()
                .enumerate()
                .map(|(col, cell)| {
                    cell.to_digit(10)
                        .map(|d| d as u8)
                        .ok_or(MapError::InvalidCell { row, col, cell })
                })
                .collect::<Result<Vec<u8>, MapError>>()
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct TileMap {
    pub tile_size: f32,
    pub spawn: Vec2,
    pub ground: TileGroup,
    pub platforms: TileGroup,
    pub goals: TileGroup,
    tile_list: Vec<TileInfo>,
}

impl TileMap {
    /// Builds every tile of `layout`; cell (row, col) lands at
    /// `(col * tile_size, row * tile_size)`.
    pub fn build(layout: &[Vec<u8>], tile_size: f32, spawn: Vec2) -> Result<Self, MapError> {
        if layout.is_empty() {
            return Err(MapError::EmptyLayout);
        }

        let mut map = TileMap {
            tile_size,
            spawn,
            ground: TileGroup::new(tile_size),
            platforms: TileGroup::new(tile_size),
            goals: TileGroup::new(tile_size),
            tile_list: Vec::new(),
        };

        for (row, cells) in layout.iter().enumerate() {
            for (col, &code) in cells.iter().enumerate() {
                let kind = TileKind::from_code(code)
                    .ok_or(MapError::UnknownTileCode { row, col, code })?;
                let Some(kind) = kind else {
                    continue;
                };

                let tile = Tile::new(col as f32 * tile_size, row as f32 * tile_size, tile_size, kind);
                map.tile_list.push(tile.info());
                match kind {
                    TileKind::Ground => map.ground.insert(tile),
                    TileKind::Platform => map.platforms.insert(tile),
                    TileKind::Goal => map.goals.insert(tile),
                }
            }
        }

        debug!(
            "Built tile map: {} ground, {} platform, {} goal tiles",
            map.ground.len(),
            map.platforms.len(),
            map.goals.len()
        );
        Ok(map)
    }

    /// Flat `{x, y, type}` list sent on room entry and map changes
    pub fn tile_list(&self) -> Vec<TileInfo> {
        self.tile_list.clone()
    }

    /// Re-validates every platform claim and returns the tiles whose
    /// displayed color changed.
    pub fn refresh_platforms(&mut self, players: &[(PlayerColor, Rect)]) -> Vec<TileUpdate> {
        self.platforms
            .iter_mut()
            .filter_map(|tile| {
                if tile.refresh_occupancy(players) {
                    Some(tile.display_update())
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(rows: &[&str]) -> Vec<Vec<u8>> {
        parse_layout(rows).unwrap()
    }

    #[test]
    fn test_goal_tile_placement() {
        let rows = ["0000000", "0000000", "0000000", "0000000", "0000000", "0003000"];
        let map = TileMap::build(&layout(&rows), 16.0, Vec2::ZERO).unwrap();

        assert_eq!(map.goals.len(), 1);
        assert!(map.ground.is_empty());
        assert!(map.platforms.is_empty());

        let goal = map.goals.get(0).unwrap();
        assert_eq!(goal.rect, Rect::new(48.0, 80.0, 16.0, 16.0));
        assert_eq!(
            map.tile_list(),
            vec![TileInfo {
                x: 48.0,
                y: 80.0,
                kind: TileKind::Goal
            }]
        );
    }

    #[test]
    fn test_tiles_grouped_by_kind() {
        let map = TileMap::build(&layout(&["0220", "1131"]), 16.0, Vec2::ZERO).unwrap();
        assert_eq!(map.platforms.len(), 2);
        assert_eq!(map.ground.len(), 3);
        assert_eq!(map.goals.len(), 1);
        assert_eq!(map.tile_list().len(), 6);
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let err = TileMap::build(&[vec![0, 7]], 16.0, Vec2::ZERO).unwrap_err();
        assert_eq!(
            err,
            MapError::UnknownTileCode {
                row: 0,
                col: 1,
                code: 7
            }
        );
        assert_eq!(
            parse_layout(&["01x"]).unwrap_err(),
            MapError::InvalidCell {
                row: 0,
                col: 2,
                cell: 'x'
            }
        );
        assert_eq!(
            TileMap::build(&[], 16.0, Vec2::ZERO).unwrap_err(),
            MapError::EmptyLayout
        );
    }

    #[test]
    fn test_overlap_query() {
        let map = TileMap::build(&layout(&["000", "111"]), 16.0, Vec2::ZERO).unwrap();

        // Straddles the first two ground tiles
        let hits = map.ground.overlapping(&Rect::new(8.0, 10.0, 16.0, 16.0));
        assert_eq!(hits, vec![0, 1]);

        // Resting exactly on top does not overlap
        let resting = map.ground.overlapping(&Rect::new(0.0, 0.0, 16.0, 16.0));
        assert!(resting.is_empty());

        // Far outside the grid
        assert!(map
            .ground
            .overlapping(&Rect::new(-100.0, -100.0, 16.0, 16.0))
            .is_empty());
    }

    #[test]
    fn test_occupancy_colors_and_clears() {
        let mut map = TileMap::build(&layout(&["0", "2"]), 16.0, Vec2::ZERO).unwrap();
        map.platforms.get_mut(0).unwrap().occupied_by = Some(PlayerColor::Red);

        // Standing on top: bottom edge touches the platform's top edge
        let standing = Rect::new(0.0, 0.0, 16.0, 16.0);
        let changes = map.refresh_platforms(&[(PlayerColor::Red, standing)]);
        assert_eq!(
            changes,
            vec![TileUpdate {
                x: 0.0,
                y: 16.0,
                color: Some(PlayerColor::Red)
            }]
        );

        // No change reported while the claim holds
        assert!(map.refresh_platforms(&[(PlayerColor::Red, standing)]).is_empty());

        // A different color standing there does not keep the claim alive
        let changes = map.refresh_platforms(&[(PlayerColor::Blue, standing)]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].color, None);
        assert_eq!(map.platforms.get(0).unwrap().occupied_by, None);
    }

    #[test]
    fn test_occupancy_clears_once_player_moves_away() {
        let mut map = TileMap::build(&layout(&["0", "2"]), 16.0, Vec2::ZERO).unwrap();
        map.platforms.get_mut(0).unwrap().occupied_by = Some(PlayerColor::Green);
        map.refresh_platforms(&[(PlayerColor::Green, Rect::new(0.0, 0.0, 16.0, 16.0))]);

        // Two pixels above the platform is outside the 1px slack
        let lifted = Rect::new(0.0, -2.0, 16.0, 16.0);
        let changes = map.refresh_platforms(&[(PlayerColor::Green, lifted)]);
        assert_eq!(changes.len(), 1);
        assert_eq!(map.platforms.get(0).unwrap().occupied_by, None);
    }

    #[test]
    fn test_unoccupied_platform_reports_nothing() {
        let mut map = TileMap::build(&layout(&["2"]), 16.0, Vec2::ZERO).unwrap();
        assert!(map
            .refresh_platforms(&[(PlayerColor::Red, Rect::new(0.0, 0.0, 16.0, 16.0))])
            .is_empty());
    }
}
