//! Player entity: intents, physics and collision against the tile map
//!
//! Connection handlers only ever post intents into a player's mailbox. The
//! tick loop drains that mailbox once per tick and is the only place that
//! moves the player.

use crate::tile_map::{CollisionQueryable, TileMap};
use shared::{
    Direction, PlayerColor, PlayerSnapshot, Rect, Vec2, GRAVITY, JUMP_DAMPING, PLAYER_HEIGHT,
    PLAYER_SPEED, PLAYER_WIDTH, SCREEN_HEIGHT, SCREEN_WIDTH,
};

/// What the player asked for since the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Intent {
    pub direction: Option<Direction>,
    /// Drag vector of a requested jump
    pub jump: Option<Vec2>,
}

/// Single-slot mailbox between a connection handler and the tick loop.
///
/// A newer intent of the same kind overwrites an unconsumed one; `take`
/// hands everything to the tick loop and leaves the slot empty.
#[derive(Debug, Default)]
pub struct IntentMailbox {
    pending: Intent,
}

impl IntentMailbox {
    pub fn post_move(&mut self, direction: Direction) {
        self.pending.direction = Some(direction);
    }

    pub fn post_jump(&mut self, drag: Vec2) {
        self.pending.jump = Some(drag);
    }

    pub fn take(&mut self) -> Intent {
        std::mem::take(&mut self.pending)
    }

    pub fn peek(&self) -> Intent {
        self.pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved,
    ReachedGoal,
    /// Touched a foreign platform or fell out of the world
    Respawned,
}

#[derive(Debug)]
pub struct Player {
    pub color: PlayerColor,
    /// Bottom-left corner
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub in_air: bool,
    pub wins: u32,
    pub width: f32,
    pub height: f32,
    pub intents: IntentMailbox,
}

impl Player {
    pub fn new(color: PlayerColor, spawn: Vec2) -> Self {
        Self {
            color,
            position: spawn,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            in_air: true,
            wins: 0,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
            intents: IntentMailbox::default(),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect_at(self.position)
    }

    fn rect_at(&self, position: Vec2) -> Rect {
        Rect::from_bottom_left(position, self.width, self.height)
    }

    /// Puts the player back on `spawn` at rest.
    pub fn reset(&mut self, spawn: Vec2) {
        self.position = spawn;
        self.velocity = Vec2::ZERO;
        self.acceleration = Vec2::ZERO;
        self.in_air = true;
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            x: self.position.x,
            y: self.position.y,
            color: self.color,
            in_air: self.in_air,
        }
    }

    /// Advances the player by one tick against `map`.
    ///
    /// Collision is resolved against the predicted position only, using the
    /// first overlapping tile of each group. Without `territory` platforms
    /// are plain solid tiles: nothing is claimed and nobody is reset.
    pub fn step(&mut self, map: &mut TileMap, check_goal: bool, territory: bool) -> StepOutcome {
        let intent = self.intents.take();

        self.acceleration = Vec2::new(0.0, GRAVITY);

        match intent.direction {
            Some(Direction::Left) => self.velocity.x = -PLAYER_SPEED,
            Some(Direction::Right) => self.velocity.x = PLAYER_SPEED,
            None if !self.in_air => self.velocity.x = 0.0,
            None => {}
        }

        if let Some(drag) = intent.jump {
            self.acceleration = drag.scale(1.0 / JUMP_DAMPING);
            self.in_air = true;
        }

        self.velocity = self.velocity.add(self.acceleration);
        let mut next = self
            .position
            .add(self.velocity)
            .add(self.acceleration.scale(0.5));

        let current = self.rect();
        let next_rect = self.rect_at(next);

        if check_goal && !map.goals.overlapping(&next_rect).is_empty() {
            return StepOutcome::ReachedGoal;
        }

        let ground_hits = map.ground.overlapping(&next_rect);
        let platform_hits = map.platforms.overlapping(&next_rect);

        if ground_hits.is_empty() && platform_hits.is_empty() {
            self.in_air = true;
        }

        if let Some(tile) = ground_hits.first().and_then(|&i| map.ground.get(i)) {
            let tile_rect = tile.rect;
            self.resolve_against(&tile_rect, &current, &next_rect, &mut next);
        }

        if !platform_hits.is_empty() {
            if territory {
                for &index in &platform_hits {
                    let Some(tile) = map.platforms.get_mut(index) else {
                        continue;
                    };
                    match tile.occupied_by {
                        Some(owner) if owner != self.color => {
                            self.reset(map.spawn);
                            return StepOutcome::Respawned;
                        }
                        _ => {
                            if self.lands_on(&tile.rect, &current, &next_rect) {
                                tile.occupied_by = Some(self.color);
                            }
                        }
                    }
                }
            }

            if let Some(tile) = map.platforms.get(platform_hits[0]) {
                let tile_rect = tile.rect;
                self.resolve_against(&tile_rect, &current, &next_rect, &mut next);
            }
        }

        if next.x < 0.0 {
            next.x = 0.0;
            self.velocity.x = 0.0;
            self.acceleration.x = 0.0;
        } else if next.x + self.width > SCREEN_WIDTH {
            next.x = SCREEN_WIDTH - self.width;
            self.velocity.x = 0.0;
            self.acceleration.x = 0.0;
        }

        if next.y - self.height < 0.0 {
            next.y = self.height;
            self.velocity.y = 0.0;
            self.acceleration.y = 0.0;
        } else if next.y > SCREEN_HEIGHT {
            self.reset(map.spawn);
            return StepOutcome::Respawned;
        }

        self.position = next;
        StepOutcome::Moved
    }

    fn lands_on(&self, tile: &Rect, current: &Rect, next_rect: &Rect) -> bool {
        self.velocity.y > 0.0
            && next_rect.bottom() > tile.top()
            && current.bottom() < tile.top() + 1.0
    }

    /// Per-axis resolution against one solid tile.
    fn resolve_against(&mut self, tile: &Rect, current: &Rect, next_rect: &Rect, next: &mut Vec2) {
        // Only push sideways while our vertical extent is inside the tile's band
        let beside = current.bottom() > tile.top() + 1.0 && current.top() < tile.bottom() - 1.0;

        if self.velocity.x > 0.0 && next_rect.right() > tile.left() && beside {
            next.x = tile.left() - self.width;
            self.velocity.x = 0.0;
            self.acceleration.x = 0.0;
        } else if self.velocity.x < 0.0 && next_rect.left() < tile.right() && beside {
            next.x = tile.right();
            self.velocity.x = 0.0;
            self.acceleration.x = 0.0;
        }

        if self.lands_on(tile, current, next_rect) {
            next.y = tile.top();
            self.velocity.y = 0.0;
            self.acceleration.y = 0.0;
            self.in_air = false;
        } else if self.velocity.y < 0.0
            && next_rect.top() < tile.bottom()
            && current.top() > tile.bottom() - 1.0
        {
            next.y = tile.bottom() + self.height;
            self.velocity.y = 0.0;
            self.acceleration.y = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_map::parse_layout;
    use assert_approx_eq::assert_approx_eq;

    fn map(rows: &[&str], spawn: Vec2) -> TileMap {
        TileMap::build(&parse_layout(rows).unwrap(), 16.0, spawn).unwrap()
    }

    fn empty_map() -> TileMap {
        map(&["0000"], Vec2::new(100.0, 100.0))
    }

    /// Floor along row 5, so its top edge is at y = 80.
    fn floor_map() -> TileMap {
        map(
            &["00000000", "00000000", "00000000", "00000000", "00000000", "11111111"],
            Vec2::new(16.0, 80.0),
        )
    }

    #[test]
    fn test_new_player_starts_airborne_at_spawn() {
        let player = Player::new(PlayerColor::Red, Vec2::new(32.0, 336.0));
        assert_eq!(player.position, Vec2::new(32.0, 336.0));
        assert_eq!(player.rect(), Rect::new(32.0, 320.0, 16.0, 16.0));
        assert!(player.in_air);
        assert_eq!(player.wins, 0);
    }

    #[test]
    fn test_mailbox_last_write_wins_and_clears() {
        let mut mailbox = IntentMailbox::default();
        mailbox.post_move(Direction::Left);
        mailbox.post_move(Direction::Right);
        mailbox.post_jump(Vec2::new(1.0, 2.0));
        mailbox.post_jump(Vec2::new(-5.0, -50.0));

        let intent = mailbox.take();
        assert_eq!(intent.direction, Some(Direction::Right));
        assert_eq!(intent.jump, Some(Vec2::new(-5.0, -50.0)));
        assert_eq!(mailbox.take(), Intent::default());
    }

    #[test]
    fn test_free_fall_integration() {
        let mut world = empty_map();
        let mut player = Player::new(PlayerColor::Red, Vec2::new(100.0, 100.0));

        assert_eq!(player.step(&mut world, false, true), StepOutcome::Moved);
        assert_approx_eq!(player.velocity.y, GRAVITY);
        assert_approx_eq!(player.position.y, 100.0 + 1.5 * GRAVITY);
        assert!(player.in_air);

        player.step(&mut world, false, true);
        assert_approx_eq!(player.velocity.y, 2.0 * GRAVITY);
        assert_approx_eq!(player.position.y, 100.0 + 1.5 * GRAVITY + 2.5 * GRAVITY);
    }

    #[test]
    fn test_lands_on_floor() {
        let mut world = floor_map();
        let mut player = Player::new(PlayerColor::Red, Vec2::new(16.0, 80.0));

        player.step(&mut world, false, true);
        assert!(!player.in_air);
        assert_eq!(player.position.y, 80.0);
        assert_eq!(player.velocity.y, 0.0);

        // Keeps standing on later ticks
        for _ in 0..10 {
            player.step(&mut world, false, true);
        }
        assert!(!player.in_air);
        assert_eq!(player.position.y, 80.0);
    }

    #[test]
    fn test_walking_and_stopping() {
        let mut world = floor_map();
        let mut player = Player::new(PlayerColor::Red, Vec2::new(16.0, 80.0));
        player.step(&mut world, false, true);

        player.intents.post_move(Direction::Right);
        player.step(&mut world, false, true);
        assert_approx_eq!(player.position.x, 16.0 + PLAYER_SPEED);
        assert_eq!(player.velocity.x, PLAYER_SPEED);

        // Intent was consumed; grounded players stop dead
        player.step(&mut world, false, true);
        assert_eq!(player.velocity.x, 0.0);
        assert_approx_eq!(player.position.x, 16.0 + PLAYER_SPEED);
    }

    #[test]
    fn test_airborne_momentum_is_preserved() {
        let mut world = empty_map();
        let mut player = Player::new(PlayerColor::Red, Vec2::new(100.0, 100.0));
        player.intents.post_move(Direction::Left);
        player.step(&mut world, false, true);
        player.step(&mut world, false, true);
        assert_eq!(player.velocity.x, -PLAYER_SPEED);
    }

    #[test]
    fn test_jump_uses_damped_drag_vector() {
        let mut world = floor_map();
        let mut player = Player::new(PlayerColor::Red, Vec2::new(16.0, 80.0));
        player.step(&mut world, false, true);

        player.intents.post_jump(Vec2::new(20.0, -100.0));
        player.step(&mut world, false, true);

        assert!(player.in_air);
        assert_approx_eq!(player.velocity.x, 2.0);
        assert_approx_eq!(player.velocity.y, -10.0);
        assert_approx_eq!(player.position.x, 16.0 + 2.0 + 1.0);
        assert_approx_eq!(player.position.y, 80.0 - 10.0 - 5.0);

        // Gravity takes over on the next tick
        player.step(&mut world, false, true);
        assert_approx_eq!(player.acceleration.y, GRAVITY);
    }

    #[test]
    fn test_wall_stops_horizontal_motion() {
        // Wall column at x = 48..64 on rows 3 and 4, floor on row 5
        let mut world = map(
            &["0000000", "0000000", "0000000", "0001000", "0001000", "1111111"],
            Vec2::new(16.0, 80.0),
        );
        let mut player = Player::new(PlayerColor::Red, Vec2::new(30.0, 80.0));
        player.step(&mut world, false, true);
        player.intents.post_move(Direction::Right);
        player.step(&mut world, false, true);

        assert_eq!(player.position.x, 32.0);
        assert_eq!(player.velocity.x, 0.0);
    }

    #[test]
    fn test_head_bump_on_ceiling() {
        // Ceiling tile on row 2 (y = 32..48)
        let mut world = map(&["000", "000", "010", "000", "000"], Vec2::ZERO);
        let mut player = Player::new(PlayerColor::Red, Vec2::new(16.0, 66.0));
        player.in_air = false;
        player.intents.post_jump(Vec2::new(0.0, -40.0));
        player.step(&mut world, false, true);

        assert_eq!(player.position.y, 48.0 + 16.0);
        assert_eq!(player.velocity.y, 0.0);
    }

    #[test]
    fn test_landing_claims_platform() {
        let mut world = map(&["000", "000", "000", "020"], Vec2::ZERO);
        let mut player = Player::new(PlayerColor::Blue, Vec2::new(16.0, 48.0));
        player.step(&mut world, false, true);

        assert!(!player.in_air);
        assert_eq!(player.position.y, 48.0);
        assert_eq!(
            world.platforms.get(0).unwrap().occupied_by,
            Some(PlayerColor::Blue)
        );
    }

    #[test]
    fn test_foreign_platform_resets_to_spawn() {
        let spawn = Vec2::new(0.0, 16.0);
        let mut world = map(&["000", "000", "000", "020"], spawn);
        world.platforms.get_mut(0).unwrap().occupied_by = Some(PlayerColor::Red);

        let mut player = Player::new(PlayerColor::Blue, Vec2::new(16.0, 48.0));
        player.velocity = Vec2::new(1.0, 3.0);
        let before = player.position;

        assert_eq!(player.step(&mut world, false, true), StepOutcome::Respawned);
        assert_ne!(before, spawn);
        assert_eq!(player.position, spawn);
        assert_eq!(player.velocity, Vec2::ZERO);
        assert_eq!(player.acceleration, Vec2::ZERO);

        // The owner's claim is untouched
        assert_eq!(
            world.platforms.get(0).unwrap().occupied_by,
            Some(PlayerColor::Red)
        );
    }

    #[test]
    fn test_foreign_platform_from_the_side_also_resets() {
        let spawn = Vec2::new(0.0, 16.0);
        let mut world = map(&["0000", "0000", "0000", "0020"], spawn);
        world.platforms.get_mut(0).unwrap().occupied_by = Some(PlayerColor::Green);

        let mut player = Player::new(PlayerColor::Blue, Vec2::new(14.0, 63.0));
        player.intents.post_move(Direction::Right);

        assert_eq!(player.step(&mut world, false, true), StepOutcome::Respawned);
        assert_eq!(player.position, spawn);
    }

    #[test]
    fn test_own_platform_is_safe() {
        let mut world = map(&["000", "000", "000", "020"], Vec2::ZERO);
        world.platforms.get_mut(0).unwrap().occupied_by = Some(PlayerColor::Blue);

        let mut player = Player::new(PlayerColor::Blue, Vec2::new(16.0, 48.0));
        assert_eq!(player.step(&mut world, false, true), StepOutcome::Moved);
        assert_eq!(player.position.y, 48.0);
    }

    #[test]
    fn test_platforms_without_territory_are_plain_ground() {
        let spawn = Vec2::new(0.0, 16.0);
        let mut world = map(&["000", "000", "000", "022"], spawn);
        world.platforms.get_mut(0).unwrap().occupied_by = Some(PlayerColor::Red);

        // Lands on a foreign claim without being reset
        let mut player = Player::new(PlayerColor::Blue, Vec2::new(8.0, 48.0));
        assert_eq!(player.step(&mut world, false, false), StepOutcome::Moved);
        assert_eq!(player.position, Vec2::new(8.0, 48.0));
        assert!(!player.in_air);

        // And claims nothing for itself
        assert_eq!(
            world.platforms.get(0).unwrap().occupied_by,
            Some(PlayerColor::Red)
        );
        assert_eq!(world.platforms.get(1).unwrap().occupied_by, None);
    }

    #[test]
    fn test_goal_only_counts_when_enabled() {
        let rows = ["0000000", "0000000", "0000000", "0000000", "0000000", "0003000"];
        let mut world = map(&rows, Vec2::ZERO);

        let mut waiting = Player::new(PlayerColor::Red, Vec2::new(48.0, 80.0));
        assert_eq!(waiting.step(&mut world, false, true), StepOutcome::Moved);

        let mut racing = Player::new(PlayerColor::Red, Vec2::new(48.0, 80.0));
        let before = racing.position;
        assert_eq!(racing.step(&mut world, true, true), StepOutcome::ReachedGoal);
        assert_eq!(racing.position, before);
    }

    #[test]
    fn test_world_bounds() {
        let spawn = Vec2::new(100.0, 100.0);
        let mut world = map(&["0"], spawn);

        let mut left = Player::new(PlayerColor::Red, Vec2::new(1.0, 100.0));
        left.intents.post_move(Direction::Left);
        left.step(&mut world, false, true);
        assert_eq!(left.position.x, 0.0);
        assert_eq!(left.velocity.x, 0.0);

        let mut right = Player::new(PlayerColor::Red, Vec2::new(SCREEN_WIDTH - 17.0, 100.0));
        right.intents.post_move(Direction::Right);
        right.step(&mut world, false, true);
        assert_eq!(right.position.x, SCREEN_WIDTH - 16.0);

        let mut top = Player::new(PlayerColor::Red, Vec2::new(50.0, 17.0));
        top.intents.post_jump(Vec2::new(0.0, -100.0));
        top.step(&mut world, false, true);
        assert_eq!(top.position.y, 16.0);
        assert_eq!(top.velocity.y, 0.0);

        let mut bottom = Player::new(PlayerColor::Red, Vec2::new(50.0, SCREEN_HEIGHT));
        assert_eq!(bottom.step(&mut world, false, true), StepOutcome::Respawned);
        assert_eq!(bottom.position, spawn);
    }
}
