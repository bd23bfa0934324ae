//! Grid ray marching.
//!
//! A ray is stepped through the grid in fixed sub-steps until it samples a
//! wall tile or leaves the map. The coarse march only decides *which* tile
//! edge was crossed; the reported distance is then computed exactly from the
//! ray's line and that edge.

use std::f64::consts::{FRAC_PI_2, PI};

use glam::DVec2;

use crate::color::Rgb;
use crate::world::{DEFAULT_WALL_COLOR, Position, Tile, WorldGrid};

/// Angle subtracted from a ray that crossed a tile corner before retrying.
pub const AMBIGUITY_NUDGE: f64 = 1e-4;

/// Crossings closer than this (in tiles) count as going through the corner.
const CORNER_TOLERANCE: f64 = 1e-9;

/// Which edge of the hit tile the ray crossed.
///
/// Tile rows grow with `y`, so the north edge is the low-`y` edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    North,
    South,
    East,
    West,
}

impl Side {
    /// Side crossed when moving from cell `prev` into cell `cell`, if exactly
    /// one axis changed.
    pub fn crossed(cell: (i64, i64), prev: (i64, i64)) -> Option<Side> {
        let dx = cell.0 != prev.0;
        let dy = cell.1 != prev.1;
        match (dx, dy) {
            (true, false) if cell.0 > prev.0 => Some(Side::West),
            (true, false) => Some(Side::East),
            (false, true) if cell.1 > prev.1 => Some(Side::North),
            (false, true) => Some(Side::South),
            _ => None,
        }
    }

    /// Tie-break for a step that changed both coordinates: the edge of `cell`
    /// the ray line crosses last is the one it entered through.
    pub fn entered(
        origin: Position,
        dir: DVec2,
        cell: (i64, i64),
        prev: (i64, i64),
        scale: f64,
    ) -> Side {
        let x_side = if cell.0 > prev.0 { Side::West } else { Side::East };
        let y_side = if cell.1 > prev.1 { Side::North } else { Side::South };
        let (t_x, t_y) = crossing_times(origin, dir, cell, prev, scale);
        if t_x >= t_y { x_side } else { y_side }
    }

    /// Side a wall straight ahead would show to a ray moving along `dir`.
    pub fn facing(dir: DVec2) -> Side {
        if dir.x.abs() >= dir.y.abs() {
            if dir.x > 0.0 { Side::West } else { Side::East }
        } else if dir.y > 0.0 {
            Side::North
        } else {
            Side::South
        }
    }

    /// Angle between the ray and the hit surface, used only for lighting.
    pub fn incidence(self, ray_angle: f64) -> f64 {
        match self {
            Side::West => FRAC_PI_2 - (ray_angle - PI - FRAC_PI_2),
            Side::East => FRAC_PI_2 - (ray_angle - FRAC_PI_2),
            Side::North => FRAC_PI_2 - ray_angle,
            Side::South => FRAC_PI_2 - (ray_angle - PI),
        }
    }
}

/// Result of one cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Fish-eye corrected distance in world units; infinite for a miss.
    pub distance: f64,
    pub color: Rgb,
    pub incidence: f64,
    /// `None` when the ray left the grid without hitting anything.
    pub side: Option<Side>,
    pub cell: Option<(i64, i64)>,
}

impl RayHit {
    /// The "nothing in the way" outcome.
    pub const MISS: RayHit = RayHit {
        distance: f64::INFINITY,
        color: Rgb::BLACK,
        incidence: 0.0,
        side: None,
        cell: None,
    };

    #[inline]
    pub fn is_miss(&self) -> bool {
        self.side.is_none()
    }

    /// Distance in tiles, the unit wall height and fog are expressed in.
    #[inline]
    pub fn depth(&self, scale: f64) -> f64 {
        self.distance / scale
    }
}

enum March {
    Escaped,
    /// The origin itself lies in a wall tile.
    Inside { cell: (i64, i64), tile: Tile },
    /// `side` is `None` when the ray went through the corner of `prev` too
    /// closely to tell which edge of `cell` it crossed.
    Hit {
        cell: (i64, i64),
        prev: (i64, i64),
        side: Option<Side>,
        tile: Tile,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct RayCaster {
    substeps_per_tile: u32,
    max_retries: u32,
}

impl Default for RayCaster {
    fn default() -> Self {
        Self::new(10, 4)
    }
}

impl RayCaster {
    pub fn new(substeps_per_tile: u32, max_retries: u32) -> Self {
        Self {
            substeps_per_tile: substeps_per_tile.max(1),
            max_retries,
        }
    }

    /// Unit direction of a ray at `angle`; angle 0 looks down +y.
    #[inline]
    pub fn direction(angle: f64) -> DVec2 {
        DVec2::new(-angle.sin(), angle.cos())
    }

    /// Cast one ray from `origin` and report the first wall it meets.
    pub fn cast(
        &self,
        world: &WorldGrid,
        origin: Position,
        ray_angle: f64,
        player_angle: f64,
    ) -> RayHit {
        let mut angle = ray_angle;
        let mut attempt = 0;
        loop {
            let dir = Self::direction(angle);
            let (cell, side, tile) = match self.march(world, origin, dir) {
                March::Escaped => return RayHit::MISS,
                March::Inside { cell, tile } => {
                    let side = Side::facing(dir);
                    return RayHit {
                        distance: 0.0,
                        color: tile.color().unwrap_or(DEFAULT_WALL_COLOR),
                        incidence: side.incidence(angle),
                        side: Some(side),
                        cell: Some(cell),
                    };
                }
                March::Hit { cell, side: Some(side), tile, .. } => (cell, side, tile),
                March::Hit { cell, prev, side: None, tile } => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        angle -= AMBIGUITY_NUDGE;
                        continue;
                    }
                    log::trace!("corner hit at {cell:?} unresolved after {attempt} retries");
                    (cell, Side::entered(origin, dir, cell, prev, world.scale()), tile)
                }
            };

            let raw = edge_distance(origin, dir, cell, side, world.scale());
            return RayHit {
                distance: (raw * (player_angle - angle).cos()).abs(),
                color: tile.color().unwrap_or(DEFAULT_WALL_COLOR),
                incidence: side.incidence(angle),
                side: Some(side),
                cell: Some(cell),
            };
        }
    }

    fn march(&self, world: &WorldGrid, origin: Position, dir: DVec2) -> March {
        let scale = world.scale();
        let step = dir * (scale / self.substeps_per_tile as f64);
        // A straight line cannot stay inside the grid longer than this.
        let max_steps = (world.width() + world.height() + 2) as u64 * self.substeps_per_tile as u64;

        let mut cell = world.cell_of(origin);
        match world.tile_at(cell.0, cell.1) {
            Err(_) => return March::Escaped,
            Ok(tile) if tile.is_solid() => return March::Inside { cell, tile },
            Ok(_) => {}
        }

        for i in 1..=max_steps {
            let prev = cell;
            cell = world.cell_of(origin + step * i as f64);
            if cell == prev {
                continue;
            }

            // A step is shorter than a tile, so it changes each coordinate at
            // most once. When both change, the line passed through one of the
            // two neighbouring cells first.
            let side = match Side::crossed(cell, prev) {
                Some(side) => Some(side),
                None => {
                    let (t_x, t_y) = crossing_times(origin, dir, cell, prev, scale);
                    if (t_x - t_y).abs() <= CORNER_TOLERANCE * scale {
                        None
                    } else {
                        let via = if t_x < t_y { (cell.0, prev.1) } else { (prev.0, cell.1) };
                        match world.tile_at(via.0, via.1) {
                            Err(_) => return March::Escaped,
                            Ok(tile) if tile.is_solid() => {
                                let side = Side::crossed(via, prev);
                                return March::Hit { cell: via, prev, side, tile };
                            }
                            Ok(_) => Side::crossed(cell, via),
                        }
                    }
                }
            };

            match world.tile_at(cell.0, cell.1) {
                Err(_) => return March::Escaped,
                Ok(tile) if tile.is_solid() => return March::Hit { cell, prev, side, tile },
                Ok(_) => {}
            }
        }
        March::Escaped
    }
}

/// Parametric distances along `dir` at which the line crosses the x and y
/// boundaries between `prev` and its diagonal neighbour `cell`.
fn crossing_times(
    origin: Position,
    dir: DVec2,
    cell: (i64, i64),
    prev: (i64, i64),
    scale: f64,
) -> (f64, f64) {
    let x = cell.0.max(prev.0) as f64 * scale;
    let y = cell.1.max(prev.1) as f64 * scale;
    ((x - origin.x) / dir.x, (y - origin.y) / dir.y)
}

/// Exact distance from `origin` along `dir` to the crossed edge of `cell`.
fn edge_distance(origin: Position, dir: DVec2, cell: (i64, i64), side: Side, scale: f64) -> f64 {
    // Axis-aligned rays: the hit edge is straight ahead.
    if dir.x == 0.0 {
        let far = if dir.y < 0.0 { 1 } else { 0 };
        return ((cell.1 + far) as f64 * scale - origin.y).abs();
    }
    if dir.y == 0.0 {
        let far = if dir.x < 0.0 { 1 } else { 0 };
        return ((cell.0 + far) as f64 * scale - origin.x).abs();
    }

    let hit = match side {
        Side::North | Side::South => {
            let y = (cell.1 + (side == Side::South) as i64) as f64 * scale;
            let slope = dir.y / dir.x;
            DVec2::new((y - origin.y) / slope + origin.x, y)
        }
        Side::East | Side::West => {
            let x = (cell.0 + (side == Side::East) as i64) as f64 * scale;
            let slope = dir.x / dir.y;
            DVec2::new(x, (x - origin.x) / slope + origin.y)
        }
    };
    origin.distance(hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::TAU;

    fn boxed_room() -> WorldGrid {
        WorldGrid::from_rows(&["rrr", "rPr", "rrr"], 10.0).unwrap()
    }

    fn corridor() -> WorldGrid {
        WorldGrid::from_rows(&["rrrrrrr", "rP    g", "rrrrrrr"], 10.0).unwrap()
    }

    #[test]
    fn straight_ahead_hits_north_edge() {
        let world = boxed_room();
        let origin = world.find_start_position().unwrap();
        let hit = RayCaster::default().cast(&world, origin, 0.0, 0.0);
        assert_eq!(hit.side, Some(Side::North));
        assert_eq!(hit.cell, Some((1, 2)));
        assert!((hit.distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn axis_aligned_distance_is_tiles_times_scale() {
        let world = corridor();
        // Facing +x: angle -pi/2 gives direction (1, ~0).
        let origin = DVec2::new(15.0, 15.0);
        let angle = -FRAC_PI_2;
        let hit = RayCaster::default().cast(&world, origin, angle, angle);
        assert_eq!(hit.side, Some(Side::West));
        assert_eq!(hit.cell, Some((6, 1)));
        assert_eq!(hit.color, Rgb::from_hex(0x22FF22));
        assert!((hit.distance - 45.0).abs() < 1e-9);
    }

    #[test]
    fn fish_eye_scales_by_view_offset() {
        let world = corridor();
        let origin = DVec2::new(15.0, 15.0);
        let ray = -FRAC_PI_2 + 0.05;
        let straight = RayCaster::default().cast(&world, origin, ray, ray);
        let offset = RayCaster::default().cast(&world, origin, ray, -FRAC_PI_2);
        assert!((offset.distance - straight.distance * 0.05f64.cos()).abs() < 1e-9);
    }

    #[test]
    fn leaving_the_grid_is_a_miss() {
        let world = WorldGrid::from_rows(&["   ", " P ", "   "], 10.0).unwrap();
        let hit = RayCaster::default().cast(&world, DVec2::new(15.0, 15.0), 1.0, 1.0);
        assert!(hit.is_miss());
        assert!(hit.distance.is_infinite());

        let outside = RayCaster::default().cast(&boxed_room(), DVec2::new(-50.0, 15.0), 0.0, 0.0);
        assert_eq!(outside, RayHit::MISS);
    }

    #[test]
    fn incidence_is_perpendicular_for_head_on_hits() {
        assert!((Side::North.incidence(0.0).sin() - 1.0).abs() < 1e-12);
        assert!((Side::West.incidence(-FRAC_PI_2).sin() - 1.0).abs() < 1e-12);
        assert!((Side::East.incidence(FRAC_PI_2).sin() - 1.0).abs() < 1e-12);
        assert!((Side::South.incidence(PI).sin() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn side_crossing() {
        assert_eq!(Side::crossed((2, 1), (1, 1)), Some(Side::West));
        assert_eq!(Side::crossed((0, 1), (1, 1)), Some(Side::East));
        assert_eq!(Side::crossed((1, 2), (1, 1)), Some(Side::North));
        assert_eq!(Side::crossed((1, 0), (1, 1)), Some(Side::South));
        assert_eq!(Side::crossed((2, 2), (1, 1)), None);
    }

    #[test]
    fn corner_tie_break_uses_last_crossed_edge() {
        let origin = DVec2::new(15.0, 15.0);
        // Crosses x = 20 at t = 6.25 and y = 20 at t = 8.33: entered through the north edge.
        let side = Side::entered(origin, DVec2::new(0.8, 0.6), (2, 2), (1, 1), 10.0);
        assert_eq!(side, Side::North);
        // Crosses x = 20 at t = 8.33 and y = 10 at t = 6.25: entered through the west edge.
        let side = Side::entered(origin, DVec2::new(0.6, -0.8), (2, 0), (1, 1), 10.0);
        assert_eq!(side, Side::West);
    }

    #[test]
    fn ray_through_a_corner_resolves_with_or_without_retries() {
        // The 45 degree ray leaves cell (1, 1) through its corner into the wall at (2, 2).
        let world = WorldGrid::from_rows(&["rrrr", "r  r", "r rr", "rrrr"], 10.0).unwrap();
        let angle = -std::f64::consts::FRAC_PI_4;
        for retries in [0, 4] {
            let caster = RayCaster::new(10, retries);
            let hit = caster.cast(&world, DVec2::new(15.0, 15.0), angle, angle);
            assert!(!hit.is_miss());
            assert_eq!(hit.cell, Some((2, 2)));
            assert!((hit.distance - 50f64.sqrt()).abs() < 1e-2);
        }
    }

    fn pillar_room() -> WorldGrid {
        WorldGrid::from_rows(
            &["rrrrrrr", "r     r", "r  r  r", "r     r", "r     r", "rrrrrrr"],
            10.0,
        )
        .unwrap()
    }

    #[test]
    fn diagonal_step_stops_at_the_wall_it_passes_first() {
        // One sub-step jumps from (1, 1) to (0, 2); the line crosses x = 10 into
        // the wall at (0, 1) before it reaches y = 20.
        let world = pillar_room();
        let origin = DVec2::new(13.3, 17.1);
        let angle = 0.90583;
        let hit = RayCaster::default().cast(&world, origin, angle, angle);
        assert_eq!(hit.cell, Some((0, 1)));
        assert_eq!(hit.side, Some(Side::East));
        assert!((hit.distance - 3.3 / angle.sin()).abs() < 1e-9);
    }

    #[test]
    fn origin_inside_a_wall_is_a_zero_distance_hit() {
        let world = boxed_room();
        let hit = RayCaster::default().cast(&world, DVec2::new(5.0, 5.0), 0.0, 0.0);
        assert_eq!(hit.distance, 0.0);
        assert_eq!(hit.cell, Some((0, 0)));
        assert_eq!(hit.side, Some(Side::North));
        assert_eq!(hit.color, Rgb::from_hex(0xFF2222));

        let facing_west = RayCaster::default().cast(&world, DVec2::new(5.0, 5.0), -FRAC_PI_2, 0.0);
        assert_eq!(facing_west.side, Some(Side::West));
    }

    #[test]
    fn horizontal_edge_distance() {
        let origin = DVec2::new(15.0, 15.0);
        let east = edge_distance(origin, DVec2::new(1.0, 0.0), (6, 1), Side::West, 10.0);
        assert!((east - 45.0).abs() < 1e-12);
        let west = edge_distance(origin, DVec2::new(-1.0, 0.0), (0, 1), Side::East, 10.0);
        assert!((west - 5.0).abs() < 1e-12);
        let south = edge_distance(origin, DVec2::new(0.0, -1.0), (1, 0), Side::South, 10.0);
        assert!((south - 5.0).abs() < 1e-12);
    }

    /// Exact grid traversal: distance along `dir` to the first solid cell.
    fn traversal_distance(world: &WorldGrid, origin: DVec2, dir: DVec2) -> f64 {
        let scale = world.scale();
        let (mut cx, mut cy) = world.cell_of(origin);
        let step_x = if dir.x > 0.0 { 1 } else { -1 };
        let step_y = if dir.y > 0.0 { 1 } else { -1 };
        let first = |c: i64, step: i64, o: f64, d: f64| {
            let edge = (c + (step > 0) as i64) as f64 * scale;
            if d == 0.0 { f64::INFINITY } else { (edge - o) / d }
        };
        let mut t_x = first(cx, step_x, origin.x, dir.x);
        let mut t_y = first(cy, step_y, origin.y, dir.y);
        let dt_x = (scale / dir.x).abs();
        let dt_y = (scale / dir.y).abs();
        loop {
            let t = if t_x < t_y {
                cx += step_x;
                t_x += dt_x;
                t_x - dt_x
            } else {
                cy += step_y;
                t_y += dt_y;
                t_y - dt_y
            };
            if world.tile_at(cx, cy).map_or(true, |tile| tile.is_solid()) {
                return t;
            }
        }
    }

    proptest! {
        #[test]
        fn cast_always_terminates_inside_a_closed_room(
            angle in 0.0f64..TAU,
            ox in 10.5f64..39.5,
            oy in 10.5f64..39.5,
        ) {
            let world = WorldGrid::from_rows(
                &["rrrrr", "r   r", "r   r", "r   r", "rrrrr"],
                10.0,
            ).unwrap();
            let hit = RayCaster::default().cast(&world, DVec2::new(ox, oy), angle, angle);
            prop_assert!(!hit.is_miss());
            // The room is 3 tiles wide: no wall can be farther than its diagonal.
            prop_assert!(hit.distance <= 30.0 * 2f64.sqrt() + 1e-6);
            prop_assert!(hit.incidence.sin() >= -1e-9);
        }

        #[test]
        fn cast_matches_exact_traversal(
            angle in 0.0f64..TAU,
            ox in 10.0f64..60.0,
            oy in 10.0f64..50.0,
        ) {
            let world = pillar_room();
            let cell = world.cell_of(DVec2::new(ox, oy));
            prop_assume!(cell != (3, 2));
            let origin = DVec2::new(ox, oy);
            let hit = RayCaster::default().cast(&world, origin, angle, angle);
            let expected = traversal_distance(&world, origin, RayCaster::direction(angle));
            // Corner retries turn the ray by at most 4e-4 rad.
            prop_assert!(
                (hit.distance - expected).abs() < 0.05,
                "cast {} vs traversal {} at {:?}", hit.distance, expected, hit.cell
            );
        }
    }
}
