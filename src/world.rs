use glam::DVec2;
use thiserror::Error;

use crate::color::Rgb;
use crate::error::{Error, Result};

/// Point in world units (not tile units).
pub type Position = DVec2;

pub const EMPTY_SYMBOL: u8 = b' ';
pub const START_SYMBOL: u8 = b'P';

/// Color of walls whose symbol has no entry in the table.
pub const DEFAULT_WALL_COLOR: Rgb = Rgb::from_hex(0x222222);

const WALL_COLORS: [(u8, Rgb); 3] = [
    (b'r', Rgb::from_hex(0xFF2222)),
    (b'g', Rgb::from_hex(0x22FF22)),
    (b'b', Rgb::from_hex(0x2222FF)),
];

/// The level shipped with the binary.
pub const DEFAULT_MAP: &str = "\
rrrrrrrrrrrrrrrrrrrrrrrrrrrrrr
r                 r          r
r                 r          r
r   P             r          r
r                 r          r
r                 r          r
r                 r          r
r     rrrrrrrrrrrrr     rrrrrr
r                 r          r
r  r              r          r
r                 r          r
r                            r
r                            r
r    rr           rrrrr    rrr
r                 r          r
r                 r          r
r                 r          r
r                 r          r
rrrrrrrrrrrrrrrrrrrrrrrrrrrrrr
";

/// One cell of the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tile {
    Empty,
    Start,
    Wall(u8),
}

impl Tile {
    #[inline]
    pub fn from_symbol(symbol: u8) -> Self {
        match symbol {
            EMPTY_SYMBOL => Tile::Empty,
            START_SYMBOL => Tile::Start,
            s => Tile::Wall(s),
        }
    }

    /// Rays pass through empty cells and the start cell.
    #[inline]
    pub fn is_solid(self) -> bool {
        matches!(self, Tile::Wall(_))
    }

    /// Flat color of a wall tile; `None` for walkable tiles.
    pub fn color(self) -> Option<Rgb> {
        match self {
            Tile::Wall(symbol) => Some(wall_color(symbol)),
            Tile::Empty | Tile::Start => None,
        }
    }
}

/// Symbol → wall color lookup, falling back to [`DEFAULT_WALL_COLOR`].
pub fn wall_color(symbol: u8) -> Rgb {
    WALL_COLORS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map_or(DEFAULT_WALL_COLOR, |(_, c)| *c)
}

/// A lookup landed outside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("tile ({x}, {y}) lies outside the grid")]
pub struct OutOfBounds {
    pub x: i64,
    pub y: i64,
}

/// Immutable tile map with a fixed world-units-per-tile scale.
#[derive(Clone, Debug)]
pub struct WorldGrid {
    tiles: Vec<u8>,
    width: usize,
    height: usize,
    scale: f64,
}

impl WorldGrid {
    /// Parse a text map: one row per line, one ASCII symbol per tile.
    pub fn parse(text: &str, scale: f64) -> Result<Self> {
        let mut rows: Vec<&str> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        Self::from_rows(&rows, scale)
    }

    pub fn from_rows<S: AsRef<str>>(rows: &[S], scale: f64) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "world scale must be positive, got {scale}"
            )));
        }
        let width = rows.first().map_or(0, |r| r.as_ref().chars().count());
        if width == 0 {
            return Err(Error::EmptyMap);
        }

        let mut tiles = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let found = row.chars().count();
            if found != width {
                return Err(Error::RaggedRow {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, symbol) in row.chars().enumerate() {
                if !symbol.is_ascii() {
                    return Err(Error::NonAsciiTile { symbol, x, y });
                }
                tiles.push(symbol as u8);
            }
        }

        Ok(Self {
            tiles,
            width,
            height: rows.len(),
            scale,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// World units per tile.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Bounds-checked tile lookup in tile coordinates.
    #[inline]
    pub fn tile_at(&self, x: i64, y: i64) -> std::result::Result<Tile, OutOfBounds> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return Err(OutOfBounds { x, y });
        }
        Ok(Tile::from_symbol(
            self.tiles[y as usize * self.width + x as usize],
        ))
    }

    /// Tile coordinates of the cell containing `p`.
    #[inline]
    pub fn cell_of(&self, p: Position) -> (i64, i64) {
        let c = (p / self.scale).floor();
        (c.x as i64, c.y as i64)
    }

    /// World position of the first start tile in row-major order (its origin corner).
    pub fn find_start_position(&self) -> Result<Position> {
        let index = self
            .tiles
            .iter()
            .position(|&s| s == START_SYMBOL)
            .ok_or(Error::NoStartTile {
                marker: START_SYMBOL as char,
            })?;
        let (x, y) = (index % self.width, index / self.width);
        Ok(DVec2::new(x as f64, y as f64) * self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> WorldGrid {
        WorldGrid::from_rows(&["rgb", "xP ", "rrr"], 10.0).unwrap()
    }

    #[test]
    fn default_map_is_well_formed() {
        let world = WorldGrid::parse(DEFAULT_MAP, 10.0).unwrap();
        assert_eq!((world.width(), world.height()), (30, 19));
        assert_eq!(world.find_start_position().unwrap(), DVec2::new(40.0, 30.0));
    }

    #[test]
    fn tile_lookup_classifies_symbols() {
        let world = sample();
        assert_eq!(world.tile_at(0, 0), Ok(Tile::Wall(b'r')));
        assert_eq!(world.tile_at(1, 1), Ok(Tile::Start));
        assert_eq!(world.tile_at(2, 1), Ok(Tile::Empty));
        assert_eq!(world.tile_at(0, 1).unwrap().color(), Some(DEFAULT_WALL_COLOR));
        assert_eq!(world.tile_at(1, 0).unwrap().color(), Some(Rgb::from_hex(0x22FF22)));
        assert_eq!(world.tile_at(3, 0), Err(OutOfBounds { x: 3, y: 0 }));
        assert_eq!(world.tile_at(0, -1), Err(OutOfBounds { x: 0, y: -1 }));
    }

    #[test]
    fn start_is_tile_origin_corner() {
        assert_eq!(sample().find_start_position().unwrap(), DVec2::new(10.0, 10.0));
    }

    #[test]
    fn missing_start_is_an_error() {
        let world = WorldGrid::from_rows(&["rrr", "r r", "rrr"], 1.0).unwrap();
        assert!(matches!(
            world.find_start_position(),
            Err(Error::NoStartTile { marker: 'P' })
        ));
    }

    #[test]
    fn parse_rejects_bad_maps() {
        assert!(matches!(WorldGrid::parse("", 1.0), Err(Error::EmptyMap)));
        assert!(matches!(
            WorldGrid::parse("rrr\nrr\n", 1.0),
            Err(Error::RaggedRow { row: 1, expected: 3, found: 2 })
        ));
        assert!(matches!(
            WorldGrid::parse("rér", 1.0),
            Err(Error::NonAsciiTile { x: 1, y: 0, .. })
        ));
        assert!(matches!(
            WorldGrid::parse("r", 0.0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn parse_strips_carriage_returns() {
        let world = WorldGrid::parse("rr\r\nPr\r\n\r\n", 1.0).unwrap();
        assert_eq!((world.width(), world.height()), (2, 2));
    }

    proptest! {
        #[test]
        fn tile_at_is_total(x in -10i64..20, y in -10i64..20) {
            let world = sample();
            let inside = (0..3).contains(&x) && (0..3).contains(&y);
            match world.tile_at(x, y) {
                Ok(tile) => {
                    prop_assert!(inside);
                    if let Some(c) = tile.color() {
                        prop_assert!(WALL_COLORS.iter().any(|(_, w)| *w == c) || c == DEFAULT_WALL_COLOR);
                    }
                }
                Err(e) => {
                    prop_assert!(!inside);
                    prop_assert_eq!(e, OutOfBounds { x, y });
                }
            }
        }
    }
}
