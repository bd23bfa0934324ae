//! Per-pixel colors for one screen column: flat-lit wall run, sky above,
//! fog-graded floor below.

use crate::color::{Rgb, blend};
use crate::config::Config;
use crate::raycast::RayHit;

/// Fog never hides more than this fraction of a color.
pub const MAX_FOG: f64 = 0.8;

#[derive(Clone, Copy, Debug)]
pub struct Shader {
    pub min_fog_distance: f64,
    pub max_fog_distance: f64,
    pub fog_color: Rgb,
    pub light_color: Rgb,
    pub sky_color: Rgb,
    pub floor_color: Rgb,
}

impl Shader {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_fog_distance: config.min_fog_distance,
            max_fog_distance: config.max_fog_distance,
            fog_color: config.fog_color,
            light_color: config.light_color,
            sky_color: config.sky_color,
            floor_color: config.floor_color,
        }
    }

    /// Fog blend factor for a depth in tiles, in `[0, MAX_FOG]`.
    pub fn fog_amount(&self, depth: f64) -> f64 {
        if depth.is_nan() || depth <= self.min_fog_distance {
            return 0.0;
        }
        ((depth - self.min_fog_distance) / (self.max_fog_distance - self.min_fog_distance))
            .min(MAX_FOG)
    }

    #[inline]
    fn fogged(&self, color: Rgb, depth: f64) -> Rgb {
        let fog = self.fog_amount(depth);
        if fog > 0.0 { blend(color, self.fog_color, fog) } else { color }
    }

    /// Lit and fogged color of a wall hit.
    pub fn wall_color(&self, hit: &RayHit, depth: f64) -> Rgb {
        let light = hit.incidence.sin().clamp(0.0, 1.0).sqrt();
        self.fogged(blend(self.light_color, hit.color, light), depth)
    }

    /// Floor color of screen row `y`, graded by the distance that row looks at.
    pub fn floor_row_color(&self, y: usize, screen_height: usize) -> Rgb {
        let depth = screen_height as f64 / ((y as f64 - screen_height as f64 / 2.0) * 2.0);
        self.fogged(self.floor_color, depth)
    }

    /// Rows `[top, bottom)` covered by a wall at `depth` tiles.
    pub fn wall_span(depth: f64, screen_height: usize) -> (usize, usize) {
        let h = screen_height as i64;
        // Saturating float cast: a zero depth covers the whole column.
        let wall = ((screen_height as f64 / depth) as i64).clamp(0, h);
        (((h - wall) / 2) as usize, ((h + wall) / 2) as usize)
    }

    /// Fill `rows` (one entry per screen row, top to bottom) for a column
    /// whose ray produced `hit`. `scale` converts the hit distance to tiles.
    pub fn shade_column(&self, hit: &RayHit, scale: f64, rows: &mut [Rgb]) {
        let height = rows.len();
        let depth = hit.depth(scale);
        let (top, bottom) = if hit.is_miss() {
            (height / 2, height / 2)
        } else {
            Self::wall_span(depth, height)
        };
        let wall = self.wall_color(hit, depth);

        for (y, px) in rows.iter_mut().enumerate() {
            *px = if (top..bottom).contains(&y) {
                wall
            } else if y < height / 2 {
                self.sky_color
            } else {
                self.floor_row_color(y, height)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raycast::Side;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_PI_2;

    fn shader() -> Shader {
        Shader::from_config(&Config::default())
    }

    fn hit_at(distance: f64) -> RayHit {
        RayHit {
            distance,
            color: Rgb::from_hex(0xFF2222),
            incidence: FRAC_PI_2,
            side: Some(Side::North),
            cell: Some((0, 0)),
        }
    }

    #[test]
    fn fog_is_zero_up_close_and_capped_far_away() {
        let s = shader();
        assert_eq!(s.fog_amount(0.0), 0.0);
        assert_eq!(s.fog_amount(s.min_fog_distance), 0.0);
        assert!((s.fog_amount(11.0) - 0.5).abs() < 1e-12);
        assert_eq!(s.fog_amount(1e9), MAX_FOG);
        assert_eq!(s.fog_amount(f64::INFINITY), MAX_FOG);
    }

    proptest! {
        #[test]
        fn fog_is_monotonic_and_bounded(a in -100.0f64..1e4, b in -100.0f64..1e4) {
            let s = shader();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(s.fog_amount(lo) <= s.fog_amount(hi));
            prop_assert!((0.0..=MAX_FOG).contains(&s.fog_amount(hi)));
        }
    }

    #[test]
    fn head_on_hit_keeps_tile_color() {
        let s = shader();
        assert_eq!(s.wall_color(&hit_at(10.0), 1.0), Rgb::from_hex(0xFF2222));
        let grazing = RayHit { incidence: 0.0, ..hit_at(10.0) };
        assert_eq!(s.wall_color(&grazing, 1.0), s.light_color);
    }

    #[test]
    fn wall_span_is_centered() {
        assert_eq!(Shader::wall_span(2.0, 600), (150, 450));
        assert_eq!(Shader::wall_span(0.0, 600), (0, 600));
        assert_eq!(Shader::wall_span(0.5, 600), (0, 600));
        assert_eq!(Shader::wall_span(f64::INFINITY, 600), (300, 300));
    }

    #[test]
    fn column_is_sky_wall_floor() {
        let s = shader();
        let mut rows = vec![Rgb::BLACK; 600];
        // 20 world units at scale 10: two tiles, no fog.
        s.shade_column(&hit_at(20.0), 10.0, &mut rows);
        assert!(rows[..150].iter().all(|&c| c == s.sky_color));
        assert!(rows[150..450].iter().all(|&c| c == Rgb::from_hex(0xFF2222)));
        assert_eq!(rows[450], s.floor_color);
        assert_eq!(rows[599], s.floor_color);
        // Floor just under the horizon looks far away and is fogged.
        assert_ne!(s.floor_row_color(301, 600), s.floor_color);
    }

    #[test]
    fn miss_renders_only_sky_and_floor() {
        let s = shader();
        let mut rows = vec![Rgb::BLACK; 100];
        s.shade_column(&RayHit::MISS, 10.0, &mut rows);
        assert!(rows[..50].iter().all(|&c| c == s.sky_color));
        for (y, &c) in rows.iter().enumerate().skip(50) {
            assert_eq!(c, s.floor_row_color(y, 100));
        }
    }
}
