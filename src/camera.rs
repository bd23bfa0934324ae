/// Perspective projection from screen columns to view angles.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub half_fov: f64, // radians
    pub focal: f64,    // distance from eye to image plane, in pixels
    width: usize,
}

impl Camera {
    pub fn new(width: usize, fov_x_deg: f64) -> Self {
        let mut camera = Self {
            half_fov: 0.0,
            focal: 0.0,
            width,
        };
        camera.set_fov_from_horizontal(width, fov_x_deg);
        camera
    }

    pub fn set_fov_from_horizontal(&mut self, width: usize, fov_x_deg: f64) {
        self.width = width;
        self.half_fov = 0.5 * fov_x_deg.to_radians();
        self.focal = (width / 2) as f64 / self.half_fov.tan();
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Ray angle through the center of screen column `x` for a viewer facing `yaw`.
    #[inline]
    pub fn column_angle(&self, x: usize, yaw: f64) -> f64 {
        let offset = x as f64 - (self.width / 2) as f64;
        yaw + (offset / self.focal).atan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_column_looks_straight_ahead() {
        let cam = Camera::new(800, 100.0);
        assert_eq!(cam.column_angle(400, 0.25), 0.25);
    }

    #[test]
    fn screen_edges_span_the_fov() {
        let cam = Camera::new(640, 90.0);
        assert!((cam.focal - 320.0).abs() < 1e-9);
        assert!((cam.column_angle(0, 0.0) + cam.half_fov).abs() < 1e-9);
        // Columns to the right turn the ray the same way a right turn does.
        assert!(cam.column_angle(639, 0.0) > 0.0);
    }
}
