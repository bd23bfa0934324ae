use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec2;

use crate::config::Config;
use crate::raycast::RayCaster;
use crate::world::Position;

/// Where the viewer stands and which way it faces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerState {
    pub position: Position,
    pub angle: f64, // radians, 0 looks down +y
}

impl PlayerState {
    pub fn new(position: Position, angle: f64) -> Self {
        Self { position, angle }
    }

    #[inline]
    pub fn forward(&self) -> DVec2 {
        RayCaster::direction(self.angle)
    }

    #[inline]
    pub fn right(&self) -> DVec2 {
        RayCaster::direction(self.angle + FRAC_PI_2)
    }
}

/// Control snapshot gathered between two frames.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlInput {
    pub forward: bool,
    pub back: bool,
    pub strafe_left: bool,
    pub strafe_right: bool,
    pub turn_left: bool,
    pub turn_right: bool,
    /// Relative horizontal mouse motion since the last frame.
    pub mouse_dx: f64,
}

impl ControlInput {
    /// Clear the per-frame accumulators; held keys stay held.
    #[inline]
    pub fn end_frame(&mut self) {
        self.mouse_dx = 0.0;
    }
}

#[inline]
fn axis(positive: bool, negative: bool) -> f64 {
    match (positive, negative) {
        (true, false) => 1.0,
        (false, true) => -1.0,
        _ => 0.0,
    }
}

/// Fold any angle into `[-pi, pi)` to avoid float drift.
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Frame-rate independent player movement.
#[derive(Clone, Copy, Debug)]
pub struct PlayerIntegrator {
    pub linear_speed: f64,
    pub turn_speed: f64,
    pub mouse_sensitivity: f64,
}

impl PlayerIntegrator {
    pub fn from_config(config: &Config) -> Self {
        Self {
            linear_speed: config.linear_speed,
            turn_speed: config.turn_speed,
            mouse_sensitivity: config.mouse_sensitivity,
        }
    }

    /// Apply one frame of input over `dt` seconds.
    pub fn advance(&self, player: PlayerState, input: &ControlInput, dt: f64) -> PlayerState {
        let mut next = player;

        let turn = input.mouse_dx / 1000.0 * self.mouse_sensitivity
            + axis(input.turn_right, input.turn_left) * self.turn_speed * dt;
        if turn != 0.0 {
            next.angle = wrap_angle(next.angle + turn);
        }

        let fwd = axis(input.forward, input.back);
        let strafe = axis(input.strafe_right, input.strafe_left);
        let step = self.linear_speed * dt;
        if fwd != 0.0 {
            next.position += next.forward() * fwd * step;
        }
        if strafe != 0.0 {
            next.position += next.right() * strafe * step;
        }
        next
    }
}
