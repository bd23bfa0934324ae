//! Tile-grid raycaster.
//!
//! Core modules:
//! - `world`: immutable tile map and start lookup
//! - `raycast`: grid ray marching with exact edge distances
//! - `shading`: wall lighting, fog, sky and floor colors
//! - `renderer`: column rendering and the multi-threaded frame scheduler
//! - `player`: frame-rate independent movement
//! - `scaler`: stretching the finished frame onto a window surface

pub mod camera;
pub mod color;
pub mod config;
pub mod error;
pub mod player;
pub mod raycast;
pub mod renderer;
pub mod scaler;
pub mod shading;
pub mod world;

pub use color::{Rgb, blend};
pub use config::Config;
pub use error::{Error, Result};
pub use player::{ControlInput, PlayerIntegrator, PlayerState};
pub use raycast::{RayCaster, RayHit, Side};
pub use renderer::{FrameBuffer, FrameScheduler, RenderContext};
pub use shading::Shader;
pub use world::{Position, Tile, WorldGrid};
