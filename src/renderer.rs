use std::ops::Range;

use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use crate::{
    camera::Camera,
    color::Rgb,
    config::Config,
    error::Result,
    player::PlayerState,
    raycast::RayCaster,
    shading::Shader,
    world::WorldGrid,
};

pub const CHANNELS: usize = 3;

/// Row-major RGB8 frame, `width * height * 3` bytes.
pub struct FrameBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0; width * height * CHANNELS],
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        let i = (y * self.width + x) * CHANNELS;
        Rgb(self.data[i], self.data[i + 1], self.data[i + 2])
    }

    /// Split the frame into `count` contiguous column bands.
    ///
    /// Each band borrows its own slice of every row, so bands can be written
    /// from different threads without any locking.
    pub fn column_bands(&mut self, count: usize) -> Vec<ColumnBand<'_>> {
        let ranges = band_ranges(self.width, count);
        let mut bands: Vec<ColumnBand<'_>> = ranges
            .iter()
            .map(|columns| ColumnBand {
                columns: columns.clone(),
                rows: Vec::with_capacity(self.height),
            })
            .collect();
        if self.width == 0 {
            return bands;
        }

        for row in self.data.chunks_exact_mut(self.width * CHANNELS) {
            let mut rest = row;
            for band in bands.iter_mut() {
                let (head, tail) =
                    std::mem::take(&mut rest).split_at_mut(band.columns.len() * CHANNELS);
                band.rows.push(head);
                rest = tail;
            }
        }
        bands
    }
}

/// `count` contiguous, non-overlapping column ranges covering `0..width`.
pub fn band_ranges(width: usize, count: usize) -> Vec<Range<usize>> {
    let count = count.max(1);
    (0..count)
        .map(|i| (i * width / count)..((i + 1) * width / count))
        .collect()
}

/// Exclusive write view over a range of screen columns.
pub struct ColumnBand<'a> {
    columns: Range<usize>,
    rows: Vec<&'a mut [u8]>,
}

impl ColumnBand<'_> {
    #[inline]
    pub fn columns(&self) -> Range<usize> {
        self.columns.clone()
    }

    /// Write a full column top to bottom. `x` is a screen column inside this band.
    pub fn write_column(&mut self, x: usize, colors: &[Rgb]) {
        let i = (x - self.columns.start) * CHANNELS;
        for (row, c) in self.rows.iter_mut().zip(colors) {
            row[i..i + CHANNELS].copy_from_slice(&[c.0, c.1, c.2]);
        }
    }
}

/// Everything a frame needs besides the player: built once at startup.
pub struct RenderContext {
    pub world: WorldGrid,
    pub camera: Camera,
    pub caster: RayCaster,
    pub shader: Shader,
    pub height: usize,
}

impl RenderContext {
    pub fn new(world: WorldGrid, config: &Config) -> Self {
        Self {
            world,
            camera: Camera::new(config.width, config.fov_degrees),
            caster: RayCaster::new(config.substeps_per_tile, config.max_cast_retries),
            shader: Shader::from_config(config),
            height: config.height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.camera.width()
    }

    /// Cast, shade and write screen column `x`. `scratch` holds one color per row.
    pub fn render_column(
        &self,
        x: usize,
        player: &PlayerState,
        band: &mut ColumnBand<'_>,
        scratch: &mut [Rgb],
    ) {
        let ray_angle = self.camera.column_angle(x, player.angle);
        let hit = self
            .caster
            .cast(&self.world, player.position, ray_angle, player.angle);
        self.shader.shade_column(&hit, self.world.scale(), scratch);
        band.write_column(x, scratch);
    }

    fn render_band(&self, player: &PlayerState, mut band: ColumnBand<'_>) {
        let mut scratch = vec![Rgb::BLACK; self.height];
        for x in band.columns() {
            self.render_column(x, player, &mut band, &mut scratch);
        }
    }
}

/// Fans a frame out over a fixed set of worker threads, one column band each.
pub struct FrameScheduler {
    pool: ThreadPool,
    workers: usize,
}

impl FrameScheduler {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("render-{i}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Render every column of `frame`; returns once all bands are written.
    ///
    /// `player` is a snapshot: every column of the frame sees the same state.
    pub fn render_frame(&self, ctx: &RenderContext, player: PlayerState, frame: &mut FrameBuffer) {
        debug_assert_eq!(frame.width(), ctx.width());
        debug_assert_eq!(frame.height(), ctx.height);

        let bands = frame.column_bands(self.workers);
        self.pool.install(|| {
            bands
                .into_par_iter()
                .with_max_len(1)
                .for_each(|band| ctx.render_band(&player, band));
        });
    }
}
