use thiserror::Error;

/// Everything that can stop the renderer from starting.
#[derive(Debug, Error)]
pub enum Error {
    /// The map has no tile carrying the player start marker.
    #[error("map has no player start tile `{marker}`")]
    NoStartTile { marker: char },

    #[error("map contains no rows")]
    EmptyMap,

    /// Every row of a map must be as wide as the first one.
    #[error("map row {row} is {found} tiles wide, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("map tile {symbol:?} at ({x}, {y}) is not an ASCII symbol")]
    NonAsciiTile { symbol: char, x: usize, y: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The render worker threads could not be spawned.
    #[error("failed to start render workers")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
