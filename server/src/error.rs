use shared::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Map(#[from] MapError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("no more colors available")]
    ColorPoolExhausted,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("unknown tile code {code} at row {row}, column {col}")]
    UnknownTileCode { row: usize, col: usize, code: u8 },
    #[error("layout cell {cell:?} at row {row}, column {col} is not a digit")]
    InvalidCell { row: usize, col: usize, cell: char },
    #[error("map layout has no rows")]
    EmptyLayout,
    #[error("map pool has no race maps")]
    EmptyPool,
}
