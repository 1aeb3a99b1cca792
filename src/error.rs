use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum GameError {
    #[error("grid sides must be between 1 and 255, got {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("at least two colors are required (empty plus one fill), got {0}")]
    TooFewColors(u8),

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedGrid {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("cell value {value} is outside the palette of {max_colors} colors")]
    ColorOutOfRange { value: u8, max_colors: u8 },

    #[error("a piece sequence needs at least one shape")]
    EmptyPieceSequence,
}
